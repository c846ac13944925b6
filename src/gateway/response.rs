//! Encoding gateway results as wire responses.

use super::values::{write_row_header, write_value};
use crate::codec::Message;
use crate::engine::DbError;
use crate::error::Result;
use rusqlite::types::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ResponseType {
    Welcome = 0,
    Servers = 1,
    Db = 2,
    Stmt = 3,
    Result = 4,
    Rows = 5,
    Empty = 6,
    Failure = 7,
    DbError = 8,
}

#[derive(Debug, Clone)]
pub enum Response {
    Welcome { leader: String, heartbeat_timeout_ms: u64 },
    Servers { addresses: Vec<String> },
    Db { id: u32 },
    Stmt { db_id: u32, id: u32 },
    Result { last_insert_id: i64, rows_affected: u64 },
    Rows { rows: Vec<Vec<Value>> },
    Empty,
    Failure { message: String },
    DbError(DbError),
}

impl Response {
    fn response_type(&self) -> ResponseType {
        match self {
            Self::Welcome { .. } => ResponseType::Welcome,
            Self::Servers { .. } => ResponseType::Servers,
            Self::Db { .. } => ResponseType::Db,
            Self::Stmt { .. } => ResponseType::Stmt,
            Self::Result { .. } => ResponseType::Result,
            Self::Rows { .. } => ResponseType::Rows,
            Self::Empty => ResponseType::Empty,
            Self::Failure { .. } => ResponseType::Failure,
            Self::DbError(_) => ResponseType::DbError,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut message = Message::new(self.response_type() as u8);
        {
            let mut w = message.writer();
            match self {
                Self::Welcome { leader, heartbeat_timeout_ms } => {
                    w.put_text(leader).put_uint64(*heartbeat_timeout_ms);
                }
                Self::Servers { addresses } => {
                    for address in addresses {
                        w.put_text(address);
                    }
                    // A zero-length entry terminates the list, the wire
                    // stand-in for the original's NULL sentinel.
                    w.put_text("");
                }
                Self::Db { id } => {
                    w.put_uint32(*id);
                }
                Self::Stmt { db_id, id } => {
                    w.put_uint32(*db_id).put_uint32(*id);
                }
                Self::Result { last_insert_id, rows_affected } => {
                    w.put_int64(*last_insert_id).put_uint64(*rows_affected);
                }
                Self::Rows { rows } => {
                    for row in rows {
                        write_row_header(&mut w, row);
                        for value in row {
                            write_value(&mut w, value);
                        }
                    }
                }
                Self::Empty => {}
                Self::Failure { message: text } => {
                    w.put_text(text);
                }
                Self::DbError(err) => {
                    #[expect(clippy::cast_sign_loss, reason = "sqlite result codes are small non-negative ints in practice")]
                    w.put_uint32(err.code as u32).put_uint32(err.extended_code as u32).put_text(&err.description);
                }
            }
        }
        message.encode()
    }
}
