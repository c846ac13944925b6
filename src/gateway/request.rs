//! Decoding wire requests into typed values.

use super::values::read_params;
use crate::codec::Message;
use crate::error::{Error, Result};
use rusqlite::types::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RequestType {
    Helo = 0,
    Heartbeat = 1,
    Open = 2,
    Prepare = 3,
    Exec = 4,
    Query = 5,
    Finalize = 6,
}

impl RequestType {
    pub fn from_u8(value: u8) -> Result<Self> {
        Ok(match value {
            0 => Self::Helo,
            1 => Self::Heartbeat,
            2 => Self::Open,
            3 => Self::Prepare,
            4 => Self::Exec,
            5 => Self::Query,
            6 => Self::Finalize,
            other => return Err(Error::Protocol(format!("unknown request type {other}"))),
        })
    }
}

#[derive(Debug, Clone)]
pub enum Request {
    Helo { client_id: u64 },
    Heartbeat { timestamp: u64 },
    Open { name: String, flags: u32, vfs: String },
    Prepare { db_id: u32, sql: String },
    Exec { db_id: u32, stmt_id: u32, params: Vec<Value> },
    Query { db_id: u32, stmt_id: u32, params: Vec<Value> },
    Finalize { db_id: u32, stmt_id: u32 },
}

impl Request {
    pub fn decode(message: &Message) -> Result<Self> {
        let request_type = RequestType::from_u8(message.message_type)?;
        let mut r = message.reader();
        Ok(match request_type {
            RequestType::Helo => Self::Helo {
                client_id: r.get_uint64()?.into_inner(),
            },
            RequestType::Heartbeat => Self::Heartbeat {
                timestamp: r.get_uint64()?.into_inner(),
            },
            RequestType::Open => {
                let name = r.get_text()?.into_inner();
                let flags = r.get_uint32()?.into_inner();
                let vfs = r.get_text()?.into_inner();
                Self::Open { name, flags, vfs }
            }
            RequestType::Prepare => {
                let db_id = r.get_uint32()?.into_inner();
                let sql = r.get_text()?.into_inner();
                Self::Prepare { db_id, sql }
            }
            RequestType::Exec => {
                let db_id = r.get_uint32()?.into_inner();
                let stmt_id = r.get_uint32()?.into_inner();
                let params = read_params(&mut r)?;
                Self::Exec { db_id, stmt_id, params }
            }
            RequestType::Query => {
                let db_id = r.get_uint32()?.into_inner();
                let stmt_id = r.get_uint32()?.into_inner();
                let params = read_params(&mut r)?;
                Self::Query { db_id, stmt_id, params }
            }
            RequestType::Finalize => {
                let db_id = r.get_uint32()?.into_inner();
                let stmt_id = r.get_uint32()?.into_inner();
                Self::Finalize { db_id, stmt_id }
            }
        })
    }
}
