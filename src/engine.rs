//! The embedded SQL engine capability: open/prepare/exec/query/finalize,
//! and the named in-memory VFS registry OPEN requires.
//!
//! Both are external collaborators per this crate's scope (the gateway only
//! consumes them through the traits below); the `rusqlite`-backed
//! implementations here are the concrete default, grounded the way
//! `conduit`'s sqlite storage `Pool`/`Engine` wrap `rusqlite::Connection` in
//! a mutex per connection rather than assuming single-threaded access.

use crate::error::{Error, Result};
use bitflags::bitflags;
use rusqlite::types::Value;
use rusqlite::Connection;
use std::collections::HashSet;
use std::sync::Mutex;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        const READONLY = 0x01;
        const READWRITE = 0x02;
        const CREATE = 0x04;
    }
}

/// SQLite's own result-code space, surfaced verbatim to clients.
pub const SQLITE_MISUSE: i32 = 21;
const SQLITE_ERROR: i32 = 1;

/// A SQLite-layer failure, reported as a response payload rather than an
/// `Error`: per this crate's rule, a storage-engine failure is a result a
/// client can inspect, not an API misuse on the core's part.
#[derive(Debug, Clone)]
pub struct DbError {
    pub code: i32,
    pub extended_code: i32,
    pub description: String,
}

impl DbError {
    pub fn misuse(description: impl Into<String>) -> Self {
        Self {
            code: SQLITE_MISUSE,
            extended_code: SQLITE_MISUSE,
            description: description.into(),
        }
    }

    fn from_rusqlite(e: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(ffi_err, ref msg) = e {
            Self {
                code: ffi_err.extended_code & 0xff,
                extended_code: ffi_err.extended_code,
                description: msg.clone().unwrap_or_else(|| e.to_string()),
            }
        } else {
            Self {
                code: SQLITE_ERROR,
                extended_code: SQLITE_ERROR,
                description: e.to_string(),
            }
        }
    }
}

pub struct ExecResult {
    pub last_insert_id: i64,
    pub rows_affected: u64,
}

/// A single open connection and the statements registered against it.
///
/// Prepared statements are kept as SQL text rather than a compiled
/// `rusqlite::Statement`: a `Statement<'conn>` borrows its `Connection`,
/// which would make `Database` self-referential for no real benefit, since
/// `rusqlite::Connection::prepare_cached` already caches the compiled plan
/// internally keyed by SQL text. The id a client sees is this crate's own
/// bookkeeping; the cache is what actually avoids re-parsing.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(uri: &str, flags: OpenFlags) -> std::result::Result<Self, DbError> {
        if flags.contains(OpenFlags::CREATE) && !flags.intersects(OpenFlags::READONLY | OpenFlags::READWRITE) {
            return Err(DbError::misuse("CREATE requires READONLY or READWRITE"));
        }
        if flags.contains(OpenFlags::READONLY) && flags.contains(OpenFlags::READWRITE) {
            return Err(DbError::misuse("READONLY and READWRITE are mutually exclusive"));
        }

        let mut rusqlite_flags = rusqlite::OpenFlags::SQLITE_OPEN_URI;
        rusqlite_flags |= if flags.contains(OpenFlags::READWRITE) {
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
        } else {
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
        };
        if flags.contains(OpenFlags::CREATE) {
            rusqlite_flags |= rusqlite::OpenFlags::SQLITE_OPEN_CREATE;
        }

        let conn = Connection::open_with_flags(uri, rusqlite_flags).map_err(DbError::from_rusqlite)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Validate `sql` compiles against this connection. Returns the SQL
    /// text, which is the statement "handle" this crate hands back to the
    /// caller as an id-registry entry.
    pub fn prepare(&self, sql: &str) -> std::result::Result<String, DbError> {
        #[expect(clippy::unwrap_used, reason = "a poisoned connection mutex is already fatal")]
        let conn = self.conn.lock().unwrap();
        conn.prepare(sql).map_err(DbError::from_rusqlite)?;
        Ok(sql.to_owned())
    }

    pub fn exec(&self, sql: &str, params: &[Value]) -> std::result::Result<ExecResult, DbError> {
        #[expect(clippy::unwrap_used, reason = "a poisoned connection mutex is already fatal")]
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(sql).map_err(DbError::from_rusqlite)?;
        let params_ref: Vec<&dyn rusqlite::ToSql> = params.iter().map(|v| v as &dyn rusqlite::ToSql).collect();
        let rows_affected = stmt
            .execute(params_ref.as_slice())
            .map_err(DbError::from_rusqlite)?;
        Ok(ExecResult {
            last_insert_id: conn.last_insert_rowid(),
            rows_affected: rows_affected as u64,
        })
    }

    /// Run `sql` and invoke `row_cb` once per result row with its column
    /// values in SQLite's dynamic typing.
    pub fn query(
        &self,
        sql: &str,
        params: &[Value],
        mut row_cb: impl FnMut(&[Value]) -> Result<()>,
    ) -> std::result::Result<(), DbError> {
        #[expect(clippy::unwrap_used, reason = "a poisoned connection mutex is already fatal")]
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(sql).map_err(DbError::from_rusqlite)?;
        let params_ref: Vec<&dyn rusqlite::ToSql> = params.iter().map(|v| v as &dyn rusqlite::ToSql).collect();
        let column_count = stmt.column_count();
        let mut rows = stmt.query(params_ref.as_slice()).map_err(DbError::from_rusqlite)?;
        while let Some(row) = rows.next().map_err(DbError::from_rusqlite)? {
            let values: std::result::Result<Vec<Value>, _> = (0..column_count).map(|i| row.get(i)).collect();
            let values = values.map_err(DbError::from_rusqlite)?;
            row_cb(&values).map_err(|e| DbError {
                code: SQLITE_ERROR,
                extended_code: SQLITE_ERROR,
                description: e.to_string(),
            })?;
        }
        Ok(())
    }
}

/// Tracks which VFS names OPEN may reference. The real in-memory page
/// storage behind a name is SQLite's own shared-cache `:memory:` database,
/// which is this crate's out-of-scope collaborator for page storage; this
/// registry only owns the name-to-availability bookkeeping the gateway
/// needs to reject an unregistered `vfs` value up front.
pub struct VfsRegistry {
    names: Mutex<HashSet<String>>,
}

impl VfsRegistry {
    pub fn new() -> Self {
        Self { names: Mutex::new(HashSet::new()) }
    }

    pub fn register(&self, name: &str) -> Result<()> {
        #[expect(clippy::unwrap_used, reason = "a poisoned registry mutex is already fatal")]
        let mut names = self.names.lock().unwrap();
        names.insert(name.to_owned());
        Ok(())
    }

    /// Build the connection URI for database `db_name` under the named
    /// VFS, or `NotFound` if that name was never registered.
    pub fn uri_for(&self, db_name: &str, vfs_name: &str) -> Result<String> {
        #[expect(clippy::unwrap_used, reason = "a poisoned registry mutex is already fatal")]
        let names = self.names.lock().unwrap();
        if !names.contains(vfs_name) {
            return Err(Error::NotFound(format!("no vfs registered with name {vfs_name}")));
        }
        Ok(format!("file:/{vfs_name}/{db_name}?mode=memory&cache=shared"))
    }
}

impl Default for VfsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_without_readwrite_or_readonly_is_misuse() {
        let err = Database::open("file::memory:", OpenFlags::CREATE).unwrap_err();
        assert_eq!(err.code, SQLITE_MISUSE);
    }

    #[test]
    fn open_prepare_exec_query_round_trip() {
        let db = Database::open(
            "file::memory:?cache=shared",
            OpenFlags::READWRITE | OpenFlags::CREATE,
        )
        .unwrap();
        db.exec("CREATE TABLE foo (n INT, t TEXT)", &[]).unwrap();
        let insert = db.prepare("INSERT INTO foo (n, t) VALUES (?, ?)").unwrap();
        db.exec(&insert, &[Value::Integer(8), Value::Text("hello".into())]).unwrap();

        let select = db.prepare("SELECT n, t FROM foo").unwrap();
        let mut rows = Vec::new();
        db.query(&select, &[], |values| {
            rows.push(values.to_vec());
            Ok(())
        })
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0], Value::Integer(8));
    }

    #[test]
    fn unregistered_vfs_name_is_not_found() {
        let registry = VfsRegistry::new();
        assert!(registry.uri_for("test.db", "main").is_err());
        registry.register("main").unwrap();
        assert!(registry.uri_for("test.db", "main").is_ok());
    }
}
