//! Request gateway: decodes wire frames into [`request::Request`]s, drives
//! the embedded SQL engine and thread pool, and encodes the result as a
//! [`response::Response`] frame.
//!
//! `EXEC` is submitted to the pool as ordered work, hashed to a worker
//! thread by the database id; two clients writing to the same database
//! never interleave their statements because `Database` itself serializes
//! access behind its own connection mutex, while unrelated databases run
//! concurrently. `QUERY` runs synchronously on the calling thread: this
//! crate has no server-side cursor, so a query's full row set is collected
//! before the response is built (see `SPEC_FULL.md` §4.6).

pub mod request;
pub mod response;
mod values;

use crate::cluster::ClusterInfo;
use crate::codec::Message;
use crate::config::PoolConfig;
use crate::engine::{Database, OpenFlags, VfsRegistry};
use crate::error::{Error, Result};
use crate::metrics::{IdGenerator, Metrics, MetricsSnapshot};
use crate::pool::Pool;
use crate::registry::Registry;
use request::Request;
use response::Response;
use std::sync::{mpsc, Arc, Mutex};
use std::time::Instant;

/// The single ordered work class every `EXEC` is submitted under. All
/// `EXEC`s share this kind regardless of which database they target; only
/// the cookie (`db_id`) varies, to spread them across worker threads.
const EXEC_ORDER_KIND: u32 = 0;

/// An open database and the statements prepared against it. `statements` is
/// its own mutex rather than living behind the outer `databases` lock, so
/// preparing a statement on one database never blocks a request against
/// another.
struct DbEntry {
    database: Arc<Database>,
    statements: Mutex<Registry<String>>,
}

struct GatewayInner {
    databases: Mutex<Registry<DbEntry>>,
    vfs: VfsRegistry,
    cluster: Box<dyn ClusterInfo>,
    pool: Pool,
    metrics: Metrics,
    ids: IdGenerator,
    heartbeat_timeout_ms: u64,
}

/// A cheaply cloneable handle to the gateway's shared state. Clones are
/// handed to pool-submitted closures so `EXEC` work can reach the database
/// registry from a worker thread.
#[derive(Clone)]
pub struct Gateway(Arc<GatewayInner>);

impl Gateway {
    pub fn new(pool_config: &PoolConfig, cluster: Box<dyn ClusterInfo>, heartbeat_timeout_ms: u64) -> Result<Self> {
        let pool = Pool::new(pool_config.threads)?;
        Ok(Self(Arc::new(GatewayInner {
            databases: Mutex::new(Registry::new("db")),
            vfs: VfsRegistry::new(),
            cluster,
            pool,
            metrics: Metrics::new(),
            ids: IdGenerator::new(),
            heartbeat_timeout_ms,
        })))
    }

    /// Make `name` a valid `vfs` value for a subsequent `OPEN` request.
    pub fn register_vfs(&self, name: &str) -> Result<()> {
        self.0.vfs.register(name)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.0.metrics.snapshot()
    }

    pub fn next_id(&self) -> u64 {
        self.0.ids.generate()
    }

    /// Decode `frame`, dispatch it, and return the encoded response frame.
    pub fn handle(&self, frame: &[u8]) -> Result<Vec<u8>> {
        let message = Message::decode(frame)?;
        let start = Instant::now();
        let response = match self.dispatch(&message) {
            Ok(response) => response,
            Err(Error::NotFound(message) | Error::Protocol(message)) => Response::Failure { message },
            Err(other) => return Err(other),
        };
        self.0.metrics.record(start.elapsed());
        response.encode()
    }

    fn dispatch(&self, message: &Message) -> Result<Response> {
        let request = Request::decode(message)?;
        let label = match &request {
            Request::Helo { .. } => "helo",
            Request::Heartbeat { .. } => "heartbeat",
            Request::Open { .. } => "open",
            Request::Prepare { .. } => "prepare",
            Request::Exec { .. } => "exec",
            Request::Query { .. } => "query",
            Request::Finalize { .. } => "finalize",
        };
        let result = match request {
            Request::Helo { client_id: _ } => Ok(Response::Welcome {
                leader: self.0.cluster.leader().unwrap_or_default(),
                heartbeat_timeout_ms: self.0.heartbeat_timeout_ms,
            }),
            Request::Heartbeat { timestamp: _ } => Ok(Response::Servers {
                addresses: self.0.cluster.servers(),
            }),
            Request::Open { name, flags, vfs } => self.open(&name, flags, &vfs),
            Request::Prepare { db_id, sql } => self.prepare(db_id, &sql),
            Request::Exec { db_id, stmt_id, params } => self.exec(db_id, stmt_id, params),
            Request::Query { db_id, stmt_id, params } => self.query(db_id, stmt_id, params),
            Request::Finalize { db_id, stmt_id } => self.finalize(db_id, stmt_id),
        };
        result.map_err(|err| match err {
            Error::NotFound(msg) => Error::NotFound(format!("failed to handle {label}: {msg}")),
            Error::Protocol(msg) => Error::Protocol(format!("failed to handle {label}: {msg}")),
            other => other,
        })
    }

    fn open(&self, name: &str, flags: u32, vfs: &str) -> Result<Response> {
        let uri = self.0.vfs.uri_for(name, vfs)?;
        let open_flags = OpenFlags::from_bits_truncate(flags);
        match Database::open(&uri, open_flags) {
            Ok(database) => {
                let entry = DbEntry {
                    database: Arc::new(database),
                    statements: Mutex::new(Registry::new("stmt")),
                };
                let mut databases = self.0.databases.lock()?;
                let id = databases.open(entry);
                Ok(Response::Db { id })
            }
            Err(err) => Ok(Response::DbError(err)),
        }
    }

    fn prepare(&self, db_id: u32, sql: &str) -> Result<Response> {
        let databases = self.0.databases.lock()?;
        let entry = databases.get(db_id)?;
        match entry.database.prepare(sql) {
            Ok(sql_text) => {
                let mut statements = entry.statements.lock()?;
                let id = statements.open(sql_text);
                Ok(Response::Stmt { db_id, id })
            }
            Err(err) => Ok(Response::DbError(err)),
        }
    }

    fn lookup_stmt(&self, db_id: u32, stmt_id: u32) -> Result<(Arc<Database>, String)> {
        let databases = self.0.databases.lock()?;
        let entry = databases.get(db_id)?;
        let statements = entry.statements.lock()?;
        let sql = statements.get(stmt_id)?.clone();
        Ok((Arc::clone(&entry.database), sql))
    }

    /// Run through the pool as ordered work hashed to a worker by `db_id`,
    /// and block on the result: the gateway's own contract is a synchronous
    /// request/response, even though the work itself runs on a pool thread.
    /// Every `EXEC` shares the same ordered *kind* (`EXEC_ORDER_KIND`), since
    /// kind is a pool-wide work class, not a per-database id: serializing
    /// writes to one database is `Database`'s own `Mutex<Connection>` doing
    /// its job (see `engine.rs`), not the pool's ordering.
    fn exec(&self, db_id: u32, stmt_id: u32, params: Vec<rusqlite::types::Value>) -> Result<Response> {
        let (database, sql) = self.lookup_stmt(db_id, stmt_id)?;
        let (tx, rx) = mpsc::channel();
        self.0.pool.submit_ordered(
            EXEC_ORDER_KIND,
            db_id,
            move || {
                let result = database.exec(&sql, &params);
                let _ = tx.send(result);
            },
            None::<fn()>,
        )?;
        let result = rx
            .recv()
            .map_err(|_| Error::Fatal("pool worker dropped exec result channel".into()))?;
        Ok(match result {
            Ok(exec_result) => Response::Result {
                last_insert_id: exec_result.last_insert_id,
                rows_affected: exec_result.rows_affected,
            },
            Err(err) => Response::DbError(err),
        })
    }

    fn query(&self, db_id: u32, stmt_id: u32, params: Vec<rusqlite::types::Value>) -> Result<Response> {
        let (database, sql) = self.lookup_stmt(db_id, stmt_id)?;
        let mut rows = Vec::new();
        match database.query(&sql, &params, |values| {
            rows.push(values.to_vec());
            Ok(())
        }) {
            Ok(()) => Ok(Response::Rows { rows }),
            Err(err) => Ok(Response::DbError(err)),
        }
    }

    fn finalize(&self, db_id: u32, stmt_id: u32) -> Result<Response> {
        let databases = self.0.databases.lock()?;
        let entry = databases.get(db_id)?;
        let mut statements = entry.statements.lock()?;
        statements.close(stmt_id)?;
        Ok(Response::Empty)
    }

    /// Tear the pool down. Fails if other clones of this gateway are still
    /// outstanding, since shutting down the pool out from under a live
    /// clone would strand its in-flight `EXEC` calls.
    pub fn shutdown(self) -> Result<()> {
        let inner = Arc::try_unwrap(self.0).map_err(|_| Error::Fatal("gateway has outstanding clones".into()))?;
        let mut pool = inner.pool;
        pool.shutdown()
    }
}
