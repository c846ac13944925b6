//! Pool sizing configuration, in the style of the connection `Opts` this
//! crate's ancestor exposed: a small `Default`-able struct plus a
//! constructor that reads the process environment.

use crate::error::Error;
use smart_default::SmartDefault;

const MAX_THREADS: u32 = 1024;
const ENV_THREADPOOL_SIZE: &str = "POOL_THREADPOOL_SIZE";

/// Configuration for [`crate::pool::Pool`].
#[derive(Debug, Clone, SmartDefault)]
pub struct PoolConfig {
    #[default(4)]
    pub threads: u32,
}

impl PoolConfig {
    pub fn new(threads: u32) -> Self {
        Self {
            threads: threads.clamp(1, MAX_THREADS),
        }
    }

    /// Read `POOL_THREADPOOL_SIZE` from the environment, clamped to
    /// `[1, 1024]`; falls back to the default of 4 if unset or not a valid
    /// `u32`.
    pub fn from_env() -> Result<Self, Error> {
        let threads = match std::env::var(ENV_THREADPOOL_SIZE) {
            Ok(value) => value
                .parse::<u32>()
                .map_err(|e| Error::BadConfig(format!("{ENV_THREADPOOL_SIZE}: {e}")))?,
            Err(std::env::VarError::NotPresent) => Self::default().threads,
            Err(e) => return Err(Error::BadConfig(format!("{ENV_THREADPOOL_SIZE}: {e}"))),
        };
        Ok(Self::new(threads))
    }
}
