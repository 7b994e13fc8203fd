//! Redis backend (one persistent connection per process).
//!
//! Commands are issued with `redis::cmd` so the wire commands match the key
//! contract exactly: `SET`/`GET`/`DEL` for records and registry entries,
//! `LPUSH`/`BRPOPLPUSH`/`LREM` for queues, `KEYS` for scans.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, warn};

use super::{Backend, BackendError, Database};

/// Redis-backed store.
///
/// The connection is opened lazily and dropped whenever Redis reports a
/// connection-level failure, so the next call reconnects.
pub struct RedisBackend {
    client: redis::Client,
    conn: Mutex<Option<redis::Connection>>,
}

impl std::fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBackend")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

fn classify(err: redis::RedisError) -> BackendError {
    if err.is_connection_dropped()
        || err.is_connection_refusal()
        || err.is_io_error()
        || err.is_timeout()
    {
        BackendError::Connection(err.to_string())
    } else {
        BackendError::Command(err.to_string())
    }
}

/// `BRPOPLPUSH` takes whole seconds; zero means "forever".
fn blocking_timeout_secs(timeout: Duration) -> u64 {
    if timeout.is_zero() {
        0
    } else {
        timeout.as_secs().max(1) + u64::from(timeout.subsec_nanos() > 0 && timeout.as_secs() > 0)
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

impl RedisBackend {
    /// Create a backend from a Redis URL (e.g. "redis://localhost:6379/15").
    pub fn new(redis_url: impl AsRef<str>) -> Result<Self, BackendError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| BackendError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            conn: Mutex::new(None),
        })
    }

    /// Create a backend for `host:port`, selecting a logical database.
    pub fn connect(host: &str, port: u16, database: Database) -> Result<Self, BackendError> {
        Self::new(format!("redis://{host}:{port}/{}", database.index()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<redis::Connection>>, BackendError> {
        self.conn.lock().map_err(|_| BackendError::Poisoned)
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut redis::Connection) -> redis::RedisResult<T>,
    ) -> Result<T, BackendError> {
        let mut guard = self.lock()?;

        if guard.is_none() {
            let conn = self.client.get_connection().map_err(classify)?;
            debug!("opened redis connection");
            *guard = Some(conn);
        }

        let Some(conn) = guard.as_mut() else {
            return Err(BackendError::Connection("no connection".to_string()));
        };

        match f(conn) {
            Ok(value) => Ok(value),
            Err(err) => {
                let err = classify(err);
                if err.is_connection() {
                    warn!(error = %err, "dropping redis connection");
                    *guard = None;
                }
                Err(err)
            }
        }
    }
}

impl Backend for RedisBackend {
    fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        self.with_conn(|conn| redis::cmd("GET").arg(key).query(conn))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), BackendError> {
        self.with_conn(|conn| redis::cmd("SET").arg(key).arg(value).query(conn))
    }

    fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), BackendError> {
        self.with_conn(|conn| {
            redis::cmd("SET")
                .arg(key)
                .arg(value)
                .arg("PX")
                .arg(ttl_millis(ttl))
                .query(conn)
        })
    }

    fn delete(&self, key: &str) -> Result<bool, BackendError> {
        let removed: i64 = self.with_conn(|conn| redis::cmd("DEL").arg(key).query(conn))?;
        Ok(removed > 0)
    }

    fn exists(&self, key: &str) -> Result<bool, BackendError> {
        let found: i64 = self.with_conn(|conn| redis::cmd("EXISTS").arg(key).query(conn))?;
        Ok(found > 0)
    }

    fn expire(&self, key: &str, ttl: Duration) -> Result<bool, BackendError> {
        let applied: i64 = self.with_conn(|conn| {
            redis::cmd("PEXPIRE")
                .arg(key)
                .arg(ttl_millis(ttl))
                .query(conn)
        })?;
        Ok(applied == 1)
    }

    fn keys(&self, pattern: &str) -> Result<Vec<String>, BackendError> {
        self.with_conn(|conn| redis::cmd("KEYS").arg(pattern).query(conn))
    }

    fn lpush(&self, list: &str, value: &str) -> Result<(), BackendError> {
        let _: i64 = self.with_conn(|conn| redis::cmd("LPUSH").arg(list).arg(value).query(conn))?;
        Ok(())
    }

    fn brpoplpush(
        &self,
        source: &str,
        destination: &str,
        timeout: Duration,
    ) -> Result<Option<String>, BackendError> {
        self.with_conn(|conn| {
            redis::cmd("BRPOPLPUSH")
                .arg(source)
                .arg(destination)
                .arg(blocking_timeout_secs(timeout))
                .query(conn)
        })
    }

    fn lrem(&self, list: &str, count: usize, value: &str) -> Result<usize, BackendError> {
        let removed: i64 = self.with_conn(|conn| {
            redis::cmd("LREM")
                .arg(list)
                .arg(count)
                .arg(value)
                .query(conn)
        })?;
        Ok(usize::try_from(removed).unwrap_or(0))
    }

    fn llen(&self, list: &str) -> Result<usize, BackendError> {
        let len: i64 = self.with_conn(|conn| redis::cmd("LLEN").arg(list).query(conn))?;
        Ok(usize::try_from(len).unwrap_or(0))
    }

    fn ping(&self) -> Result<(), BackendError> {
        let _: String = self.with_conn(|conn| redis::cmd("PING").query(conn))?;
        Ok(())
    }

    fn reconnect(&self) -> Result<(), BackendError> {
        let conn = self.client.get_connection().map_err(classify)?;
        *self.lock()? = Some(conn);
        Ok(())
    }

    fn close(&self) {
        if let Ok(mut guard) = self.lock() {
            guard.take();
        }
    }
}
