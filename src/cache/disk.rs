use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};

use super::Store;
use crate::error::{Error, Result};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS entries (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    expires_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_entries_expiry ON entries(expires_at);
";

const DB_FILE: &str = "cache.db";

/// SQLite store under `<directory>/<user>/`, so processes of different
/// users never share a database.
pub struct DiskStore {
    path: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl DiskStore {
    pub fn open(directory: &Path) -> Result<Self> {
        let dir = directory.join(process_user());
        std::fs::create_dir_all(&dir)
            .map_err(|e| Error::cache(format!("creating {}: {e}", dir.display())))?;
        let path = dir.join(DB_FILE);
        let conn = Connection::open(&path).map_err(Error::cache)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(Error::cache)?;
        conn.execute_batch(SCHEMA).map_err(Error::cache)?;
        tracing::debug!(target: "async_devmon::cache", path = %path.display(), "disk cache opened");
        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` against the database on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || f(&conn.lock()))
            .await
            .map_err(Error::cache)?
            .map_err(Error::cache)
    }
}

impl std::fmt::Debug for DiskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskStore").field("path", &self.path).finish()
    }
}

fn process_user() -> String {
    ["USER", "USERNAME", "LOGNAME"]
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|u| !u.is_empty()))
        .map(|u| u.replace(['/', '\\'], "_"))
        .unwrap_or_else(|| "default".to_owned())
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

impl Store for DiskStore {
    fn load<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
        let key = key.to_owned();
        Box::pin(self.with_conn(move |conn| {
            conn.query_row(
                "SELECT value FROM entries WHERE key = ?1 AND expires_at > ?2",
                params![key, now()],
                |row| row.get(0),
            )
            .optional()
        }))
    }

    fn store<'a>(&'a self, key: &'a str, value: String, ttl: Duration) -> BoxFuture<'a, Result<()>> {
        let key = key.to_owned();
        let expires_at = now().saturating_add(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX));
        Box::pin(self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO entries (key, value, expires_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
                params![key, value, expires_at],
            )?;
            conn.execute("DELETE FROM entries WHERE expires_at <= ?1", params![now()])?;
            Ok(())
        }))
    }

    fn clear(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(self.with_conn(|conn| conn.execute("DELETE FROM entries", []).map(drop)))
    }
}
