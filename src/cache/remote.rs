use std::time::Duration;

use futures::future::BoxFuture;
use redis::aio::MultiplexedConnection;
use tokio::sync::OnceCell;

use super::Store;
use crate::error::{Error, Result};

const KEY_PREFIX: &str = "devmon:";

/// Redis store; entries expire server-side through `SET ... EX`.
pub struct RedisStore {
    client: redis::Client,
    conn: OnceCell<MultiplexedConnection>,
}

impl RedisStore {
    /// Connects lazily on first use.
    pub fn new(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(Error::cache)?;
        Ok(Self {
            client,
            conn: OnceCell::new(),
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection> {
        self.conn
            .get_or_try_init(|| self.client.get_multiplexed_async_connection())
            .await
            .cloned()
            .map_err(Error::cache)
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("connected", &self.conn.initialized())
            .finish_non_exhaustive()
    }
}

impl Store for RedisStore {
    fn load<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(async move {
            let mut conn = self.connection().await?;
            let value: Option<String> = redis::cmd("GET")
                .arg(format!("{KEY_PREFIX}{key}"))
                .query_async(&mut conn)
                .await
                .map_err(Error::cache)?;
            Ok(value)
        })
    }

    fn store<'a>(&'a self, key: &'a str, value: String, ttl: Duration) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut conn = self.connection().await?;
            let () = redis::cmd("SET")
                .arg(format!("{KEY_PREFIX}{key}"))
                .arg(value)
                .arg("EX")
                .arg(ttl.as_secs().max(1))
                .query_async(&mut conn)
                .await
                .map_err(Error::cache)?;
            Ok(())
        })
    }

    fn clear(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let mut conn = self.connection().await?;
            let keys: Vec<String> = redis::cmd("KEYS")
                .arg(format!("{KEY_PREFIX}*"))
                .query_async(&mut conn)
                .await
                .map_err(Error::cache)?;
            if keys.is_empty() {
                return Ok(());
            }
            let () = redis::cmd("DEL")
                .arg(keys)
                .query_async(&mut conn)
                .await
                .map_err(Error::cache)?;
            Ok(())
        })
    }
}
