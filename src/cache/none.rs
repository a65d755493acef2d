use std::time::Duration;

use futures::future::BoxFuture;

use super::Store;
use crate::error::Result;

/// Stores nothing; every read misses.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStore;

impl Store for NoStore {
    fn load<'a>(&'a self, _key: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(async { Ok(None) })
    }

    fn store<'a>(&'a self, _key: &'a str, _value: String, _ttl: Duration) -> BoxFuture<'a, Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn clear(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }
}
