use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use lru::LruCache;
use parking_lot::Mutex;

use super::Store;
use crate::error::Result;

/// In-process LRU store.
pub struct MemoryStore {
    entries: Mutex<LruCache<String, (String, Instant)>>,
}

impl MemoryStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn load_now(&self, key: &str, now: Instant) -> Option<String> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some((value, expires)) if *expires > now => Some(value.clone()),
            Some(_) => {
                entries.pop(key);
                None
            }
            None => None,
        }
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.lock();
        f.debug_struct("MemoryStore")
            .field("len", &entries.len())
            .field("capacity", &entries.cap())
            .finish()
    }
}

impl Store for MemoryStore {
    fn load<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(async move { Ok(self.load_now(key, Instant::now())) })
    }

    fn store<'a>(&'a self, key: &'a str, value: String, ttl: Duration) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let expires = Instant::now() + ttl;
            self.entries.lock().put(key.to_owned(), (value, expires));
            Ok(())
        })
    }

    fn clear(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.entries.lock().clear();
            Ok(())
        })
    }
}
