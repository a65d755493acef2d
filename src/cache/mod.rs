//! Device-property cache.
//!
//! Two records are kept per target IP: the identified device (class and
//! identity properties) and the ideal connection data of the last
//! successful connection. Both are stored as JSON with their own TTL in one
//! of the [`Store`] backings.

mod memory;
mod none;
#[cfg(feature = "disk-cache")]
mod disk;
#[cfg(feature = "redis-cache")]
mod remote;

use std::net::IpAddr;
use std::time::Duration;

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{CacheConfig, CacheKind};
use crate::device::IdentifyProperties;
use crate::error::{Error, Result};
use crate::network::IdealConnectionData;

pub use memory::MemoryStore;
pub use none::NoStore;
#[cfg(feature = "disk-cache")]
pub use disk::DiskStore;
#[cfg(feature = "redis-cache")]
pub use remote::RedisStore;

/// A cached identification result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedDevice {
    pub class: String,
    #[serde(default)]
    pub properties: IdentifyProperties,
}

/// Key/value storage with per-entry expiry.
pub trait Store: Send + Sync + std::fmt::Debug {
    /// The live value of `key`; expired entries read as absent.
    fn load<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>>;

    fn store<'a>(&'a self, key: &'a str, value: String, ttl: Duration) -> BoxFuture<'a, Result<()>>;

    /// Drop every entry.
    fn clear(&self) -> BoxFuture<'_, Result<()>>;
}

#[derive(Debug)]
pub struct DeviceCache {
    store: Box<dyn Store>,
    ttl: Duration,
    connection_ttl: Duration,
}

impl DeviceCache {
    pub fn new(store: Box<dyn Store>, ttl: Duration, connection_ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            connection_ttl,
        }
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self::new(Box::new(NoStore), Duration::ZERO, Duration::ZERO)
    }

    /// Open the backing named by `config`, clearing it first when the
    /// configuration asks for a rebuild.
    pub async fn open(config: &CacheConfig) -> Result<Self> {
        let store: Box<dyn Store> = match config.kind {
            CacheKind::None => Box::new(NoStore),
            CacheKind::Memory => Box::new(MemoryStore::new(config.capacity)),
            #[cfg(feature = "disk-cache")]
            CacheKind::Disk => Box::new(DiskStore::open(&config.directory)?),
            #[cfg(feature = "redis-cache")]
            CacheKind::Redis => Box::new(RedisStore::new(&config.redis_url)?),
            #[allow(unreachable_patterns)]
            other => {
                return Err(Error::config(format!(
                    "cache backing '{other}' is not compiled in"
                )));
            }
        };
        if config.rebuild {
            debug!(target: "async_devmon::cache", kind = %config.kind, "clearing cache on start");
            store.clear().await?;
        }
        Ok(Self::new(store, config.ttl(), config.connection_ttl()))
    }

    pub async fn get(&self, ip: IpAddr) -> Result<Option<CachedDevice>> {
        self.load(&device_key(ip)).await
    }

    pub async fn set(&self, ip: IpAddr, device: &CachedDevice) -> Result<()> {
        self.save(&device_key(ip), device, self.ttl).await
    }

    pub async fn get_connection_data(&self, ip: IpAddr) -> Result<Option<IdealConnectionData>> {
        self.load(&connection_key(ip)).await
    }

    pub async fn set_connection_data(&self, ip: IpAddr, data: &IdealConnectionData) -> Result<()> {
        self.save(&connection_key(ip), data, self.connection_ttl).await
    }

    async fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.store.load(key).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                // A record written by an incompatible version reads as a miss.
                warn!(target: "async_devmon::cache", key, error = %e, "discarding unreadable cache entry");
                Ok(None)
            }
        }
    }

    async fn save<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        if ttl.is_zero() {
            return Ok(());
        }
        let raw = serde_json::to_string(value).map_err(Error::cache)?;
        self.store.store(key, raw, ttl).await
    }
}

fn device_key(ip: IpAddr) -> String {
    format!("device:{ip}")
}

fn connection_key(ip: IpAddr) -> String {
    format!("connection:{ip}")
}
