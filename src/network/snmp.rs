//! Caching SNMP client used by communicators.
//!
//! Wraps [`Client`] with a per-request cache: GET results are kept per OID
//! (including exception values) and walks per base OID, errors included, so
//! that class conditions and properties touching the same subtree cost one
//! round trip per request.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use super::hints::{SnmpSettings, V3Settings};
use crate::client::{Client, ClientConfig, Retry};
use crate::error::{Error, ErrorKind, Result};
use crate::oid::Oid;
use crate::transport::{Transport, UdpTransport};
use crate::value::Value;
use crate::varbind::VarBind;
use crate::version::Version;

/// Credentials a client was established with.
#[derive(Debug, Clone, PartialEq)]
pub struct SnmpCredentials {
    pub version: Version,
    pub community: Option<String>,
    pub port: u16,
    pub v3: Option<V3Settings>,
}

/// An error kept in the walk cache and replayed on later hits.
#[derive(Debug, Clone)]
struct CachedError {
    kind: ErrorKind,
    message: String,
}

impl CachedError {
    fn capture(err: &Error) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    fn replay(&self, target: SocketAddr) -> Box<Error> {
        match self.kind {
            ErrorKind::NotFound => Error::not_found(self.message.clone()),
            ErrorKind::NotImplemented => Error::not_implemented(self.message.clone()),
            ErrorKind::Decode => Error::decode(self.message.clone()),
            _ => Error::Connection {
                target: target.to_string().into(),
                reason: self.message.clone().into(),
            }
            .boxed(),
        }
    }
}

type WalkOutcome = std::result::Result<Vec<VarBind>, CachedError>;

#[derive(Default)]
struct ResponseCache {
    gets: HashMap<Oid, Value>,
    walks: HashMap<Oid, Arc<OnceCell<WalkOutcome>>>,
}

/// One SNMP session to one device.
#[derive(Clone)]
pub struct SnmpClient<T: Transport = UdpTransport> {
    client: Client<T>,
    credentials: Arc<SnmpCredentials>,
    cache: Arc<Mutex<ResponseCache>>,
    caching: Arc<AtomicBool>,
    succeeded: Arc<AtomicBool>,
}

impl<T: Transport> std::fmt::Debug for SnmpClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnmpClient")
            .field("peer", &self.peer_addr())
            .field("version", &self.version())
            .finish_non_exhaustive()
    }
}

/// Client configuration for one credential set.
pub(crate) fn client_config(
    settings: &SnmpSettings,
    credentials: &SnmpCredentials,
    discovery: bool,
) -> ClientConfig {
    let (timeout, retries) = if discovery {
        (settings.discover_timeout, settings.discover_retries)
    } else {
        (settings.timeout, settings.retries)
    };
    let defaults = ClientConfig::default();
    ClientConfig {
        version: credentials.version,
        community: Bytes::from(credentials.community.clone().unwrap_or_default()),
        timeout,
        retry: Retry::immediate(retries),
        max_oids_per_request: if credentials.version == Version::V1 {
            1
        } else {
            defaults.max_oids_per_request
        },
        max_repetitions: settings.max_repetitions,
        max_walk_results: defaults.max_walk_results,
        v3_security: credentials.v3.as_ref().map(V3Settings::security_config),
    }
}

impl SnmpClient<UdpTransport> {
    pub async fn connect(
        ip: std::net::IpAddr,
        settings: &SnmpSettings,
        credentials: SnmpCredentials,
        discovery: bool,
    ) -> Result<Self> {
        let config = client_config(settings, &credentials, discovery);
        let client = Client::connect(SocketAddr::new(ip, credentials.port), config).await?;
        Ok(Self::from_client(client, credentials))
    }

    /// A sibling session with another community and an empty cache.
    pub async fn with_community(&self, community: &str) -> Result<Self> {
        let client = self.client.with_community(community.to_owned()).await?;
        let credentials = SnmpCredentials {
            community: Some(community.to_owned()),
            ..(*self.credentials).clone()
        };
        Ok(Self::from_client(client, credentials))
    }
}

impl<T: Transport> SnmpClient<T> {
    pub fn from_client(client: Client<T>, credentials: SnmpCredentials) -> Self {
        Self {
            client,
            credentials: Arc::new(credentials),
            cache: Arc::default(),
            caching: Arc::new(AtomicBool::new(true)),
            succeeded: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn credentials(&self) -> &SnmpCredentials {
        &self.credentials
    }

    pub fn version(&self) -> Version {
        self.credentials.version
    }

    pub fn community(&self) -> Option<&str> {
        self.credentials.community.as_deref()
    }

    pub fn port(&self) -> u16 {
        self.credentials.port
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.client.peer_addr()
    }

    /// Whether any request ever returned a usable value.
    pub fn has_success(&self) -> bool {
        self.succeeded.load(Ordering::Relaxed)
    }

    pub fn set_caching(&self, enabled: bool) {
        self.caching.store(enabled, Ordering::Relaxed);
    }

    fn caching(&self) -> bool {
        self.caching.load(Ordering::Relaxed)
    }

    /// GET `oids`, answered from the cache where possible.
    ///
    /// Values come back in request order. Exception values are returned as
    /// is; if every value is an exception the call fails with `NotFound`.
    pub async fn get(&self, oids: &[Oid]) -> Result<Vec<VarBind>> {
        if oids.is_empty() {
            return Ok(Vec::new());
        }
        let caching = self.caching();
        let missing: Vec<Oid> = if caching {
            let cache = self.cache.lock();
            oids.iter()
                .filter(|oid| !cache.gets.contains_key(*oid))
                .cloned()
                .collect()
        } else {
            oids.to_vec()
        };

        let mut fetched = HashMap::new();
        if !missing.is_empty() {
            let response = self.client.get_many(&missing).await?;
            for (oid, vb) in missing.iter().zip(response) {
                fetched.insert(oid.clone(), vb.value);
            }
            if caching {
                let mut cache = self.cache.lock();
                for (oid, value) in &fetched {
                    cache.gets.insert(oid.clone(), value.clone());
                }
            }
        }

        let results: Vec<VarBind> = {
            let cache = self.cache.lock();
            oids.iter()
                .map(|oid| {
                    let value = fetched
                        .get(oid)
                        .or_else(|| cache.gets.get(oid))
                        .cloned()
                        .unwrap_or(Value::NoSuchObject);
                    VarBind::new(oid.clone(), value)
                })
                .collect()
        };

        if results.iter().any(|vb| vb.value.is_successful()) {
            self.succeeded.store(true, Ordering::Relaxed);
            Ok(results)
        } else {
            Err(Error::not_found(format!(
                "no value for {}",
                oids.iter().map(Oid::to_string).collect::<Vec<_>>().join(", ")
            )))
        }
    }

    /// GET a single OID; exception values become `NotFound`.
    pub async fn get_one(&self, oid: &Oid) -> Result<Value> {
        let mut vbs = self.get(std::slice::from_ref(oid)).await?;
        match vbs.pop() {
            Some(vb) if vb.value.is_successful() => Ok(vb.value),
            _ => Err(Error::not_found(format!("no value for {oid}"))),
        }
    }

    /// Walk `base`, answered from the cache where possible.
    ///
    /// Concurrent walks of one base share a single request.
    pub async fn walk(&self, base: &Oid) -> Result<Vec<VarBind>> {
        if !self.caching() {
            return self.walk_uncached(base).await;
        }
        let cell = self.cache.lock().walks.entry(base.clone()).or_default().clone();
        let outcome = cell
            .get_or_init(|| async {
                self.walk_uncached(base)
                    .await
                    .map_err(|e| CachedError::capture(&e))
            })
            .await;
        match outcome {
            Ok(vbs) => Ok(vbs.clone()),
            Err(e) => Err(e.replay(self.peer_addr())),
        }
    }

    async fn walk_uncached(&self, base: &Oid) -> Result<Vec<VarBind>> {
        let vbs = self.client.walk(base).await?;
        if !vbs.is_empty() {
            self.succeeded.store(true, Ordering::Relaxed);
        }
        Ok(vbs)
    }

    /// Uncached GETNEXT on `.0.0`, the reachability probe.
    pub async fn probe(&self) -> Result<VarBind> {
        let vb = self.client.get_next(&crate::oid!(0, 0)).await?;
        self.succeeded.store(true, Ordering::Relaxed);
        Ok(vb)
    }
}

/// Connection data that reproduces a working session without probing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnmpConnectionData {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub community: Option<String>,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v3_data: Option<super::hints::V3Credentials>,
}

impl From<&SnmpCredentials> for SnmpConnectionData {
    fn from(creds: &SnmpCredentials) -> Self {
        Self {
            version: creds.version.as_str().to_owned(),
            community: creds.community.clone(),
            port: creds.port,
            v3_data: creds.v3.as_ref().map(V3Settings::to_credentials),
        }
    }
}
