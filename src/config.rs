//! Process configuration, read from TOML.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration.
//!
//! ```toml
//! assets = "/etc/devmon/assets"
//!
//! [connection.snmp]
//! communities = ["public", "private"]
//! versions = ["2c", "1"]
//!
//! [cache]
//! kind = "disk"
//! directory = "/var/cache/devmon"
//!
//! [logging]
//! level = "async_devmon=debug"
//! format = "json"
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::network::{ConnectionHints, HttpHints, SnmpHints};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub request: RequestConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Directory with `device-classes/` and `mappings/` replacing the
    /// embedded bundle.
    #[serde(default)]
    pub assets: Option<PathBuf>,
}

impl Config {
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("{}: {e}", path.display())))?;
        Self::from_toml(&contents).map_err(|e| Error::config(format!("{}: {e}", path.display())))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default)]
    pub snmp: SnmpDefaults,
    #[serde(default)]
    pub http: HttpDefaults,
}

impl ConnectionConfig {
    /// The lowest-precedence hint tier.
    pub fn hints(&self) -> ConnectionHints {
        let s = &self.snmp;
        let h = &self.http;
        ConnectionHints {
            snmp: Some(SnmpHints {
                communities: s.communities.clone(),
                versions: s.versions.clone(),
                ports: s.ports.clone(),
                discover_parallel_requests: Some(s.discover_parallel_requests),
                discover_timeout: Some(s.discover_timeout),
                discover_retries: Some(s.discover_retries),
                timeout: Some(s.timeout),
                retries: Some(s.retries),
                max_repetitions: Some(s.max_repetitions),
                v3_data: None,
            }),
            http: Some(HttpHints {
                http_ports: Some(h.http_ports.clone()),
                https_ports: Some(h.https_ports.clone()),
                auth_username: None,
                auth_password: None,
                insecure_skip_verify: Some(h.insecure_skip_verify),
            }),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnmpDefaults {
    #[serde(default = "default_communities")]
    pub communities: Vec<String>,
    #[serde(default = "default_versions")]
    pub versions: Vec<String>,
    #[serde(default = "default_snmp_ports")]
    pub ports: Vec<u16>,
    #[serde(default = "default_discover_parallel_requests")]
    pub discover_parallel_requests: usize,
    /// Seconds.
    #[serde(default = "default_discover_timeout")]
    pub discover_timeout: u64,
    #[serde(default)]
    pub discover_retries: u32,
    /// Seconds.
    #[serde(default = "default_snmp_timeout")]
    pub timeout: u64,
    #[serde(default = "default_snmp_retries")]
    pub retries: u32,
    #[serde(default = "default_max_repetitions")]
    pub max_repetitions: u32,
}

impl Default for SnmpDefaults {
    fn default() -> Self {
        Self {
            communities: default_communities(),
            versions: default_versions(),
            ports: default_snmp_ports(),
            discover_parallel_requests: default_discover_parallel_requests(),
            discover_timeout: default_discover_timeout(),
            discover_retries: 0,
            timeout: default_snmp_timeout(),
            retries: default_snmp_retries(),
            max_repetitions: default_max_repetitions(),
        }
    }
}

fn default_communities() -> Vec<String> {
    vec!["public".to_owned()]
}

fn default_versions() -> Vec<String> {
    vec!["2c".to_owned(), "1".to_owned()]
}

fn default_snmp_ports() -> Vec<u16> {
    vec![161]
}

fn default_discover_parallel_requests() -> usize {
    5
}

fn default_discover_timeout() -> u64 {
    2
}

fn default_snmp_timeout() -> u64 {
    5
}

fn default_snmp_retries() -> u32 {
    1
}

fn default_max_repetitions() -> u32 {
    25
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpDefaults {
    #[serde(default = "default_http_ports")]
    pub http_ports: Vec<u16>,
    #[serde(default = "default_https_ports")]
    pub https_ports: Vec<u16>,
    #[serde(default = "default_true")]
    pub insecure_skip_verify: bool,
    /// Seconds, per HTTP request.
    #[serde(default = "default_http_timeout")]
    pub timeout: u64,
}

impl Default for HttpDefaults {
    fn default() -> Self {
        Self {
            http_ports: default_http_ports(),
            https_ports: default_https_ports(),
            insecure_skip_verify: true,
            timeout: default_http_timeout(),
        }
    }
}

fn default_http_ports() -> Vec<u16> {
    vec![80]
}

fn default_https_ports() -> Vec<u16> {
    vec![443]
}

fn default_http_timeout() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestConfig {
    /// Seconds.
    #[serde(default = "default_request_timeout")]
    pub timeout: u64,
    /// Serialise requests per target IP.
    #[serde(default = "default_true")]
    pub ip_lock: bool,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout: default_request_timeout(),
            ip_lock: true,
        }
    }
}

impl RequestConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout.max(1))
    }
}

fn default_request_timeout() -> u64 {
    60
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheKind {
    #[default]
    Memory,
    Disk,
    Redis,
    None,
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Memory => "memory",
            Self::Disk => "disk",
            Self::Redis => "redis",
            Self::None => "none",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub kind: CacheKind,
    /// Seconds a cached identification stays valid.
    #[serde(default = "default_cache_ttl")]
    pub ttl: u64,
    /// Seconds cached connection data stays valid.
    #[serde(default = "default_connection_ttl")]
    pub connection_ttl: u64,
    /// Clear the backing when the process starts.
    #[serde(default)]
    pub rebuild: bool,
    /// Root of the disk cache; one sub-directory per process user.
    #[serde(default = "default_cache_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    /// Entries kept by the memory backing.
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            kind: CacheKind::default(),
            ttl: default_cache_ttl(),
            connection_ttl: default_connection_ttl(),
            rebuild: false,
            directory: default_cache_directory(),
            redis_url: default_redis_url(),
            capacity: default_cache_capacity(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl)
    }

    pub fn connection_ttl(&self) -> Duration {
        Duration::from_secs(self.connection_ttl)
    }
}

fn default_cache_ttl() -> u64 {
    600
}

fn default_connection_ttl() -> u64 {
    86_400
}

fn default_cache_directory() -> PathBuf {
    std::env::temp_dir().join("devmon")
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379/".to_owned()
}

fn default_cache_capacity() -> usize {
    4096
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.connection.snmp.communities, ["public"]);
        assert_eq!(config.connection.snmp.versions, ["2c", "1"]);
        assert_eq!(config.connection.snmp.discover_parallel_requests, 5);
        assert_eq!(config.connection.http.https_ports, [443]);
        assert_eq!(config.request.timeout(), Duration::from_secs(60));
        assert_eq!(config.cache.kind, CacheKind::Memory);
        assert_eq!(config.cache.ttl(), Duration::from_secs(600));
        assert_eq!(config.cache.connection_ttl(), Duration::from_secs(86_400));
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.assets.is_none());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_toml(
            r#"
            [connection.snmp]
            communities = ["ceragon-ip10"]

            [cache]
            kind = "none"
            "#,
        )
        .unwrap();
        assert_eq!(config.connection.snmp.communities, ["ceragon-ip10"]);
        assert_eq!(config.connection.snmp.ports, [161]);
        assert_eq!(config.cache.kind, CacheKind::None);
        assert_eq!(config.cache.capacity, 4096);
    }

    #[test]
    fn config_hints_resolve() {
        let hints = Config::default().connection.hints();
        let resolved = hints.resolve().unwrap();
        let snmp = resolved.snmp.unwrap();
        assert_eq!(snmp.discover_timeout, Duration::from_secs(2));
        assert_eq!(resolved.http.unwrap().https_ports, [443]);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Config::from_toml("colour = true").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Internal);
    }
}
