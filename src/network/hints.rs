//! Connection hints: which credentials, versions and ports to try.
//!
//! Hints come from three tiers. For every field the first tier that sets
//! it wins, in the order request, cached per-target data, configuration.
//! Lists are taken whole from the winning tier and de-duplicated, so a
//! cached single-credential hint set is never widened by configured
//! alternatives.

use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::client::V3SecurityConfig;
use crate::error::{Error, Result};
use crate::message::SecurityLevel;
use crate::v3::{AuthProtocol, PrivProtocol};
use crate::version::Version;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionHints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snmp: Option<SnmpHints>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpHints>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnmpHints {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub communities: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub versions: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discover_parallel_requests: Option<usize>,
    /// Seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discover_timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discover_retries: Option<u32>,
    /// Seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_repetitions: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v3_data: Option<V3Credentials>,
}

/// USM credentials as supplied by callers.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct V3Credentials {
    /// `noAuthNoPriv`, `authNoPriv` or `authPriv`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priv_protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priv_key: Option<String>,
}

impl std::fmt::Debug for V3Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("V3Credentials")
            .field("level", &self.level)
            .field("context_name", &self.context_name)
            .field("user", &self.user)
            .field("auth_protocol", &self.auth_protocol)
            .field("priv_protocol", &self.priv_protocol)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpHints {
    /// `Some(vec![])` disables plain HTTP instead of deferring to a lower tier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_ports: Option<Vec<u16>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub https_ports: Option<Vec<u16>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insecure_skip_verify: Option<bool>,
}

fn pick_list<T: Clone + PartialEq>(tiers: &[&[T]]) -> Vec<T> {
    let winner = tiers.iter().find(|l| !l.is_empty()).copied().unwrap_or(&[]);
    let mut out: Vec<T> = Vec::with_capacity(winner.len());
    for item in winner {
        if !out.contains(item) {
            out.push(item.clone());
        }
    }
    out
}

fn pick<T: Clone>(tiers: &[&Option<T>]) -> Option<T> {
    tiers.iter().find_map(|o| (*o).clone())
}

impl ConnectionHints {
    /// Merge tiers, highest precedence first.
    pub fn merge(tiers: &[&ConnectionHints]) -> ConnectionHints {
        let snmp: Vec<&SnmpHints> = tiers.iter().filter_map(|t| t.snmp.as_ref()).collect();
        let http: Vec<&HttpHints> = tiers.iter().filter_map(|t| t.http.as_ref()).collect();
        ConnectionHints {
            snmp: (!snmp.is_empty()).then(|| SnmpHints::merge(&snmp)),
            http: (!http.is_empty()).then(|| HttpHints::merge(&http)),
        }
    }

    /// Validate and resolve. Runs before any network activity.
    pub fn resolve(&self) -> Result<ResolvedHints> {
        let snmp = self.snmp.as_ref().map(SnmpHints::resolve).transpose()?;
        let http = self.http.as_ref().map(HttpHints::resolve).transpose()?;
        Ok(ResolvedHints { snmp, http })
    }
}

impl SnmpHints {
    fn merge(tiers: &[&SnmpHints]) -> SnmpHints {
        let lists = |f: fn(&SnmpHints) -> &[String]| {
            pick_list(&tiers.iter().map(|t| f(t)).collect::<Vec<_>>())
        };
        SnmpHints {
            communities: lists(|t| t.communities.as_slice()),
            versions: lists(|t| t.versions.as_slice()),
            ports: pick_list(&tiers.iter().map(|t| t.ports.as_slice()).collect::<Vec<_>>()),
            discover_parallel_requests: pick(
                &tiers.iter().map(|t| &t.discover_parallel_requests).collect::<Vec<_>>(),
            ),
            discover_timeout: pick(&tiers.iter().map(|t| &t.discover_timeout).collect::<Vec<_>>()),
            discover_retries: pick(&tiers.iter().map(|t| &t.discover_retries).collect::<Vec<_>>()),
            timeout: pick(&tiers.iter().map(|t| &t.timeout).collect::<Vec<_>>()),
            retries: pick(&tiers.iter().map(|t| &t.retries).collect::<Vec<_>>()),
            max_repetitions: pick(&tiers.iter().map(|t| &t.max_repetitions).collect::<Vec<_>>()),
            v3_data: pick(&tiers.iter().map(|t| &t.v3_data).collect::<Vec<_>>()),
        }
    }

    fn resolve(&self) -> Result<SnmpSettings> {
        let mut versions = Vec::with_capacity(self.versions.len());
        for v in &self.versions {
            let version: Version = v
                .parse()
                .map_err(|_| Error::pre_condition(format!("invalid SNMP version '{v}'")))?;
            versions.push(version);
        }
        if versions.is_empty() {
            return Err(Error::pre_condition("no SNMP version given"));
        }
        if self.ports.is_empty() || self.ports.contains(&0) {
            return Err(Error::pre_condition("SNMP ports must be greater than 0"));
        }
        let parallel = self.discover_parallel_requests.unwrap_or(0);
        if parallel == 0 {
            return Err(Error::pre_condition(
                "discover_parallel_requests must be greater than 0",
            ));
        }
        let discover_timeout = self.discover_timeout.unwrap_or(0);
        if discover_timeout == 0 {
            return Err(Error::pre_condition("discover_timeout must be greater than 0"));
        }
        let community_versions = versions.iter().any(|v| v.is_community());
        if community_versions && self.communities.is_empty() {
            return Err(Error::pre_condition("no SNMP community given"));
        }

        let v3 = if versions.contains(&Version::V3) {
            let creds = self
                .v3_data
                .as_ref()
                .ok_or_else(|| Error::pre_condition("SNMP v3 requested without v3 data"))?;
            Some(creds.resolve()?)
        } else {
            None
        };

        Ok(SnmpSettings {
            communities: self.communities.clone(),
            versions,
            ports: self.ports.clone(),
            discover_parallel_requests: parallel,
            discover_timeout: Duration::from_secs(discover_timeout),
            discover_retries: self.discover_retries.unwrap_or(0),
            timeout: Duration::from_secs(self.timeout.unwrap_or(5).max(1)),
            retries: self.retries.unwrap_or(1),
            max_repetitions: self.max_repetitions.unwrap_or(25).max(1),
            v3,
        })
    }
}

impl V3Credentials {
    fn resolve(&self) -> Result<V3Settings> {
        let level = match self.level.as_deref() {
            Some(l) if l.eq_ignore_ascii_case("noAuthNoPriv") => SecurityLevel::NoAuthNoPriv,
            Some(l) if l.eq_ignore_ascii_case("authNoPriv") => SecurityLevel::AuthNoPriv,
            Some(l) if l.eq_ignore_ascii_case("authPriv") => SecurityLevel::AuthPriv,
            Some(l) => return Err(Error::pre_condition(format!("invalid SNMP v3 level '{l}'"))),
            None => return Err(Error::pre_condition("SNMP v3 level is missing")),
        };
        let user = self
            .user
            .clone()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| Error::pre_condition("SNMP v3 user is missing"))?;

        let auth = if level.requires_auth() {
            let protocol: AuthProtocol = self
                .auth_protocol
                .as_deref()
                .ok_or_else(|| Error::pre_condition("SNMP v3 auth protocol is missing"))?
                .parse()
                .map_err(|_| Error::pre_condition("invalid SNMP v3 auth protocol"))?;
            let key = self
                .auth_key
                .clone()
                .filter(|k| !k.is_empty())
                .ok_or_else(|| Error::pre_condition("SNMP v3 auth key is missing"))?;
            Some((protocol, key))
        } else {
            None
        };
        let privacy = if level.requires_priv() {
            let protocol: PrivProtocol = self
                .priv_protocol
                .as_deref()
                .ok_or_else(|| Error::pre_condition("SNMP v3 priv protocol is missing"))?
                .parse()
                .map_err(|_| Error::pre_condition("invalid SNMP v3 priv protocol"))?;
            let key = self
                .priv_key
                .clone()
                .filter(|k| !k.is_empty())
                .ok_or_else(|| Error::pre_condition("SNMP v3 priv key is missing"))?;
            Some((protocol, key))
        } else {
            None
        };

        Ok(V3Settings {
            level,
            user,
            context_name: self.context_name.clone().unwrap_or_default(),
            auth,
            privacy,
        })
    }
}

impl HttpHints {
    fn merge(tiers: &[&HttpHints]) -> HttpHints {
        HttpHints {
            http_ports: pick(&tiers.iter().map(|t| &t.http_ports).collect::<Vec<_>>())
                .map(|ports| pick_list(&[ports.as_slice()])),
            https_ports: pick(&tiers.iter().map(|t| &t.https_ports).collect::<Vec<_>>())
                .map(|ports| pick_list(&[ports.as_slice()])),
            auth_username: pick(&tiers.iter().map(|t| &t.auth_username).collect::<Vec<_>>()),
            auth_password: pick(&tiers.iter().map(|t| &t.auth_password).collect::<Vec<_>>()),
            insecure_skip_verify: pick(
                &tiers.iter().map(|t| &t.insecure_skip_verify).collect::<Vec<_>>(),
            ),
        }
    }

    fn resolve(&self) -> Result<HttpSettings> {
        let http_ports = self.http_ports.clone().unwrap_or_default();
        let https_ports = self.https_ports.clone().unwrap_or_default();
        if http_ports.contains(&0) || https_ports.contains(&0) {
            return Err(Error::pre_condition("HTTP ports must be greater than 0"));
        }
        if self.auth_password.is_some() && self.auth_username.is_none() {
            return Err(Error::pre_condition("HTTP password given without a username"));
        }
        Ok(HttpSettings {
            http_ports,
            https_ports,
            username: self.auth_username.clone(),
            password: self.auth_password.clone(),
            insecure_skip_verify: self.insecure_skip_verify.unwrap_or(true),
        })
    }
}

/// Validated hints.
#[derive(Debug, Clone)]
pub struct ResolvedHints {
    pub snmp: Option<SnmpSettings>,
    pub http: Option<HttpSettings>,
}

#[derive(Debug, Clone)]
pub struct SnmpSettings {
    pub communities: Vec<String>,
    pub versions: Vec<Version>,
    pub ports: Vec<u16>,
    pub discover_parallel_requests: usize,
    pub discover_timeout: Duration,
    pub discover_retries: u32,
    pub timeout: Duration,
    pub retries: u32,
    pub max_repetitions: u32,
    pub v3: Option<V3Settings>,
}

#[derive(Clone, PartialEq)]
pub struct V3Settings {
    pub level: SecurityLevel,
    pub user: String,
    pub context_name: String,
    pub auth: Option<(AuthProtocol, String)>,
    pub privacy: Option<(PrivProtocol, String)>,
}

impl V3Settings {
    pub fn security_config(&self) -> V3SecurityConfig {
        let mut config = V3SecurityConfig::new(Bytes::from(self.user.clone()))
            .context(Bytes::from(self.context_name.clone()));
        if let Some((protocol, key)) = &self.auth {
            config = config.auth(*protocol, key.as_bytes().to_vec());
        }
        if let Some((protocol, key)) = &self.privacy {
            config = config.privacy(*protocol, key.as_bytes().to_vec());
        }
        config
    }

    /// Back to caller-facing form.
    pub fn to_credentials(&self) -> V3Credentials {
        let level = match self.level {
            SecurityLevel::NoAuthNoPriv => "noAuthNoPriv",
            SecurityLevel::AuthNoPriv => "authNoPriv",
            SecurityLevel::AuthPriv => "authPriv",
        };
        V3Credentials {
            level: Some(level.to_owned()),
            context_name: (!self.context_name.is_empty()).then(|| self.context_name.clone()),
            user: Some(self.user.clone()),
            auth_protocol: self.auth.as_ref().map(|(p, _)| p.to_string()),
            auth_key: self.auth.as_ref().map(|(_, k)| k.clone()),
            priv_protocol: self.privacy.as_ref().map(|(p, _)| p.to_string()),
            priv_key: self.privacy.as_ref().map(|(_, k)| k.clone()),
        }
    }
}

impl std::fmt::Debug for V3Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("V3Settings")
            .field("level", &self.level)
            .field("user", &self.user)
            .field("context_name", &self.context_name)
            .field("auth", &self.auth.as_ref().map(|(p, _)| p))
            .field("privacy", &self.privacy.as_ref().map(|(p, _)| p))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub http_ports: Vec<u16>,
    pub https_ports: Vec<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub insecure_skip_verify: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn config_tier() -> ConnectionHints {
        ConnectionHints {
            snmp: Some(SnmpHints {
                communities: vec!["public".into()],
                versions: vec!["2c".into(), "1".into()],
                ports: vec![161],
                discover_parallel_requests: Some(5),
                discover_timeout: Some(2),
                discover_retries: Some(0),
                timeout: Some(5),
                retries: Some(1),
                max_repetitions: Some(25),
                v3_data: None,
            }),
            http: Some(HttpHints {
                http_ports: Some(vec![80]),
                https_ports: Some(vec![443]),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn request_beats_cache_beats_config() {
        let request = ConnectionHints {
            snmp: Some(SnmpHints {
                communities: vec!["private".into(), "private".into(), "public".into()],
                ..Default::default()
            }),
            http: None,
        };
        let cache = ConnectionHints {
            snmp: Some(SnmpHints {
                communities: vec!["cached".into()],
                versions: vec!["1".into()],
                ..Default::default()
            }),
            http: None,
        };
        let merged = ConnectionHints::merge(&[&request, &cache, &config_tier()]);
        let snmp = merged.snmp.unwrap();
        assert_eq!(snmp.communities, ["private", "public"]);
        assert_eq!(snmp.versions, ["1"]);
        assert_eq!(snmp.ports, [161]);
        assert_eq!(merged.http.unwrap().https_ports, Some(vec![443]));
    }

    #[test]
    fn invalid_inputs_are_preconditions() {
        let mut hints = config_tier();
        hints.snmp.as_mut().unwrap().versions = vec!["4".into()];
        assert_eq!(hints.resolve().unwrap_err().kind(), ErrorKind::PreCondition);

        let mut hints = config_tier();
        hints.snmp.as_mut().unwrap().ports = vec![0];
        assert_eq!(hints.resolve().unwrap_err().kind(), ErrorKind::PreCondition);

        let mut hints = config_tier();
        hints.snmp.as_mut().unwrap().discover_parallel_requests = Some(0);
        assert_eq!(hints.resolve().unwrap_err().kind(), ErrorKind::PreCondition);
    }

    #[test]
    fn v3_requires_matching_credentials() {
        let mut hints = config_tier();
        let snmp = hints.snmp.as_mut().unwrap();
        snmp.versions = vec!["3".into()];
        assert!(hints.resolve().is_err());

        let snmp = hints.snmp.as_mut().unwrap();
        snmp.v3_data = Some(V3Credentials {
            level: Some("authPriv".into()),
            user: Some("monitor".into()),
            auth_protocol: Some("sha".into()),
            auth_key: Some("authsecret".into()),
            ..Default::default()
        });
        let err = hints.resolve().unwrap_err();
        assert!(err.to_string().contains("priv"), "{err}");

        let v3 = hints.snmp.as_mut().unwrap().v3_data.as_mut().unwrap();
        v3.priv_protocol = Some("aes".into());
        v3.priv_key = Some("privsecret".into());
        let resolved = hints.resolve().unwrap();
        let settings = resolved.snmp.unwrap().v3.unwrap();
        assert_eq!(settings.level, SecurityLevel::AuthPriv);
        assert!(!format!("{settings:?}").contains("privsecret"));
    }
}
