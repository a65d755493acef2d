//! Per-request device connection.

use std::net::IpAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use super::discovery::discover;
use super::hints::{ConnectionHints, HttpHints, HttpSettings, ResolvedHints, SnmpHints};
use super::http::{HttpClient, HttpConnectionData, Scheme};
use super::snmp::{SnmpClient, SnmpConnectionData};
use crate::error::{Error, Result};

/// Connection data that reproduces the established connection without
/// probing alternatives when fed back as hints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdealConnectionData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snmp: Option<SnmpConnectionData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpConnectionData>,
}

impl IdealConnectionData {
    pub fn into_hints(self) -> ConnectionHints {
        let snmp = self.snmp.map(|s| SnmpHints {
            communities: s.community.into_iter().collect(),
            versions: vec![s.version],
            ports: vec![s.port],
            v3_data: s.v3_data,
            ..Default::default()
        });
        let http = self.http.map(|h| {
            let (http_ports, https_ports) = match h.scheme {
                Scheme::Http => (vec![h.port], vec![]),
                Scheme::Https => (vec![], vec![h.port]),
            };
            HttpHints {
                http_ports: Some(http_ports),
                https_ports: Some(https_ports),
                auth_username: h.auth_username,
                auth_password: h.auth_password,
                insecure_skip_verify: None,
            }
        });
        ConnectionHints { snmp, http }
    }
}

/// Resolve a host name or literal address to an IP.
pub async fn resolve_target(target: &str) -> Result<IpAddr> {
    if let Ok(ip) = target.parse::<IpAddr>() {
        return Ok(ip);
    }
    let addrs = tokio::net::lookup_host((target, 0))
        .await
        .map_err(|e| Error::Connection {
            target: target.into(),
            reason: format!("name resolution failed: {e}").into(),
        }
        .boxed())?;
    let addrs: Vec<_> = addrs.map(|a| a.ip()).collect();
    addrs
        .iter()
        .find(|ip| ip.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| {
            Error::Connection {
                target: target.into(),
                reason: "name resolved to no address".into(),
            }
            .boxed()
        })
}

/// SNMP and HTTP sessions to one device.
#[derive(Debug, Clone)]
pub struct Connection {
    ip: IpAddr,
    snmp: Option<SnmpClient>,
    http: Option<HttpClient>,
}

impl Connection {
    /// Establish SNMP and HTTP in parallel.
    ///
    /// Fails with a network error when neither protocol answers.
    #[instrument(skip(hints, cancel), err, fields(device.ip = %ip))]
    pub async fn establish(
        ip: IpAddr,
        hints: &ResolvedHints,
        http_timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        if hints.snmp.is_none() && hints.http.is_none() {
            return Err(Error::pre_condition("no connection data for SNMP or HTTP"));
        }
        let snmp_fut = async {
            match &hints.snmp {
                Some(settings) => Some(discover(ip, settings, cancel).await),
                None => None,
            }
        };
        let http_fut = async {
            match &hints.http {
                Some(settings) => Some(establish_http(ip, settings, http_timeout, cancel).await),
                None => None,
            }
        };
        let (snmp, http) = tokio::join!(snmp_fut, http_fut);

        if cancel.is_cancelled() {
            return Err(Error::Cancelled.boxed());
        }

        let mut reasons = Vec::new();
        let snmp = match snmp {
            Some(Ok(client)) => Some(client),
            Some(Err(e)) => {
                tracing::debug!(target: "async_devmon::network", { error = %e }, "SNMP unavailable");
                reasons.push(format!("snmp: {e}"));
                None
            }
            None => None,
        };
        let http = match http {
            Some(Ok(client)) => Some(client),
            Some(Err(e)) => {
                tracing::debug!(target: "async_devmon::network", { error = %e }, "HTTP unavailable");
                reasons.push(format!("http: {e}"));
                None
            }
            None => None,
        };

        if snmp.is_none() && http.is_none() {
            return Err(Error::Connection {
                target: ip.to_string().into(),
                reason: reasons.join("; ").into(),
            }
            .boxed());
        }
        Ok(Self { ip, snmp, http })
    }

    /// A connection from already established sessions.
    pub fn from_parts(ip: IpAddr, snmp: Option<SnmpClient>, http: Option<HttpClient>) -> Self {
        Self { ip, snmp, http }
    }

    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    pub fn snmp(&self) -> Result<&SnmpClient> {
        self.snmp
            .as_ref()
            .ok_or_else(|| Error::not_found("no SNMP connection to device"))
    }

    pub fn http(&self) -> Result<&HttpClient> {
        self.http
            .as_ref()
            .ok_or_else(|| Error::not_found("no HTTP connection to device"))
    }

    pub fn has_snmp(&self) -> bool {
        self.snmp.is_some()
    }

    /// Whether the device answered anything usable.
    pub fn has_success(&self) -> bool {
        self.snmp.as_ref().is_some_and(SnmpClient::has_success) || self.http.is_some()
    }

    pub fn ideal_connection_data(&self) -> IdealConnectionData {
        IdealConnectionData {
            snmp: self
                .snmp
                .as_ref()
                .map(|c| SnmpConnectionData::from(c.credentials())),
            http: self.http.as_ref().map(HttpConnectionData::from),
        }
    }

    /// Drop both sessions. Sockets close when the last clone goes away.
    pub fn close(self) {
        tracing::trace!(target: "async_devmon::network", { device.ip = %self.ip }, "closing connection");
    }
}

/// TLS ports first, then plain HTTP; first endpoint that answers wins.
async fn establish_http(
    ip: IpAddr,
    settings: &HttpSettings,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<HttpClient> {
    let candidates = settings
        .https_ports
        .iter()
        .map(|p| (Scheme::Https, *p))
        .chain(settings.http_ports.iter().map(|p| (Scheme::Http, *p)));
    let mut last_error = None;
    for (scheme, port) in candidates {
        let client = HttpClient::new(ip, scheme, port, settings, timeout)?;
        let outcome = tokio::select! {
            outcome = client.probe() => outcome,
            _ = cancel.cancelled() => return Err(Error::Cancelled.boxed()),
        };
        match outcome {
            Ok(()) => return Ok(client),
            Err(e) => last_error = Some(e),
        }
    }
    Err(last_error.unwrap_or_else(|| Error::not_found("no HTTP ports configured")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ideal_data_pins_single_credentials() {
        let ideal = IdealConnectionData {
            snmp: Some(SnmpConnectionData {
                version: "2c".into(),
                community: Some("ceragon-ip10".into()),
                port: 161,
                v3_data: None,
            }),
            http: Some(HttpConnectionData {
                scheme: Scheme::Http,
                port: 8080,
                auth_username: None,
                auth_password: None,
            }),
        };
        let hints = ideal.into_hints();
        let snmp = hints.snmp.as_ref().unwrap();
        assert_eq!(snmp.communities, ["ceragon-ip10"]);
        assert_eq!(snmp.versions, ["2c"]);
        assert_eq!(snmp.ports, [161]);
        let http = hints.http.as_ref().unwrap();
        assert_eq!(http.https_ports, Some(vec![]));
        assert_eq!(http.http_ports, Some(vec![8080]));
    }

    #[tokio::test]
    async fn literal_targets_skip_resolution() {
        assert_eq!(
            resolve_target("192.0.2.7").await.unwrap(),
            "192.0.2.7".parse::<IpAddr>().unwrap()
        );
    }
}
