//! Parallel SNMP credential discovery.
//!
//! Every (port, version, community) combination and, for v3, every
//! (port, v3 credentials) pair becomes one probe: a GETNEXT on `.0.0` with
//! the discovery timeout. A fixed pool of workers drains a bounded queue of
//! probes. Once a probe succeeds, no further probes start and running probes
//! that cannot beat the winner's version are abandoned. The best version
//! among the successes wins, ties going to the earlier combination.

use std::net::IpAddr;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use super::hints::SnmpSettings;
use super::snmp::{SnmpClient, SnmpCredentials};
use crate::error::{Error, Result};
use crate::version::Version;

#[derive(Debug, Clone)]
struct Probe {
    order: usize,
    credentials: SnmpCredentials,
}

/// Every credential combination in preference-independent input order.
fn probes(settings: &SnmpSettings) -> Vec<Probe> {
    let mut out = Vec::new();
    for &port in &settings.ports {
        for &version in &settings.versions {
            if version == Version::V3 {
                out.push(SnmpCredentials {
                    version,
                    community: None,
                    port,
                    v3: settings.v3.clone(),
                });
                continue;
            }
            for community in &settings.communities {
                out.push(SnmpCredentials {
                    version,
                    community: Some(community.clone()),
                    port,
                    v3: None,
                });
            }
        }
    }
    out.into_iter()
        .enumerate()
        .map(|(order, credentials)| Probe { order, credentials })
        .collect()
}

/// Find working credentials for `ip` and return a client configured with
/// the request timeouts.
#[instrument(skip(settings, cancel), err, fields(snmp.ip = %ip))]
pub async fn discover(
    ip: IpAddr,
    settings: &SnmpSettings,
    cancel: &CancellationToken,
) -> Result<SnmpClient> {
    let probes = probes(settings);
    if probes.is_empty() {
        return Err(Error::pre_condition("no SNMP credentials to try"));
    }
    let total = probes.len();
    let workers = settings.discover_parallel_requests.clamp(1, total);

    let (queue_tx, queue_rx) = mpsc::channel::<Probe>(workers);
    let queue_rx = Arc::new(Mutex::new(queue_rx));
    let (result_tx, mut result_rx) = mpsc::channel::<(Probe, Result<()>)>(total);
    let (best_tx, best_rx) = watch::channel::<Option<Version>>(None);
    let stop = cancel.child_token();

    let feeder = {
        let stop = stop.clone();
        tokio::spawn(async move {
            for probe in probes {
                tokio::select! {
                    sent = queue_tx.send(probe) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                    _ = stop.cancelled() => break,
                }
            }
        })
    };

    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers {
        let queue_rx = queue_rx.clone();
        let result_tx = result_tx.clone();
        let best_rx = best_rx.clone();
        let stop = stop.clone();
        let cancel = cancel.clone();
        let settings = settings.clone();
        handles.push(tokio::spawn(async move {
            loop {
                let next = {
                    let mut rx = queue_rx.lock().await;
                    tokio::select! {
                        p = rx.recv() => p,
                        _ = stop.cancelled() => None,
                    }
                };
                let Some(probe) = next else { break };
                let outcome = tokio::select! {
                    outcome = run_probe(ip, &settings, &probe, best_rx.clone()) => outcome,
                    _ = cancel.cancelled() => Err(Error::Cancelled.boxed()),
                };
                if result_tx.send((probe, outcome)).await.is_err() {
                    break;
                }
            }
        }));
    }
    drop(result_tx);

    let mut winner: Option<Probe> = None;
    let mut last_error: Option<Box<Error>> = None;
    while let Some((probe, outcome)) = result_rx.recv().await {
        match outcome {
            Ok(()) => {
                tracing::debug!(target: "async_devmon::network", { snmp.version = %probe.credentials.version, snmp.port = probe.credentials.port }, "SNMP probe succeeded");
                let better = match &winner {
                    None => true,
                    Some(w) => {
                        probe.credentials.version > w.credentials.version
                            || (probe.credentials.version == w.credentials.version
                                && probe.order < w.order)
                    }
                };
                if better {
                    best_tx.send_replace(Some(probe.credentials.version));
                    winner = Some(probe);
                }
                stop.cancel();
            }
            Err(e) => {
                tracing::trace!(target: "async_devmon::network", { snmp.version = %probe.credentials.version, error = %e }, "SNMP probe failed");
                last_error = Some(e);
            }
        }
    }
    stop.cancel();
    feeder.abort();
    for handle in handles {
        let _ = handle.await;
    }

    if cancel.is_cancelled() && winner.is_none() {
        return Err(Error::Cancelled.boxed());
    }
    let Some(winner) = winner else {
        let reason = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no SNMP probe answered".to_owned());
        return Err(Error::Connection {
            target: ip.to_string().into(),
            reason: reason.into(),
        }
        .boxed());
    };
    tracing::debug!(target: "async_devmon::network", { snmp.version = %winner.credentials.version, snmp.port = winner.credentials.port }, "selected SNMP credentials");
    SnmpClient::connect(ip, settings, winner.credentials, false).await
}

/// Run one probe; gives up early once a success of at least this version
/// is known.
async fn run_probe(
    ip: IpAddr,
    settings: &SnmpSettings,
    probe: &Probe,
    mut best: watch::Receiver<Option<Version>>,
) -> Result<()> {
    let version = probe.credentials.version;
    let attempt = async {
        let client = SnmpClient::connect(ip, settings, probe.credentials.clone(), true).await?;
        client.probe().await.map(|_| ())
    };
    let beaten = async {
        loop {
            if best.borrow_and_update().is_some_and(|b| b >= version) {
                return;
            }
            if best.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    };
    tokio::select! {
        outcome = attempt => outcome,
        _ = beaten => Err(Error::Cancelled.boxed()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn settings() -> SnmpSettings {
        SnmpSettings {
            communities: vec!["a".into(), "b".into()],
            versions: vec![Version::V2c, Version::V1],
            ports: vec![161, 1161],
            discover_parallel_requests: 4,
            discover_timeout: Duration::from_secs(1),
            discover_retries: 0,
            timeout: Duration::from_secs(1),
            retries: 0,
            max_repetitions: 10,
            v3: None,
        }
    }

    #[test]
    fn probes_cover_every_combination_in_order() {
        let probes = probes(&settings());
        assert_eq!(probes.len(), 8);
        let first = &probes[0].credentials;
        assert_eq!((first.port, first.version), (161, Version::V2c));
        assert_eq!(first.community.as_deref(), Some("a"));
        let last = &probes[7].credentials;
        assert_eq!((last.port, last.version), (1161, Version::V1));
        assert_eq!(last.community.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn cancelled_discovery_reports_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = discover("192.0.2.1".parse().unwrap(), &settings(), &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled() || err.is_network(), "{err}");
    }
}
