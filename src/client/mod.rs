//! SNMP client.
//!
//! [`Client`] speaks v1, v2c and v3 (USM) to one agent over any
//! [`Transport`]. It owns request-ID allocation, retries, response
//! validation, batching and walks. Caching and credential discovery live a
//! layer up in [`crate::network::snmp`].

mod retry;
mod v3;
mod walk;

pub use retry::{Backoff, Retry};
pub use v3::V3SecurityConfig;

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::RwLock;
use tracing::{Span, instrument};

use crate::error::{Error, ErrorStatus, Result};
use crate::message::CommunityMessage;
use crate::oid::Oid;
use crate::pdu::{Pdu, PduType};
use crate::transport::{Transport, UdpTransport};
use crate::v3::SaltCounter;
use crate::value::Value;
use crate::varbind::VarBind;
use crate::version::Version;

/// SNMP client bound to one agent.
///
/// Cloning is cheap and clones share engine state and the request-ID counter.
#[derive(Clone)]
pub struct Client<T: Transport = UdpTransport> {
    inner: Arc<ClientInner<T>>,
}

struct ClientInner<T: Transport> {
    transport: T,
    config: ClientConfig,
    request_id: AtomicI32,
    /// Discovered engine and the keys localized to it (v3 only).
    engine: RwLock<Option<v3::EngineSession>>,
    salt: SaltCounter,
}

/// Client configuration.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub version: Version,
    /// Community for v1/v2c.
    pub community: Bytes,
    /// Per-attempt response timeout.
    pub timeout: Duration,
    pub retry: Retry,
    /// OIDs per GET; larger requests are split into batches.
    pub max_oids_per_request: usize,
    pub max_repetitions: u32,
    /// Upper bound on varbinds returned by one walk.
    pub max_walk_results: Option<usize>,
    pub v3_security: Option<V3SecurityConfig>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            version: Version::V2c,
            community: Bytes::from_static(b"public"),
            timeout: Duration::from_secs(5),
            retry: Retry::default(),
            max_oids_per_request: 10,
            max_repetitions: 25,
            max_walk_results: None,
            v3_security: None,
        }
    }
}

impl Client<UdpTransport> {
    /// Open a UDP client to `target`.
    pub async fn connect(target: SocketAddr, config: ClientConfig) -> Result<Self> {
        let transport = UdpTransport::connect(target).await?;
        Ok(Self::new(transport, config))
    }

    /// A sibling client on a fresh socket that speaks with `community`.
    ///
    /// Used where an agent exposes separate views per community and several
    /// readers run side by side.
    pub async fn with_community(&self, community: impl Into<Bytes>) -> Result<Self> {
        let mut config = self.inner.config.clone();
        config.community = community.into();
        Self::connect(self.peer_addr(), config).await
    }
}

impl<T: Transport> Client<T> {
    pub fn new(transport: T, config: ClientConfig) -> Self {
        let mut seed = [0u8; 4];
        let start = match getrandom::fill(&mut seed) {
            Ok(()) => (u32::from_ne_bytes(seed) & 0x3FFF_FFFF) as i32,
            Err(_) => 1,
        };
        Self {
            inner: Arc::new(ClientInner {
                transport,
                config,
                request_id: AtomicI32::new(start.max(1)),
                engine: RwLock::new(None),
                salt: SaltCounter::new(),
            }),
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.inner.transport.peer_addr()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn version(&self) -> Version {
        self.inner.config.version
    }

    /// Positive request IDs; wraps back to 1.
    fn next_request_id(&self) -> i32 {
        let id = self.inner.request_id.fetch_add(1, Ordering::Relaxed);
        if id <= 0 || id == i32::MAX {
            self.inner.request_id.store(2, Ordering::Relaxed);
            return 1;
        }
        id
    }

    /// Send `data` and wait for the datagram answering `request_id`,
    /// re-sending on timeout per the retry policy.
    #[instrument(
        level = "debug",
        skip(self, data),
        fields(
            snmp.target = %self.peer_addr(),
            snmp.request_id = request_id,
            snmp.attempt = tracing::field::Empty,
            snmp.elapsed_ms = tracing::field::Empty,
        )
    )]
    async fn exchange(&self, request_id: i32, data: &[u8]) -> Result<Bytes> {
        let start = Instant::now();
        let retry = &self.inner.config.retry;

        for attempt in 0..=retry.max_attempts {
            Span::current().record("snmp.attempt", attempt);
            if attempt > 0 {
                tracing::debug!(target: "async_devmon::client", "retrying request");
            }

            tracing::trace!(target: "async_devmon::client", { snmp.bytes = data.len() }, "sending request");
            self.inner.transport.send(data).await?;

            match self
                .inner
                .transport
                .recv(request_id, self.inner.config.timeout)
                .await
            {
                Ok(response) => {
                    Span::current().record("snmp.elapsed_ms", start.elapsed().as_millis() as u64);
                    return Ok(response);
                }
                Err(e) if matches!(*e, Error::Timeout { .. }) => {
                    if attempt < retry.max_attempts {
                        let delay = retry.compute_delay(attempt);
                        if !delay.is_zero() {
                            tracing::debug!(target: "async_devmon::client", { delay_ms = delay.as_millis() as u64 }, "backing off");
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
                Err(e) => return Err(e),
            }
        }

        let elapsed = start.elapsed();
        Span::current().record("snmp.elapsed_ms", elapsed.as_millis() as u64);
        tracing::debug!(target: "async_devmon::client", { snmp.request_id = request_id, ?elapsed, retries = retry.max_attempts }, "request timed out");
        Err(Error::Timeout {
            target: self.peer_addr(),
            elapsed,
            retries: retry.max_attempts,
        }
        .boxed())
    }

    /// Turn an error-status response into [`Error::Snmp`].
    fn check_response(&self, pdu: Pdu) -> Result<Pdu> {
        if !pdu.is_error() {
            return Ok(pdu);
        }
        // error_index is 1-based; 0 means the whole PDU
        let oid = (pdu.error_index as usize)
            .checked_sub(1)
            .and_then(|idx| pdu.varbinds.get(idx))
            .map(|vb| vb.oid.clone());
        Err(Error::Snmp {
            target: self.peer_addr(),
            status: pdu.status(),
            index: pdu.error_index.max(0) as u32,
            oid,
        }
        .boxed())
    }

    async fn send_request(&self, pdu: Pdu) -> Result<Pdu> {
        if self.inner.config.version == Version::V3 {
            return self.send_v3(pdu).await;
        }

        tracing::debug!(target: "async_devmon::client", { snmp.pdu_type = %pdu.pdu_type, snmp.varbind_count = pdu.varbinds.len() }, "sending request");

        let request_id = pdu.request_id;
        let message = CommunityMessage::new(
            self.inner.config.version,
            self.inner.config.community.clone(),
            pdu,
        );
        let raw = self.exchange(request_id, &message.encode()).await?;
        let response = CommunityMessage::decode(raw)?;

        if response.version != self.inner.config.version {
            tracing::warn!(target: "async_devmon::client", { expected = %self.inner.config.version, actual = %response.version, snmp.target = %self.peer_addr() }, "version mismatch in response");
            return Err(Error::MalformedResponse {
                target: self.peer_addr(),
            }
            .boxed());
        }
        if response.pdu.pdu_type != PduType::Response || response.pdu.request_id != request_id {
            tracing::warn!(target: "async_devmon::client", { expected = request_id, actual = response.pdu.request_id, snmp.target = %self.peer_addr() }, "unexpected response PDU");
            return Err(Error::MalformedResponse {
                target: self.peer_addr(),
            }
            .boxed());
        }

        tracing::debug!(target: "async_devmon::client", { snmp.varbind_count = response.pdu.varbinds.len(), snmp.error_status = response.pdu.error_status }, "received response");
        self.check_response(response.pdu)
    }

    /// GET one OID.
    #[instrument(skip(self), err, fields(snmp.target = %self.peer_addr(), snmp.oid = %oid))]
    pub async fn get(&self, oid: &Oid) -> Result<VarBind> {
        let mut varbinds = self.get_many(std::slice::from_ref(oid)).await?;
        varbinds.pop().ok_or_else(|| {
            Error::MalformedResponse {
                target: self.peer_addr(),
            }
            .boxed()
        })
    }

    /// GET several OIDs in batches of `max_oids_per_request`.
    ///
    /// Results keep request order. On v1 a `noSuchName` answer to a
    /// single-OID batch is reported as a `NoSuchObject` value so callers see
    /// the same shape as on v2c.
    #[instrument(skip(self, oids), err, fields(snmp.target = %self.peer_addr(), snmp.oid_count = oids.len()))]
    pub async fn get_many(&self, oids: &[Oid]) -> Result<Vec<VarBind>> {
        let batch = self.inner.config.max_oids_per_request.max(1);
        let mut results = Vec::with_capacity(oids.len());

        for chunk in oids.chunks(batch) {
            let pdu = Pdu::get_request(self.next_request_id(), chunk);
            match self.send_request(pdu).await {
                Ok(response) => {
                    if response.varbinds.len() != chunk.len() {
                        tracing::debug!(target: "async_devmon::client", { expected = chunk.len(), actual = response.varbinds.len() }, "varbind count mismatch");
                        return Err(Error::MalformedResponse {
                            target: self.peer_addr(),
                        }
                        .boxed());
                    }
                    results.extend(response.varbinds);
                }
                Err(e)
                    if chunk.len() == 1
                        && matches!(
                            *e,
                            Error::Snmp {
                                status: ErrorStatus::NoSuchName,
                                ..
                            }
                        ) =>
                {
                    results.push(VarBind::new(chunk[0].clone(), Value::NoSuchObject));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(results)
    }

    /// GETNEXT one OID.
    #[instrument(skip(self), err, fields(snmp.target = %self.peer_addr(), snmp.oid = %oid))]
    pub async fn get_next(&self, oid: &Oid) -> Result<VarBind> {
        let pdu = Pdu::get_next_request(self.next_request_id(), std::slice::from_ref(oid));
        let response = self.send_request(pdu).await?;
        response.varbinds.into_iter().next().ok_or_else(|| {
            Error::MalformedResponse {
                target: self.peer_addr(),
            }
            .boxed()
        })
    }

    /// GETBULK (v2c/v3).
    #[instrument(skip(self, oids), err, fields(snmp.target = %self.peer_addr(), snmp.oid_count = oids.len()))]
    pub async fn get_bulk(
        &self,
        oids: &[Oid],
        non_repeaters: i32,
        max_repetitions: i32,
    ) -> Result<Vec<VarBind>> {
        if self.inner.config.version == Version::V1 {
            return Err(Error::pre_condition("GETBULK is not available in SNMPv1"));
        }
        let pdu = Pdu::get_bulk(self.next_request_id(), non_repeaters, max_repetitions, oids);
        Ok(self.send_request(pdu).await?.varbinds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;
    use crate::transport::MockTransport;

    fn client(mock: MockTransport, version: Version, batch: usize) -> Client<MockTransport> {
        Client::new(
            mock,
            ClientConfig {
                version,
                timeout: Duration::from_millis(20),
                retry: Retry::none(),
                max_oids_per_request: batch,
                ..ClientConfig::default()
            },
        )
    }

    fn echo_strings(request: &CommunityMessage) -> Option<Pdu> {
        let varbinds = request
            .pdu
            .varbinds
            .iter()
            .map(|vb| VarBind::new(vb.oid.clone(), Value::from(vb.oid.to_string())))
            .collect();
        Some(request.pdu.response(varbinds))
    }

    #[tokio::test]
    async fn get_many_batches_and_keeps_order() {
        let mock = MockTransport::new(echo_strings);
        let client = client(mock.clone(), Version::V2c, 2);
        let oids: Vec<Oid> = (1..=5).map(|i| oid!(1, 3, 6, 1, 2, 1, 1, i, 0)).collect();

        let results = client.get_many(&oids).await.unwrap();

        assert_eq!(results.len(), 5);
        for (vb, oid) in results.iter().zip(&oids) {
            assert_eq!(&vb.oid, oid);
        }
        let sizes: Vec<usize> = mock.requests().iter().map(|r| r.pdu.varbinds.len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn v1_no_such_name_becomes_exception_value() {
        let mock = MockTransport::new(|request: &CommunityMessage| {
            let mut pdu = request.pdu.response(request.pdu.varbinds.clone());
            pdu.error_status = 2;
            pdu.error_index = 1;
            Some(pdu)
        });
        let client = client(mock, Version::V1, 1);
        let vb = client.get(&oid!(1, 3, 6, 1, 2, 1, 1, 9, 0)).await.unwrap();
        assert_eq!(vb.value, Value::NoSuchObject);
    }

    #[tokio::test]
    async fn error_status_surfaces_as_snmp_error() {
        let mock = MockTransport::new(|request: &CommunityMessage| {
            let mut pdu = request.pdu.response(request.pdu.varbinds.clone());
            pdu.error_status = 5;
            pdu.error_index = 1;
            Some(pdu)
        });
        let client = client(mock, Version::V2c, 10);
        let err = client.get(&oid!(1, 3, 6, 1)).await.unwrap_err();
        match *err {
            Error::Snmp { status, ref oid, .. } => {
                assert_eq!(status, ErrorStatus::GenErr);
                assert_eq!(oid.as_ref(), Some(&oid!(1, 3, 6, 1)));
            }
            ref other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn silence_times_out_after_retries() {
        let mock = MockTransport::new(|_: &CommunityMessage| None);
        let mut config = ClientConfig {
            timeout: Duration::from_millis(10),
            ..ClientConfig::default()
        };
        config.retry = Retry::immediate(2);
        let client = Client::new(mock.clone(), config);

        let err = client.get(&oid!(1, 3, 6, 1)).await.unwrap_err();
        assert!(matches!(*err, Error::Timeout { retries: 2, .. }));
        assert_eq!(mock.requests().len(), 3);
    }

    #[tokio::test]
    async fn bulk_is_refused_on_v1() {
        let client = client(MockTransport::new(echo_strings), Version::V1, 1);
        let err = client.get_bulk(&[oid!(1, 3)], 0, 10).await.unwrap_err();
        assert!(matches!(*err, Error::PreCondition(_)));
    }
}
