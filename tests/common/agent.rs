//! In-process SNMP agent serving a fixed MIB.
//!
//! Agents bind to an ephemeral localhost port, answer GET, GETNEXT and
//! GETBULK for v1 and v2c, and shut down on drop. Requests with an unknown
//! community are dropped, like a real agent would.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::ops::Bound;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_devmon::message::CommunityMessage;
use async_devmon::pdu::{Pdu, PduType};
use async_devmon::{Oid, Value, VarBind, Version};
use bytes::Bytes;
use parking_lot::RwLock;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// v1 `noSuchName`.
const NO_SUCH_NAME: i32 = 2;

struct Shared {
    data: RwLock<BTreeMap<Oid, Value>>,
    communities: Vec<Bytes>,
    delays: Vec<(Oid, Duration)>,
    requests: AtomicUsize,
}

pub struct TestAgent {
    addr: SocketAddr,
    shared: Arc<Shared>,
    cancel: CancellationToken,
    _task: JoinHandle<()>,
}

pub struct TestAgentBuilder {
    data: BTreeMap<Oid, Value>,
    communities: Vec<Bytes>,
    delays: Vec<(Oid, Duration)>,
}

impl TestAgentBuilder {
    pub fn data(mut self, data: BTreeMap<Oid, Value>) -> Self {
        self.data.extend(data);
        self
    }

    /// Accept `community`. Without any, `public` is accepted.
    pub fn community(mut self, community: &str) -> Self {
        self.communities.push(Bytes::copy_from_slice(community.as_bytes()));
        self
    }

    /// Hold back answers to requests naming an OID below `prefix`.
    pub fn delay(mut self, prefix: &str, delay: Duration) -> Self {
        self.delays
            .push((Oid::parse(prefix).expect("valid delay prefix"), delay));
        self
    }

    pub async fn start(mut self) -> TestAgent {
        if self.communities.is_empty() {
            self.communities.push(Bytes::from_static(b"public"));
        }
        let socket = Arc::new(
            UdpSocket::bind("127.0.0.1:0")
                .await
                .expect("failed to bind test agent"),
        );
        let addr = socket.local_addr().expect("bound socket has an address");
        let shared = Arc::new(Shared {
            data: RwLock::new(self.data),
            communities: self.communities,
            delays: self.delays,
            requests: AtomicUsize::new(0),
        });
        let cancel = CancellationToken::new();
        let task = tokio::spawn(serve(socket, shared.clone(), cancel.clone()));
        TestAgent {
            addr,
            shared,
            cancel,
            _task: task,
        }
    }
}

impl TestAgent {
    pub fn builder() -> TestAgentBuilder {
        TestAgentBuilder {
            data: BTreeMap::new(),
            communities: Vec::new(),
            delays: Vec::new(),
        }
    }

    pub async fn with_data(data: BTreeMap<Oid, Value>) -> Self {
        Self::builder().data(data).start().await
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Insert or replace one value.
    pub fn set(&self, oid: Oid, value: Value) {
        self.shared.data.write().insert(oid, value);
    }

    /// Requests answered or being answered so far.
    pub fn request_count(&self) -> usize {
        self.shared.requests.load(Ordering::Relaxed)
    }
}

impl Drop for TestAgent {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn serve(socket: Arc<UdpSocket>, shared: Arc<Shared>, cancel: CancellationToken) {
    let mut buf = vec![0u8; 65_535];
    loop {
        let (len, peer) = tokio::select! {
            received = socket.recv_from(&mut buf) => match received {
                Ok(r) => r,
                Err(_) => continue,
            },
            _ = cancel.cancelled() => break,
        };
        let Ok(request) = CommunityMessage::decode(Bytes::copy_from_slice(&buf[..len])) else {
            continue;
        };
        if !shared.communities.contains(&request.community) {
            continue;
        }
        shared.requests.fetch_add(1, Ordering::Relaxed);

        let socket = socket.clone();
        let shared = shared.clone();
        tokio::spawn(async move {
            if let Some(delay) = shared.delay_for(&request.pdu) {
                tokio::time::sleep(delay).await;
            }
            let pdu = shared.respond(request.version, &request.pdu);
            let reply = CommunityMessage::new(request.version, request.community.clone(), pdu);
            let _ = socket.send_to(&reply.encode(), peer).await;
        });
    }
}

impl Shared {
    fn delay_for(&self, pdu: &Pdu) -> Option<Duration> {
        pdu.varbinds.iter().find_map(|vb| {
            self.delays
                .iter()
                .find(|(prefix, _)| vb.oid.starts_with(prefix))
                .map(|(_, delay)| *delay)
        })
    }

    fn respond(&self, version: Version, request: &Pdu) -> Pdu {
        let data = self.data.read();
        let varbinds: Vec<VarBind> = match request.pdu_type {
            PduType::GetRequest => request
                .varbinds
                .iter()
                .map(|vb| {
                    let value = data.get(&vb.oid).cloned().unwrap_or(Value::NoSuchObject);
                    VarBind::new(vb.oid.clone(), value)
                })
                .collect(),
            PduType::GetNextRequest => request
                .varbinds
                .iter()
                .map(|vb| next(&data, &vb.oid))
                .collect(),
            PduType::GetBulkRequest => bulk(&data, request),
            PduType::Response | PduType::Report => return request.response(Vec::new()),
        };

        if version == Version::V1
            && let Some(pos) = varbinds.iter().position(|vb| vb.value.is_exception())
        {
            let mut pdu = request.response(request.varbinds.clone());
            pdu.error_status = NO_SUCH_NAME;
            pdu.error_index = pos as i32 + 1;
            return pdu;
        }
        request.response(varbinds)
    }
}

fn next(data: &BTreeMap<Oid, Value>, oid: &Oid) -> VarBind {
    data.range((Bound::Excluded(oid.clone()), Bound::Unbounded))
        .next()
        .map(|(k, v)| VarBind::new(k.clone(), v.clone()))
        .unwrap_or_else(|| VarBind::new(oid.clone(), Value::EndOfMibView))
}

fn bulk(data: &BTreeMap<Oid, Value>, request: &Pdu) -> Vec<VarBind> {
    let non_repeaters = request.error_status.max(0) as usize;
    let max_repetitions = request.error_index.max(0) as usize;
    let (fixed, repeated) = request
        .varbinds
        .split_at(non_repeaters.min(request.varbinds.len()));

    let mut out: Vec<VarBind> = fixed.iter().map(|vb| next(data, &vb.oid)).collect();
    let mut cursors: Vec<Oid> = repeated.iter().map(|vb| vb.oid.clone()).collect();
    for _ in 0..max_repetitions {
        let mut all_done = true;
        for cursor in &mut cursors {
            let vb = next(data, cursor);
            if vb.value != Value::EndOfMibView {
                all_done = false;
                *cursor = vb.oid.clone();
            }
            out.push(vb);
        }
        if all_done {
            break;
        }
    }
    out
}
