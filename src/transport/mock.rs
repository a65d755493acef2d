//! Scripted in-memory transport for client unit tests.
//!
//! Each sent v1/v2c request is decoded and handed to a responder closure;
//! whatever it returns is queued for the next `recv`. `None` simulates a
//! lost datagram.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;

use super::Transport;
use crate::error::{Error, Result};
use crate::message::CommunityMessage;
use crate::pdu::Pdu;

type Responder = dyn Fn(&CommunityMessage) -> Option<Pdu> + Send + Sync;

#[derive(Clone)]
pub(crate) struct MockTransport {
    inner: Arc<Inner>,
}

struct Inner {
    target: SocketAddr,
    responder: Box<Responder>,
    pending: Mutex<VecDeque<Bytes>>,
    requests: Mutex<Vec<CommunityMessage>>,
}

impl MockTransport {
    pub(crate) fn new(
        responder: impl Fn(&CommunityMessage) -> Option<Pdu> + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                target: "192.0.2.10:161".parse().unwrap(),
                responder: Box::new(responder),
                pending: Mutex::new(VecDeque::new()),
                requests: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Every request sent so far, decoded.
    pub(crate) fn requests(&self) -> Vec<CommunityMessage> {
        self.inner.requests.lock().unwrap().clone()
    }
}

impl Transport for MockTransport {
    async fn send(&self, data: &[u8]) -> Result<()> {
        let request = CommunityMessage::decode(Bytes::copy_from_slice(data))?;
        if let Some(pdu) = (self.inner.responder)(&request) {
            let reply = CommunityMessage::new(request.version, request.community.clone(), pdu);
            self.inner.pending.lock().unwrap().push_back(reply.encode());
        }
        self.inner.requests.lock().unwrap().push(request);
        Ok(())
    }

    async fn recv(&self, _request_id: i32, timeout: Duration) -> Result<Bytes> {
        let next = self.inner.pending.lock().unwrap().pop_front();
        next.ok_or_else(|| {
            Error::Timeout {
                target: self.inner.target,
                elapsed: timeout,
                retries: 0,
            }
            .boxed()
        })
    }

    fn peer_addr(&self) -> SocketAddr {
        self.inner.target
    }

    fn local_addr(&self) -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }
}
