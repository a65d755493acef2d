//! UDP transport.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::net::UdpSocket;

use super::{Transport, extract_request_id};
use crate::error::{Error, Result};
use crate::util::bind_ephemeral_udp_socket;

/// A connected UDP socket to one agent.
#[derive(Clone)]
pub struct UdpTransport {
    inner: Arc<UdpTransportInner>,
}

struct UdpTransportInner {
    socket: UdpSocket,
    target: SocketAddr,
    local_addr: SocketAddr,
}

impl UdpTransport {
    pub async fn connect(target: SocketAddr) -> Result<Self> {
        let io_err = |source| Error::Network { target, source }.boxed();

        let socket = bind_ephemeral_udp_socket(target).map_err(io_err)?;
        socket.connect(target).await.map_err(io_err)?;
        let local_addr = socket.local_addr().map_err(io_err)?;

        tracing::trace!(target: "async_devmon::transport", { snmp.target = %target, snmp.local_addr = %local_addr }, "UDP transport connected");

        Ok(Self {
            inner: Arc::new(UdpTransportInner {
                socket,
                target,
                local_addr,
            }),
        })
    }
}

impl Transport for UdpTransport {
    async fn send(&self, data: &[u8]) -> Result<()> {
        tracing::trace!(target: "async_devmon::transport", { snmp.target = %self.inner.target, snmp.bytes = data.len() }, "UDP send");
        self.inner
            .socket
            .send(data)
            .await
            .map_err(|source| {
                Error::Network {
                    target: self.inner.target,
                    source,
                }
                .boxed()
            })?;
        Ok(())
    }

    async fn recv(&self, request_id: i32, timeout: Duration) -> Result<Bytes> {
        let start = Instant::now();
        let deadline = tokio::time::Instant::now() + timeout;
        let mut buf = vec![0u8; 65535];

        loop {
            let len = match tokio::time::timeout_at(deadline, self.inner.socket.recv(&mut buf)).await
            {
                Ok(Ok(len)) => len,
                Ok(Err(source)) => {
                    // ICMP port unreachable surfaces here on connected sockets
                    return Err(Error::Network {
                        target: self.inner.target,
                        source,
                    }
                    .boxed());
                }
                Err(_) => {
                    tracing::trace!(target: "async_devmon::transport", { snmp.target = %self.inner.target, snmp.request_id = request_id }, "UDP recv timeout");
                    return Err(Error::Timeout {
                        target: self.inner.target,
                        elapsed: start.elapsed(),
                        retries: 0,
                    }
                    .boxed());
                }
            };

            let data = &buf[..len];
            match extract_request_id(data) {
                Some(id) if id == request_id => {
                    tracing::trace!(target: "async_devmon::transport", { snmp.target = %self.inner.target, snmp.bytes = len }, "UDP recv complete");
                    return Ok(Bytes::copy_from_slice(data));
                }
                other => {
                    tracing::trace!(target: "async_devmon::transport", { snmp.target = %self.inner.target, expected = request_id, actual = ?other }, "discarding stale datagram");
                }
            }
        }
    }

    fn peer_addr(&self) -> SocketAddr {
        self.inner.target
    }

    fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }
}
