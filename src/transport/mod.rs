//! Transport layer abstraction.
//!
//! The client is generic over [`Transport`]; production code uses
//! [`UdpTransport`], unit tests a scripted mock.

mod udp;

#[cfg(test)]
mod mock;

pub use udp::UdpTransport;

#[cfg(test)]
pub(crate) use mock::MockTransport;

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;

use crate::ber::Decoder;
use crate::ber::tag;
use crate::error::Result;

/// Client-side datagram transport bound to one agent.
///
/// `Clone` is cheap; implementations share state behind an `Arc`.
pub trait Transport: Send + Sync + Clone + 'static {
    fn send(&self, data: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Wait for the response carrying `request_id` (msgID for v3).
    ///
    /// Datagrams for other IDs are stale replies to earlier attempts and
    /// are discarded.
    fn recv(&self, request_id: i32, timeout: Duration)
    -> impl Future<Output = Result<Bytes>> + Send;

    fn peer_addr(&self) -> SocketAddr;

    fn local_addr(&self) -> SocketAddr;
}

/// Request ID of a v1/v2c message or msgID of a v3 message.
pub(crate) fn extract_request_id(data: &[u8]) -> Option<i32> {
    let mut dec = Decoder::from_slice(data);
    let mut seq = dec.read_sequence().ok()?;
    let version = seq.read_integer().ok()?;
    if version == 3 {
        let mut global = seq.read_sequence().ok()?;
        return global.read_integer().ok();
    }
    if seq.peek_tag() != Some(tag::universal::OCTET_STRING) {
        return None;
    }
    seq.read_octet_string().ok()?;
    let pdu_tag = seq.read_tag().ok()?;
    if !(0xA0..=0xA8).contains(&pdu_tag) {
        return None;
    }
    seq.read_length().ok()?;
    seq.read_integer().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_from_v2c_response() {
        let response = [
            0x30, 0x1c, 0x02, 0x01, 0x01, 0x04, 0x06, 0x70, 0x75, 0x62, 0x6c, 0x69, 0x63, 0xa2,
            0x0f, 0x02, 0x02, 0x30, 0x39, 0x02, 0x01, 0x00, 0x02, 0x01, 0x00, 0x30, 0x03, 0x30,
            0x01, 0x00,
        ];
        assert_eq!(extract_request_id(&response), Some(12345));
    }

    #[test]
    fn msg_id_from_v3_header() {
        let header = [
            0x30, 0x16, 0x02, 0x01, 0x03, 0x30, 0x11, 0x02, 0x02, 0x30, 0x39, 0x02, 0x03, 0x00,
            0xff, 0xe3, 0x04, 0x01, 0x04, 0x02, 0x01, 0x03,
        ];
        assert_eq!(extract_request_id(&header), Some(12345));
    }

    #[test]
    fn negative_request_id() {
        let response = [
            0x30, 0x19, 0x02, 0x01, 0x01, 0x04, 0x06, 0x70, 0x75, 0x62, 0x6c, 0x69, 0x63, 0xa2,
            0x0c, 0x02, 0x01, 0xff, 0x02, 0x01, 0x00, 0x02, 0x01, 0x00, 0x30, 0x00,
        ];
        assert_eq!(extract_request_id(&response), Some(-1));
    }

    #[test]
    fn garbage_has_no_request_id() {
        assert_eq!(extract_request_id(&[]), None);
        assert_eq!(extract_request_id(&[0x02, 0x01, 0x00]), None);
        assert_eq!(extract_request_id(&[0x30, 0x10]), None);
    }
}
