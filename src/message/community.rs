//! v1/v2c message: `SEQUENCE { version INTEGER, community OCTET STRING, pdu }`.

use bytes::Bytes;

use crate::ber::{Decoder, EncodeBuf};
use crate::error::Result;
use crate::error::internal::DecodeErrorKind;
use crate::pdu::Pdu;
use crate::version::Version;

#[derive(Debug, Clone)]
pub struct CommunityMessage {
    pub version: Version,
    pub community: Bytes,
    pub pdu: Pdu,
}

impl CommunityMessage {
    pub fn new(version: Version, community: impl Into<Bytes>, pdu: Pdu) -> Self {
        debug_assert!(version.is_community());
        Self {
            version,
            community: community.into(),
            pdu,
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::new();
        buf.push_sequence(|buf| {
            self.pdu.encode(buf);
            buf.push_octet_string(&self.community);
            buf.push_integer(self.version.as_i32());
        });
        buf.finish()
    }

    pub fn decode(data: Bytes) -> Result<Self> {
        let mut dec = Decoder::new(data);
        let mut seq = dec.read_sequence()?;
        let raw = seq.read_integer()?;
        let version = Version::from_i32(raw)
            .filter(|v| v.is_community())
            .ok_or_else(|| seq.reject(DecodeErrorKind::UnknownVersion(raw)))?;
        Self::decode_body(&mut seq, version)
    }

    /// Decode what follows the version field.
    pub(crate) fn decode_body(seq: &mut Decoder, version: Version) -> Result<Self> {
        let community = seq.read_octet_string()?;
        let pdu = Pdu::decode(seq)?;
        Ok(Self {
            version,
            community,
            pdu,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;

    #[test]
    fn version_and_community_survive() {
        for version in [Version::V1, Version::V2c] {
            let pdu = Pdu::get_request(42, &[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]);
            let msg = CommunityMessage::new(version, &b"ceragon-ip10"[..], pdu);
            let back = CommunityMessage::decode(msg.encode()).unwrap();
            assert_eq!(back.version, version);
            assert_eq!(&back.community[..], b"ceragon-ip10");
            assert_eq!(back.pdu.request_id, 42);
        }
    }

    #[test]
    fn v3_is_not_a_community_message() {
        let mut buf = EncodeBuf::new();
        buf.push_sequence(|b| b.push_integer(3));
        assert!(CommunityMessage::decode(buf.finish()).is_err());
    }
}
