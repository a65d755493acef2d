//! User-based Security Model parameters (RFC 3414 Section 2.4).
//!
//! ```text
//! UsmSecurityParameters ::= SEQUENCE {
//!     msgAuthoritativeEngineID     OCTET STRING,
//!     msgAuthoritativeEngineBoots  INTEGER (0..2147483647),
//!     msgAuthoritativeEngineTime   INTEGER (0..2147483647),
//!     msgUserName                  OCTET STRING (SIZE(0..32)),
//!     msgAuthenticationParameters  OCTET STRING,
//!     msgPrivacyParameters         OCTET STRING
//! }
//! ```

use bytes::Bytes;

use crate::ber::{Decoder, EncodeBuf, tag};
use crate::error::Result;
use crate::error::internal::DecodeErrorKind;

#[derive(Debug, Clone, Default)]
pub struct UsmSecurityParams {
    pub engine_id: Bytes,
    pub engine_boots: u32,
    pub engine_time: u32,
    pub username: Bytes,
    pub auth_params: Bytes,
    pub priv_params: Bytes,
}

impl UsmSecurityParams {
    pub fn new(
        engine_id: impl Into<Bytes>,
        engine_boots: u32,
        engine_time: u32,
        username: impl Into<Bytes>,
    ) -> Self {
        Self {
            engine_id: engine_id.into(),
            engine_boots,
            engine_time,
            username: username.into(),
            ..Self::default()
        }
    }

    /// Parameters of an engine discovery probe: everything empty.
    pub fn discovery() -> Self {
        Self::default()
    }

    pub fn with_priv_params(mut self, priv_params: impl Into<Bytes>) -> Self {
        self.priv_params = priv_params.into();
        self
    }

    /// Zeroed MAC field, replaced once the whole message is encoded.
    pub fn with_auth_placeholder(mut self, mac_len: usize) -> Self {
        self.auth_params = Bytes::from(vec![0u8; mac_len]);
        self
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::new();
        buf.push_sequence(|buf| {
            buf.push_octet_string(&self.priv_params);
            buf.push_octet_string(&self.auth_params);
            buf.push_octet_string(&self.username);
            buf.push_unsigned32(tag::universal::INTEGER, self.engine_time);
            buf.push_unsigned32(tag::universal::INTEGER, self.engine_boots);
            buf.push_octet_string(&self.engine_id);
        });
        buf.finish()
    }

    pub fn decode(data: Bytes) -> Result<Self> {
        let mut decoder = Decoder::new(data);
        let mut seq = decoder.read_sequence()?;
        let engine_id = seq.read_octet_string()?;
        let boots = seq.read_integer()?;
        let time = seq.read_integer()?;
        if boots < 0 || time < 0 {
            return Err(seq.reject(DecodeErrorKind::InvalidLength));
        }
        Ok(Self {
            engine_id,
            engine_boots: boots as u32,
            engine_time: time as u32,
            username: seq.read_octet_string()?,
            auth_params: seq.read_octet_string()?,
            priv_params: seq.read_octet_string()?,
        })
    }

    /// Offset and length of msgAuthenticationParameters inside an encoded
    /// v3 message, or `None` when the layout does not match.
    pub fn find_auth_params_offset(message: &[u8]) -> Option<(usize, usize)> {
        let mut dec = Decoder::from_slice(message);
        if dec.read_tag().ok()? != tag::universal::SEQUENCE {
            return None;
        }
        dec.read_length().ok()?;
        // version, msgGlobalData
        dec.skip_tlv().ok()?;
        dec.skip_tlv().ok()?;
        if dec.read_tag().ok()? != tag::universal::OCTET_STRING {
            return None;
        }
        dec.read_length().ok()?;
        if dec.read_tag().ok()? != tag::universal::SEQUENCE {
            return None;
        }
        dec.read_length().ok()?;
        // engine id, boots, time, user name
        for _ in 0..4 {
            dec.skip_tlv().ok()?;
        }
        if dec.read_tag().ok()? != tag::universal::OCTET_STRING {
            return None;
        }
        let len = dec.read_length().ok()?;
        let offset = dec.offset();
        (offset + len <= message.len()).then_some((offset, len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MsgFlags, MsgGlobalData, ScopedPdu, SecurityLevel, V3Message, V3MessageData};
    use crate::pdu::Pdu;
    use crate::oid;

    #[test]
    fn params_survive_encoding() {
        let params = UsmSecurityParams::new(&b"engine"[..], 4, 99_000, &b"admin"[..])
            .with_auth_placeholder(12)
            .with_priv_params(&[1u8, 2, 3, 4, 5, 6, 7, 8][..]);
        let back = UsmSecurityParams::decode(params.encode()).unwrap();
        assert_eq!(&back.engine_id[..], b"engine");
        assert_eq!(back.engine_boots, 4);
        assert_eq!(back.engine_time, 99_000);
        assert_eq!(&back.username[..], b"admin");
        assert_eq!(back.auth_params.len(), 12);
        assert_eq!(back.priv_params.len(), 8);
    }

    #[test]
    fn auth_offset_points_at_placeholder() {
        let params = UsmSecurityParams::new(&b"eng"[..], 1, 2, &b"u"[..]).with_auth_placeholder(12);
        let msg = V3Message {
            global_data: MsgGlobalData::new(5, 65507, MsgFlags::new(SecurityLevel::AuthNoPriv, true)),
            security_params: params.encode(),
            data: V3MessageData::Plaintext(ScopedPdu::new(
                &b"eng"[..],
                Bytes::new(),
                Pdu::get_request(5, &[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]),
            )),
        };
        let encoded = msg.encode();
        let (offset, len) = UsmSecurityParams::find_auth_params_offset(&encoded).unwrap();
        assert_eq!(len, 12);
        assert!(encoded[offset..offset + len].iter().all(|b| *b == 0));
        assert_eq!(encoded[offset - 2], tag::universal::OCTET_STRING);
    }

    #[test]
    fn garbage_has_no_auth_offset() {
        assert!(UsmSecurityParams::find_auth_params_offset(&[0x02, 0x01, 0x00]).is_none());
    }
}
