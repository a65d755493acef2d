//! SNMP Protocol Data Units used by a read-only manager.

use crate::ber::{Decoder, EncodeBuf};
use crate::error::internal::DecodeErrorKind;
use crate::error::{ErrorStatus, Result};
use crate::oid::Oid;
use crate::varbind::{VarBind, decode_varbind_list, encode_varbind_list};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PduType {
    GetRequest = 0xA0,
    GetNextRequest = 0xA1,
    Response = 0xA2,
    GetBulkRequest = 0xA5,
    Report = 0xA8,
}

impl PduType {
    pub fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0xA0 => Self::GetRequest,
            0xA1 => Self::GetNextRequest,
            0xA2 => Self::Response,
            0xA5 => Self::GetBulkRequest,
            0xA8 => Self::Report,
            _ => return None,
        })
    }

    pub fn tag(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for PduType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::GetRequest => "GetRequest",
            Self::GetNextRequest => "GetNextRequest",
            Self::Response => "Response",
            Self::GetBulkRequest => "GetBulkRequest",
            Self::Report => "Report",
        };
        f.write_str(name)
    }
}

/// Request/response PDU.
///
/// For GETBULK, `error_status` carries non-repeaters and `error_index`
/// carries max-repetitions.
#[derive(Debug, Clone, PartialEq)]
pub struct Pdu {
    pub pdu_type: PduType,
    pub request_id: i32,
    pub error_status: i32,
    pub error_index: i32,
    pub varbinds: Vec<VarBind>,
}

impl Pdu {
    fn request(pdu_type: PduType, request_id: i32, oids: &[Oid]) -> Self {
        Self {
            pdu_type,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds: oids.iter().cloned().map(VarBind::null).collect(),
        }
    }

    pub fn get_request(request_id: i32, oids: &[Oid]) -> Self {
        Self::request(PduType::GetRequest, request_id, oids)
    }

    pub fn get_next_request(request_id: i32, oids: &[Oid]) -> Self {
        Self::request(PduType::GetNextRequest, request_id, oids)
    }

    pub fn get_bulk(request_id: i32, non_repeaters: i32, max_repetitions: i32, oids: &[Oid]) -> Self {
        Self {
            error_status: non_repeaters,
            error_index: max_repetitions,
            ..Self::request(PduType::GetBulkRequest, request_id, oids)
        }
    }

    /// A response echoing this request's id.
    pub fn response(&self, varbinds: Vec<VarBind>) -> Self {
        Self {
            pdu_type: PduType::Response,
            request_id: self.request_id,
            error_status: 0,
            error_index: 0,
            varbinds,
        }
    }

    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_constructed(self.pdu_type.tag(), |buf| {
            encode_varbind_list(buf, &self.varbinds);
            buf.push_integer(self.error_index);
            buf.push_integer(self.error_status);
            buf.push_integer(self.request_id);
        });
    }

    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let tag = decoder.read_tag()?;
        let pdu_type = PduType::from_tag(tag)
            .ok_or_else(|| decoder.reject(DecodeErrorKind::UnknownPduType(tag)))?;
        let len = decoder.read_length()?;
        let mut body = decoder.sub_decoder(len)?;
        Ok(Self {
            pdu_type,
            request_id: body.read_integer()?,
            error_status: body.read_integer()?,
            error_index: body.read_integer()?,
            varbinds: decode_varbind_list(&mut body)?,
        })
    }

    pub fn is_error(&self) -> bool {
        self.error_status != 0
    }

    pub fn status(&self) -> ErrorStatus {
        ErrorStatus::from_i32(self.error_status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;

    #[test]
    fn bulk_reuses_status_fields() {
        let pdu = Pdu::get_bulk(7, 0, 25, &[oid!(1, 3, 6, 1, 2, 1, 2)]);
        let mut buf = EncodeBuf::new();
        pdu.encode(&mut buf);
        let back = Pdu::decode(&mut Decoder::new(buf.finish())).unwrap();
        assert_eq!(back.pdu_type, PduType::GetBulkRequest);
        assert_eq!(back.error_index, 25);
        assert_eq!(back, pdu);
    }

    #[test]
    fn unknown_pdu_tag_rejected() {
        // SetRequest is never sent or accepted by this crate.
        let mut dec = Decoder::from_slice(&[0xA3, 0x00]);
        assert!(Pdu::decode(&mut dec).is_err());
    }
}
