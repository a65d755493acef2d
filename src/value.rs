//! SNMP value types.

use bytes::Bytes;

use crate::ber::{Decoder, EncodeBuf, tag};
use crate::error::Result;
use crate::error::internal::DecodeErrorKind;
use crate::oid::Oid;
use crate::util::encode_hex_upper;

/// SNMP value, including the v2c exception values.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Value {
    Integer(i32),
    OctetString(Bytes),
    Null,
    ObjectIdentifier(Oid),
    IpAddress([u8; 4]),
    Counter32(u32),
    Gauge32(u32),
    TimeTicks(u32),
    Opaque(Bytes),
    /// SNMPv2c/v3 only.
    Counter64(u64),
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
    /// Unrecognised tag, kept as-is.
    Unknown { tag: u8, data: Bytes },
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(i64::from(*v)),
            Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v) => Some(i64::from(*v)),
            Value::Counter64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Integer(v) => u64::try_from(*v).ok(),
            Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v) => Some(u64::from(*v)),
            Value::Counter64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::OctetString(b) | Value::Opaque(b) => Some(b),
            _ => None,
        }
    }

    /// The octet string as UTF-8, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    pub fn as_oid(&self) -> Option<&Oid> {
        match self {
            Value::ObjectIdentifier(oid) => Some(oid),
            _ => None,
        }
    }

    /// True for noSuchObject, noSuchInstance and endOfMibView.
    pub fn is_exception(&self) -> bool {
        matches!(
            self,
            Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView
        )
    }

    /// A response value carries data: it is neither an exception nor NULL.
    pub fn is_successful(&self) -> bool {
        !self.is_exception() && !matches!(self, Value::Null)
    }

    pub fn encode(&self, buf: &mut EncodeBuf) {
        match self {
            Value::Integer(v) => buf.push_integer(*v),
            Value::OctetString(data) => buf.push_octet_string(data),
            Value::Null => buf.push_null(),
            Value::ObjectIdentifier(oid) => buf.push_oid(oid),
            Value::IpAddress(addr) => buf.push_ip_address(*addr),
            Value::Counter32(v) => buf.push_unsigned32(tag::application::COUNTER32, *v),
            Value::Gauge32(v) => buf.push_unsigned32(tag::application::GAUGE32, *v),
            Value::TimeTicks(v) => buf.push_unsigned32(tag::application::TIMETICKS, *v),
            Value::Counter64(v) => buf.push_integer64(*v),
            Value::Opaque(data) => raw_tlv(buf, tag::application::OPAQUE, data),
            Value::NoSuchObject => raw_tlv(buf, tag::context::NO_SUCH_OBJECT, &[]),
            Value::NoSuchInstance => raw_tlv(buf, tag::context::NO_SUCH_INSTANCE, &[]),
            Value::EndOfMibView => raw_tlv(buf, tag::context::END_OF_MIB_VIEW, &[]),
            Value::Unknown { tag, data } => raw_tlv(buf, *tag, data),
        }
    }

    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let t = decoder.read_tag()?;
        let len = decoder.read_length()?;
        Ok(match t {
            tag::universal::INTEGER => Value::Integer(decoder.read_integer_value(len)?),
            tag::universal::OCTET_STRING => Value::OctetString(decoder.read_bytes(len)?),
            tag::universal::NULL => {
                if len != 0 {
                    return Err(decoder.reject(DecodeErrorKind::InvalidNull));
                }
                Value::Null
            }
            tag::universal::OBJECT_IDENTIFIER => {
                Value::ObjectIdentifier(decoder.read_oid_value(len)?)
            }
            tag::application::IP_ADDRESS => Value::IpAddress(decoder.read_ip_value(len)?),
            tag::application::COUNTER32 => Value::Counter32(decoder.read_unsigned32_value(len)?),
            tag::application::GAUGE32 => Value::Gauge32(decoder.read_unsigned32_value(len)?),
            tag::application::TIMETICKS => Value::TimeTicks(decoder.read_unsigned32_value(len)?),
            tag::application::OPAQUE => Value::Opaque(decoder.read_bytes(len)?),
            tag::application::COUNTER64 => Value::Counter64(decoder.read_integer64_value(len)?),
            tag::context::NO_SUCH_OBJECT => {
                decoder.read_bytes(len)?;
                Value::NoSuchObject
            }
            tag::context::NO_SUCH_INSTANCE => {
                decoder.read_bytes(len)?;
                Value::NoSuchInstance
            }
            tag::context::END_OF_MIB_VIEW => {
                decoder.read_bytes(len)?;
                Value::EndOfMibView
            }
            tag::universal::OCTET_STRING_CONSTRUCTED => {
                return Err(decoder.reject(DecodeErrorKind::ConstructedOctetString));
            }
            other => Value::Unknown {
                tag: other,
                data: decoder.read_bytes(len)?,
            },
        })
    }
}

fn raw_tlv(buf: &mut EncodeBuf, tag: u8, data: &[u8]) {
    buf.push_bytes(data);
    buf.push_length(data.len());
    buf.push_tag(tag);
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{}", v),
            Value::OctetString(data) => match std::str::from_utf8(data) {
                Ok(s) => f.write_str(s),
                Err(_) => write!(f, "0x{}", encode_hex_upper(data)),
            },
            Value::Null => f.write_str("NULL"),
            Value::ObjectIdentifier(oid) => write!(f, "{}", oid),
            Value::IpAddress(a) => write!(f, "{}.{}.{}.{}", a[0], a[1], a[2], a[3]),
            Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v) => write!(f, "{}", v),
            Value::Counter64(v) => write!(f, "{}", v),
            Value::Opaque(data) => write!(f, "Opaque(0x{})", encode_hex_upper(data)),
            Value::NoSuchObject => f.write_str("noSuchObject"),
            Value::NoSuchInstance => f.write_str("noSuchInstance"),
            Value::EndOfMibView => f.write_str("endOfMibView"),
            Value::Unknown { tag, data } => {
                write!(f, "Unknown(tag=0x{:02X}, data=0x{})", tag, encode_hex_upper(data))
            }
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::OctetString(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::OctetString(Bytes::from(s))
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::OctetString(Bytes::copy_from_slice(b))
    }
}

impl From<Oid> for Value {
    fn from(oid: Oid) -> Self {
        Value::ObjectIdentifier(oid)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Counter64(v)
    }
}

impl From<std::net::Ipv4Addr> for Value {
    fn from(addr: std::net::Ipv4Addr) -> Self {
        Value::IpAddress(addr.octets())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;

    fn round_trip(v: &Value) -> Value {
        let mut buf = EncodeBuf::new();
        v.encode(&mut buf);
        Value::decode(&mut Decoder::new(buf.finish())).unwrap()
    }

    #[test]
    fn wire_forms_survive() {
        for v in [
            Value::Integer(-42),
            Value::from("Ceragon IP-10"),
            Value::ObjectIdentifier(oid!(1, 3, 6, 1, 4, 1, 2281)),
            Value::Counter32(u32::MAX),
            Value::Counter64(5_000_000_000),
            Value::IpAddress([10, 0, 0, 1]),
            Value::NoSuchInstance,
        ] {
            assert_eq!(round_trip(&v), v);
        }
    }

    #[test]
    fn success_discipline() {
        assert!(Value::Integer(0).is_successful());
        assert!(Value::from("").is_successful());
        assert!(!Value::Null.is_successful());
        assert!(!Value::NoSuchObject.is_successful());
        assert!(!Value::NoSuchInstance.is_successful());
        assert!(!Value::EndOfMibView.is_successful());
    }

    #[test]
    fn constructed_octet_string_rejected() {
        let mut dec = Decoder::from_slice(&[0x24, 0x00]);
        assert!(Value::decode(&mut dec).is_err());
    }

    #[test]
    fn numeric_views() {
        assert_eq!(Value::Gauge32(7).as_u64(), Some(7));
        assert_eq!(Value::Integer(-1).as_u64(), None);
        assert_eq!(Value::Counter64(u64::MAX).as_i64(), None);
    }
}
