//! BER decoding over [`Bytes`] without copying content octets.

use std::net::SocketAddr;

use bytes::Bytes;

use super::length::decode_length;
use super::tag;
use crate::error::internal::DecodeErrorKind;
use crate::error::{Error, Result, UNKNOWN_TARGET};
use crate::oid::Oid;

pub struct Decoder {
    data: Bytes,
    offset: usize,
    target: Option<SocketAddr>,
}

impl Decoder {
    pub fn new(data: Bytes) -> Self {
        Self {
            data,
            offset: 0,
            target: None,
        }
    }

    /// Decoder whose errors name `target`.
    pub fn with_target(data: Bytes, target: SocketAddr) -> Self {
        Self {
            data,
            offset: 0,
            target: Some(target),
        }
    }

    pub fn from_slice(data: &[u8]) -> Self {
        Self::new(Bytes::copy_from_slice(data))
    }

    fn malformed(&self, kind: DecodeErrorKind) -> Box<Error> {
        tracing::debug!(target: "async_devmon::ber", { snmp.offset = self.offset, kind = %kind }, "decode error");
        Error::MalformedResponse {
            target: self.target.unwrap_or(UNKNOWN_TARGET),
        }
        .boxed()
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.offset)
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn peek_tag(&self) -> Option<u8> {
        self.data.get(self.offset).copied()
    }

    pub fn read_tag(&mut self) -> Result<u8> {
        let tag = self
            .peek_tag()
            .ok_or_else(|| self.malformed(DecodeErrorKind::TruncatedData))?;
        self.offset += 1;
        Ok(tag)
    }

    pub fn read_length(&mut self) -> Result<usize> {
        let (len, used) = decode_length(&self.data[self.offset..], self.offset, self.target)?;
        self.offset += used;
        Ok(len)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        let end = self.offset.saturating_add(len);
        if end > self.data.len() {
            return Err(self.malformed(DecodeErrorKind::TlvOverflow));
        }
        let out = self.data.slice(self.offset..end);
        self.offset = end;
        Ok(out)
    }

    /// Read a tag, fail unless it is `expected`, and return the content length.
    pub fn expect_tag(&mut self, expected: u8) -> Result<usize> {
        let actual = self.read_tag()?;
        if actual != expected {
            return Err(self.malformed(DecodeErrorKind::UnexpectedTag { expected, actual }));
        }
        self.read_length()
    }

    pub fn read_integer(&mut self) -> Result<i32> {
        let len = self.expect_tag(tag::universal::INTEGER)?;
        self.read_integer_value(len)
    }

    /// Signed content octets. Values longer than four octets are truncated
    /// to their leading four, as net-snmp does.
    pub fn read_integer_value(&mut self, len: usize) -> Result<i32> {
        if len == 0 {
            return Err(self.malformed(DecodeErrorKind::ZeroLengthInteger));
        }
        let bytes = self.read_bytes(len)?;
        let init: i32 = if bytes[0] & 0x80 != 0 { -1 } else { 0 };
        Ok(bytes
            .iter()
            .take(4)
            .fold(init, |acc, b| (acc << 8) | i32::from(*b)))
    }

    pub fn read_unsigned32_value(&mut self, len: usize) -> Result<u32> {
        if len == 0 {
            return Err(self.malformed(DecodeErrorKind::ZeroLengthInteger));
        }
        let bytes = self.read_bytes(len)?;
        Ok(bytes
            .iter()
            .fold(0u64, |acc, b| (acc << 8) | u64::from(*b)) as u32)
    }

    pub fn read_integer64_value(&mut self, len: usize) -> Result<u64> {
        if len == 0 {
            return Err(self.malformed(DecodeErrorKind::ZeroLengthInteger));
        }
        if len > 9 {
            return Err(self.malformed(DecodeErrorKind::Integer64TooLong { length: len }));
        }
        let bytes = self.read_bytes(len)?;
        Ok(bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
    }

    pub fn read_octet_string(&mut self) -> Result<Bytes> {
        let len = self.expect_tag(tag::universal::OCTET_STRING)?;
        self.read_bytes(len)
    }

    pub fn read_null(&mut self) -> Result<()> {
        let len = self.expect_tag(tag::universal::NULL)?;
        if len != 0 {
            return Err(self.malformed(DecodeErrorKind::InvalidNull));
        }
        Ok(())
    }

    pub fn read_oid(&mut self) -> Result<Oid> {
        let len = self.expect_tag(tag::universal::OBJECT_IDENTIFIER)?;
        self.read_oid_value(len)
    }

    pub fn read_oid_value(&mut self, len: usize) -> Result<Oid> {
        let bytes = self.read_bytes(len)?;
        Oid::from_ber(&bytes).map_err(|_| self.malformed(DecodeErrorKind::InvalidOidEncoding))
    }

    pub fn read_ip_value(&mut self, len: usize) -> Result<[u8; 4]> {
        if len != 4 {
            return Err(self.malformed(DecodeErrorKind::InvalidIpAddressLength { length: len }));
        }
        let b = self.read_bytes(4)?;
        Ok([b[0], b[1], b[2], b[3]])
    }

    pub fn read_sequence(&mut self) -> Result<Decoder> {
        self.read_constructed(tag::universal::SEQUENCE)
    }

    /// Read a constructed type and return a decoder over its content.
    pub fn read_constructed(&mut self, expected_tag: u8) -> Result<Decoder> {
        let len = self.expect_tag(expected_tag)?;
        self.sub_decoder(len)
    }

    pub fn sub_decoder(&mut self, len: usize) -> Result<Decoder> {
        let data = self.read_bytes(len)?;
        Ok(Decoder {
            data,
            offset: 0,
            target: self.target,
        })
    }

    pub fn skip_tlv(&mut self) -> Result<()> {
        self.read_tag()?;
        let len = self.read_length()?;
        self.read_bytes(len).map(|_| ())
    }

    /// The whole underlying buffer.
    pub fn as_bytes(&self) -> &Bytes {
        &self.data
    }

    pub(crate) fn reject(&self, kind: DecodeErrorKind) -> Box<Error> {
        self.malformed(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers() {
        for (bytes, want) in [
            (&[0x02, 0x01, 0x00][..], 0),
            (&[0x02, 0x01, 0x7F], 127),
            (&[0x02, 0x02, 0x00, 0x80], 128),
            (&[0x02, 0x01, 0xFF], -1),
            (&[0x02, 0x02, 0x00, 0x01], 1),
        ] {
            assert_eq!(Decoder::from_slice(bytes).read_integer().unwrap(), want);
        }
    }

    #[test]
    fn long_integers_truncate() {
        let mut dec = Decoder::from_slice(&[0x02, 0x05, 0x01, 0x02, 0x03, 0x04, 0x05]);
        assert_eq!(dec.read_integer().unwrap(), 0x01020304);
    }

    #[test]
    fn sequence_contents() {
        let mut dec = Decoder::from_slice(&[0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02]);
        let mut seq = dec.read_sequence().unwrap();
        assert_eq!(seq.read_integer().unwrap(), 1);
        assert_eq!(seq.read_integer().unwrap(), 2);
        assert!(seq.is_empty());
    }

    #[test]
    fn overruns_are_malformed() {
        let err = Decoder::from_slice(&[0x01, 0x02]).read_bytes(10).unwrap_err();
        assert!(matches!(*err, Error::MalformedResponse { .. }));
        let mut dec = Decoder::from_slice(&[0x04, 0x82, 0x01, 0x00, 0xAA]);
        assert!(dec.skip_tlv().is_err());
    }

    #[test]
    fn unexpected_tag() {
        let mut dec = Decoder::from_slice(&[0x04, 0x00]);
        assert!(dec.read_integer().is_err());
    }
}
