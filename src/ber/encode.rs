//! BER encoding.
//!
//! [`EncodeBuf`] grows backwards: the innermost content is pushed first and
//! each constructed type pushes its length and tag after its content.
//! [`EncodeBuf::finish`] reverses the buffer into wire order.

use bytes::Bytes;

use super::length::encode_length;
use super::tag;
use crate::oid::Oid;

#[derive(Debug, Default)]
pub struct EncodeBuf {
    rev: Vec<u8>,
}

impl EncodeBuf {
    pub fn new() -> Self {
        Self {
            rev: Vec::with_capacity(256),
        }
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.rev.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rev.is_empty()
    }

    pub fn push_tag(&mut self, tag: u8) {
        self.rev.push(tag);
    }

    pub fn push_length(&mut self, len: usize) {
        let (buf, n) = encode_length(len);
        self.rev.extend(buf[..n].iter().rev());
    }

    pub fn push_bytes(&mut self, data: &[u8]) {
        self.rev.extend(data.iter().rev());
    }

    /// Push a constructed TLV whose content is written by `f`.
    pub fn push_constructed(&mut self, tag: u8, f: impl FnOnce(&mut Self)) {
        let start = self.rev.len();
        f(self);
        let content = self.rev.len() - start;
        self.push_length(content);
        self.push_tag(tag);
    }

    pub fn push_sequence(&mut self, f: impl FnOnce(&mut Self)) {
        self.push_constructed(tag::universal::SEQUENCE, f);
    }

    fn push_primitive(&mut self, tag: u8, content: &[u8]) {
        self.push_bytes(content);
        self.push_length(content.len());
        self.push_tag(tag);
    }

    /// Two's complement, minimal length.
    pub fn push_integer(&mut self, value: i32) {
        let bytes = value.to_be_bytes();
        let mut start = 0;
        while start < 3 {
            let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
                || (bytes[start] == 0xFF && bytes[start + 1] & 0x80 != 0);
            if !redundant {
                break;
            }
            start += 1;
        }
        self.push_primitive(tag::universal::INTEGER, &bytes[start..]);
    }

    /// Unsigned value with a leading zero octet when the high bit is set.
    fn push_unsigned(&mut self, tag: u8, value: u64) {
        let bytes = value.to_be_bytes();
        let skip = bytes.iter().take_while(|b| **b == 0).count().min(7);
        let significant = &bytes[skip..];
        if significant[0] & 0x80 != 0 {
            self.push_bytes(significant);
            self.rev.push(0);
            self.push_length(significant.len() + 1);
            self.push_tag(tag);
        } else {
            self.push_primitive(tag, significant);
        }
    }

    pub fn push_unsigned32(&mut self, tag: u8, value: u32) {
        self.push_unsigned(tag, u64::from(value));
    }

    pub fn push_integer64(&mut self, value: u64) {
        self.push_unsigned(tag::application::COUNTER64, value);
    }

    pub fn push_octet_string(&mut self, data: &[u8]) {
        self.push_primitive(tag::universal::OCTET_STRING, data);
    }

    pub fn push_null(&mut self) {
        self.push_length(0);
        self.push_tag(tag::universal::NULL);
    }

    pub fn push_oid(&mut self, oid: &Oid) {
        self.push_primitive(tag::universal::OBJECT_IDENTIFIER, &oid.to_ber());
    }

    pub fn push_ip_address(&mut self, addr: [u8; 4]) {
        self.push_primitive(tag::application::IP_ADDRESS, &addr);
    }

    /// Consume the buffer, returning bytes in wire order.
    pub fn finish(mut self) -> Bytes {
        self.rev.reverse();
        Bytes::from(self.rev)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;

    fn encoded(f: impl FnOnce(&mut EncodeBuf)) -> Vec<u8> {
        let mut buf = EncodeBuf::new();
        f(&mut buf);
        buf.finish().to_vec()
    }

    #[test]
    fn integers_are_minimal() {
        assert_eq!(encoded(|b| b.push_integer(0)), [0x02, 0x01, 0x00]);
        assert_eq!(encoded(|b| b.push_integer(128)), [0x02, 0x02, 0x00, 0x80]);
        assert_eq!(encoded(|b| b.push_integer(-1)), [0x02, 0x01, 0xFF]);
        assert_eq!(encoded(|b| b.push_integer(-129)), [0x02, 0x02, 0xFF, 0x7F]);
    }

    #[test]
    fn unsigned_gets_leading_zero() {
        assert_eq!(
            encoded(|b| b.push_unsigned32(tag::application::GAUGE32, 0x8000_0000)),
            [0x42, 0x05, 0x00, 0x80, 0x00, 0x00, 0x00]
        );
        assert_eq!(
            encoded(|b| b.push_unsigned32(tag::application::COUNTER32, 0)),
            [0x41, 0x01, 0x00]
        );
    }

    #[test]
    fn nested_sequence() {
        let bytes = encoded(|b| {
            b.push_sequence(|b| {
                b.push_null();
                b.push_oid(&oid!(1, 3, 6, 1));
            })
        });
        // Content is pushed in reverse, so the OID lands before NULL.
        assert_eq!(
            bytes,
            [0x30, 0x07, 0x06, 0x03, 0x2B, 0x06, 0x01, 0x05, 0x00]
        );
    }
}
