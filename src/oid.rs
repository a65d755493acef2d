//! Object Identifier (OID) type.
//!
//! OIDs are stored as `SmallVec<[u32; 16]>` so the common case needs no heap
//! allocation. They render with a leading dot (`.1.3.6.1.2.1.1.1.0`), the
//! form used throughout the device class files, and parse with or without it.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smallvec::SmallVec;

use crate::error::internal::DecodeErrorKind;
use crate::error::{Error, Result, UNKNOWN_TARGET};

/// RFC 2578 Section 3.5: at most 128 sub-identifiers in a value.
pub const MAX_OID_LEN: usize = 128;

/// Object Identifier.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Oid {
    arcs: SmallVec<[u32; 16]>,
}

impl Oid {
    /// Create an empty OID.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(arcs: impl IntoIterator<Item = u32>) -> Self {
        Self {
            arcs: arcs.into_iter().collect(),
        }
    }

    pub fn from_slice(arcs: &[u32]) -> Self {
        Self {
            arcs: SmallVec::from_slice(arcs),
        }
    }

    /// Returns true if `s` consists only of digits and dots.
    ///
    /// ```
    /// use async_devmon::Oid;
    ///
    /// assert!(Oid::validate(".1.3.6.1.2.1.1.2.0"));
    /// assert!(!Oid::validate("1.3.6.x"));
    /// ```
    pub fn validate(s: &str) -> bool {
        !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit() || b == b'.')
    }

    /// Parse dotted notation, with or without a leading dot.
    ///
    /// ```
    /// use async_devmon::{Oid, oid};
    ///
    /// assert_eq!(Oid::parse(".1.3.6.1").unwrap(), oid!(1, 3, 6, 1));
    /// assert_eq!(Oid::parse("1.3.6.1").unwrap(), oid!(1, 3, 6, 1));
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Self::empty());
        }
        if !Self::validate(s) {
            return Err(Error::InvalidOid(s.into()).boxed());
        }
        let mut arcs = SmallVec::new();
        for part in s.split('.').filter(|p| !p.is_empty()) {
            let arc: u32 = part
                .parse()
                .map_err(|_| Error::InvalidOid(s.into()).boxed())?;
            arcs.push(arc);
        }
        Ok(Self { arcs })
    }

    pub fn arcs(&self) -> &[u32] {
        &self.arcs
    }

    pub fn len(&self) -> usize {
        self.arcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arcs.is_empty()
    }

    /// True if `prefix` is a (non-strict) prefix of this OID.
    pub fn starts_with(&self, prefix: &Oid) -> bool {
        self.arcs.starts_with(&prefix.arcs)
    }

    /// The arcs after `prefix`, or `None` if this OID is not below it.
    pub fn strip_prefix(&self, prefix: &Oid) -> Option<&[u32]> {
        self.arcs.strip_prefix(prefix.arcs.as_slice())
    }

    pub fn parent(&self) -> Option<Oid> {
        if self.arcs.is_empty() {
            return None;
        }
        Some(Self::from_slice(&self.arcs[..self.arcs.len() - 1]))
    }

    pub fn child(&self, arc: u32) -> Oid {
        let mut arcs = self.arcs.clone();
        arcs.push(arc);
        Self { arcs }
    }

    /// The last arc, rendered as a string.
    pub fn get_index(&self) -> Option<String> {
        self.arcs.last().map(|a| a.to_string())
    }

    /// Append every arc of `suffix`.
    pub fn add_suffix(&self, suffix: &[u32]) -> Oid {
        let mut arcs = self.arcs.clone();
        arcs.extend_from_slice(suffix);
        Self { arcs }
    }

    /// Append a dotted index string such as `"3"`, `".3"` or `"1.4.2"`.
    ///
    /// ```
    /// use async_devmon::oid;
    ///
    /// let base = oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2);
    /// assert_eq!(base.add_index(".7").unwrap().to_string(), ".1.3.6.1.2.1.2.2.1.2.7");
    /// ```
    pub fn add_index(&self, index: &str) -> Result<Oid> {
        let suffix = Oid::parse(index)?;
        Ok(self.add_suffix(suffix.arcs()))
    }

    /// Returns an error if the first two arcs break X.690 Section 8.19.4.
    pub fn check_arcs(&self) -> Result<()> {
        match self.arcs.as_slice() {
            [] => Ok(()),
            [first, ..] if *first > 2 => Err(Error::InvalidOid(self.to_string().into()).boxed()),
            [first, second, ..] if *first < 2 && *second >= 40 => {
                Err(Error::InvalidOid(self.to_string().into()).boxed())
            }
            _ if self.arcs.len() > MAX_OID_LEN => {
                Err(Error::InvalidOid(self.to_string().into()).boxed())
            }
            _ => Ok(()),
        }
    }

    /// Encode the content octets of an OBJECT IDENTIFIER.
    pub fn to_ber(&self) -> SmallVec<[u8; 64]> {
        let mut out = SmallVec::new();
        let (first, rest) = match self.arcs.as_slice() {
            [] => return out,
            [a] => (*a * 40, &[][..]),
            [a, b, rest @ ..] => (*a * 40 + *b, rest),
        };
        push_subidentifier(&mut out, first);
        for &arc in rest {
            push_subidentifier(&mut out, arc);
        }
        out
    }

    /// Decode the content octets of an OBJECT IDENTIFIER.
    pub fn from_ber(data: &[u8]) -> Result<Self> {
        let mut arcs: SmallVec<[u32; 16]> = SmallVec::new();
        let mut pos = 0;
        while pos < data.len() {
            let (value, used) = read_subidentifier(&data[pos..]).ok_or_else(|| {
                tracing::debug!(target: "async_devmon::ber", { snmp.offset = pos, kind = %DecodeErrorKind::InvalidOidEncoding }, "bad OID subidentifier");
                Error::MalformedResponse {
                    target: UNKNOWN_TARGET,
                }
                .boxed()
            })?;
            if arcs.is_empty() {
                let (a, b) = match value {
                    0..40 => (0, value),
                    40..80 => (1, value - 40),
                    _ => (2, value - 80),
                };
                arcs.push(a);
                arcs.push(b);
            } else {
                arcs.push(value);
            }
            pos += used;
            if arcs.len() > MAX_OID_LEN {
                tracing::debug!(target: "async_devmon::ber", { snmp.offset = pos, kind = %DecodeErrorKind::InvalidOidEncoding }, "OID exceeds 128 arcs");
                return Err(Error::MalformedResponse {
                    target: UNKNOWN_TARGET,
                }
                .boxed());
            }
        }
        Ok(Self { arcs })
    }
}

fn push_subidentifier(out: &mut SmallVec<[u8; 64]>, value: u32) {
    let groups = (32 - value.leading_zeros()).div_ceil(7).max(1);
    for i in (0..groups).rev() {
        let mut byte = ((value >> (i * 7)) & 0x7F) as u8;
        if i > 0 {
            byte |= 0x80;
        }
        out.push(byte);
    }
}

fn read_subidentifier(data: &[u8]) -> Option<(u32, usize)> {
    let mut value: u32 = 0;
    for (i, &byte) in data.iter().enumerate() {
        if value > (u32::MAX >> 7) {
            return None;
        }
        value = (value << 7) | u32::from(byte & 0x7F);
        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }
    None
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", self)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for arc in &self.arcs {
            write!(f, ".{}", arc)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for Oid {
    type Err = Box<Error>;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<&[u32]> for Oid {
    fn from(arcs: &[u32]) -> Self {
        Self::from_slice(arcs)
    }
}

impl<const N: usize> From<[u32; N]> for Oid {
    fn from(arcs: [u32; N]) -> Self {
        Self::new(arcs)
    }
}

impl PartialOrd for Oid {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Numeric, arc-by-arc ordering (`.1.3.6.1.10` sorts after `.1.3.6.1.9`).
impl Ord for Oid {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.arcs.cmp(&other.arcs)
    }
}

impl Serialize for Oid {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Oid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Oid::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Build an OID from literal arcs.
///
/// ```
/// use async_devmon::oid;
///
/// let sys_descr = oid!(1, 3, 6, 1, 2, 1, 1, 1, 0);
/// assert_eq!(sys_descr.to_string(), ".1.3.6.1.2.1.1.1.0");
/// ```
#[macro_export]
macro_rules! oid {
    ($($arc:expr),* $(,)?) => {
        $crate::oid::Oid::from_slice(&[$($arc),*])
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_leading_dot() {
        let a = Oid::parse(".1.3.6.1.2.1.1.1.0").unwrap();
        let b = Oid::parse("1.3.6.1.2.1.1.1.0").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.arcs(), &[1, 3, 6, 1, 2, 1, 1, 1, 0]);
    }

    #[test]
    fn parse_rejects_non_digits() {
        assert!(Oid::parse("1.3.six.1").is_err());
        assert!(Oid::parse("1.3.6.1 ").is_ok());
        assert!(!Oid::validate(""));
    }

    #[test]
    fn index_helpers() {
        let col = oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2);
        let cell = col.add_index("12").unwrap();
        assert_eq!(cell.get_index().as_deref(), Some("12"));
        assert_eq!(cell.strip_prefix(&col), Some(&[12u32][..]));
        assert_eq!(col.add_suffix(&[1, 4]).to_string(), ".1.3.6.1.2.1.2.2.1.2.1.4");
    }

    #[test]
    fn ordering_is_numeric() {
        let a = Oid::parse("1.3.6.1.9").unwrap();
        let b = Oid::parse("1.3.6.1.10").unwrap();
        assert!(a < b);
        assert!(b.starts_with(&oid!(1, 3, 6, 1)));
    }

    #[test]
    fn ber_encoding() {
        assert_eq!(oid!(1, 3, 6, 1).to_ber().as_slice(), &[0x2B, 0x06, 0x01]);
        assert_eq!(oid!(0, 0).to_ber().as_slice(), &[0x00]);
        let big = oid!(1, 3, 6, 1, 4, 1, 2281, 10, 1);
        assert_eq!(Oid::from_ber(&big.to_ber()).unwrap(), big);
    }

    #[test]
    fn from_ber_rejects_truncated_subidentifier() {
        assert!(Oid::from_ber(&[0x2B, 0x86]).is_err());
    }

    #[test]
    fn serde_uses_dotted_string() {
        let oid = oid!(1, 3, 6, 1, 4, 1, 9);
        let json = serde_json::to_string(&oid).unwrap();
        assert_eq!(json, "\".1.3.6.1.4.1.9\"");
        let back: Oid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, oid);
    }
}
