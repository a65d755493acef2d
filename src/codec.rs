//! Typed access to raw SNMP and HTTP results.
//!
//! Device agents answer with whatever encoding they like: ISO-8859-1
//! strings padded with NUL bytes, MAC addresses as raw octets, numbers
//! carried as text. [`RawValue`] wraps one such result and offers the
//! conversions recipes and record builders need.

use std::fmt;

use crate::error::{Error, Result};
use crate::util::encode_hex_upper;
use crate::value::Value;

/// A dynamically typed result value.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Snmp(Value),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
}

impl RawValue {
    /// Whether the value carries data. SNMP exceptions and NULL do not.
    pub fn is_successful(&self) -> bool {
        match self {
            RawValue::Snmp(v) => v.is_successful(),
            _ => true,
        }
    }

    /// Decoded string: octet strings are read as ISO-8859-1 and every
    /// non-graphic character is dropped.
    pub fn as_string(&self) -> String {
        match self {
            RawValue::Snmp(Value::OctetString(bytes)) | RawValue::Snmp(Value::Opaque(bytes)) => {
                latin1_graphic(bytes)
            }
            RawValue::Snmp(v) => snmp_text(v),
            RawValue::Text(s) => s.chars().filter(|c| is_graphic(*c)).collect(),
            RawValue::Int(i) => i.to_string(),
            RawValue::UInt(u) => u.to_string(),
            RawValue::Float(f) => f.to_string(),
        }
    }

    /// Undecoded string: octet strings become upper-case hex, everything
    /// else its plain textual form.
    pub fn as_raw_string(&self) -> String {
        match self {
            RawValue::Snmp(Value::OctetString(bytes)) | RawValue::Snmp(Value::Opaque(bytes)) => {
                encode_hex_upper(bytes)
            }
            RawValue::Snmp(v) => snmp_text(v),
            RawValue::Text(s) => s.clone(),
            other => other.as_string(),
        }
    }

    /// [`as_raw_string`](Self::as_raw_string) when `raw` is set, otherwise
    /// [`as_string`](Self::as_string).
    pub fn to_text(&self, raw: bool) -> String {
        if raw {
            self.as_raw_string()
        } else {
            self.as_string()
        }
    }

    pub fn as_int(&self) -> Result<i64> {
        match self {
            RawValue::Int(i) => Ok(*i),
            RawValue::UInt(u) => i64::try_from(*u).map_err(|_| overflow(u)),
            RawValue::Float(f) => float_to_int(*f),
            RawValue::Snmp(v) => match v.as_i64() {
                Some(i) => Ok(i),
                None => parse_text(v, |s| s.parse::<i64>().ok()),
            },
            RawValue::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| Error::decode(format!("'{s}' is not an integer"))),
        }
    }

    pub fn as_uint(&self) -> Result<u64> {
        match self {
            RawValue::UInt(u) => Ok(*u),
            RawValue::Int(i) => u64::try_from(*i).map_err(|_| overflow(i)),
            RawValue::Float(f) => float_to_int(*f)
                .and_then(|i| u64::try_from(i).map_err(|_| overflow(f))),
            RawValue::Snmp(v) => match v.as_u64() {
                Some(u) => Ok(u),
                None => parse_text(v, |s| s.parse::<u64>().ok()),
            },
            RawValue::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| Error::decode(format!("'{s}' is not an unsigned integer"))),
        }
    }

    pub fn as_float(&self) -> Result<f64> {
        match self {
            RawValue::Float(f) => Ok(*f),
            RawValue::Int(i) => Ok(*i as f64),
            RawValue::UInt(u) => Ok(*u as f64),
            RawValue::Snmp(v) => match v.as_i64() {
                Some(i) => Ok(i as f64),
                None => match v.as_u64() {
                    Some(u) => Ok(u as f64),
                    None => parse_text(v, |s| s.parse::<f64>().ok()),
                },
            },
            RawValue::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| Error::decode(format!("'{s}' is not a number"))),
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

impl From<Value> for RawValue {
    fn from(v: Value) -> Self {
        RawValue::Snmp(v)
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::Text(s)
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_owned())
    }
}

impl From<i64> for RawValue {
    fn from(i: i64) -> Self {
        RawValue::Int(i)
    }
}

impl From<u64> for RawValue {
    fn from(u: u64) -> Self {
        RawValue::UInt(u)
    }
}

impl From<f64> for RawValue {
    fn from(f: f64) -> Self {
        RawValue::Float(f)
    }
}

fn is_graphic(c: char) -> bool {
    !c.is_control() && c != '\u{FFFD}'
}

fn latin1_graphic(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| char::from(b))
        .filter(|c| is_graphic(*c))
        .collect()
}

fn snmp_text(v: &Value) -> String {
    match v {
        Value::OctetString(b) | Value::Opaque(b) => latin1_graphic(b),
        Value::Null | Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView => {
            String::new()
        }
        other => other.to_string(),
    }
}

fn parse_text<T>(v: &Value, parse: impl Fn(&str) -> Option<T>) -> Result<T> {
    let text = snmp_text(v);
    parse(text.trim()).ok_or_else(|| Error::decode(format!("'{text}' is not numeric")))
}

fn float_to_int(f: f64) -> Result<i64> {
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Ok(f as i64)
    } else {
        Err(Error::decode(format!("{f} is not integral")))
    }
}

fn overflow(v: impl fmt::Display) -> Box<Error> {
    Error::decode(format!("{v} is out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;
    use bytes::Bytes;
    use proptest::prelude::*;

    #[test]
    fn latin1_strings_lose_control_characters() {
        let v = RawValue::Snmp(Value::OctetString(Bytes::from_static(b"Caf\xe9\0\r\n")));
        assert_eq!(v.as_string(), "Café");
    }

    #[test]
    fn raw_string_is_upper_hex() {
        let mac = RawValue::Snmp(Value::OctetString(Bytes::from_static(&[
            0x00, 0x1b, 0x21, 0xaa, 0xbb, 0xcc,
        ])));
        assert_eq!(mac.as_raw_string(), "001B21AABBCC");
        assert_eq!(mac.to_text(false), "!\u{aa}\u{bb}\u{cc}");
    }

    #[test]
    fn oids_and_addresses_render_as_text() {
        let oid = RawValue::Snmp(Value::ObjectIdentifier(oid!(1, 3, 6, 1, 4, 1, 9)));
        assert_eq!(oid.as_string(), ".1.3.6.1.4.1.9");
        let ip = RawValue::Snmp(Value::IpAddress([10, 0, 0, 1]));
        assert_eq!(ip.as_raw_string(), "10.0.0.1");
    }

    #[test]
    fn numbers_parse_from_padded_text() {
        assert_eq!(RawValue::from(" 42 ").as_int().unwrap(), 42);
        let v = RawValue::Snmp(Value::OctetString(Bytes::from_static(b"17.5\n")));
        assert_eq!(v.as_float().unwrap(), 17.5);
        assert!(RawValue::from("n/a").as_uint().is_err());
    }

    #[test]
    fn counters_convert_without_loss() {
        let v = RawValue::Snmp(Value::Counter64(5_000_000_000));
        assert_eq!(v.as_uint().unwrap(), 5_000_000_000);
        assert!(RawValue::Int(-1).as_uint().is_err());
    }

    #[test]
    fn exceptions_are_unsuccessful() {
        assert!(!RawValue::Snmp(Value::NoSuchInstance).is_successful());
        assert!(!RawValue::Snmp(Value::Null).is_successful());
        assert!(RawValue::from("x").is_successful());
    }

    proptest! {
        #[test]
        fn integers_survive_text_round_trip(n in any::<i64>()) {
            prop_assert_eq!(RawValue::from(n.to_string()).as_int().unwrap(), n);
        }

        #[test]
        fn decoded_strings_contain_no_controls(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
            let s = RawValue::Snmp(Value::OctetString(Bytes::from(bytes))).as_string();
            prop_assert!(s.chars().all(|c| !c.is_control()));
        }
    }
}
