//! SNMP protocol version.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Protocol version. Ordered by preference: `V3 > V2c > V1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Version {
    V1,
    V2c,
    V3,
}

impl Version {
    /// Wire value of the `msgVersion` field.
    pub fn as_i32(self) -> i32 {
        match self {
            Version::V1 => 0,
            Version::V2c => 1,
            Version::V3 => 3,
        }
    }

    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Version::V1),
            1 => Some(Version::V2c),
            3 => Some(Version::V3),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Version::V1 => "1",
            Version::V2c => "2c",
            Version::V3 => "3",
        }
    }

    pub fn is_community(self) -> bool {
        !matches!(self, Version::V3)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Version {
    type Err = Box<Error>;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "v1" => Ok(Version::V1),
            "2c" | "v2c" | "2" => Ok(Version::V2c),
            "3" | "v3" => Ok(Version::V3),
            other => Err(Error::pre_condition(format!(
                "invalid SNMP version '{}', expected one of 1, 2c, 3",
                other
            ))),
        }
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preference_order() {
        let mut v = vec![Version::V1, Version::V3, Version::V2c];
        v.sort();
        assert_eq!(v.last(), Some(&Version::V3));
        assert!(Version::V2c > Version::V1);
    }

    #[test]
    fn parses_user_spellings() {
        assert_eq!("2c".parse::<Version>().unwrap(), Version::V2c);
        assert_eq!("v1".parse::<Version>().unwrap(), Version::V1);
        assert!("4".parse::<Version>().is_err());
    }
}
