//! Result records produced by communicators.
//!
//! Every field is optional: a device that does not answer a property simply
//! leaves it out, and serialisation skips absent fields so that a missing
//! value is distinguishable from zero.

mod components;
mod interface;
mod record;

pub use components::{
    Cpu, Fan, HardwareHealthComponent, HighAvailabilityComponent, MemoryPool, PowerSupply,
    SbcAgent, SbcComponent, SbcRealm, ServerComponent, SiemComponent, Storage, Temperature,
    UpsComponent, Voltage, ZfsPool,
};
pub use interface::{
    Dwdm, EthernetLike, Interface, OpticalAmplifier, OpticalChannel, OpticalOpm,
    OpticalTransponder, Radio, Rate, Sap, Vlan, VlanEntry, dedupe_descriptions,
};
pub use record::{FromRecord, Record};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Interface administrative or operational status (IF-MIB ifOperStatus).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Up,
    Down,
    Testing,
    Unknown,
    Dormant,
    NotPresent,
    LowerLayerDown,
}

const STATUS_NAMES: [(Status, &str); 7] = [
    (Status::Up, "up"),
    (Status::Down, "down"),
    (Status::Testing, "testing"),
    (Status::Unknown, "unknown"),
    (Status::Dormant, "dormant"),
    (Status::NotPresent, "notPresent"),
    (Status::LowerLayerDown, "lowerLayerDown"),
];

impl Status {
    /// IF-MIB code, 1 through 7.
    pub fn to_code(self) -> i64 {
        STATUS_NAMES
            .iter()
            .position(|(s, _)| *s == self)
            .map(|p| p as i64 + 1)
            .unwrap_or(4)
    }

    pub fn from_code(code: i64) -> Option<Self> {
        usize::try_from(code - 1)
            .ok()
            .and_then(|idx| STATUS_NAMES.get(idx))
            .map(|(s, _)| *s)
    }

    pub fn as_str(self) -> &'static str {
        STATUS_NAMES
            .iter()
            .find(|(s, _)| *s == self)
            .map(|(_, n)| *n)
            .unwrap_or("unknown")
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = Box<Error>;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(code) = s.parse::<i64>() {
            return Status::from_code(code)
                .ok_or_else(|| Error::decode(format!("invalid status code {code}")));
        }
        STATUS_NAMES
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(s))
            .map(|(st, _)| *st)
            .ok_or_else(|| Error::decode(format!("invalid status '{s}'")))
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// State of a hardware-health sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HealthState {
    Initial,
    Normal,
    Warning,
    Critical,
    Shutdown,
    NotPresent,
    NotFunctioning,
    Unknown,
}

const HEALTH_NAMES: [(HealthState, &str); 8] = [
    (HealthState::Initial, "initial"),
    (HealthState::Normal, "normal"),
    (HealthState::Warning, "warning"),
    (HealthState::Critical, "critical"),
    (HealthState::Shutdown, "shutdown"),
    (HealthState::NotPresent, "not_present"),
    (HealthState::NotFunctioning, "not_functioning"),
    (HealthState::Unknown, "unknown"),
];

impl HealthState {
    /// Code 0 through 7.
    pub fn to_code(self) -> i64 {
        HEALTH_NAMES
            .iter()
            .position(|(s, _)| *s == self)
            .map(|p| p as i64)
            .unwrap_or(7)
    }

    pub fn from_code(code: i64) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|idx| HEALTH_NAMES.get(idx))
            .map(|(s, _)| *s)
    }

    pub fn as_str(self) -> &'static str {
        HEALTH_NAMES
            .iter()
            .find(|(s, _)| *s == self)
            .map(|(_, n)| *n)
            .unwrap_or("unknown")
    }

    /// Warning or worse.
    pub fn is_degraded(self) -> bool {
        matches!(
            self,
            Self::Warning | Self::Critical | Self::Shutdown | Self::NotFunctioning
        )
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HealthState {
    type Err = Box<Error>;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(code) = s.parse::<i64>() {
            return HealthState::from_code(code)
                .ok_or_else(|| Error::decode(format!("invalid health state code {code}")));
        }
        let normalized = s.to_ascii_lowercase().replace([' ', '-'], "_");
        HEALTH_NAMES
            .iter()
            .find(|(_, n)| *n == normalized)
            .map(|(st, _)| *st)
            .ok_or_else(|| Error::decode(format!("invalid health state '{s}'")))
    }
}

impl Serialize for HealthState {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for HealthState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Identity of a device as reported by `identify`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentifyProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_series: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_round_trip() {
        for (status, _) in STATUS_NAMES {
            assert_eq!(Status::from_code(status.to_code()), Some(status));
        }
        assert_eq!(Status::from_code(0), None);
        assert_eq!(Status::from_code(8), None);
        assert_eq!("lowerLayerDown".parse::<Status>().unwrap(), Status::LowerLayerDown);
        assert_eq!("2".parse::<Status>().unwrap(), Status::Down);
    }

    #[test]
    fn health_codes_round_trip() {
        for (state, _) in HEALTH_NAMES {
            assert_eq!(HealthState::from_code(state.to_code()), Some(state));
        }
        assert_eq!("Not Functioning".parse::<HealthState>().unwrap(), HealthState::NotFunctioning);
        assert!(HealthState::Critical.is_degraded());
        assert!(!HealthState::Normal.is_degraded());
    }

    #[test]
    fn absent_identity_fields_are_omitted() {
        let props = IdentifyProperties {
            vendor: Some("Ceragon".into()),
            ..Default::default()
        };
        let json = serde_json::to_string(&props).unwrap();
        assert_eq!(json, r#"{"vendor":"Ceragon"}"#);
        let back: IdentifyProperties = serde_json::from_str(&json).unwrap();
        assert_eq!(back, props);
    }
}
