use serde::{Deserialize, Serialize};

use super::{FromRecord, HealthState, Record};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cpu {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load: Option<f64>,
}

impl FromRecord for Cpu {
    fn from_record(r: &Record) -> Self {
        Self {
            label: r.string("label"),
            load: r.float("load"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryPool {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<f64>,
}

impl FromRecord for MemoryPool {
    fn from_record(r: &Record) -> Self {
        Self {
            label: r.string("label"),
            usage: r.float("usage"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpsComponent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alarm_low_voltage_disconnect: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_amperage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_capacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_current: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_remaining_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_voltage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_load: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mains_voltage_applied: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rectifier_current: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_voltage: Option<f64>,
}

impl UpsComponent {
    pub const FIELDS: [&'static str; 11] = [
        "alarm_low_voltage_disconnect",
        "battery_amperage",
        "battery_capacity",
        "battery_current",
        "battery_remaining_time",
        "battery_temperature",
        "battery_voltage",
        "current_load",
        "mains_voltage_applied",
        "rectifier_current",
        "system_voltage",
    ];
}

impl FromRecord for UpsComponent {
    fn from_record(r: &Record) -> Self {
        Self {
            alarm_low_voltage_disconnect: r.int("alarm_low_voltage_disconnect"),
            battery_amperage: r.float("battery_amperage"),
            battery_capacity: r.float("battery_capacity"),
            battery_current: r.float("battery_current"),
            battery_remaining_time: r.float("battery_remaining_time"),
            battery_temperature: r.float("battery_temperature"),
            battery_voltage: r.float("battery_voltage"),
            current_load: r.float("current_load"),
            mains_voltage_applied: r.int("mains_voltage_applied").map(|v| v != 0),
            rectifier_current: r.float("rectifier_current"),
            system_voltage: r.float("system_voltage"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Storage {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available: Option<u64>,
    /// Bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used: Option<u64>,
}

impl Storage {
    pub fn used_percent(&self) -> Option<f64> {
        match (self.used, self.available) {
            (Some(used), Some(available)) if available > 0 => {
                Some(used as f64 / available as f64 * 100.0)
            }
            _ => None,
        }
    }
}

impl FromRecord for Storage {
    /// HOST-RESOURCES reports sizes in allocation units, so `size` and
    /// `used` are scaled by `allocation_units` when present.
    fn from_record(r: &Record) -> Self {
        let unit = r.uint("allocation_units").unwrap_or(1);
        let scale = |v: Option<u64>| v.map(|v| v.saturating_mul(unit));
        Self {
            kind: r.string("type"),
            description: r.string("description"),
            available: scale(r.uint("available")),
            used: scale(r.uint("used")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerComponent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub procs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<u64>,
}

impl ServerComponent {
    pub const FIELDS: [&'static str; 2] = ["procs", "users"];
}

impl FromRecord for ServerComponent {
    fn from_record(r: &Record) -> Self {
        Self {
            procs: r.uint("procs"),
            users: r.uint("users"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SbcAgent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_active_sessions_inbound: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_session_rate_inbound: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_active_sessions_outbound: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_session_rate_outbound: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_asr: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<i64>,
}

impl FromRecord for SbcAgent {
    fn from_record(r: &Record) -> Self {
        Self {
            hostname: r.string("hostname"),
            current_active_sessions_inbound: r.int("current_active_sessions_inbound"),
            current_session_rate_inbound: r.int("current_session_rate_inbound"),
            current_active_sessions_outbound: r.int("current_active_sessions_outbound"),
            current_session_rate_outbound: r.int("current_session_rate_outbound"),
            period_asr: r.int("period_asr"),
            status: r.int("status"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SbcRealm {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_active_sessions_inbound: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_session_rate_inbound: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_active_sessions_outbound: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_session_rate_outbound: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_asr: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_local_contacts: Option<i64>,
}

impl FromRecord for SbcRealm {
    fn from_record(r: &Record) -> Self {
        Self {
            name: r.string("name"),
            current_active_sessions_inbound: r.int("current_active_sessions_inbound"),
            current_session_rate_inbound: r.int("current_session_rate_inbound"),
            current_active_sessions_outbound: r.int("current_active_sessions_outbound"),
            current_session_rate_outbound: r.int("current_session_rate_outbound"),
            period_asr: r.int("period_asr"),
            active_local_contacts: r.int("active_local_contacts"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SbcComponent {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub agents: Vec<SbcAgent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub realms: Vec<SbcRealm>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_call_per_second: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_concurrent_sessions: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_local_contacts: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcoding_capacity: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_capacity: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_redundancy: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_health_score: Option<i64>,
}

impl SbcComponent {
    pub const FIELDS: [&'static str; 7] = [
        "global_call_per_second",
        "global_concurrent_sessions",
        "active_local_contacts",
        "transcoding_capacity",
        "license_capacity",
        "system_redundancy",
        "system_health_score",
    ];
}

impl FromRecord for SbcComponent {
    fn from_record(r: &Record) -> Self {
        Self {
            global_call_per_second: r.int("global_call_per_second"),
            global_concurrent_sessions: r.int("global_concurrent_sessions"),
            active_local_contacts: r.int("active_local_contacts"),
            transcoding_capacity: r.int("transcoding_capacity"),
            license_capacity: r.int("license_capacity"),
            system_redundancy: r.int("system_redundancy"),
            system_health_score: r.int("system_health_score"),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fan {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<HealthState>,
}

impl FromRecord for Fan {
    fn from_record(r: &Record) -> Self {
        Self {
            description: r.string("description"),
            state: r.health("state"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PowerSupply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<HealthState>,
}

impl FromRecord for PowerSupply {
    fn from_record(r: &Record) -> Self {
        Self {
            description: r.string("description"),
            state: r.health("state"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Temperature {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Degrees Celsius.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<HealthState>,
}

impl FromRecord for Temperature {
    fn from_record(r: &Record) -> Self {
        Self {
            description: r.string("description"),
            temperature: r.float("temperature"),
            state: r.health("state"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Voltage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voltage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<HealthState>,
}

impl FromRecord for Voltage {
    fn from_record(r: &Record) -> Self {
        Self {
            description: r.string("description"),
            voltage: r.float("voltage"),
            state: r.health("state"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HardwareHealthComponent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_monitor_state: Option<HealthState>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fans: Vec<Fan>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub power_supply: Vec<PowerSupply>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub temperature: Vec<Temperature>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub voltage: Vec<Voltage>,
}

impl HardwareHealthComponent {
    /// Worst sensor state across the component.
    pub fn worst_state(&self) -> Option<HealthState> {
        let states = self
            .environment_monitor_state
            .into_iter()
            .chain(self.fans.iter().filter_map(|f| f.state))
            .chain(self.power_supply.iter().filter_map(|p| p.state))
            .chain(self.temperature.iter().filter_map(|t| t.state))
            .chain(self.voltage.iter().filter_map(|v| v.state));
        states.max_by_key(|s| severity(*s))
    }
}

fn severity(state: HealthState) -> u8 {
    match state {
        HealthState::Normal | HealthState::Initial | HealthState::NotPresent => 0,
        HealthState::Unknown => 1,
        HealthState::Warning => 2,
        HealthState::Critical | HealthState::Shutdown | HealthState::NotFunctioning => 3,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HighAvailabilityComponent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<u64>,
}

impl HighAvailabilityComponent {
    pub const FIELDS: [&'static str; 3] = ["state", "role", "nodes"];
}

impl FromRecord for HighAvailabilityComponent {
    fn from_record(r: &Record) -> Self {
        Self {
            state: r.string("state"),
            role: r.string("role"),
            nodes: r.uint("nodes"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZfsPool {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<String>,
}

impl FromRecord for ZfsPool {
    fn from_record(r: &Record) -> Self {
        Self {
            name: r.string("name"),
            state: r.string("state"),
            health: r.string("health"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiemComponent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_recorded_messages_per_second: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_recorded_messages_per_second: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_processed_messages_per_second: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_processed_messages_per_second: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_version: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub zfs_pools: Vec<ZfsPool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_scales_allocation_units() {
        let mut r = Record::new();
        r.insert("description", "/");
        r.insert("allocation_units", 4096u64);
        r.insert("available", 1000u64);
        r.insert("used", 250u64);
        let s = Storage::from_record(&r);
        assert_eq!(s.available, Some(4_096_000));
        assert_eq!(s.used_percent(), Some(25.0));
    }

    #[test]
    fn worst_state_ranks_critical_over_warning() {
        let hw = HardwareHealthComponent {
            environment_monitor_state: Some(HealthState::Normal),
            fans: vec![Fan {
                description: Some("fan1".into()),
                state: Some(HealthState::Warning),
            }],
            temperature: vec![Temperature {
                state: Some(HealthState::Critical),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert_eq!(hw.worst_state(), Some(HealthState::Critical));
    }

    #[test]
    fn ups_mains_flag_from_integer() {
        let mut r = Record::new();
        r.insert("mains_voltage_applied", 1i64);
        r.insert("battery_capacity", "87");
        let ups = UpsComponent::from_record(&r);
        assert_eq!(ups.mains_voltage_applied, Some(true));
        assert_eq!(ups.battery_capacity, Some(87.0));
    }
}
