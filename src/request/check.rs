//! Monitoring-plugin style check results.
//!
//! Thresholds use the Nagios range syntax: `10` alerts outside `0..=10`,
//! `10:` below 10, `~:10` above 10, `10:20` outside the interval and
//! `@10:20` inside it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::device::{
    Cpu, HardwareHealthComponent, HealthState, HighAvailabilityComponent, IdentifyProperties,
    Interface, MemoryPool, SbcComponent, ServerComponent, SiemComponent, Storage, UpsComponent,
};
use crate::error::{Error, Result};
use crate::network::IdealConnectionData;

/// Plugin exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckStatus {
    Ok = 0,
    Warning = 1,
    Critical = 2,
    Unknown = 3,
}

impl CheckStatus {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A threshold range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    start: f64,
    end: f64,
    inside: bool,
}

impl Range {
    /// Whether `value` should raise an alert.
    pub fn alerts(&self, value: f64) -> bool {
        let within = value >= self.start && value <= self.end;
        if self.inside { within } else { !within }
    }
}

impl FromStr for Range {
    type Err = Box<Error>;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::pre_condition(format!("invalid threshold range '{s}'"));
        let raw = s.trim();
        let (inside, body) = match raw.strip_prefix('@') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        let number = |t: &str| t.trim().parse::<f64>().map_err(|_| invalid());
        let (start, end) = match body.split_once(':') {
            None => (0.0, number(body)?),
            Some((start, end)) => {
                let start = match start.trim() {
                    "~" => f64::NEG_INFINITY,
                    "" => 0.0,
                    t => number(t)?,
                };
                let end = if end.trim().is_empty() {
                    f64::INFINITY
                } else {
                    number(end)?
                };
                (start, end)
            }
        };
        if start > end {
            return Err(invalid());
        }
        Ok(Self { start, end, inside })
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.inside {
            f.write_str("@")?;
        }
        match (self.start, self.end) {
            (s, e) if s == 0.0 && e.is_finite() => write!(f, "{e}"),
            (s, e) if e.is_infinite() && s.is_finite() => write!(f, "{s}:"),
            (s, e) if s.is_infinite() => write!(f, "~:{e}"),
            (s, e) => write!(f, "{s}:{e}"),
        }
    }
}

/// Warning and critical ranges as supplied with a request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub critical: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Ranges {
    warning: Option<Range>,
    critical: Option<Range>,
}

impl Thresholds {
    fn compile(&self) -> Result<Ranges> {
        let parse = |s: &Option<String>| s.as_deref().map(str::parse::<Range>).transpose();
        Ok(Ranges {
            warning: parse(&self.warning)?,
            critical: parse(&self.critical)?,
        })
    }
}

impl Ranges {
    fn status(&self, value: f64) -> CheckStatus {
        if self.critical.is_some_and(|r| r.alerts(value)) {
            CheckStatus::Critical
        } else if self.warning.is_some_and(|r| r.alerts(value)) {
            CheckStatus::Warning
        } else {
            CheckStatus::Ok
        }
    }
}

/// One performance-data item: `'label'=value[uom];warn;crit;min;max`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerfData {
    pub label: String,
    pub value: PerfValue,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uom: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl PerfData {
    pub fn new(label: impl Into<String>, value: impl Into<PerfValue>, uom: &str) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            uom: uom.to_owned(),
            warning: None,
            critical: None,
            min: None,
            max: None,
        }
    }

    fn with_ranges(mut self, ranges: &Ranges) -> Self {
        self.warning = ranges.warning.map(|r| r.to_string());
        self.critical = ranges.critical.map(|r| r.to_string());
        self
    }

    fn percent(mut self) -> Self {
        self.min = Some(0.0);
        self.max = Some(100.0);
        self
    }
}

impl fmt::Display for PerfData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        let num = |v: Option<f64>| v.map(|n| n.to_string()).unwrap_or_default();
        write!(
            f,
            "'{}'={}{};{};{};{};{}",
            self.label.replace('\'', "\""),
            self.value,
            self.uom,
            opt(&self.warning),
            opt(&self.critical),
            num(self.min),
            num(self.max),
        )?;
        Ok(())
    }
}

/// A perf-data value. Counters stay integral so 64-bit octet counters
/// print exactly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PerfValue {
    Counter(u64),
    Gauge(f64),
}

impl PerfValue {
    pub fn as_f64(self) -> f64 {
        match self {
            PerfValue::Counter(n) => n as f64,
            PerfValue::Gauge(v) => v,
        }
    }
}

impl From<u64> for PerfValue {
    fn from(n: u64) -> Self {
        PerfValue::Counter(n)
    }
}

impl From<f64> for PerfValue {
    fn from(v: f64) -> Self {
        PerfValue::Gauge(v)
    }
}

impl fmt::Display for PerfValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PerfValue::Counter(n) => write!(f, "{n}"),
            PerfValue::Gauge(v) => write!(f, "{v}"),
        }
    }
}

/// Outcome of a check request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub status: CheckStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub perf_data: Vec<PerfData>,
    /// Extra output lines after the status line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_output: Option<String>,
}

impl CheckResult {
    pub fn new(status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            perf_data: Vec::new(),
            long_output: None,
        }
    }

    /// Any failure becomes UNKNOWN with the error in the status line.
    pub fn unknown(err: &Error) -> Self {
        Self::new(CheckStatus::Unknown, err.to_string())
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.status, self.message)?;
        if !self.perf_data.is_empty() {
            f.write_str(" |")?;
            for p in &self.perf_data {
                write!(f, " {p}")?;
            }
        }
        if let Some(long) = &self.long_output {
            write!(f, "\n{long}")?;
        }
        Ok(())
    }
}

/// Worst status of a sequence, `Ok` when empty.
fn worst(statuses: impl IntoIterator<Item = CheckStatus>) -> CheckStatus {
    statuses.into_iter().max().unwrap_or(CheckStatus::Ok)
}

pub fn identify(got: &IdentifyProperties, expected: &IdentifyProperties) -> CheckResult {
    let fields = [
        ("vendor", &got.vendor, &expected.vendor),
        ("model", &got.model, &expected.model),
        ("model_series", &got.model_series, &expected.model_series),
        ("serial_number", &got.serial_number, &expected.serial_number),
        ("os_version", &got.os_version, &expected.os_version),
    ];
    let mut lines = Vec::new();
    let mut mismatches = 0;
    for (name, got, want) in fields {
        let Some(want) = want else {
            continue;
        };
        let got = got.as_deref().unwrap_or("");
        if got == want {
            lines.push(format!("{name}: {got}"));
        } else {
            mismatches += 1;
            lines.push(format!("{name}: expected '{want}', got '{got}'"));
        }
    }
    let mut result = if mismatches == 0 {
        CheckResult::new(CheckStatus::Ok, "identity matches")
    } else {
        CheckResult::new(
            CheckStatus::Critical,
            format!("{mismatches} identity field(s) differ"),
        )
    };
    result.long_output = (!lines.is_empty()).then(|| lines.join("\n"));
    result
}

pub fn snmp(data: &IdealConnectionData) -> CheckResult {
    match &data.snmp {
        Some(snmp) => CheckResult::new(
            CheckStatus::Ok,
            format!("SNMP v{} answering on port {}", snmp.version, snmp.port),
        ),
        None => CheckResult::new(CheckStatus::Critical, "SNMP is not available"),
    }
}

/// Per-interface counters, status and levels as perf data, optionally
/// with the interface table as CSV.
pub fn interface_metrics(interfaces: &[Interface], print_csv: bool) -> CheckResult {
    let mut result = CheckResult::new(
        CheckStatus::Ok,
        format!("{} interfaces read", interfaces.len()),
    );
    for iface in interfaces {
        let name = iface
            .if_descr
            .clone()
            .or_else(|| iface.if_index.map(|i| i.to_string()))
            .unwrap_or_default();
        let counters = [
            ("traffic_in", iface.traffic_counter_in(), "c"),
            ("traffic_out", iface.traffic_counter_out(), "c"),
            ("packet_counter_unicast_in", iface.packet_counter_unicast_in(), "c"),
            ("packet_counter_unicast_out", iface.packet_counter_unicast_out(), "c"),
            ("packet_counter_multicast_in", iface.packet_counter_multicast_in(), "c"),
            ("packet_counter_multicast_out", iface.packet_counter_multicast_out(), "c"),
            ("packet_counter_broadcast_in", iface.packet_counter_broadcast_in(), "c"),
            ("packet_counter_broadcast_out", iface.packet_counter_broadcast_out(), "c"),
            ("errors_in", iface.if_in_errors, "c"),
            ("errors_out", iface.if_out_errors, "c"),
            ("discards_in", iface.if_in_discards, "c"),
            ("discards_out", iface.if_out_discards, "c"),
            ("speed", iface.if_speed, ""),
        ];
        let statuses = [
            ("oper_status", iface.if_oper_status),
            ("admin_status", iface.if_admin_status),
        ];
        let levels = [
            ("level_in", iface.radio.as_ref().and_then(|r| r.level_in)),
            ("level_out", iface.radio.as_ref().and_then(|r| r.level_out)),
            ("rx_power", iface.dwdm.as_ref().and_then(|d| d.rx_power)),
            ("tx_power", iface.dwdm.as_ref().and_then(|d| d.tx_power)),
        ];
        let perf = &mut result.perf_data;
        for (metric, value, uom) in counters {
            if let Some(v) = value {
                perf.push(PerfData::new(format!("{name}_{metric}"), v, uom));
            }
        }
        for (metric, status) in statuses {
            if let Some(s) = status {
                perf.push(PerfData::new(format!("{name}_{metric}"), s.to_code() as f64, ""));
            }
        }
        for (metric, level) in levels {
            if let Some(v) = level {
                perf.push(PerfData::new(format!("{name}_{metric}"), v, "dBm"));
            }
        }
    }
    if print_csv {
        result.long_output = Some(interfaces_csv(interfaces));
    }
    result
}

const CSV_HEADER: &str =
    "ifIndex,ifDescr,ifOperStatus,ifSpeed,trafficIn,trafficOut,errorsIn,errorsOut";

pub fn interfaces_csv(interfaces: &[Interface]) -> String {
    let mut out = String::from(CSV_HEADER);
    for iface in interfaces {
        let num = |v: Option<u64>| v.map(|n| n.to_string()).unwrap_or_default();
        let cells = [
            num(iface.if_index),
            csv_cell(iface.if_descr.as_deref().unwrap_or("")),
            iface
                .if_oper_status
                .map(|s| s.as_str().to_owned())
                .unwrap_or_default(),
            num(iface.if_speed),
            num(iface.traffic_counter_in()),
            num(iface.traffic_counter_out()),
            num(iface.if_in_errors),
            num(iface.if_out_errors),
        ];
        out.push('\n');
        out.push_str(&cells.join(","));
    }
    out
}

fn csv_cell(s: &str) -> String {
    if s.contains([',', '"', '\n']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_owned()
    }
}

fn labelled<'a>(label: Option<&'a str>, fallback: &'a str, i: usize) -> String {
    match label {
        Some(l) if !l.is_empty() => l.to_owned(),
        _ => format!("{fallback}{i}"),
    }
}

/// Shared shape of the percentage checks.
fn percentages(
    what: &str,
    items: impl IntoIterator<Item = (String, Option<f64>)>,
    thresholds: &Thresholds,
) -> Result<CheckResult> {
    let ranges = thresholds.compile()?;
    let mut perf = Vec::new();
    let mut statuses = Vec::new();
    let mut parts = Vec::new();
    for (label, value) in items {
        let Some(value) = value else {
            continue;
        };
        statuses.push(ranges.status(value));
        parts.push(format!("{label} {value:.1}%"));
        perf.push(PerfData::new(label, value, "%").with_ranges(&ranges).percent());
    }
    if perf.is_empty() {
        return Ok(CheckResult::new(CheckStatus::Unknown, format!("no {what} values")));
    }
    let mut result = CheckResult::new(worst(statuses), format!("{what}: {}", parts.join(", ")));
    result.perf_data = perf;
    Ok(result)
}

pub fn cpu_load(cpus: &[Cpu], thresholds: &Thresholds) -> Result<CheckResult> {
    percentages(
        "cpu load",
        cpus.iter()
            .enumerate()
            .map(|(i, c)| (labelled(c.label.as_deref(), "cpu", i), c.load)),
        thresholds,
    )
}

pub fn memory_usage(pools: &[MemoryPool], thresholds: &Thresholds) -> Result<CheckResult> {
    percentages(
        "memory usage",
        pools
            .iter()
            .enumerate()
            .map(|(i, m)| (labelled(m.label.as_deref(), "memory", i), m.usage)),
        thresholds,
    )
}

pub fn disk(storages: &[Storage], thresholds: &Thresholds) -> Result<CheckResult> {
    percentages(
        "disk usage",
        storages.iter().enumerate().map(|(i, s)| {
            (labelled(s.description.as_deref(), "disk", i), s.used_percent())
        }),
        thresholds,
    )
}

/// Thresholds apply to the battery capacity; lost mains or a low-voltage
/// disconnect is always critical.
pub fn ups(ups: &UpsComponent, thresholds: &Thresholds) -> Result<CheckResult> {
    let ranges = thresholds.compile()?;
    let mut statuses = Vec::new();
    let mut parts = Vec::new();
    let mut result = CheckResult::new(CheckStatus::Ok, String::new());

    if ups.mains_voltage_applied == Some(false) {
        statuses.push(CheckStatus::Critical);
        parts.push("mains voltage lost".to_owned());
    }
    if ups.alarm_low_voltage_disconnect.is_some_and(|a| a != 0) {
        statuses.push(CheckStatus::Critical);
        parts.push("low voltage disconnect".to_owned());
    }
    if let Some(capacity) = ups.battery_capacity {
        statuses.push(ranges.status(capacity));
        parts.push(format!("battery capacity {capacity:.0}%"));
        result
            .perf_data
            .push(PerfData::new("battery_capacity", capacity, "%").with_ranges(&ranges).percent());
    }
    let extra = [
        ("battery_voltage", ups.battery_voltage, "V"),
        ("battery_current", ups.battery_current, "A"),
        ("battery_temperature", ups.battery_temperature, ""),
        ("current_load", ups.current_load, ""),
        ("system_voltage", ups.system_voltage, "V"),
    ];
    for (label, value, uom) in extra {
        if let Some(v) = value {
            result.perf_data.push(PerfData::new(label, v, uom));
        }
    }
    if parts.is_empty() && result.perf_data.is_empty() {
        return Ok(CheckResult::new(CheckStatus::Unknown, "no UPS values"));
    }
    result.status = worst(statuses);
    result.message = if parts.is_empty() {
        "UPS values read".to_owned()
    } else {
        parts.join(", ")
    };
    Ok(result)
}

/// Thresholds apply to the system health score.
pub fn sbc(sbc: &SbcComponent, thresholds: &Thresholds) -> Result<CheckResult> {
    let ranges = thresholds.compile()?;
    let Some(score) = sbc.system_health_score else {
        return Ok(CheckResult::new(CheckStatus::Unknown, "no system health score"));
    };
    let mut result = CheckResult::new(
        ranges.status(score as f64),
        format!("system health score {score}"),
    );
    result
        .perf_data
        .push(PerfData::new("system_health_score", score as f64, "").with_ranges(&ranges));
    let extra = [
        ("global_concurrent_sessions", sbc.global_concurrent_sessions),
        ("global_call_per_second", sbc.global_call_per_second),
        ("active_local_contacts", sbc.active_local_contacts),
    ];
    for (label, value) in extra {
        if let Some(v) = value {
            result.perf_data.push(PerfData::new(label, v as f64, ""));
        }
    }
    Ok(result)
}

/// Thresholds apply to the process count.
pub fn server(server: &ServerComponent, thresholds: &Thresholds) -> Result<CheckResult> {
    let ranges = thresholds.compile()?;
    let Some(procs) = server.procs else {
        return Ok(CheckResult::new(CheckStatus::Unknown, "no process count"));
    };
    let mut result = CheckResult::new(ranges.status(procs as f64), format!("{procs} processes"));
    result
        .perf_data
        .push(PerfData::new("procs", procs, "").with_ranges(&ranges));
    if let Some(users) = server.users {
        result.message.push_str(&format!(", {users} users"));
        result.perf_data.push(PerfData::new("users", users, ""));
    }
    Ok(result)
}

pub fn hardware_health(health: &HardwareHealthComponent) -> CheckResult {
    let Some(state) = health.worst_state() else {
        return CheckResult::new(CheckStatus::Unknown, "no sensor states");
    };
    let status = match state {
        HealthState::Normal | HealthState::Initial | HealthState::NotPresent => CheckStatus::Ok,
        HealthState::Warning => CheckStatus::Warning,
        HealthState::Unknown => CheckStatus::Unknown,
        HealthState::Critical | HealthState::Shutdown | HealthState::NotFunctioning => {
            CheckStatus::Critical
        }
    };
    let mut result = CheckResult::new(status, format!("worst sensor state {state}"));
    for (i, t) in health.temperature.iter().enumerate() {
        if let Some(v) = t.temperature {
            result.perf_data.push(PerfData::new(
                labelled(t.description.as_deref(), "temperature", i),
                v,
                "",
            ));
        }
    }
    for (i, v) in health.voltage.iter().enumerate() {
        if let Some(volts) = v.voltage {
            result.perf_data.push(PerfData::new(
                labelled(v.description.as_deref(), "voltage", i),
                volts,
                "V",
            ));
        }
    }
    result
}

/// Critical when the pair is degraded; thresholds apply to the node count.
pub fn high_availability(
    ha: &HighAvailabilityComponent,
    thresholds: &Thresholds,
) -> Result<CheckResult> {
    let ranges = thresholds.compile()?;
    let state = ha.state.as_deref().unwrap_or("unknown");
    let mut statuses = Vec::new();
    if matches!(state, "degraded" | "failed" | "down") {
        statuses.push(CheckStatus::Critical);
    }
    let mut message = format!("state {state}");
    if let Some(role) = &ha.role {
        message.push_str(&format!(", role {role}"));
    }
    let mut result = CheckResult::new(CheckStatus::Ok, message);
    if let Some(nodes) = ha.nodes {
        statuses.push(ranges.status(nodes as f64));
        result
            .perf_data
            .push(PerfData::new("nodes", nodes, "").with_ranges(&ranges));
    }
    result.status = worst(statuses);
    Ok(result)
}

/// Unhealthy ZFS pools are critical; thresholds apply to the processed
/// message rate.
pub fn siem(siem: &SiemComponent, thresholds: &Thresholds) -> Result<CheckResult> {
    let ranges = thresholds.compile()?;
    let mut statuses = Vec::new();
    let mut parts = Vec::new();
    let mut result = CheckResult::new(CheckStatus::Ok, String::new());

    if let Some(mps) = siem.last_processed_messages_per_second {
        statuses.push(ranges.status(mps as f64));
        parts.push(format!("{mps} msg/s processed"));
        result
            .perf_data
            .push(PerfData::new("processed_mps", mps as f64, "").with_ranges(&ranges));
    }
    if let Some(mps) = siem.last_recorded_messages_per_second {
        result.perf_data.push(PerfData::new("recorded_mps", mps as f64, ""));
    }
    for pool in &siem.zfs_pools {
        let name = pool.name.as_deref().unwrap_or("pool");
        let state = pool.state.as_deref().unwrap_or("UNKNOWN");
        if !state.eq_ignore_ascii_case("online") {
            statuses.push(CheckStatus::Critical);
            parts.push(format!("zpool {name} {state}"));
        }
    }
    if parts.is_empty() && result.perf_data.is_empty() {
        return Ok(CheckResult::new(CheckStatus::Unknown, "no SIEM values"));
    }
    result.status = worst(statuses);
    result.message = if parts.is_empty() {
        "SIEM values read".to_owned()
    } else {
        parts.join(", ")
    };
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Status, ZfsPool};

    fn range(s: &str) -> Range {
        s.parse().unwrap()
    }

    #[test]
    fn nagios_range_forms() {
        assert!(range("10").alerts(11.0));
        assert!(range("10").alerts(-1.0));
        assert!(!range("10").alerts(10.0));
        assert!(range("10:").alerts(9.9));
        assert!(!range("10:").alerts(1e9));
        assert!(range("~:10").alerts(10.5));
        assert!(!range("~:10").alerts(-1e9));
        assert!(range("10:20").alerts(21.0));
        assert!(!range("10:20").alerts(15.0));
        assert!(range("@10:20").alerts(15.0));
        assert!("20:10".parse::<Range>().is_err());
        assert!("abc".parse::<Range>().is_err());
    }

    #[test]
    fn range_display_round_trips() {
        for s in ["10", "10:", "~:10", "10:20", "@10:20"] {
            assert_eq!(range(s).to_string(), s);
        }
    }

    #[test]
    fn cpu_check_takes_worst() {
        let cpus = vec![
            Cpu { label: None, load: Some(50.0) },
            Cpu { label: Some("slot 2".into()), load: Some(95.0) },
        ];
        let thresholds = Thresholds {
            warning: Some("80".into()),
            critical: Some("90".into()),
        };
        let result = cpu_load(&cpus, &thresholds).unwrap();
        assert_eq!(result.status, CheckStatus::Critical);
        assert_eq!(result.perf_data[1].label, "slot 2");
        let line = result.to_string();
        assert!(line.starts_with("CRITICAL - cpu load: cpu0 50.0%, slot 2 95.0%"));
        assert!(line.contains("'cpu0'=50%;80;90;0;100"));
    }

    #[test]
    fn bad_threshold_is_precondition() {
        let thresholds = Thresholds {
            warning: Some("x".into()),
            critical: None,
        };
        let err = memory_usage(&[], &thresholds).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::PreCondition);
    }

    #[test]
    fn identify_lists_mismatches() {
        let got = IdentifyProperties {
            vendor: Some("Ceragon".into()),
            model: Some("IP-10G".into()),
            ..Default::default()
        };
        let expected = IdentifyProperties {
            vendor: Some("Ceragon".into()),
            model: Some("IP-20C".into()),
            ..Default::default()
        };
        let result = identify(&got, &expected);
        assert_eq!(result.status, CheckStatus::Critical);
        assert!(result
            .long_output
            .unwrap()
            .contains("model: expected 'IP-20C', got 'IP-10G'"));
    }

    #[test]
    fn interface_csv_quotes_cells() {
        let ifaces = vec![Interface {
            if_index: Some(1),
            if_descr: Some("uplink, north".into()),
            if_oper_status: Some(Status::Up),
            if_in_octets: Some(1000),
            if_hc_in_octets: Some(0),
            ..Default::default()
        }];
        let csv = interfaces_csv(&ifaces);
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some(CSV_HEADER));
        assert_eq!(lines.next(), Some("1,\"uplink, north\",up,,1000,,,"));
        let result = interface_metrics(&ifaces, true);
        assert_eq!(result.status, CheckStatus::Ok);
        assert_eq!(result.perf_data[0].value, PerfValue::Counter(1000));
        assert!(result.long_output.is_some());
    }

    #[test]
    fn ups_mains_loss_is_critical() {
        let ups_state = UpsComponent {
            mains_voltage_applied: Some(false),
            battery_capacity: Some(100.0),
            ..Default::default()
        };
        let result = ups(&ups_state, &Thresholds::default()).unwrap();
        assert_eq!(result.status, CheckStatus::Critical);
    }

    #[test]
    fn degraded_zpool_is_critical() {
        let state = SiemComponent {
            last_processed_messages_per_second: Some(100),
            zfs_pools: vec![ZfsPool {
                name: Some("data".into()),
                state: Some("DEGRADED".into()),
                health: None,
            }],
            ..Default::default()
        };
        let result = siem(&state, &Thresholds::default()).unwrap();
        assert_eq!(result.status, CheckStatus::Critical);
        assert!(result.message.contains("zpool data DEGRADED"));
    }

    #[test]
    fn unknown_wraps_errors() {
        let result = CheckResult::unknown(&Error::Cancelled);
        assert_eq!(result.status.code(), 3);
        assert_eq!(result.to_string(), "UNKNOWN - request cancelled");
    }
}
