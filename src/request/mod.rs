//! Requests, responses and the processor that runs them.

pub mod check;
mod format;
mod lock;
mod processor;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::class::Component;
use crate::device::{
    Cpu, HardwareHealthComponent, HighAvailabilityComponent, IdentifyProperties, Interface,
    MemoryPool, SbcComponent, ServerComponent, SiemComponent, Storage, UpsComponent,
};
use crate::error::{Error, ErrorKind, Result};
use crate::group::PropertyFilter;
use crate::network::ConnectionHints;

pub use check::{CheckResult, CheckStatus, PerfData, PerfValue, Range, Thresholds};
pub use format::{OutputFormat, render};
pub use lock::IpLocks;
pub use processor::Processor;

macro_rules! request_kinds {
    ($($variant:ident => $name:literal, $check:literal;)*) => {
        /// Every request the processor answers.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum RequestKind {
            $(
                #[serde(rename = $name)]
                $variant,
            )*
        }

        impl RequestKind {
            pub const ALL: &'static [RequestKind] = &[$(RequestKind::$variant),*];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(RequestKind::$variant => $name,)*
                }
            }

            /// Check requests answer with a plugin status instead of data.
            pub fn is_check(self) -> bool {
                match self {
                    $(RequestKind::$variant => $check,)*
                }
            }
        }
    };
}

request_kinds! {
    Identify => "identify", false;
    CheckIdentify => "check-identify", true;
    CheckSnmp => "check-snmp", true;
    ReadInterfaces => "read-interfaces", false;
    CheckInterfaceMetrics => "check-interface-metrics", true;
    ReadCountInterfaces => "read-count-interfaces", false;
    ReadCpuLoad => "read-cpu-load", false;
    CheckCpuLoad => "check-cpu-load", true;
    ReadMemoryUsage => "read-memory-usage", false;
    CheckMemoryUsage => "check-memory-usage", true;
    ReadUps => "read-ups", false;
    CheckUps => "check-ups", true;
    ReadDisk => "read-disk", false;
    CheckDisk => "check-disk", true;
    ReadSbc => "read-sbc", false;
    CheckSbc => "check-sbc", true;
    ReadServer => "read-server", false;
    CheckServer => "check-server", true;
    ReadHardwareHealth => "read-hardware-health", false;
    CheckHardwareHealth => "check-hardware-health", true;
    ReadHighAvailability => "read-high-availability", false;
    CheckHighAvailability => "check-high-availability", true;
    ReadAvailableComponents => "read-available-components", false;
    ReadSiem => "read-siem", false;
    CheckSiem => "check-siem", true;
}

impl RequestKind {
    /// The capability a request reads, if any.
    pub fn component(self) -> Option<Component> {
        use RequestKind::*;
        Some(match self {
            Identify | CheckIdentify => Component::Identify,
            ReadInterfaces | CheckInterfaceMetrics | ReadCountInterfaces => Component::Interfaces,
            ReadCpuLoad | CheckCpuLoad => Component::Cpu,
            ReadMemoryUsage | CheckMemoryUsage => Component::Memory,
            ReadUps | CheckUps => Component::Ups,
            ReadDisk | CheckDisk => Component::Disk,
            ReadSbc | CheckSbc => Component::Sbc,
            ReadServer | CheckServer => Component::Server,
            ReadHardwareHealth | CheckHardwareHealth => Component::HardwareHealth,
            ReadHighAvailability | CheckHighAvailability => Component::HighAvailability,
            ReadSiem | CheckSiem => Component::Siem,
            CheckSnmp | ReadAvailableComponents => return None,
        })
    }

    /// Whether the device class must be known to answer.
    pub fn needs_class(self) -> bool {
        self != RequestKind::CheckSnmp
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestKind {
    type Err = Box<Error>;

    fn from_str(s: &str) -> Result<Self> {
        RequestKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| Error::pre_condition(format!("unknown request '{s}'")))
    }
}

/// A request against one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub kind: RequestKind,
    /// IP address or host name.
    pub target: String,
    #[serde(default)]
    pub connection: ConnectionHints,
    /// Seconds; the configured request timeout when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub no_ip_lock: bool,
    #[serde(default)]
    pub snmp_gets_instead_of_walk: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<PropertyFilter>,
    /// Rewrite interface descriptions: every match of this regex is
    /// replaced with `ifdescr_replace`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ifdescr_regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ifdescr_replace: Option<String>,
    #[serde(default)]
    pub thresholds: Thresholds,
    /// Identity `check-identify` compares against.
    #[serde(default)]
    pub expected: IdentifyProperties,
    /// Attach the interface table as CSV to `check-interface-metrics`.
    #[serde(default)]
    pub print_csv: bool,
}

impl Request {
    pub fn new(kind: RequestKind, target: impl Into<String>) -> Self {
        Self {
            kind,
            target: target.into(),
            connection: ConnectionHints::default(),
            timeout: None,
            no_ip_lock: false,
            snmp_gets_instead_of_walk: false,
            filters: Vec::new(),
            ifdescr_regex: None,
            ifdescr_replace: None,
            thresholds: Thresholds::default(),
            expected: IdentifyProperties::default(),
            print_csv: false,
        }
    }
}

/// Answer to `identify`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identification {
    pub class: String,
    #[serde(flatten)]
    pub properties: IdentifyProperties,
}

/// Successful payload of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Response {
    Identify(Identification),
    Check(CheckResult),
    Interfaces(Vec<Interface>),
    Count(u64),
    CpuLoad(Vec<Cpu>),
    MemoryUsage(Vec<MemoryPool>),
    Ups(UpsComponent),
    Disk(Vec<Storage>),
    Sbc(SbcComponent),
    Server(ServerComponent),
    HardwareHealth(HardwareHealthComponent),
    HighAvailability(HighAvailabilityComponent),
    Siem(SiemComponent),
    Components(Vec<String>),
}

/// User-visible failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&Error> for Failure {
    fn from(err: &Error) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Outcome of one request as seen by callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reply {
    Success(Response),
    Failure(Failure),
}

impl Reply {
    /// Wrap a processing result. Check requests never fail: an error
    /// becomes an UNKNOWN status.
    pub fn new(kind: RequestKind, result: Result<Response>) -> Self {
        match result {
            Ok(response) => Reply::Success(response),
            Err(err) if kind.is_check() => Reply::Success(Response::Check(CheckResult::unknown(&err))),
            Err(err) => Reply::Failure(Failure::from(err.as_ref())),
        }
    }

    /// 0 or 1 for data requests, the plugin status for checks.
    pub fn exit_code(&self) -> i32 {
        match self {
            Reply::Success(Response::Check(check)) => check.status.code(),
            Reply::Success(_) => 0,
            Reply::Failure(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_parse_from_their_names() {
        assert_eq!(RequestKind::ALL.len(), 25);
        for kind in RequestKind::ALL {
            assert_eq!(kind.as_str().parse::<RequestKind>().unwrap(), *kind);
            assert_eq!(kind.is_check(), kind.as_str().starts_with("check-"));
        }
        assert!("read-everything".parse::<RequestKind>().is_err());
    }

    #[test]
    fn request_json_defaults() {
        let req: Request =
            serde_json::from_str(r#"{"kind":"read-interfaces","target":"192.0.2.1"}"#).unwrap();
        assert_eq!(req, Request::new(RequestKind::ReadInterfaces, "192.0.2.1"));
    }

    #[test]
    fn check_errors_become_unknown() {
        let reply = Reply::new(RequestKind::CheckCpuLoad, Err(Error::Cancelled.boxed()));
        assert_eq!(reply.exit_code(), 3);
        let reply = Reply::new(RequestKind::ReadCpuLoad, Err(Error::Cancelled.boxed()));
        assert_eq!(reply.exit_code(), 1);
        match reply {
            Reply::Failure(f) => assert_eq!(f.kind, ErrorKind::Cancelled),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn response_json_round_trips() {
        let reply = Reply::Success(Response::Identify(Identification {
            class: "ceragon/ip10".into(),
            properties: IdentifyProperties {
                vendor: Some("Ceragon".into()),
                ..Default::default()
            },
        }));
        let json = serde_json::to_string(&reply).unwrap();
        assert!(json.contains(r#""vendor":"Ceragon""#));
        assert_eq!(serde_json::from_str::<Reply>(&json).unwrap(), reply);
    }
}
