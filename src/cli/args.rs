//! Command-line argument structures for the `devmon` tool.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::device::IdentifyProperties;
use crate::group::PropertyFilter;
use crate::network::{ConnectionHints, HttpHints, SnmpHints, V3Credentials};
use crate::request::{OutputFormat, Request, RequestKind, Thresholds};

/// Identify network devices and read their metrics over SNMP and HTTP.
#[derive(Debug, Parser)]
#[command(name = "devmon", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(flatten)]
    pub v3: V3Args,

    #[command(flatten)]
    pub output: OutputArgs,
}

impl Cli {
    /// The request described by the command line.
    pub fn request(&self) -> Request {
        let (kind, target) = self.command.kind_and_target();
        let mut request = Request::new(kind, target.target.clone());
        request.connection = self.connection.hints(&self.v3);
        request.timeout = self.connection.request_timeout;
        request.no_ip_lock = self.connection.no_ip_lock;
        request.snmp_gets_instead_of_walk = self.connection.snmp_gets;

        match &self.command {
            Command::CheckIdentify(args) => request.expected = args.expected(),
            Command::ReadInterfaces(args) => args.apply(&mut request),
            Command::CheckInterfaceMetrics(args) => {
                args.interfaces.apply(&mut request);
                request.print_csv = args.csv;
            }
            Command::CheckCpuLoad(args)
            | Command::CheckMemoryUsage(args)
            | Command::CheckUps(args)
            | Command::CheckDisk(args)
            | Command::CheckSbc(args)
            | Command::CheckServer(args)
            | Command::CheckHighAvailability(args)
            | Command::CheckSiem(args) => request.thresholds = args.thresholds(),
            _ => {}
        }
        request
    }
}

/// One subcommand per request.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Identify the device class and read vendor, model and versions.
    Identify(TargetArgs),
    /// Compare the identity against expected values.
    CheckIdentify(CheckIdentifyArgs),
    /// Check that SNMP answers and show the working credentials.
    CheckSnmp(TargetArgs),
    /// Read the interface list.
    ReadInterfaces(InterfaceArgs),
    /// Interface counters as performance data.
    CheckInterfaceMetrics(InterfaceMetricsArgs),
    /// Count interfaces.
    ReadCountInterfaces(TargetArgs),
    ReadCpuLoad(TargetArgs),
    CheckCpuLoad(ThresholdArgs),
    ReadMemoryUsage(TargetArgs),
    CheckMemoryUsage(ThresholdArgs),
    ReadUps(TargetArgs),
    CheckUps(ThresholdArgs),
    ReadDisk(TargetArgs),
    CheckDisk(ThresholdArgs),
    ReadSbc(TargetArgs),
    CheckSbc(ThresholdArgs),
    ReadServer(TargetArgs),
    CheckServer(ThresholdArgs),
    ReadHardwareHealth(TargetArgs),
    CheckHardwareHealth(TargetArgs),
    ReadHighAvailability(TargetArgs),
    CheckHighAvailability(ThresholdArgs),
    /// List the components the device class supports.
    ReadAvailableComponents(TargetArgs),
    ReadSiem(TargetArgs),
    CheckSiem(ThresholdArgs),
}

impl Command {
    fn kind_and_target(&self) -> (RequestKind, &TargetArgs) {
        use Command as C;
        use RequestKind as K;
        match self {
            C::Identify(t) => (K::Identify, t),
            C::CheckIdentify(a) => (K::CheckIdentify, &a.target),
            C::CheckSnmp(t) => (K::CheckSnmp, t),
            C::ReadInterfaces(a) => (K::ReadInterfaces, &a.target),
            C::CheckInterfaceMetrics(a) => (K::CheckInterfaceMetrics, &a.interfaces.target),
            C::ReadCountInterfaces(t) => (K::ReadCountInterfaces, t),
            C::ReadCpuLoad(t) => (K::ReadCpuLoad, t),
            C::CheckCpuLoad(a) => (K::CheckCpuLoad, &a.target),
            C::ReadMemoryUsage(t) => (K::ReadMemoryUsage, t),
            C::CheckMemoryUsage(a) => (K::CheckMemoryUsage, &a.target),
            C::ReadUps(t) => (K::ReadUps, t),
            C::CheckUps(a) => (K::CheckUps, &a.target),
            C::ReadDisk(t) => (K::ReadDisk, t),
            C::CheckDisk(a) => (K::CheckDisk, &a.target),
            C::ReadSbc(t) => (K::ReadSbc, t),
            C::CheckSbc(a) => (K::CheckSbc, &a.target),
            C::ReadServer(t) => (K::ReadServer, t),
            C::CheckServer(a) => (K::CheckServer, &a.target),
            C::ReadHardwareHealth(t) => (K::ReadHardwareHealth, t),
            C::CheckHardwareHealth(t) => (K::CheckHardwareHealth, t),
            C::ReadHighAvailability(t) => (K::ReadHighAvailability, t),
            C::CheckHighAvailability(a) => (K::CheckHighAvailability, &a.target),
            C::ReadAvailableComponents(t) => (K::ReadAvailableComponents, t),
            C::ReadSiem(t) => (K::ReadSiem, t),
            C::CheckSiem(a) => (K::CheckSiem, &a.target),
        }
    }
}

#[derive(Debug, Args)]
pub struct TargetArgs {
    /// Device IP address or host name.
    #[arg(value_name = "TARGET")]
    pub target: String,
}

#[derive(Debug, Args)]
pub struct ThresholdArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Warning range (Nagios syntax, e.g. `80`, `10:`, `@5:10`).
    #[arg(short = 'w', long = "warning", allow_hyphen_values = true)]
    pub warning: Option<String>,

    /// Critical range.
    #[arg(short = 'C', long = "critical", allow_hyphen_values = true)]
    pub critical: Option<String>,
}

impl ThresholdArgs {
    fn thresholds(&self) -> Thresholds {
        Thresholds {
            warning: self.warning.clone(),
            critical: self.critical.clone(),
        }
    }
}

#[derive(Debug, Args)]
pub struct CheckIdentifyArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    #[arg(long)]
    pub vendor: Option<String>,
    #[arg(long)]
    pub model: Option<String>,
    #[arg(long)]
    pub model_series: Option<String>,
    #[arg(long)]
    pub serial_number: Option<String>,
    #[arg(long)]
    pub os_version: Option<String>,
}

impl CheckIdentifyArgs {
    fn expected(&self) -> IdentifyProperties {
        IdentifyProperties {
            vendor: self.vendor.clone(),
            model: self.model.clone(),
            model_series: self.model_series.clone(),
            serial_number: self.serial_number.clone(),
            os_version: self.os_version.clone(),
        }
    }
}

#[derive(Debug, Args)]
pub struct InterfaceArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Keep interfaces whose PATH matches REGEX (`PATH=REGEX`, repeatable).
    #[arg(long = "group-filter", value_name = "PATH=REGEX")]
    pub group_filters: Vec<String>,

    /// Leave PATH out of every interface (repeatable).
    #[arg(long = "drop", value_name = "PATH")]
    pub dropped: Vec<String>,

    /// Report only these paths (repeatable).
    #[arg(long = "only", value_name = "PATH")]
    pub only: Vec<String>,

    /// Regex applied to every ifDescr.
    #[arg(long = "ifdescr-regex")]
    pub ifdescr_regex: Option<String>,

    /// Replacement for `--ifdescr-regex` matches.
    #[arg(long = "ifdescr-replace", requires = "ifdescr_regex")]
    pub ifdescr_replace: Option<String>,
}

impl InterfaceArgs {
    fn apply(&self, request: &mut Request) {
        request.filters = self.filters();
        request.ifdescr_regex = self.ifdescr_regex.clone();
        request.ifdescr_replace = self.ifdescr_replace.clone();
    }

    fn filters(&self) -> Vec<PropertyFilter> {
        let mut filters: Vec<PropertyFilter> = self
            .group_filters
            .iter()
            .map(|f| {
                let (path, regex) = f.split_once('=').unwrap_or((f.as_str(), ".*"));
                PropertyFilter::Group {
                    path: path.to_owned(),
                    regex: regex.to_owned(),
                }
            })
            .collect();
        filters.extend(self.dropped.iter().map(|path| PropertyFilter::Value { path: path.clone() }));
        if !self.only.is_empty() {
            filters.push(PropertyFilter::ExclusiveValue {
                paths: self.only.clone(),
            });
        }
        filters
    }
}

#[derive(Debug, Args)]
pub struct InterfaceMetricsArgs {
    #[command(flatten)]
    pub interfaces: InterfaceArgs,

    /// Append the interface table as CSV.
    #[arg(long)]
    pub csv: bool,
}

/// Connection hints given on the command line. Unset options fall back to
/// cached connection data, then to the configuration file.
#[derive(Debug, Args)]
pub struct ConnectionArgs {
    /// SNMP community to try (repeatable).
    #[arg(short = 'c', long = "community", global = true)]
    pub communities: Vec<String>,

    /// SNMP version to try: 1, 2c or 3 (repeatable).
    #[arg(short = 'v', long = "snmp-version", global = true)]
    pub versions: Vec<String>,

    /// SNMP port to try (repeatable).
    #[arg(short = 'p', long = "port", global = true)]
    pub ports: Vec<u16>,

    /// SNMP request timeout in seconds.
    #[arg(long = "snmp-timeout", global = true)]
    pub snmp_timeout: Option<u64>,

    /// SNMP retries.
    #[arg(long = "retries", global = true)]
    pub retries: Option<u32>,

    /// GETBULK max-repetitions.
    #[arg(long = "max-rep", global = true)]
    pub max_repetitions: Option<u32>,

    /// HTTP port to try (repeatable).
    #[arg(long = "http-port", global = true)]
    pub http_ports: Vec<u16>,

    /// HTTPS port to try (repeatable).
    #[arg(long = "https-port", global = true)]
    pub https_ports: Vec<u16>,

    /// HTTP basic auth user.
    #[arg(long = "http-user", global = true)]
    pub http_user: Option<String>,

    /// HTTP basic auth password.
    #[arg(long = "http-password", global = true)]
    pub http_password: Option<String>,

    /// Whole-request timeout in seconds.
    #[arg(short = 't', long = "timeout", global = true)]
    pub request_timeout: Option<u64>,

    /// Do not serialise with other requests to the same device.
    #[arg(long = "no-ip-lock", global = true)]
    pub no_ip_lock: bool,

    /// GET each column value instead of walking columns.
    #[arg(long = "snmp-gets", global = true)]
    pub snmp_gets: bool,
}

impl ConnectionArgs {
    pub fn hints(&self, v3: &V3Args) -> ConnectionHints {
        let snmp = SnmpHints {
            communities: self.communities.clone(),
            versions: self.versions.clone(),
            ports: self.ports.clone(),
            timeout: self.snmp_timeout,
            retries: self.retries,
            max_repetitions: self.max_repetitions,
            v3_data: v3.credentials(),
            ..Default::default()
        };
        let http = HttpHints {
            http_ports: (!self.http_ports.is_empty()).then(|| self.http_ports.clone()),
            https_ports: (!self.https_ports.is_empty()).then(|| self.https_ports.clone()),
            auth_username: self.http_user.clone(),
            auth_password: self.http_password.clone(),
            insecure_skip_verify: None,
        };
        ConnectionHints {
            snmp: (snmp != SnmpHints::default()).then_some(snmp),
            http: (http != HttpHints::default()).then_some(http),
        }
    }
}

/// SNMPv3 security arguments.
#[derive(Debug, Args)]
pub struct V3Args {
    /// Security name/username.
    #[arg(short = 'u', long = "username", global = true)]
    pub username: Option<String>,

    /// Security level: noAuthNoPriv, authNoPriv, or authPriv.
    #[arg(short = 'l', long = "level", global = true)]
    pub level: Option<String>,

    /// Authentication protocol: MD5, SHA, SHA-224, SHA-256, SHA-384, SHA-512.
    #[arg(short = 'a', long = "auth-protocol", global = true)]
    pub auth_protocol: Option<String>,

    /// Authentication passphrase.
    #[arg(short = 'A', long = "auth-password", global = true)]
    pub auth_password: Option<String>,

    /// Privacy protocol: DES, AES, AES-192, AES-256.
    #[arg(short = 'x', long = "priv-protocol", global = true)]
    pub priv_protocol: Option<String>,

    /// Privacy passphrase.
    #[arg(short = 'X', long = "priv-password", global = true)]
    pub priv_password: Option<String>,

    /// Context name.
    #[arg(short = 'n', long = "context", global = true)]
    pub context: Option<String>,
}

impl V3Args {
    /// Credentials when a username is given. Validation happens when the
    /// hints are resolved.
    pub fn credentials(&self) -> Option<V3Credentials> {
        let user = self.username.clone()?;
        let level = self.level.clone().or_else(|| {
            Some(
                match (self.auth_protocol.is_some(), self.priv_protocol.is_some()) {
                    (true, true) => "authPriv",
                    (true, false) => "authNoPriv",
                    _ => "noAuthNoPriv",
                }
                .to_owned(),
            )
        });
        Some(V3Credentials {
            level,
            context_name: self.context.clone(),
            user: Some(user),
            auth_protocol: self.auth_protocol.clone(),
            auth_key: self.auth_password.clone(),
            priv_protocol: self.priv_protocol.clone(),
            priv_key: self.priv_password.clone(),
        })
    }
}

/// Output and process control.
#[derive(Debug, Args)]
pub struct OutputArgs {
    /// Output format.
    #[arg(short = 'o', long = "format", default_value = "json", global = true)]
    pub format: OutputFormat,

    /// Configuration file (TOML).
    #[arg(long = "config", env = "DEVMON_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging (async_devmon=debug).
    #[arg(short = 'd', long = "debug", global = true)]
    pub debug: bool,

    /// Enable trace logging (async_devmon=trace).
    #[arg(short = 'D', long = "trace", global = true)]
    pub trace: bool,
}
