//! Device connections: hint resolution, SNMP discovery, HTTP endpoints.

mod connection;
mod discovery;
mod hints;
mod http;
mod snmp;

pub use connection::{Connection, IdealConnectionData, resolve_target};
pub use discovery::discover;
pub use hints::{
    ConnectionHints, HttpHints, HttpSettings, ResolvedHints, SnmpHints, SnmpSettings,
    V3Credentials, V3Settings,
};
pub use http::{HttpClient, HttpConnectionData, HttpResponse, Scheme, encode_path};
pub use snmp::{SnmpClient, SnmpConnectionData, SnmpCredentials};
