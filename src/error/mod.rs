//! Error types for async-devmon.
//!
//! This module provides:
//!
//! - [`Error`] - the main error type, covering protocol failures from the
//!   SNMP engine as well as the engine-level outcomes used by recipe
//!   evaluation (`NotFound`, `NotImplemented`, ...)
//! - [`ErrorKind`] - the stable, serialisable classification shown to users
//! - [`ErrorStatus`] - SNMP protocol errors returned by agents (RFC 3416)
//! - [`WalkAbortReason`] - reasons a walk operation was aborted
//!
//! Errors are boxed: `Result<T> = Result<T, Box<Error>>`.
//!
//! ```rust
//! use async_devmon::{Error, ErrorKind, Result};
//!
//! fn classify(result: Result<()>) -> Option<ErrorKind> {
//!     result.err().map(|e| e.kind())
//! }
//!
//! let err = Error::not_found("sysObjectID");
//! assert_eq!(classify(Err(err)), Some(ErrorKind::NotFound));
//! ```

pub(crate) mod internal;

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::oid::Oid;

/// Placeholder target address used when no target is known.
pub(crate) const UNKNOWN_TARGET: SocketAddr =
    SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0)), 0);

/// Result type alias using the library's boxed Error type.
pub type Result<T> = std::result::Result<T, Box<Error>>;

/// Reason a walk operation was aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkAbortReason {
    /// Agent returned an OID that is not greater than the previous OID.
    NonIncreasing,
    /// Agent returned an OID outside of the walked subtree without ending it.
    Runaway,
}

impl std::fmt::Display for WalkAbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonIncreasing => write!(f, "non-increasing OID"),
            Self::Runaway => write!(f, "walk did not terminate"),
        }
    }
}

/// The main error type.
///
/// Protocol variants (`Network`, `Timeout`, `Snmp`, `Auth`,
/// `MalformedResponse`, `WalkAborted`, `Http`, `HttpStatus`, `Connection`)
/// all classify as [`ErrorKind::Network`]. The remaining variants carry the
/// outcomes the engine reasons about: `NotFound` and `NotImplemented` are
/// recovered inside recipe evaluation, everything else reaches the caller.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Network failure (connection refused, unreachable, etc.)
    #[error("network error communicating with {target}: {source}")]
    Network {
        target: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// SNMP request timed out after retries.
    #[error("timeout after {elapsed:?} waiting for {target} ({retries} retries)")]
    Timeout {
        target: SocketAddr,
        elapsed: Duration,
        retries: u32,
    },

    /// SNMP protocol error from agent.
    #[error("SNMP error from {target}: {status} at index {index}")]
    Snmp {
        target: SocketAddr,
        status: ErrorStatus,
        index: u32,
        oid: Option<Oid>,
    },

    /// SNMPv3 authentication failed.
    #[error("authentication failed for {target}")]
    Auth { target: SocketAddr },

    /// Malformed response from agent.
    #[error("malformed response from {target}")]
    MalformedResponse { target: SocketAddr },

    /// Walk aborted due to agent misbehavior.
    #[error("walk aborted for {target}: {reason}")]
    WalkAborted {
        target: SocketAddr,
        reason: WalkAbortReason,
    },

    /// HTTP transport failure.
    #[error("http request to {url} failed: {source}")]
    Http {
        url: Box<str>,
        #[source]
        source: reqwest::Error,
    },

    /// HTTP request answered with a non-success status.
    #[error("http request to {url} returned status {status}")]
    HttpStatus { url: Box<str>, status: u16 },

    /// Neither SNMP nor HTTP could be established to the device.
    #[error("no connection to {target} could be established: {reason}")]
    Connection { target: Box<str>, reason: Box<str> },

    /// The requested entity does not exist.
    #[error("not found: {0}")]
    NotFound(Box<str>),

    /// The capability is not available at this layer.
    #[error("not implemented: {0}")]
    NotImplemented(Box<str>),

    /// The device class does not declare the requested component.
    #[error("device class '{class}' does not support component '{component}'")]
    ComponentNotFound {
        class: Box<str>,
        component: Box<str>,
    },

    /// Inputs are inconsistent.
    #[error("precondition failed: {0}")]
    PreCondition(Box<str>),

    /// Rejected by a rate limiter.
    #[error("too many requests")]
    TooManyRequests,

    /// A value could not be converted to the requested type.
    #[error("decode error: {0}")]
    Decode(Box<str>),

    /// The request deadline passed.
    #[error("request deadline exceeded")]
    DeadlineExceeded,

    /// The request was cancelled.
    #[error("request cancelled")]
    Cancelled,

    /// A panic escaped capability dispatch.
    #[error("engine panicked: {0}")]
    Panicked(Box<str>),

    /// Device-property cache backend failure.
    #[error("cache error: {0}")]
    Cache(Box<str>),

    /// Invalid configuration or data file.
    #[error("configuration error: {0}")]
    Config(Box<str>),

    /// Invalid OID format.
    #[error("invalid OID: {0}")]
    InvalidOid(Box<str>),

    /// Another error with a short description of what was being done.
    #[error("{context}: {source}")]
    Context {
        context: Box<str>,
        #[source]
        source: Box<Error>,
    },
}

/// User-visible error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    NotFound,
    NotImplemented,
    ComponentNotFound,
    PreCondition,
    TooManyRequests,
    Decode,
    Timeout,
    Cancelled,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Network => "network",
            Self::NotFound => "not_found",
            Self::NotImplemented => "not_implemented",
            Self::ComponentNotFound => "component_not_found",
            Self::PreCondition => "pre_condition",
            Self::TooManyRequests => "too_many_requests",
            Self::Decode => "decode",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

impl Error {
    /// Box this error (convenience for constructing boxed errors).
    pub fn boxed(self) -> Box<Self> {
        Box::new(self)
    }

    pub fn not_found(what: impl Into<String>) -> Box<Self> {
        Self::NotFound(what.into().into_boxed_str()).boxed()
    }

    pub fn not_implemented(what: impl Into<String>) -> Box<Self> {
        Self::NotImplemented(what.into().into_boxed_str()).boxed()
    }

    pub fn pre_condition(what: impl Into<String>) -> Box<Self> {
        Self::PreCondition(what.into().into_boxed_str()).boxed()
    }

    pub fn decode(what: impl Into<String>) -> Box<Self> {
        Self::Decode(what.into().into_boxed_str()).boxed()
    }

    pub fn config(what: impl Into<String>) -> Box<Self> {
        Self::Config(what.into().into_boxed_str()).boxed()
    }

    pub fn cache(what: impl std::fmt::Display) -> Box<Self> {
        Self::Cache(what.to_string().into_boxed_str()).boxed()
    }

    /// The innermost error, looking through [`Error::Context`] layers.
    pub fn root(&self) -> &Error {
        let mut current = self;
        while let Error::Context { source, .. } = current {
            current = source;
        }
        current
    }

    /// Classify the error for users and exit-code decisions.
    pub fn kind(&self) -> ErrorKind {
        match self.root() {
            Error::Network { .. }
            | Error::Timeout { .. }
            | Error::Snmp { .. }
            | Error::Auth { .. }
            | Error::MalformedResponse { .. }
            | Error::WalkAborted { .. }
            | Error::Http { .. }
            | Error::HttpStatus { .. }
            | Error::Connection { .. } => ErrorKind::Network,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::NotImplemented(_) => ErrorKind::NotImplemented,
            Error::ComponentNotFound { .. } => ErrorKind::ComponentNotFound,
            Error::PreCondition(_) => ErrorKind::PreCondition,
            Error::TooManyRequests => ErrorKind::TooManyRequests,
            Error::Decode(_) => ErrorKind::Decode,
            Error::DeadlineExceeded => ErrorKind::Timeout,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Panicked(_)
            | Error::Cache(_)
            | Error::Config(_)
            | Error::InvalidOid(_)
            | Error::Context { .. } => ErrorKind::Internal,
        }
    }

    pub fn is_network(&self) -> bool {
        self.kind() == ErrorKind::Network
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_not_implemented(&self) -> bool {
        self.kind() == ErrorKind::NotImplemented
    }

    /// True for request-level completion (deadline or cancel).
    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind(), ErrorKind::Cancelled | ErrorKind::Timeout)
    }
}

/// Attach context to errors while propagating them with `?`.
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|source| {
            // Engine outcomes stay matchable at the top level.
            match *source {
                Error::NotFound(_)
                | Error::NotImplemented(_)
                | Error::ComponentNotFound { .. }
                | Error::Cancelled
                | Error::DeadlineExceeded => source,
                _ => Error::Context {
                    context: context.into().into_boxed_str(),
                    source,
                }
                .boxed(),
            }
        })
    }
}

/// SNMP protocol error status codes (RFC 3416).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorStatus {
    NoError,
    TooBig,
    /// SNMPv1 only; v2c+ agents answer with exception values instead.
    NoSuchName,
    BadValue,
    ReadOnly,
    GenErr,
    NoAccess,
    WrongType,
    WrongLength,
    WrongEncoding,
    WrongValue,
    NoCreation,
    InconsistentValue,
    ResourceUnavailable,
    CommitFailed,
    UndoFailed,
    AuthorizationError,
    NotWritable,
    InconsistentName,
    Unknown(i32),
}

const STATUS_NAMES: [(ErrorStatus, &str); 19] = [
    (ErrorStatus::NoError, "noError"),
    (ErrorStatus::TooBig, "tooBig"),
    (ErrorStatus::NoSuchName, "noSuchName"),
    (ErrorStatus::BadValue, "badValue"),
    (ErrorStatus::ReadOnly, "readOnly"),
    (ErrorStatus::GenErr, "genErr"),
    (ErrorStatus::NoAccess, "noAccess"),
    (ErrorStatus::WrongType, "wrongType"),
    (ErrorStatus::WrongLength, "wrongLength"),
    (ErrorStatus::WrongEncoding, "wrongEncoding"),
    (ErrorStatus::WrongValue, "wrongValue"),
    (ErrorStatus::NoCreation, "noCreation"),
    (ErrorStatus::InconsistentValue, "inconsistentValue"),
    (ErrorStatus::ResourceUnavailable, "resourceUnavailable"),
    (ErrorStatus::CommitFailed, "commitFailed"),
    (ErrorStatus::UndoFailed, "undoFailed"),
    (ErrorStatus::AuthorizationError, "authorizationError"),
    (ErrorStatus::NotWritable, "notWritable"),
    (ErrorStatus::InconsistentName, "inconsistentName"),
];

impl ErrorStatus {
    /// Create from raw status code.
    pub fn from_i32(value: i32) -> Self {
        match usize::try_from(value) {
            Ok(idx) if idx < STATUS_NAMES.len() => STATUS_NAMES[idx].0,
            _ => {
                tracing::warn!(target: "async_devmon::error", { snmp.error_status = value }, "unknown SNMP error status");
                Self::Unknown(value)
            }
        }
    }

    /// Convert to raw status code.
    pub fn as_i32(&self) -> i32 {
        match self {
            Self::Unknown(code) => *code,
            known => STATUS_NAMES
                .iter()
                .position(|(s, _)| s == known)
                .map(|p| p as i32)
                .unwrap_or(-1),
        }
    }
}

impl std::fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "unknown({})", code),
            known => {
                let name = STATUS_NAMES
                    .iter()
                    .find(|(s, _)| s == known)
                    .map(|(_, n)| *n)
                    .unwrap_or("unknown");
                f.write_str(name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_is_pointer_sized() {
        assert_eq!(
            std::mem::size_of::<Result<()>>(),
            std::mem::size_of::<*const ()>(),
        );
    }

    #[test]
    fn status_codes_round_trip() {
        for code in 0..19 {
            assert_eq!(ErrorStatus::from_i32(code).as_i32(), code);
        }
        assert_eq!(ErrorStatus::from_i32(99), ErrorStatus::Unknown(99));
        assert_eq!(ErrorStatus::NoSuchName.to_string(), "noSuchName");
    }

    #[test]
    fn kind_looks_through_context() {
        let inner = Error::Timeout {
            target: UNKNOWN_TARGET,
            elapsed: Duration::from_secs(1),
            retries: 0,
        }
        .boxed();
        let wrapped: Result<()> = Err(inner);
        let err = wrapped.context("reading interfaces").unwrap_err();
        assert!(matches!(*err, Error::Context { .. }));
        assert_eq!(err.kind(), ErrorKind::Network);
        assert!(err.is_network());
    }

    #[test]
    fn context_keeps_fallback_outcomes_unwrapped() {
        let r: Result<()> = Err(Error::not_implemented("cpu"));
        let err = r.context("reading cpu").unwrap_err();
        assert!(matches!(*err, Error::NotImplemented(_)));
    }

    #[test]
    fn deadline_is_timeout_kind() {
        assert_eq!(Error::DeadlineExceeded.kind(), ErrorKind::Timeout);
        assert!(Error::Cancelled.is_cancelled());
    }
}
