//! Detailed failure kinds that are logged but not surfaced.
//!
//! Callers only ever see [`Error::MalformedResponse`](super::Error) or
//! [`Error::Auth`](super::Error); the precise reason goes to `tracing` at
//! debug level:
//!
//! ```ignore
//! tracing::debug!(
//!     target: "async_devmon::ber",
//!     { snmp.offset = 42, kind = %DecodeErrorKind::ZeroLengthInteger },
//!     "decode error"
//! );
//! ```

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DecodeErrorKind {
    UnexpectedTag { expected: u8, actual: u8 },
    TruncatedData,
    InvalidLength,
    IndefiniteLength,
    LengthTooLong { octets: usize },
    LengthExceedsMax { length: usize, max: usize },
    ZeroLengthInteger,
    Integer64TooLong { length: usize },
    InvalidNull,
    InvalidOidEncoding,
    InvalidIpAddressLength { length: usize },
    ConstructedOctetString,
    TlvOverflow,
    UnknownVersion(i32),
    UnknownPduType(u8),
    UnknownSecurityModel(i32),
    InvalidMsgFlags,
}

impl fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedTag { expected, actual } => {
                write!(f, "expected tag 0x{:02X}, got 0x{:02X}", expected, actual)
            }
            Self::TruncatedData => write!(f, "unexpected end of data"),
            Self::InvalidLength => write!(f, "invalid length encoding"),
            Self::IndefiniteLength => write!(f, "indefinite length not supported"),
            Self::LengthTooLong { octets } => write!(f, "length field too long: {} octets", octets),
            Self::LengthExceedsMax { length, max } => {
                write!(f, "length {} exceeds maximum {}", length, max)
            }
            Self::ZeroLengthInteger => write!(f, "zero-length integer"),
            Self::Integer64TooLong { length } => write!(f, "integer64 too long: {} bytes", length),
            Self::InvalidNull => write!(f, "NULL with non-zero length"),
            Self::InvalidOidEncoding => write!(f, "invalid OID encoding"),
            Self::InvalidIpAddressLength { length } => {
                write!(f, "IP address must be 4 bytes, got {}", length)
            }
            Self::ConstructedOctetString => write!(f, "constructed OCTET STRING not supported"),
            Self::TlvOverflow => write!(f, "TLV extends past end of data"),
            Self::UnknownVersion(v) => write!(f, "unknown SNMP version {}", v),
            Self::UnknownPduType(t) => write!(f, "unknown PDU type 0x{:02X}", t),
            Self::UnknownSecurityModel(m) => write!(f, "unknown security model {}", m),
            Self::InvalidMsgFlags => write!(f, "privacy flag set without authentication"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AuthErrorKind {
    HmacMismatch,
    WrongMacLength { expected: usize, actual: usize },
    AuthParamsNotFound,
    NotInTimeWindow,
    UnknownEngineId,
    UnknownUserName,
    WrongDigest,
}

impl fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HmacMismatch => write!(f, "HMAC verification failed"),
            Self::WrongMacLength { expected, actual } => {
                write!(f, "wrong MAC length: expected {}, got {}", expected, actual)
            }
            Self::AuthParamsNotFound => write!(f, "could not locate auth params in message"),
            Self::NotInTimeWindow => write!(f, "usmStatsNotInTimeWindows"),
            Self::UnknownEngineId => write!(f, "usmStatsUnknownEngineIDs"),
            Self::UnknownUserName => write!(f, "usmStatsUnknownUserNames"),
            Self::WrongDigest => write!(f, "usmStatsWrongDigests"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CryptoErrorKind {
    InvalidPrivParamsLength { expected: usize, actual: usize },
    InvalidCiphertextLength { length: usize, block_size: usize },
    CipherError,
}

impl fmt::Display for CryptoErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPrivParamsLength { expected, actual } => write!(
                f,
                "invalid privParameters length: expected {}, got {}",
                expected, actual
            ),
            Self::InvalidCiphertextLength { length, block_size } => write!(
                f,
                "ciphertext length {} not multiple of block size {}",
                length, block_size
            ),
            Self::CipherError => write!(f, "cipher operation failed"),
        }
    }
}
