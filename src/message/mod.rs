//! SNMP message wrappers.
//!
//! - [`CommunityMessage`] - v1/v2c messages with a community string
//! - [`V3Message`] - v3 messages with USM security

mod community;
mod v3;

pub use community::CommunityMessage;
pub use v3::{
    MsgFlags, MsgGlobalData, ScopedPdu, SecurityLevel, USM_SECURITY_MODEL, V3Message,
    V3MessageData,
};

use bytes::Bytes;

use crate::ber::Decoder;
use crate::error::Result;
use crate::error::internal::DecodeErrorKind;
use crate::version::Version;

/// A decoded message of any version.
#[derive(Debug)]
pub enum Message {
    Community(CommunityMessage),
    V3(V3Message),
}

impl Message {
    pub fn version(&self) -> Version {
        match self {
            Message::Community(m) => m.version,
            Message::V3(_) => Version::V3,
        }
    }

    /// Decode, detecting the version from the first field.
    pub fn decode(data: Bytes) -> Result<Self> {
        let mut decoder = Decoder::new(data);
        let mut seq = decoder.read_sequence()?;
        let raw = seq.read_integer()?;
        match Version::from_i32(raw) {
            Some(Version::V3) => Ok(Message::V3(V3Message::decode_body(&mut seq)?)),
            Some(version) => Ok(Message::Community(CommunityMessage::decode_body(
                &mut seq, version,
            )?)),
            None => Err(seq.reject(DecodeErrorKind::UnknownVersion(raw))),
        }
    }
}
