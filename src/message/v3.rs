//! SNMPv3 message format (RFC 3412).
//!
//! ```text
//! SEQUENCE {
//!     INTEGER version (3)
//!     SEQUENCE msgGlobalData { msgID, msgMaxSize, msgFlags, msgSecurityModel }
//!     OCTET STRING msgSecurityParameters
//!     msgData: ScopedPDU | OCTET STRING (encrypted ScopedPDU)
//! }
//! ```

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::ber::{Decoder, EncodeBuf, tag};
use crate::error::Result;
use crate::error::internal::DecodeErrorKind;
use crate::pdu::Pdu;

/// User-based Security Model.
pub const USM_SECURITY_MODEL: i32 = 3;

/// Security level, ordered from least to most secure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SecurityLevel {
    #[serde(rename = "noAuthNoPriv")]
    NoAuthNoPriv,
    #[serde(rename = "authNoPriv")]
    AuthNoPriv,
    #[serde(rename = "authPriv")]
    AuthPriv,
}

impl SecurityLevel {
    pub fn from_flags(flags: u8) -> Option<Self> {
        match (flags & 0x01 != 0, flags & 0x02 != 0) {
            (false, false) => Some(Self::NoAuthNoPriv),
            (true, false) => Some(Self::AuthNoPriv),
            (true, true) => Some(Self::AuthPriv),
            (false, true) => None,
        }
    }

    pub fn to_flags(self) -> u8 {
        match self {
            Self::NoAuthNoPriv => 0x00,
            Self::AuthNoPriv => 0x01,
            Self::AuthPriv => 0x03,
        }
    }

    pub fn requires_auth(self) -> bool {
        self >= Self::AuthNoPriv
    }

    pub fn requires_priv(self) -> bool {
        self == Self::AuthPriv
    }
}

impl std::fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::NoAuthNoPriv => "noAuthNoPriv",
            Self::AuthNoPriv => "authNoPriv",
            Self::AuthPriv => "authPriv",
        })
    }
}

impl std::str::FromStr for SecurityLevel {
    type Err = Box<crate::error::Error>;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "noauthnopriv" => Ok(Self::NoAuthNoPriv),
            "authnopriv" => Ok(Self::AuthNoPriv),
            "authpriv" => Ok(Self::AuthPriv),
            _ => Err(crate::error::Error::pre_condition(format!(
                "invalid SNMPv3 security level '{}'",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsgFlags {
    pub security_level: SecurityLevel,
    pub reportable: bool,
}

impl MsgFlags {
    pub fn new(security_level: SecurityLevel, reportable: bool) -> Self {
        Self {
            security_level,
            reportable,
        }
    }

    pub fn to_byte(self) -> u8 {
        self.security_level.to_flags() | if self.reportable { 0x04 } else { 0 }
    }
}

#[derive(Debug, Clone)]
pub struct MsgGlobalData {
    pub msg_id: i32,
    pub msg_max_size: i32,
    pub msg_flags: MsgFlags,
}

impl MsgGlobalData {
    pub fn new(msg_id: i32, msg_max_size: i32, msg_flags: MsgFlags) -> Self {
        Self {
            msg_id,
            msg_max_size,
            msg_flags,
        }
    }

    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_sequence(|buf| {
            buf.push_integer(USM_SECURITY_MODEL);
            buf.push_octet_string(&[self.msg_flags.to_byte()]);
            buf.push_integer(self.msg_max_size);
            buf.push_integer(self.msg_id);
        });
    }

    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut seq = decoder.read_sequence()?;
        let msg_id = seq.read_integer()?;
        let msg_max_size = seq.read_integer()?;
        let flags = seq.read_octet_string()?;
        let security_level = flags
            .first()
            .and_then(|b| SecurityLevel::from_flags(*b))
            .filter(|_| flags.len() == 1)
            .ok_or_else(|| seq.reject(DecodeErrorKind::InvalidMsgFlags))?;
        let reportable = flags[0] & 0x04 != 0;
        let model = seq.read_integer()?;
        if model != USM_SECURITY_MODEL {
            return Err(seq.reject(DecodeErrorKind::UnknownSecurityModel(model)));
        }
        Ok(Self {
            msg_id,
            msg_max_size,
            msg_flags: MsgFlags::new(security_level, reportable),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ScopedPdu {
    pub context_engine_id: Bytes,
    pub context_name: Bytes,
    pub pdu: Pdu,
}

impl ScopedPdu {
    pub fn new(context_engine_id: impl Into<Bytes>, context_name: impl Into<Bytes>, pdu: Pdu) -> Self {
        Self {
            context_engine_id: context_engine_id.into(),
            context_name: context_name.into(),
            pdu,
        }
    }

    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_sequence(|buf| {
            self.pdu.encode(buf);
            buf.push_octet_string(&self.context_name);
            buf.push_octet_string(&self.context_engine_id);
        });
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = EncodeBuf::new();
        self.encode(&mut buf);
        buf.finish()
    }

    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut seq = decoder.read_sequence()?;
        Ok(Self {
            context_engine_id: seq.read_octet_string()?,
            context_name: seq.read_octet_string()?,
            pdu: Pdu::decode(&mut seq)?,
        })
    }
}

#[derive(Debug, Clone)]
pub enum V3MessageData {
    Plaintext(ScopedPdu),
    /// Ciphertext of an encoded ScopedPDU.
    Encrypted(Bytes),
}

#[derive(Debug, Clone)]
pub struct V3Message {
    pub global_data: MsgGlobalData,
    /// Encoded USM security parameters.
    pub security_params: Bytes,
    pub data: V3MessageData,
}

impl V3Message {
    pub fn pdu(&self) -> Option<&Pdu> {
        match &self.data {
            V3MessageData::Plaintext(scoped) => Some(&scoped.pdu),
            V3MessageData::Encrypted(_) => None,
        }
    }

    pub fn msg_id(&self) -> i32 {
        self.global_data.msg_id
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::new();
        buf.push_sequence(|buf| {
            match &self.data {
                V3MessageData::Plaintext(scoped) => scoped.encode(buf),
                V3MessageData::Encrypted(ciphertext) => buf.push_octet_string(ciphertext),
            }
            buf.push_octet_string(&self.security_params);
            self.global_data.encode(buf);
            buf.push_integer(3);
        });
        buf.finish()
    }

    /// Decode what follows the version field.
    pub(crate) fn decode_body(seq: &mut Decoder) -> Result<Self> {
        let global_data = MsgGlobalData::decode(seq)?;
        let security_params = seq.read_octet_string()?;
        let data = match seq.peek_tag() {
            Some(tag::universal::OCTET_STRING) => V3MessageData::Encrypted(seq.read_octet_string()?),
            _ => V3MessageData::Plaintext(ScopedPdu::decode(seq)?),
        };
        Ok(Self {
            global_data,
            security_params,
            data,
        })
    }
}
