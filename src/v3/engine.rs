//! Authoritative engine state and Report classification (RFC 3414 Section 4).
//!
//! A v3 exchange starts with a discovery probe (noAuthNoPriv, empty engine
//! ID). The agent answers with a Report carrying usmStatsUnknownEngineIDs and
//! its engine ID, boots and time in the USM parameters.

use std::time::Instant;

use bytes::Bytes;

use crate::error::internal::AuthErrorKind;
use crate::oid::Oid;
use crate::pdu::{Pdu, PduType};
use crate::v3::UsmSecurityParams;

/// Largest snmpEngineTime (2^31 - 1).
pub const MAX_ENGINE_TIME: u32 = 2_147_483_647;

/// msgMaxSize we advertise: 65535 minus IPv4 and UDP headers.
pub const DEFAULT_MSG_MAX_SIZE: i32 = 65507;

/// usmStats prefix: 1.3.6.1.6.3.15.1.1.
const USM_STATS: [u32; 9] = [1, 3, 6, 1, 6, 3, 15, 1, 1];

#[derive(Debug, Clone)]
pub struct EngineState {
    pub engine_id: Bytes,
    pub engine_boots: u32,
    pub engine_time: u32,
    synced_at: Instant,
}

impl EngineState {
    pub fn new(engine_id: Bytes, engine_boots: u32, engine_time: u32) -> Self {
        Self {
            engine_id,
            engine_boots,
            engine_time,
            synced_at: Instant::now(),
        }
    }

    /// Engine state advertised in a Report's security parameters.
    pub fn from_report(params: &UsmSecurityParams) -> Option<Self> {
        if params.engine_id.is_empty() {
            tracing::debug!(target: "async_devmon::v3", "report carried an empty engine ID");
            return None;
        }
        Some(Self::new(
            params.engine_id.clone(),
            params.engine_boots,
            params.engine_time,
        ))
    }

    /// Synced time plus local elapsed seconds, capped at [`MAX_ENGINE_TIME`].
    pub fn estimated_time(&self) -> u32 {
        let elapsed = self.synced_at.elapsed().as_secs().min(u64::from(u32::MAX)) as u32;
        self.engine_time.saturating_add(elapsed).min(MAX_ENGINE_TIME)
    }

    /// Resync from an authenticated response; only moves forward.
    pub fn update_time(&mut self, boots: u32, time: u32) -> bool {
        if boots > self.engine_boots
            || (boots == self.engine_boots && time > self.estimated_time())
        {
            self.engine_boots = boots;
            self.engine_time = time;
            self.synced_at = Instant::now();
            true
        } else {
            false
        }
    }
}

/// Which usmStats counter a Report PDU carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    UnsupportedSecLevel,
    NotInTimeWindow,
    UnknownUserName,
    UnknownEngineId,
    WrongDigest,
    DecryptionError,
    Other,
}

impl ReportKind {
    /// `None` when `pdu` is not a Report.
    pub fn classify(pdu: &Pdu) -> Option<Self> {
        if pdu.pdu_type != PduType::Report {
            return None;
        }
        let Some(vb) = pdu.varbinds.first() else {
            return Some(Self::Other);
        };
        Some(Self::from_oid(&vb.oid))
    }

    fn from_oid(oid: &Oid) -> Self {
        match oid.strip_prefix(&Oid::from_slice(&USM_STATS)) {
            Some([1, ..]) => Self::UnsupportedSecLevel,
            Some([2, ..]) => Self::NotInTimeWindow,
            Some([3, ..]) => Self::UnknownUserName,
            Some([4, ..]) => Self::UnknownEngineId,
            Some([5, ..]) => Self::WrongDigest,
            Some([6, ..]) => Self::DecryptionError,
            _ => Self::Other,
        }
    }

    /// Whether rediscovering the engine and retrying can succeed.
    pub fn is_recoverable(self) -> bool {
        matches!(self, Self::NotInTimeWindow | Self::UnknownEngineId)
    }

    pub(crate) fn log(self) {
        let kind = match self {
            Self::NotInTimeWindow => AuthErrorKind::NotInTimeWindow,
            Self::UnknownEngineId => AuthErrorKind::UnknownEngineId,
            Self::UnknownUserName => AuthErrorKind::UnknownUserName,
            Self::WrongDigest => AuthErrorKind::WrongDigest,
            _ => {
                tracing::debug!(target: "async_devmon::v3", { report = ?self }, "report received");
                return;
            }
        };
        tracing::debug!(target: "async_devmon::v3", { kind = %kind }, "report received");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;
    use crate::value::Value;
    use crate::varbind::VarBind;

    fn report(oid: Oid) -> Pdu {
        let mut pdu = Pdu::get_request(1, &[]);
        pdu.pdu_type = PduType::Report;
        pdu.varbinds.push(VarBind::new(oid, Value::Counter32(1)));
        pdu
    }

    #[test]
    fn reports_are_classified() {
        let pdu = report(oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 4, 0));
        assert_eq!(ReportKind::classify(&pdu), Some(ReportKind::UnknownEngineId));
        let pdu = report(oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 2, 0));
        assert!(ReportKind::classify(&pdu).unwrap().is_recoverable());
        let pdu = report(oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 5, 0));
        assert_eq!(ReportKind::classify(&pdu), Some(ReportKind::WrongDigest));
        assert_eq!(ReportKind::classify(&Pdu::get_request(1, &[])), None);
    }

    #[test]
    fn time_only_moves_forward() {
        let mut state = EngineState::new(Bytes::from_static(b"e"), 2, 1000);
        assert!(!state.update_time(2, 10));
        assert!(!state.update_time(1, 5000));
        assert!(state.update_time(2, 5000));
        assert_eq!(state.estimated_time(), 5000);
        assert!(state.update_time(3, 0));
        assert_eq!(state.engine_boots, 3);
    }

    #[test]
    fn empty_engine_id_is_not_usable() {
        assert!(EngineState::from_report(&UsmSecurityParams::discovery()).is_none());
    }
}
