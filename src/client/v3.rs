//! SNMPv3 request path: engine discovery, key localisation, message
//! protection and Report handling.

use bytes::Bytes;
use tracing::instrument;

use super::Client;
use crate::ber::Decoder;
use crate::error::internal::AuthErrorKind;
use crate::error::{Error, ErrorStatus, Result};
use crate::message::{
    MsgFlags, MsgGlobalData, ScopedPdu, SecurityLevel, V3Message, V3MessageData,
};
use crate::pdu::{Pdu, PduType};
use crate::transport::Transport;
use crate::util::encode_hex_lower;
use crate::v3::engine::{DEFAULT_MSG_MAX_SIZE, ReportKind};
use crate::v3::{AuthProtocol, EngineState, LocalizedKey, PrivKey, PrivProtocol, UsmSecurityParams};

/// USM credentials.
#[derive(Clone)]
pub struct V3SecurityConfig {
    pub username: Bytes,
    pub context_name: Bytes,
    pub auth: Option<(AuthProtocol, Vec<u8>)>,
    pub privacy: Option<(PrivProtocol, Vec<u8>)>,
}

impl V3SecurityConfig {
    pub fn new(username: impl Into<Bytes>) -> Self {
        Self {
            username: username.into(),
            context_name: Bytes::new(),
            auth: None,
            privacy: None,
        }
    }

    pub fn auth(mut self, protocol: AuthProtocol, password: impl Into<Vec<u8>>) -> Self {
        self.auth = Some((protocol, password.into()));
        self
    }

    pub fn privacy(mut self, protocol: PrivProtocol, password: impl Into<Vec<u8>>) -> Self {
        self.privacy = Some((protocol, password.into()));
        self
    }

    pub fn context(mut self, name: impl Into<Bytes>) -> Self {
        self.context_name = name.into();
        self
    }

    pub fn security_level(&self) -> SecurityLevel {
        match (&self.auth, &self.privacy) {
            (None, _) => SecurityLevel::NoAuthNoPriv,
            (Some(_), None) => SecurityLevel::AuthNoPriv,
            (Some(_), Some(_)) => SecurityLevel::AuthPriv,
        }
    }

    fn localize(&self, engine_id: &[u8]) -> DerivedKeys {
        let auth = self
            .auth
            .as_ref()
            .map(|(proto, pass)| LocalizedKey::from_password(*proto, pass, engine_id));
        let privacy = match (&self.auth, &self.privacy) {
            (Some((auth_proto, _)), Some((priv_proto, pass))) => Some(PrivKey::from_password(
                *auth_proto,
                *priv_proto,
                pass,
                engine_id,
            )),
            _ => None,
        };
        DerivedKeys { auth, privacy }
    }
}

impl std::fmt::Debug for V3SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("V3SecurityConfig")
            .field("username", &String::from_utf8_lossy(&self.username))
            .field("context_name", &String::from_utf8_lossy(&self.context_name))
            .field("auth", &self.auth.as_ref().map(|(p, _)| p))
            .field("privacy", &self.privacy.as_ref().map(|(p, _)| p))
            .finish()
    }
}

struct DerivedKeys {
    auth: Option<LocalizedKey>,
    privacy: Option<PrivKey>,
}

/// Engine state plus the keys localized to it.
pub(super) struct EngineSession {
    state: EngineState,
    keys: std::sync::Arc<DerivedKeys>,
}

enum Reply {
    Pdu(Pdu),
    /// Engine state changed; rebuild and resend.
    Resync,
}

impl<T: Transport> Client<T> {
    fn security(&self) -> Result<&V3SecurityConfig> {
        self.inner
            .config
            .v3_security
            .as_ref()
            .ok_or_else(|| Error::pre_condition("SNMPv3 requested without USM credentials"))
    }

    /// Discover the authoritative engine unless already known.
    #[instrument(level = "debug", skip(self), fields(snmp.target = %self.peer_addr()))]
    async fn ensure_engine(&self) -> Result<(EngineState, std::sync::Arc<DerivedKeys>)> {
        if let Some(session) = self.inner.engine.read().as_ref() {
            return Ok((session.state.clone(), session.keys.clone()));
        }

        let msg_id = self.next_request_id();
        let probe = V3Message {
            global_data: MsgGlobalData::new(
                msg_id,
                DEFAULT_MSG_MAX_SIZE,
                MsgFlags::new(SecurityLevel::NoAuthNoPriv, true),
            ),
            security_params: UsmSecurityParams::discovery().encode(),
            data: V3MessageData::Plaintext(ScopedPdu::new(
                Bytes::new(),
                Bytes::new(),
                Pdu::get_request(msg_id, &[]),
            )),
        };
        let raw = self.exchange(msg_id, &probe.encode()).await?;
        let response = decode_v3(raw)?;
        let params = UsmSecurityParams::decode(response.security_params.clone())?;
        let state = EngineState::from_report(&params).ok_or_else(|| {
            Error::MalformedResponse {
                target: self.peer_addr(),
            }
            .boxed()
        })?;

        tracing::debug!(target: "async_devmon::client", { snmp.engine_id = %encode_hex_lower(&state.engine_id), snmp.engine_boots = state.engine_boots, snmp.engine_time = state.engine_time }, "discovered engine");
        Ok(self.install_engine(state))
    }

    fn install_engine(&self, state: EngineState) -> (EngineState, std::sync::Arc<DerivedKeys>) {
        let mut guard = self.inner.engine.write();
        let keys = match guard.as_ref() {
            Some(existing) if existing.state.engine_id == state.engine_id => existing.keys.clone(),
            _ => match self.security() {
                Ok(security) => std::sync::Arc::new(security.localize(&state.engine_id)),
                Err(_) => std::sync::Arc::new(DerivedKeys {
                    auth: None,
                    privacy: None,
                }),
            },
        };
        *guard = Some(EngineSession {
            state: state.clone(),
            keys: keys.clone(),
        });
        (state, keys)
    }

    fn build_v3_message(
        &self,
        pdu: &Pdu,
        engine: &EngineState,
        keys: &DerivedKeys,
        security: &V3SecurityConfig,
    ) -> Result<Vec<u8>> {
        let level = security.security_level();
        let boots = engine.engine_boots;
        let time = engine.estimated_time();
        let scoped = ScopedPdu::new(
            engine.engine_id.clone(),
            security.context_name.clone(),
            pdu.clone(),
        );

        let mut params = UsmSecurityParams::new(
            engine.engine_id.clone(),
            boots,
            time,
            security.username.clone(),
        );

        let data = match (&keys.privacy, level.requires_priv()) {
            (Some(privacy), true) => {
                let (ciphertext, priv_params) =
                    privacy.encrypt(&scoped.to_bytes(), boots, time, &self.inner.salt)?;
                params = params.with_priv_params(priv_params);
                V3MessageData::Encrypted(ciphertext)
            }
            _ => V3MessageData::Plaintext(scoped),
        };

        if let Some(auth) = keys.auth.as_ref().filter(|_| level.requires_auth()) {
            params = params.with_auth_placeholder(auth.mac_len());
        }

        let message = V3Message {
            global_data: MsgGlobalData::new(
                pdu.request_id,
                DEFAULT_MSG_MAX_SIZE,
                MsgFlags::new(level, true),
            ),
            security_params: params.encode(),
            data,
        };
        let mut encoded = message.encode().to_vec();

        if let Some(auth) = keys.auth.as_ref().filter(|_| level.requires_auth()) {
            let (offset, _) =
                UsmSecurityParams::find_auth_params_offset(&encoded).ok_or_else(|| {
                    tracing::debug!(target: "async_devmon::client", { kind = %AuthErrorKind::AuthParamsNotFound }, "cannot sign request");
                    Error::Auth {
                        target: self.peer_addr(),
                    }
                    .boxed()
                })?;
            auth.sign(&mut encoded, offset);
        }
        Ok(encoded)
    }

    fn auth_error(&self, kind: AuthErrorKind) -> Box<Error> {
        tracing::debug!(target: "async_devmon::client", { snmp.target = %self.peer_addr(), kind = %kind }, "authentication failure");
        Error::Auth {
            target: self.peer_addr(),
        }
        .boxed()
    }

    /// Verify, decrypt and classify one response.
    fn open_v3_response(
        &self,
        raw: Bytes,
        keys: &DerivedKeys,
        may_resync: bool,
    ) -> Result<Reply> {
        let response = decode_v3(raw.clone())?;
        let params = UsmSecurityParams::decode(response.security_params.clone())?;
        let authenticated = response.global_data.msg_flags.security_level.requires_auth();

        if authenticated {
            let auth = keys
                .auth
                .as_ref()
                .ok_or_else(|| self.auth_error(AuthErrorKind::HmacMismatch))?;
            if params.auth_params.len() != auth.mac_len() {
                return Err(self.auth_error(AuthErrorKind::WrongMacLength {
                    expected: auth.mac_len(),
                    actual: params.auth_params.len(),
                }));
            }
            let (offset, _) = UsmSecurityParams::find_auth_params_offset(&raw)
                .ok_or_else(|| self.auth_error(AuthErrorKind::AuthParamsNotFound))?;
            if !auth.verify(&raw, offset) {
                return Err(self.auth_error(AuthErrorKind::HmacMismatch));
            }
        }

        let pdu = match response.data {
            V3MessageData::Plaintext(scoped) => scoped.pdu,
            V3MessageData::Encrypted(ciphertext) => {
                let privacy = keys.privacy.as_ref().ok_or_else(|| {
                    Error::MalformedResponse {
                        target: self.peer_addr(),
                    }
                    .boxed()
                })?;
                let plaintext = privacy.decrypt(
                    &ciphertext,
                    params.engine_boots,
                    params.engine_time,
                    &params.priv_params,
                )?;
                ScopedPdu::decode(&mut Decoder::new(plaintext))?.pdu
            }
        };

        if let Some(report) = ReportKind::classify(&pdu) {
            report.log();
            if report.is_recoverable() && may_resync {
                if let Some(state) = EngineState::from_report(&params) {
                    self.install_engine(state);
                    return Ok(Reply::Resync);
                }
            }
            return Err(match report {
                ReportKind::Other => Error::Snmp {
                    target: self.peer_addr(),
                    status: ErrorStatus::GenErr,
                    index: 0,
                    oid: pdu.varbinds.first().map(|vb| vb.oid.clone()),
                }
                .boxed(),
                _ => Error::Auth {
                    target: self.peer_addr(),
                }
                .boxed(),
            });
        }

        if authenticated {
            if let Some(session) = self.inner.engine.write().as_mut() {
                session.state.update_time(params.engine_boots, params.engine_time);
            }
        }
        Ok(Reply::Pdu(pdu))
    }

    #[instrument(
        level = "debug",
        skip(self, pdu),
        fields(snmp.target = %self.peer_addr(), snmp.pdu_type = %pdu.pdu_type)
    )]
    pub(super) async fn send_v3(&self, mut pdu: Pdu) -> Result<Pdu> {
        let security = self.security()?;
        let mut may_resync = true;

        loop {
            let (engine, keys) = self.ensure_engine().await?;
            let data = self.build_v3_message(&pdu, &engine, &keys, security)?;
            let raw = self.exchange(pdu.request_id, &data).await?;

            match self.open_v3_response(raw, &keys, may_resync)? {
                Reply::Pdu(response) => {
                    if response.pdu_type != PduType::Response
                        || response.request_id != pdu.request_id
                    {
                        return Err(Error::MalformedResponse {
                            target: self.peer_addr(),
                        }
                        .boxed());
                    }
                    return self.check_response(response);
                }
                Reply::Resync => {
                    tracing::debug!(target: "async_devmon::client", "engine resynchronised, resending");
                    may_resync = false;
                    pdu.request_id = self.next_request_id();
                }
            }
        }
    }
}

fn decode_v3(raw: Bytes) -> Result<V3Message> {
    let mut decoder = Decoder::new(raw);
    let mut seq = decoder.read_sequence()?;
    let version = seq.read_integer()?;
    if version != 3 {
        return Err(seq.reject(crate::error::internal::DecodeErrorKind::UnknownVersion(version)));
    }
    V3Message::decode_body(&mut seq)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn security_level_follows_credentials() {
        let none = V3SecurityConfig::new(&b"ro"[..]);
        assert_eq!(none.security_level(), SecurityLevel::NoAuthNoPriv);
        let auth = none.clone().auth(AuthProtocol::Sha1, b"authpass".to_vec());
        assert_eq!(auth.security_level(), SecurityLevel::AuthNoPriv);
        let full = auth.privacy(PrivProtocol::Aes128, b"privpass".to_vec());
        assert_eq!(full.security_level(), SecurityLevel::AuthPriv);
    }

    #[test]
    fn debug_hides_passwords() {
        let config = V3SecurityConfig::new(&b"admin"[..]).auth(AuthProtocol::Md5, b"s3cret".to_vec());
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("MD5") || rendered.contains("Md5"));
    }

    #[test]
    fn keys_localize_per_engine() {
        let config = V3SecurityConfig::new(&b"admin"[..])
            .auth(AuthProtocol::Sha1, b"authpass".to_vec())
            .privacy(PrivProtocol::Des, b"privpass".to_vec());
        let a = config.localize(b"engine-a");
        let b = config.localize(b"engine-b");
        assert_ne!(
            a.auth.as_ref().unwrap().as_bytes(),
            b.auth.as_ref().unwrap().as_bytes()
        );
        assert!(a.privacy.is_some());
    }
}
