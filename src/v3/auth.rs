//! Key derivation and HMAC (RFC 3414 Section A.2, RFC 7860).

use digest::{Digest, KeyInit, Mac};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::AuthProtocol;

/// Run `$body` with `$D` bound to the digest type of `$proto`.
macro_rules! with_digest {
    ($proto:expr, $D:ident => $body:expr) => {
        match $proto {
            AuthProtocol::Md5 => {
                type $D = md5::Md5;
                $body
            }
            AuthProtocol::Sha1 => {
                type $D = sha1::Sha1;
                $body
            }
            AuthProtocol::Sha224 => {
                type $D = sha2::Sha224;
                $body
            }
            AuthProtocol::Sha256 => {
                type $D = sha2::Sha256;
                $body
            }
            AuthProtocol::Sha384 => {
                type $D = sha2::Sha384;
                $body
            }
            AuthProtocol::Sha512 => {
                type $D = sha2::Sha512;
                $body
            }
        }
    };
}

pub(crate) use with_digest;

/// Key bound to one authoritative engine.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct LocalizedKey {
    key: Vec<u8>,
    #[zeroize(skip)]
    protocol: AuthProtocol,
}

impl LocalizedKey {
    /// Ku = H(1 MiB of repeated password), Kul = H(Ku || engineID || Ku).
    pub fn from_password(protocol: AuthProtocol, password: &[u8], engine_id: &[u8]) -> Self {
        let mut master = password_to_key(protocol, password);
        let key = localize(protocol, &master, engine_id);
        master.zeroize();
        Self { key, protocol }
    }

    pub fn from_bytes(protocol: AuthProtocol, key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            protocol,
        }
    }

    pub fn protocol(&self) -> AuthProtocol {
        self.protocol
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }

    pub fn mac_len(&self) -> usize {
        self.protocol.mac_len()
    }

    /// HMAC over `data`, truncated to the protocol's MAC length.
    pub fn compute_hmac(&self, data: &[u8]) -> Vec<u8> {
        let full = with_digest!(self.protocol, D => {
            let mut mac = <hmac::Hmac<D> as KeyInit>::new_from_slice(&self.key)
                .expect("HMAC accepts keys of any length");
            Mac::update(&mut mac, data);
            mac.finalize().into_bytes().to_vec()
        });
        full[..self.mac_len()].to_vec()
    }

    pub fn verify_hmac(&self, data: &[u8], expected: &[u8]) -> bool {
        let computed = self.compute_hmac(data);
        computed.len() == expected.len() && bool::from(computed.ct_eq(expected))
    }

    /// Fill the zeroed MAC placeholder at `offset` in an encoded message.
    pub fn sign(&self, message: &mut [u8], offset: usize) {
        let mac = self.compute_hmac(message);
        message[offset..offset + mac.len()].copy_from_slice(&mac);
    }

    /// Check the MAC at `offset`, computed with that field zeroed.
    pub fn verify(&self, message: &[u8], offset: usize) -> bool {
        let len = self.mac_len();
        let Some(received) = message.get(offset..offset + len) else {
            return false;
        };
        let mut copy = message.to_vec();
        copy[offset..offset + len].fill(0);
        self.verify_hmac(&copy, received)
    }
}

impl std::fmt::Debug for LocalizedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalizedKey")
            .field("protocol", &self.protocol)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

pub(crate) fn password_to_key(protocol: AuthProtocol, password: &[u8]) -> Vec<u8> {
    with_digest!(protocol, D => expand::<D>(password))
}

fn expand<D: Digest>(password: &[u8]) -> Vec<u8> {
    const EXPANSION: usize = 1 << 20;

    if password.is_empty() {
        return vec![0u8; <D as Digest>::output_size()];
    }
    let mut hasher = D::new();
    let mut chunk = [0u8; 64];
    let mut idx = 0;
    for _ in 0..EXPANSION / chunk.len() {
        for byte in chunk.iter_mut() {
            *byte = password[idx % password.len()];
            idx += 1;
        }
        hasher.update(chunk);
    }
    hasher.finalize().to_vec()
}

pub(crate) fn localize(protocol: AuthProtocol, master: &[u8], engine_id: &[u8]) -> Vec<u8> {
    with_digest!(protocol, D => {
        let mut h = D::new();
        h.update(master);
        h.update(engine_id);
        h.update(master);
        h.finalize().to_vec()
    })
}

/// One digest of `data`, used for key extension.
pub(crate) fn digest(protocol: AuthProtocol, data: &[u8]) -> Vec<u8> {
    with_digest!(protocol, D => D::digest(data).to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::{decode_hex, encode_hex_lower};

    const ENGINE: &str = "000000000000000000000002";

    #[test]
    fn rfc3414_md5_vectors() {
        let ku = password_to_key(AuthProtocol::Md5, b"maplesyrup");
        assert_eq!(encode_hex_lower(&ku), "9faf3283884e92834ebc9847d8edd963");
        let engine = decode_hex(ENGINE).unwrap();
        let kul = LocalizedKey::from_password(AuthProtocol::Md5, b"maplesyrup", &engine);
        assert_eq!(
            encode_hex_lower(kul.as_bytes()),
            "526f5eed9fcce26f8964c2930787d82b"
        );
    }

    #[test]
    fn rfc3414_sha1_vectors() {
        let ku = password_to_key(AuthProtocol::Sha1, b"maplesyrup");
        assert_eq!(
            encode_hex_lower(&ku),
            "9fb5cc0381497b3793528939ff788d5d79145211"
        );
        let engine = decode_hex(ENGINE).unwrap();
        let kul = LocalizedKey::from_password(AuthProtocol::Sha1, b"maplesyrup", &engine);
        assert_eq!(
            encode_hex_lower(kul.as_bytes()),
            "6695febc9288e36282235fc7151f128497b38f3f"
        );
    }

    #[test]
    fn sign_then_verify() {
        let key = LocalizedKey::from_bytes(AuthProtocol::Sha256, vec![7u8; 32]);
        let mut msg = vec![1u8; 80];
        msg[20..44].fill(0);
        key.sign(&mut msg, 20);
        assert!(key.verify(&msg, 20));
        msg[0] ^= 0xFF;
        assert!(!key.verify(&msg, 20));
    }

    #[test]
    fn mac_lengths() {
        for (proto, len) in [
            (AuthProtocol::Md5, 12),
            (AuthProtocol::Sha1, 12),
            (AuthProtocol::Sha224, 16),
            (AuthProtocol::Sha512, 48),
        ] {
            let key = LocalizedKey::from_bytes(proto, vec![1u8; proto.digest_len()]);
            assert_eq!(key.compute_hmac(b"x").len(), len);
        }
    }
}
