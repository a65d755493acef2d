//! Privacy protocols (RFC 3414 Section 8, RFC 3826).
//!
//! DES-CBC: privParameters = engineBoots || counter, IV = preIV XOR salt.
//! AES-CFB: privParameters = 64-bit counter, IV = engineBoots || engineTime || salt.

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::auth::{digest, localize, password_to_key};
use super::{AuthProtocol, PrivProtocol};
use crate::error::internal::CryptoErrorKind;
use crate::error::{Error, Result, UNKNOWN_TARGET};

/// Salt source shared by every encryption of one client.
#[derive(Debug)]
pub struct SaltCounter(AtomicU64);

impl SaltCounter {
    /// Seeded from the OS random source.
    pub fn new() -> Self {
        let mut buf = [0u8; 8];
        if getrandom::fill(&mut buf).is_err() {
            tracing::warn!(target: "async_devmon::v3", "OS random source unavailable, salt seeded from clock");
            let nanos = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(1);
            buf = nanos.to_ne_bytes();
        }
        Self(AtomicU64::new(u64::from_ne_bytes(buf)))
    }

    pub fn from_value(value: u64) -> Self {
        Self(AtomicU64::new(value))
    }

    /// Next salt; zero is skipped.
    pub fn next(&self) -> u64 {
        loop {
            let v = self.0.fetch_add(1, Ordering::Relaxed);
            if v != 0 {
                return v;
            }
        }
    }
}

impl Default for SaltCounter {
    fn default() -> Self {
        Self::new()
    }
}

fn crypto_error(kind: CryptoErrorKind) -> Box<Error> {
    tracing::debug!(target: "async_devmon::crypto", { kind = %kind }, "privacy error");
    Error::MalformedResponse {
        target: UNKNOWN_TARGET,
    }
    .boxed()
}

/// Localized privacy key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivKey {
    key: Vec<u8>,
    #[zeroize(skip)]
    protocol: PrivProtocol,
}

impl PrivKey {
    /// Derive with the auth protocol's hash, extending short keys with
    /// Kul || H(Kul) || H(Kul || H(Kul)) ... as net-snmp does for AES-192/256.
    pub fn from_password(
        auth: AuthProtocol,
        protocol: PrivProtocol,
        password: &[u8],
        engine_id: &[u8],
    ) -> Self {
        let mut master = password_to_key(auth, password);
        let mut key = localize(auth, &master, engine_id);
        master.zeroize();
        while key.len() < protocol.key_len() {
            let more = digest(auth, &key);
            key.extend_from_slice(&more);
        }
        key.truncate(protocol.key_len());
        Self { key, protocol }
    }

    pub fn from_bytes(protocol: PrivProtocol, key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            protocol,
        }
    }

    pub fn protocol(&self) -> PrivProtocol {
        self.protocol
    }

    /// Returns (ciphertext, privParameters).
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        boots: u32,
        time: u32,
        salt: &SaltCounter,
    ) -> Result<(Bytes, Bytes)> {
        let counter = salt.next();
        match self.protocol {
            PrivProtocol::Des => {
                use cbc::cipher::{BlockEncryptMut, KeyIvInit, block_padding::NoPadding};

                let mut params = [0u8; 8];
                params[..4].copy_from_slice(&boots.to_be_bytes());
                params[4..].copy_from_slice(&(counter as u32).to_be_bytes());
                let iv = self.des_iv(&params);

                let padded = plaintext.len().div_ceil(8) * 8;
                let mut buf = vec![0u8; padded.max(8)];
                buf[..plaintext.len()].copy_from_slice(plaintext);
                let len = buf.len();
                let cipher = cbc::Encryptor::<des::Des>::new_from_slices(&self.key[..8], &iv)
                    .map_err(|_| crypto_error(CryptoErrorKind::CipherError))?;
                let out = cipher
                    .encrypt_padded_mut::<NoPadding>(&mut buf, len)
                    .map_err(|_| crypto_error(CryptoErrorKind::CipherError))?;
                Ok((Bytes::copy_from_slice(out), Bytes::copy_from_slice(&params)))
            }
            _ => {
                let params = counter.to_be_bytes();
                let iv = aes_iv(boots, time, &params);
                let mut buf = plaintext.to_vec();
                self.aes_apply(&iv, &mut buf, true)?;
                Ok((Bytes::from(buf), Bytes::copy_from_slice(&params)))
            }
        }
    }

    pub fn decrypt(&self, ciphertext: &[u8], boots: u32, time: u32, params: &[u8]) -> Result<Bytes> {
        if params.len() != 8 {
            return Err(crypto_error(CryptoErrorKind::InvalidPrivParamsLength {
                expected: 8,
                actual: params.len(),
            }));
        }
        match self.protocol {
            PrivProtocol::Des => {
                use cbc::cipher::{BlockDecryptMut, KeyIvInit, block_padding::NoPadding};

                if ciphertext.len() % 8 != 0 {
                    return Err(crypto_error(CryptoErrorKind::InvalidCiphertextLength {
                        length: ciphertext.len(),
                        block_size: 8,
                    }));
                }
                let iv = self.des_iv(params);
                let mut buf = ciphertext.to_vec();
                let cipher = cbc::Decryptor::<des::Des>::new_from_slices(&self.key[..8], &iv)
                    .map_err(|_| crypto_error(CryptoErrorKind::CipherError))?;
                let out = cipher
                    .decrypt_padded_mut::<NoPadding>(&mut buf)
                    .map_err(|_| crypto_error(CryptoErrorKind::CipherError))?;
                Ok(Bytes::copy_from_slice(out))
            }
            _ => {
                let iv = aes_iv(boots, time, params);
                let mut buf = ciphertext.to_vec();
                self.aes_apply(&iv, &mut buf, false)?;
                Ok(Bytes::from(buf))
            }
        }
    }

    fn des_iv(&self, salt: &[u8]) -> [u8; 8] {
        let mut iv = [0u8; 8];
        for (i, b) in iv.iter_mut().enumerate() {
            *b = self.key[8 + i] ^ salt[i];
        }
        iv
    }

    fn aes_apply(&self, iv: &[u8; 16], buf: &mut [u8], encrypt: bool) -> Result<()> {
        use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};

        macro_rules! run {
            ($aes:ty) => {{
                if encrypt {
                    cfb_mode::Encryptor::<$aes>::new_from_slices(&self.key, iv)
                        .map_err(|_| crypto_error(CryptoErrorKind::CipherError))?
                        .encrypt(buf)
                } else {
                    cfb_mode::Decryptor::<$aes>::new_from_slices(&self.key, iv)
                        .map_err(|_| crypto_error(CryptoErrorKind::CipherError))?
                        .decrypt(buf)
                }
            }};
        }

        match self.protocol {
            PrivProtocol::Aes128 => run!(aes::Aes128),
            PrivProtocol::Aes192 => run!(aes::Aes192),
            PrivProtocol::Aes256 => run!(aes::Aes256),
            PrivProtocol::Des => return Err(crypto_error(CryptoErrorKind::CipherError)),
        }
        Ok(())
    }
}

fn aes_iv(boots: u32, time: u32, salt: &[u8]) -> [u8; 16] {
    let mut iv = [0u8; 16];
    iv[..4].copy_from_slice(&boots.to_be_bytes());
    iv[4..8].copy_from_slice(&time.to_be_bytes());
    iv[8..].copy_from_slice(&salt[..8]);
    iv
}

impl std::fmt::Debug for PrivKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivKey")
            .field("protocol", &self.protocol)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_protocol_decrypts_its_own_output() {
        let engine = b"\x80\x00\x1f\x88\x04test";
        let salt = SaltCounter::from_value(41);
        for (auth, proto) in [
            (AuthProtocol::Md5, PrivProtocol::Des),
            (AuthProtocol::Sha1, PrivProtocol::Aes128),
            (AuthProtocol::Sha1, PrivProtocol::Aes192),
            (AuthProtocol::Sha256, PrivProtocol::Aes256),
        ] {
            let key = PrivKey::from_password(auth, proto, b"privpass123", engine);
            let plain = b"scoped pdu bytes of odd length".to_vec();
            let (ct, params) = key.encrypt(&plain, 3, 1200, &salt).unwrap();
            assert_ne!(&ct[..plain.len()], &plain[..]);
            let back = key.decrypt(&ct, 3, 1200, &params).unwrap();
            assert_eq!(&back[..plain.len()], &plain[..]);
        }
    }

    #[test]
    fn extended_key_has_protocol_length() {
        let key = PrivKey::from_password(AuthProtocol::Md5, PrivProtocol::Aes256, b"password", b"e");
        assert_eq!(key.key.len(), 32);
    }

    #[test]
    fn salt_skips_zero() {
        let salt = SaltCounter::from_value(u64::MAX);
        assert_eq!(salt.next(), u64::MAX);
        assert_eq!(salt.next(), 1);
    }

    #[test]
    fn bad_params_length_rejected() {
        let key = PrivKey::from_bytes(PrivProtocol::Aes128, vec![0u8; 16]);
        assert!(key.decrypt(&[0u8; 16], 0, 0, &[0u8; 4]).is_err());
    }
}
