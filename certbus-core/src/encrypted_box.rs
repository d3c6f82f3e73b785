//! Fingerprint-tagged hybrid-encryption envelope for short secrets.
//!
//! Wire format of `ciphertext`: `[u16 wrapped_key_len][wrapped_key][12-byte nonce][aes_gcm_ciphertext]`.
//! The RSA layer only ever wraps a randomly generated AES-256 key; the bulk
//! payload is encrypted with AES-256-GCM. This mirrors the hybrid stream used
//! by `encryptedbox.Box` in the original implementation, minus its streaming
//! chunk framing (our payloads are short: certs and private keys, not files).

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng as AesOsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use rand::rngs::OsRng;
use rsa::pkcs8::EncodePublicKey;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{CoreError, Result};

const WRAPPED_KEY_LEN_BYTES: usize = 2;
const NONCE_LEN: usize = 12;

/// A ciphertext tagged with the SHA-256 fingerprint of the public key that
/// encrypted it. The fingerprint is a routing hint, not a security boundary:
/// a consumer holding the wrong private key should skip decryption rather
/// than attempt and fail expensively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedBox {
    pub key_fingerprint: String,
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
}

/// SHA256 fingerprint of an RSA public key's DER-encoded SubjectPublicKeyInfo,
/// formatted as `"SHA256:" + base64(digest)`.
pub fn fingerprint(public_key: &RsaPublicKey) -> Result<String> {
    let der = public_key
        .to_public_key_der()
        .map_err(|e| CoreError::InvalidKey(e.to_string()))?;
    let digest = Sha256::digest(der.as_bytes());
    Ok(format!("SHA256:{}", B64.encode(digest)))
}

impl EncryptedBox {
    /// Encrypts `plaintext` to `public_key`, tagging the envelope with that
    /// key's fingerprint.
    pub fn encrypt(plaintext: &[u8], public_key: &RsaPublicKey) -> Result<Self> {
        let fp = fingerprint(public_key)?;

        let aes_key = Aes256Gcm::generate_key(AesOsRng);
        let cipher = Aes256Gcm::new(&aes_key);
        let nonce = Aes256Gcm::generate_nonce(AesOsRng);
        let ct = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| CoreError::Crypto(format!("aes-gcm encrypt: {e}")))?;

        let padding = Oaep::new::<Sha256>();
        let wrapped_key = public_key
            .encrypt(&mut OsRng, padding, aes_key.as_slice())
            .map_err(|e| CoreError::Crypto(format!("rsa-oaep wrap: {e}")))?;

        let mut buf = Vec::with_capacity(WRAPPED_KEY_LEN_BYTES + wrapped_key.len() + NONCE_LEN + ct.len());
        buf.extend_from_slice(&(wrapped_key.len() as u16).to_be_bytes());
        buf.extend_from_slice(&wrapped_key);
        buf.extend_from_slice(nonce.as_slice());
        buf.extend_from_slice(&ct);

        Ok(EncryptedBox {
            key_fingerprint: fp,
            ciphertext: buf,
        })
    }

    /// Decrypts with `private_key`. If `expected_fingerprint` is given and
    /// does not match `self.key_fingerprint`, fails *before* doing any
    /// cryptographic work.
    pub fn decrypt(
        &self,
        private_key: &RsaPrivateKey,
        expected_fingerprint: Option<&str>,
    ) -> Result<Vec<u8>> {
        if let Some(expected) = expected_fingerprint {
            if expected != self.key_fingerprint {
                return Err(CoreError::FingerprintMismatch {
                    expected: expected.to_string(),
                    actual: self.key_fingerprint.clone(),
                });
            }
        }
        self.decrypt_unchecked(private_key)
    }

    /// Decrypts without any fingerprint precondition. Used by the manager to
    /// decrypt its own configuration, which is always encrypted to its own key.
    pub fn decrypt_no_fingerprint(&self, private_key: &RsaPrivateKey) -> Result<Vec<u8>> {
        self.decrypt_unchecked(private_key)
    }

    fn decrypt_unchecked(&self, private_key: &RsaPrivateKey) -> Result<Vec<u8>> {
        if self.ciphertext.len() < WRAPPED_KEY_LEN_BYTES {
            return Err(CoreError::Crypto("ciphertext truncated".into()));
        }
        let wrapped_len =
            u16::from_be_bytes([self.ciphertext[0], self.ciphertext[1]]) as usize;
        let rest = &self.ciphertext[WRAPPED_KEY_LEN_BYTES..];
        if rest.len() < wrapped_len + NONCE_LEN {
            return Err(CoreError::Crypto("ciphertext truncated".into()));
        }
        let (wrapped_key, rest) = rest.split_at(wrapped_len);
        let (nonce_bytes, ct) = rest.split_at(NONCE_LEN);

        let padding = Oaep::new::<Sha256>();
        let aes_key = private_key
            .decrypt(padding, wrapped_key)
            .map_err(|e| CoreError::Crypto(format!("rsa-oaep unwrap: {e}")))?;
        let key = Key::<Aes256Gcm>::from_slice(&aes_key);
        let cipher = Aes256Gcm::new(key);
        let nonce = Nonce::from_slice(nonce_bytes);
        cipher
            .decrypt(nonce, ct)
            .map_err(|e| CoreError::Crypto(format!("aes-gcm decrypt: {e}")))
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD as B64;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&B64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        B64.decode(s.as_bytes()).map_err(serde::de::Error::custom)
    }
}
