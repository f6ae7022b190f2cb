//! On-disk container for encrypted payloads.
//!
//! A JSON document carrying a small header (`version`, `codec`, `created_at`)
//! plus the AES-256-GCM nonce and ciphertext. The header is bound as
//! associated data, so it cannot be edited without failing authentication.

use std::{fs, path::Path};

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use enc2fa_core::{password::UserKey, Codec, StoreError};
use serde::{Deserialize, Serialize};

pub const ENVELOPE_VERSION: u32 = 1;

const NONCE_LEN: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub version: u32,
    pub codec: Codec,
    /// Unix seconds (UTC) at encryption time.
    pub created_at: i64,
    pub nonce: String,
    pub ciphertext: String,
}

/// Header fields readable without either key factor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeInfo {
    pub version: u32,
    pub codec: Codec,
    pub created_at: DateTime<Utc>,
}

impl Envelope {
    /// Encrypt `plaintext` (already encoded with `codec`) under `key`.
    pub fn seal(key: &UserKey, codec: Codec, plaintext: &[u8]) -> Result<Self, StoreError> {
        let created_at = Utc::now().timestamp();
        let cipher = build_cipher(key)?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let aad = associated_data(ENVELOPE_VERSION, codec, created_at);

        let ciphertext = cipher
            .encrypt(
                &nonce,
                Payload {
                    msg: plaintext,
                    aad: &aad,
                },
            )
            .map_err(|e| StoreError::Storage {
                reason: format!("encrypt failed: {e}"),
            })?;

        Ok(Self {
            version: ENVELOPE_VERSION,
            codec,
            created_at,
            nonce: URL_SAFE_NO_PAD.encode(nonce.as_slice()),
            ciphertext: URL_SAFE_NO_PAD.encode(ciphertext),
        })
    }

    /// Authenticate and decrypt, returning the encoded plaintext.
    pub fn open(&self, key: &UserKey) -> Result<Vec<u8>, StoreError> {
        self.check_version()?;

        let nonce_bytes = URL_SAFE_NO_PAD
            .decode(&self.nonce)
            .map_err(|e| StoreError::format(format!("nonce decode failed: {e}")))?;
        if nonce_bytes.len() != NONCE_LEN {
            return Err(StoreError::format(format!(
                "expected {NONCE_LEN}-byte nonce, got {}",
                nonce_bytes.len()
            )));
        }
        let ciphertext = URL_SAFE_NO_PAD
            .decode(&self.ciphertext)
            .map_err(|e| StoreError::format(format!("ciphertext decode failed: {e}")))?;

        let aad = associated_data(self.version, self.codec, self.created_at);
        build_cipher(key)?
            .decrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: &ciphertext,
                    aad: &aad,
                },
            )
            .map_err(|_| StoreError::Authentication)
    }

    pub fn info(&self) -> Result<EnvelopeInfo, StoreError> {
        self.check_version()?;
        let created_at = DateTime::from_timestamp(self.created_at, 0).ok_or_else(|| {
            StoreError::format(format!("timestamp out of range: {}", self.created_at))
        })?;
        Ok(EnvelopeInfo {
            version: self.version,
            codec: self.codec,
            created_at,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec(self).map_err(StoreError::storage)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StoreError> {
        serde_json::from_slice(bytes)
            .map_err(|e| StoreError::format(format!("not an enc2fa envelope: {e}")))
    }

    fn check_version(&self) -> Result<(), StoreError> {
        if self.version != ENVELOPE_VERSION {
            return Err(StoreError::format(format!(
                "unsupported envelope version {}",
                self.version
            )));
        }
        Ok(())
    }
}

/// Read the header of an encrypted file without decrypting it.
pub fn inspect(file: impl AsRef<Path>) -> Result<EnvelopeInfo, StoreError> {
    let file = file.as_ref();
    let bytes = fs::read(file).map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            StoreError::NotFound {
                path: file.to_string_lossy().to_string(),
            }
        } else {
            StoreError::storage(err)
        }
    })?;
    Envelope::from_bytes(&bytes)?.info()
}

fn associated_data(version: u32, codec: Codec, created_at: i64) -> Vec<u8> {
    format!("enc2fa:v{version}:{codec}:{created_at}").into_bytes()
}

fn build_cipher(key: &UserKey) -> Result<Aes256Gcm, StoreError> {
    Aes256Gcm::new_from_slice(&key[..]).map_err(|e| StoreError::Storage {
        reason: format!("cipher init failed: {e}"),
    })
}
