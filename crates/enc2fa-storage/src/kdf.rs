//! Key derivation from the two factors.
//!
//! `user_key = Argon2id(password, SHA-256(domain || secret))`, then one
//! HKDF-SHA256 expansion per context (the encrypted file's name).

use argon2::{Algorithm, Argon2, Params, Version};
use enc2fa_core::{
    password::{KeyFingerprint, UserKey},
    Password, Secret, StoreError,
};
use hkdf::Hkdf;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

const SALT_DOMAIN: &[u8] = b"enc2fa/secret-salt/v1";
const FINGERPRINT_DOMAIN: &[u8] = b"enc2fa/fingerprint/v1";
const FILE_KEY_DOMAIN: &[u8] = b"enc2fa/file/v1:";

/// Length of every derived key, in bytes.
pub const KEY_LEN: usize = 32;

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    /// 19 MiB, 3 passes, single lane.
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 3,
            parallelism: 1,
        }
    }
}

impl KdfParams {
    /// Cheapest parameters Argon2 accepts. Only for tests.
    pub fn insecure_fast() -> Self {
        Self {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        }
    }

    fn argon2(&self) -> Result<Argon2<'static>, StoreError> {
        let params = Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(KEY_LEN),
        )
        .map_err(|e| StoreError::KeyDerivation {
            reason: format!("invalid argon2 parameters: {e}"),
        })?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// Derive the per-user key from the Password, salted with the Secret.
pub fn derive_user_key(
    password: &Password,
    secret: &Secret,
    params: &KdfParams,
) -> Result<UserKey, StoreError> {
    let salt = Sha256::new()
        .chain_update(SALT_DOMAIN)
        .chain_update(secret.expose().as_bytes())
        .finalize();

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    params
        .argon2()?
        .hash_password_into(password.expose().as_bytes(), &salt, &mut key[..])
        .map_err(|e| StoreError::KeyDerivation {
            reason: e.to_string(),
        })?;
    Ok(key)
}

/// Derive the AES key for one context from the user key.
pub fn derive_file_key(user_key: &UserKey, context: &str) -> Result<UserKey, StoreError> {
    let hk = Hkdf::<Sha256>::new(None, &user_key[..]);
    let mut info = Vec::with_capacity(FILE_KEY_DOMAIN.len() + context.len());
    info.extend_from_slice(FILE_KEY_DOMAIN);
    info.extend_from_slice(context.as_bytes());

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    hk.expand(&info, &mut key[..])
        .map_err(|e| StoreError::KeyDerivation {
            reason: e.to_string(),
        })?;
    Ok(key)
}

/// Cache key for a user key: changes whenever the Secret or the cost parameters do.
pub fn fingerprint(secret: &Secret, params: &KdfParams) -> KeyFingerprint {
    Sha256::new()
        .chain_update(FINGERPRINT_DOMAIN)
        .chain_update(params.memory_kib.to_le_bytes())
        .chain_update(params.iterations.to_le_bytes())
        .chain_update(params.parallelism.to_le_bytes())
        .chain_update(secret.expose().as_bytes())
        .finalize()
        .into()
}
