use std::fmt;

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;
use zeroize::Zeroizing;

/// Number of random bytes behind a generated secret.
pub const GENERATED_SECRET_BYTES: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SecretError {
    #[error("secret {var} not set in the environment or in {path}")]
    Missing { var: String, path: String },
    #[error("secret {var} is empty")]
    Empty { var: String },
    #[error("secret source unreadable: {reason}")]
    Unreadable { reason: String },
}

/// First key factor: an operator-provisioned string kept outside the program,
/// usually in a local `.env` file.
#[derive(Clone)]
pub struct Secret(Zeroizing<String>);

impl Secret {
    /// Wrap a secret value. `var` names where it came from for error reporting.
    pub fn new(var: &str, value: impl Into<String>) -> Result<Self, SecretError> {
        let value = Zeroizing::new(value.into());
        if value.trim().is_empty() {
            return Err(SecretError::Empty {
                var: var.to_string(),
            });
        }
        Ok(Self(value))
    }

    /// Fresh random secret, URL-safe base64 encoded.
    pub fn generate() -> Self {
        let mut bytes = Zeroizing::new([0u8; GENERATED_SECRET_BYTES]);
        OsRng.fill_bytes(&mut bytes[..]);
        Self(Zeroizing::new(URL_SAFE.encode(&bytes[..])))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Provides the Secret factor (`.env` file in production; memory in tests).
#[async_trait]
pub trait SecretProvider: Send + Sync {
    async fn secret(&self) -> Result<Secret, SecretError>;
}
