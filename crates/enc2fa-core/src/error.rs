use thiserror::Error;

use crate::{codec::CodecError, password::PasswordError, secret::SecretError};

/// Errors produced by the encrypted store.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The Secret factor could not be loaded.
    #[error(transparent)]
    Secret(#[from] SecretError),
    /// The Password factor was unavailable or rejected.
    #[error(transparent)]
    Password(#[from] PasswordError),
    /// Payload (de)serialization failed.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// Requested encrypted file does not exist.
    #[error("encrypted file not found: {path}")]
    NotFound { path: String },
    /// Path has no usable file name to bind the key to.
    #[error("invalid encrypted file path: {path}")]
    InvalidPath { path: String },
    /// Authenticated decryption failed.
    #[error("decryption failed: wrong secret or password, or the data was modified")]
    Authentication,
    /// The stored bytes are not a readable envelope.
    #[error("malformed encrypted data: {reason}")]
    Format { reason: String },
    #[error("key derivation failed: {reason}")]
    KeyDerivation { reason: String },
    /// Read-back after a save did not reproduce the written plaintext.
    #[error("verification after write failed for {path}")]
    Verification { path: String },
    /// Underlying storage failure.
    #[error("storage failure: {reason}")]
    Storage { reason: String },
}

impl StoreError {
    pub fn storage<E: ToString>(err: E) -> Self {
        StoreError::Storage {
            reason: err.to_string(),
        }
    }

    pub fn format(reason: impl Into<String>) -> Self {
        StoreError::Format {
            reason: reason.into(),
        }
    }
}
