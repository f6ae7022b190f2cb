//! Core abstractions for enc2fa: the two key factors, the password cache,
//! payload codecs and the shared error types.
//! This crate is intentionally small to keep dependency surface minimal.

pub mod codec;
pub mod error;
pub mod password;
pub mod secret;

pub use codec::{Codec, CodecError};
pub use error::StoreError;
pub use password::{Password, PasswordCache, PasswordError, PasswordSource, UserKey};
pub use secret::{Secret, SecretError, SecretProvider};
