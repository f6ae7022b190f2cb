//! Concrete two-factor encryption for files and in-memory payloads.
//! Uses Argon2id + HKDF for key derivation and AES-256-GCM for encryption,
//! with the Secret read from a `.env` file and the Password prompted on the terminal.

pub mod encrypted_file_store;
pub mod envelope;
pub mod kdf;
pub mod password_source;
pub mod secret_provider;

pub use encrypted_file_store::{EncryptedFileStore, StoreOptions};
pub use envelope::{inspect, EnvelopeInfo};
