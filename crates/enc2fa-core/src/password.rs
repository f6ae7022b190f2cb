use std::{
    collections::VecDeque,
    fmt,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;
use zeroize::Zeroizing;

use crate::error::StoreError;

/// Minimum accepted password length, in characters.
pub const MIN_PASSWORD_CHARS: usize = 8;

/// Number of derived keys kept by a default [`PasswordCache`].
pub const DEFAULT_CACHE_CAPACITY: usize = 4;

/// 256-bit key derived from the Password and the Secret.
pub type UserKey = Zeroizing<[u8; 32]>;

/// Identifies the Secret and key-derivation settings a [`UserKey`] was derived under.
pub type KeyFingerprint = [u8; 32];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PasswordError {
    #[error("password must have at least {min} characters")]
    TooShort { min: usize },
    #[error("could not read password: {reason}")]
    Input { reason: String },
}

/// Second key factor. Validated on construction, wiped on drop.
#[derive(Clone)]
pub struct Password(Zeroizing<String>);

impl Password {
    pub fn new(value: impl Into<String>) -> Result<Self, PasswordError> {
        let value = Zeroizing::new(value.into());
        if value.chars().count() < MIN_PASSWORD_CHARS {
            return Err(PasswordError::TooShort {
                min: MIN_PASSWORD_CHARS,
            });
        }
        Ok(Self(value))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Supplies the Password factor (terminal prompt in production; fixed value in tests).
#[async_trait]
pub trait PasswordSource: Send + Sync {
    async fn password(&self) -> Result<Password, PasswordError>;
}

struct CachedKey {
    fingerprint: KeyFingerprint,
    key: UserKey,
}

/// Process-local cache of password-derived keys.
///
/// Holds derived keys rather than passwords, keyed by the fingerprint of the
/// Secret and KDF settings they were derived under. Clones share the same
/// slots; the least recently used entry is evicted once `capacity` is reached.
#[derive(Clone)]
pub struct PasswordCache {
    inner: Arc<Mutex<VecDeque<CachedKey>>>,
    capacity: usize,
}

impl PasswordCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity: capacity.max(1),
        }
    }

    /// Look up a key, marking it most recently used.
    pub fn get(&self, fingerprint: &KeyFingerprint) -> Result<Option<UserKey>, StoreError> {
        let mut entries = self.inner.lock().map_err(|err| StoreError::Storage {
            reason: format!("lock poisoned: {err}"),
        })?;

        let Some(entry) = entries
            .iter()
            .position(|e| &e.fingerprint == fingerprint)
            .and_then(|pos| entries.remove(pos))
        else {
            return Ok(None);
        };
        let key = entry.key.clone();
        entries.push_back(entry);
        Ok(Some(key))
    }

    pub fn insert(&self, fingerprint: KeyFingerprint, key: UserKey) -> Result<(), StoreError> {
        let mut entries = self.inner.lock().map_err(|err| StoreError::Storage {
            reason: format!("lock poisoned: {err}"),
        })?;

        entries.retain(|e| e.fingerprint != fingerprint);
        entries.push_back(CachedKey { fingerprint, key });
        while entries.len() > self.capacity {
            entries.pop_front();
            debug!("evicted least recently used password key");
        }
        Ok(())
    }

    /// Forget one key, e.g. after it failed to authenticate.
    pub fn remove(&self, fingerprint: &KeyFingerprint) -> Result<(), StoreError> {
        let mut entries = self.inner.lock().map_err(|err| StoreError::Storage {
            reason: format!("lock poisoned: {err}"),
        })?;
        entries.retain(|e| &e.fingerprint != fingerprint);
        Ok(())
    }

    /// Drop every cached key so the next operation asks for the password again.
    pub fn clear(&self) {
        let mut entries = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.clear();
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .map(|entries| entries.len())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PasswordCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PasswordCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordCache")
            .field("entries", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
