use std::{
    fs::{self, File},
    io::{Read, Write},
    path::Path,
};

use enc2fa_core::{
    password::{KeyFingerprint, UserKey},
    Codec, PasswordCache, PasswordSource, SecretProvider, StoreError,
};
use serde::{de::DeserializeOwned, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument};
use zeroize::Zeroizing;

use crate::{
    envelope::Envelope,
    kdf::{self, KdfParams},
};

/// Tunables for an [`EncryptedFileStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    pub kdf: KdfParams,
    /// Codec used for new files. Reads always use the codec recorded in the file.
    pub codec: Codec,
    /// Decrypt every file right after writing it and compare with the input.
    pub verify_after_write: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            kdf: KdfParams::default(),
            codec: Codec::Json,
            verify_after_write: true,
        }
    }
}

/// Two-factor encrypted file store.
///
/// Payloads are serialized, then sealed with AES-256-GCM under a key derived
/// from the Secret (via `S`) and the Password (via `P`). The password-derived
/// key is kept in a [`PasswordCache`] until [`clear_password_cache`] is called.
///
/// [`clear_password_cache`]: EncryptedFileStore::clear_password_cache
pub struct EncryptedFileStore<S: SecretProvider, P: PasswordSource> {
    secrets: S,
    passwords: P,
    cache: PasswordCache,
    options: StoreOptions,
}

impl<S: SecretProvider, P: PasswordSource> EncryptedFileStore<S, P> {
    pub fn new(secrets: S, passwords: P) -> Self {
        Self {
            secrets,
            passwords,
            cache: PasswordCache::new(),
            options: StoreOptions::default(),
        }
    }

    pub fn with_options(mut self, options: StoreOptions) -> Self {
        self.options = options;
        self
    }

    /// Use a cache shared with other stores instead of a private one.
    pub fn with_cache(mut self, cache: PasswordCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn cache(&self) -> &PasswordCache {
        &self.cache
    }

    /// Serialize `data` and write it encrypted to `file`, replacing any existing file.
    ///
    /// The file name is mixed into the key, so a renamed file no longer decrypts.
    /// With `verify_after_write` the staged file is decrypted and compared before
    /// it replaces `file`; on mismatch the previous file is left untouched.
    #[instrument(skip_all, fields(file = %file.as_ref().display()))]
    pub async fn save_encrypted<T: Serialize + ?Sized>(
        &self,
        data: &T,
        file: impl AsRef<Path>,
    ) -> Result<(), StoreError> {
        let path = file.as_ref();
        let context = file_context(path)?;
        let plaintext = Zeroizing::new(self.options.codec.encode(data)?);

        let (_, key) = self.file_key(&context).await?;
        let envelope = self.seal(&key, &plaintext)?;
        let staged = stage_envelope(path, &envelope)?;

        if self.options.verify_after_write {
            verify_staged(staged.path(), &key, &plaintext).map_err(|err| match err {
                StoreError::Authentication | StoreError::Format { .. } => {
                    StoreError::Verification {
                        path: path.to_string_lossy().to_string(),
                    }
                }
                other => other,
            })?;
            debug!("verified encrypted file before replacing target");
        }

        staged
            .persist(path)
            .map_err(|e| StoreError::storage(e.error))?;
        Ok(())
    }

    /// Decrypt `file` and deserialize it with the codec it was written with.
    #[instrument(skip_all, fields(file = %file.as_ref().display()))]
    pub async fn read_encrypted<T: DeserializeOwned>(
        &self,
        file: impl AsRef<Path>,
    ) -> Result<T, StoreError> {
        let path = file.as_ref();
        let context = file_context(path)?;
        let envelope = read_envelope(path)?;
        let plaintext = self.open(&envelope, &context).await?;
        Ok(envelope.codec.decode(&plaintext)?)
    }

    /// Forget every cached password-derived key; the next operation prompts again.
    pub fn clear_password_cache(&self) {
        self.cache.clear();
        debug!("password cache cleared");
    }

    /// In-memory variant of [`save_encrypted`](Self::save_encrypted): returns the
    /// envelope bytes instead of writing them. `context` plays the file name's role.
    #[instrument(skip_all, fields(context = %context))]
    pub async fn encrypt_data<T: Serialize + ?Sized>(
        &self,
        data: &T,
        context: &str,
    ) -> Result<Vec<u8>, StoreError> {
        let plaintext = Zeroizing::new(self.options.codec.encode(data)?);
        let (_, key) = self.file_key(context).await?;
        self.seal(&key, &plaintext)?.to_bytes()
    }

    #[instrument(skip_all, fields(context = %context))]
    pub async fn decrypt_data<T: DeserializeOwned>(
        &self,
        token: &[u8],
        context: &str,
    ) -> Result<T, StoreError> {
        let envelope = Envelope::from_bytes(token)?;
        let plaintext = self.open(&envelope, context).await?;
        Ok(envelope.codec.decode(&plaintext)?)
    }

    fn seal(&self, key: &UserKey, plaintext: &[u8]) -> Result<Envelope, StoreError> {
        let envelope = Envelope::seal(key, self.options.codec, plaintext)?;
        log_timestamp("encrypted", &envelope);
        Ok(envelope)
    }

    /// Decrypt; a key that fails to authenticate is dropped from the cache.
    async fn open(
        &self,
        envelope: &Envelope,
        context: &str,
    ) -> Result<Zeroizing<Vec<u8>>, StoreError> {
        log_timestamp("decrypting", envelope);
        let (fingerprint, key) = self.file_key(context).await?;
        match envelope.open(&key) {
            Ok(plaintext) => Ok(Zeroizing::new(plaintext)),
            Err(StoreError::Authentication) => {
                self.cache.remove(&fingerprint)?;
                debug!("dropped cached password key after failed decryption");
                Err(StoreError::Authentication)
            }
            Err(err) => Err(err),
        }
    }

    async fn file_key(&self, context: &str) -> Result<(KeyFingerprint, UserKey), StoreError> {
        let (fingerprint, user_key) = self.user_key().await?;
        Ok((fingerprint, kdf::derive_file_key(&user_key, context)?))
    }

    async fn user_key(&self) -> Result<(KeyFingerprint, UserKey), StoreError> {
        let secret = self.secrets.secret().await?;
        let fingerprint = kdf::fingerprint(&secret, &self.options.kdf);
        if let Some(key) = self.cache.get(&fingerprint)? {
            debug!("password cache hit");
            return Ok((fingerprint, key));
        }

        debug!("password cache miss; requesting password");
        let password = self.passwords.password().await?;
        let key = kdf::derive_user_key(&password, &secret, &self.options.kdf)?;
        self.cache.insert(fingerprint, key.clone())?;
        Ok((fingerprint, key))
    }
}

fn log_timestamp(action: &str, envelope: &Envelope) {
    match envelope.info() {
        Ok(info) => info!(
            timestamp = envelope.created_at,
            created = %info.created_at.to_rfc2822(),
            "{action} payload"
        ),
        Err(err) => debug!("{action} payload with unreadable header: {err}"),
    }
}

/// Key context for a path: its final component.
fn file_context(path: &Path) -> Result<String, StoreError> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| StoreError::InvalidPath {
            path: path.to_string_lossy().to_string(),
        })
}

/// Write the envelope to a temp file next to `path`; the caller persists it.
fn stage_envelope(path: &Path, envelope: &Envelope) -> Result<NamedTempFile, StoreError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(StoreError::storage)?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(StoreError::storage)?;
    tmp.write_all(&envelope.to_bytes()?)
        .map_err(StoreError::storage)?;
    tmp.flush().map_err(StoreError::storage)?;
    Ok(tmp)
}

fn verify_staged(staged: &Path, key: &UserKey, expected: &[u8]) -> Result<(), StoreError> {
    let written = read_envelope(staged)?;
    let round_trip = Zeroizing::new(written.open(key)?);
    if round_trip[..] != expected[..] {
        return Err(StoreError::Verification {
            path: staged.to_string_lossy().to_string(),
        });
    }
    Ok(())
}

fn read_envelope(path: &Path) -> Result<Envelope, StoreError> {
    let mut file = File::open(path).map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            StoreError::NotFound {
                path: path.to_string_lossy().to_string(),
            }
        } else {
            StoreError::storage(err)
        }
    })?;

    let mut buf = Vec::new();
    file.read_to_end(&mut buf).map_err(StoreError::storage)?;
    Envelope::from_bytes(&buf)
}
