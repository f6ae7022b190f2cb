use std::{
    env::VarError,
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use enc2fa_core::{Secret, SecretError, SecretProvider};
use tracing::debug;

/// Variable holding the Secret unless configured otherwise.
pub const DEFAULT_SECRET_VAR: &str = "ENC2FA_SECRET";

/// Env file consulted unless configured otherwise.
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Reads the Secret from a dotenv-style file.
///
/// A variable already exported in the process environment takes precedence
/// over the file, even when it is empty (and then rejected as such). The value
/// is loaded once and then memoized.
#[derive(Debug, Clone)]
pub struct EnvFileSecretProvider {
    path: PathBuf,
    var: String,
    loaded: Arc<Mutex<Option<Secret>>>,
}

impl EnvFileSecretProvider {
    pub fn new(path: impl Into<PathBuf>, var: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            var: var.into(),
            loaded: Arc::new(Mutex::new(None)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn var(&self) -> &str {
        &self.var
    }

    fn load(&self) -> Result<Secret, SecretError> {
        match std::env::var(&self.var) {
            Ok(value) => {
                debug!(var = %self.var, "secret taken from process environment");
                return Secret::new(&self.var, value);
            }
            Err(VarError::NotUnicode(_)) => {
                return Err(SecretError::Unreadable {
                    reason: format!("{} in the process environment is not valid UTF-8", self.var),
                });
            }
            Err(VarError::NotPresent) => {}
        }

        let entries = match dotenvy::from_path_iter(&self.path) {
            Ok(entries) => entries,
            Err(err) if err.not_found() => return Err(self.missing()),
            Err(err) => return Err(unreadable(&self.path, err)),
        };

        for entry in entries {
            let (key, value) = entry.map_err(|e| unreadable(&self.path, e))?;
            if key == self.var {
                debug!(var = %self.var, path = ?self.path, "secret loaded from env file");
                return Secret::new(&self.var, value);
            }
        }
        Err(self.missing())
    }

    fn missing(&self) -> SecretError {
        SecretError::Missing {
            var: self.var.clone(),
            path: self.path.to_string_lossy().to_string(),
        }
    }
}

impl Default for EnvFileSecretProvider {
    fn default() -> Self {
        Self::new(DEFAULT_ENV_FILE, DEFAULT_SECRET_VAR)
    }
}

#[async_trait]
impl SecretProvider for EnvFileSecretProvider {
    async fn secret(&self) -> Result<Secret, SecretError> {
        let mut guard = self.loaded.lock().map_err(|err| SecretError::Unreadable {
            reason: format!("lock poisoned: {err}"),
        })?;

        if let Some(existing) = guard.clone() {
            return Ok(existing);
        }

        let secret = self.load()?;
        *guard = Some(secret.clone());
        Ok(secret)
    }
}

/// Fixed secret for tests and embedders that manage the value themselves.
#[derive(Debug, Clone)]
pub struct InMemorySecretProvider {
    secret: Secret,
}

impl InMemorySecretProvider {
    pub fn new(secret: Secret) -> Self {
        Self { secret }
    }
}

#[async_trait]
impl SecretProvider for InMemorySecretProvider {
    async fn secret(&self) -> Result<Secret, SecretError> {
        Ok(self.secret.clone())
    }
}

/// Append `var=<secret>` to an env file, creating it owner-readable only.
///
/// Returns `false` without touching the file when `var` is already defined
/// there, so an existing Secret is never replaced.
pub fn append_secret(path: &Path, var: &str, secret: &Secret) -> Result<bool, SecretError> {
    let existing = match fs::read_to_string(path) {
        Ok(contents) => Some(contents),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
        Err(err) => return Err(unreadable(path, err)),
    };

    if let Some(contents) = &existing {
        let defined = dotenvy::from_read_iter(contents.as_bytes())
            .filter_map(Result::ok)
            .any(|(key, _)| key == var);
        if defined {
            return Ok(false);
        }
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| unreadable(path, e))?;
    }

    let mut options = OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path).map_err(|e| unreadable(path, e))?;

    let needs_newline = existing
        .as_deref()
        .is_some_and(|c| !c.is_empty() && !c.ends_with('\n'));
    let mut line = String::new();
    if needs_newline {
        line.push('\n');
    }
    line.push_str(&format!("{var}=\"{}\"\n", secret.expose()));
    file.write_all(line.as_bytes())
        .map_err(|e| unreadable(path, e))?;
    Ok(true)
}

fn unreadable<E: ToString>(path: &Path, err: E) -> SecretError {
    SecretError::Unreadable {
        reason: format!("{}: {}", path.display(), err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Variable names are unique per test so tests that export one never
    // affect another.
    #[tokio::test]
    async fn reads_secret_from_env_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".env");
        fs::write(
            &path,
            "# local secrets\nOTHER=1\nENC2FA_TEST_READS=\"V4MN73IxjLtAB2HmU3E50e4tZjjddOZRjsBl1ogqkPA=\"\n",
        )
        .expect("write env");

        let provider = EnvFileSecretProvider::new(&path, "ENC2FA_TEST_READS");
        let secret = provider.secret().await.expect("secret");
        assert_eq!(
            secret.expose(),
            "V4MN73IxjLtAB2HmU3E50e4tZjjddOZRjsBl1ogqkPA="
        );
    }

    #[tokio::test]
    async fn secret_is_loaded_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".env");
        fs::write(&path, "ENC2FA_TEST_ONCE=first\n").expect("write env");

        let provider = EnvFileSecretProvider::new(&path, "ENC2FA_TEST_ONCE");
        assert_eq!(provider.secret().await.expect("secret").expose(), "first");

        fs::write(&path, "ENC2FA_TEST_ONCE=second\n").expect("rewrite env");
        assert_eq!(provider.secret().await.expect("secret").expose(), "first");
    }

    #[tokio::test]
    async fn missing_file_and_missing_var_are_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".env");

        let provider = EnvFileSecretProvider::new(&path, "ENC2FA_TEST_MISSING");
        let err = provider.secret().await.expect_err("no file");
        assert!(matches!(err, SecretError::Missing { .. }));

        fs::write(&path, "SOMETHING_ELSE=1\n").expect("write env");
        let provider = EnvFileSecretProvider::new(&path, "ENC2FA_TEST_MISSING");
        let err = provider.secret().await.expect_err("no var");
        assert_eq!(
            err,
            SecretError::Missing {
                var: "ENC2FA_TEST_MISSING".into(),
                path: path.to_string_lossy().to_string(),
            }
        );
    }

    #[tokio::test]
    async fn empty_value_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".env");
        fs::write(&path, "ENC2FA_TEST_EMPTY=\n").expect("write env");

        let provider = EnvFileSecretProvider::new(&path, "ENC2FA_TEST_EMPTY");
        let err = provider.secret().await.expect_err("empty");
        assert!(matches!(err, SecretError::Empty { .. }));
    }

    #[tokio::test]
    async fn exported_variable_wins_over_env_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".env");
        fs::write(&path, "ENC2FA_TEST_EXPORTED=from-file\n").expect("write env");
        std::env::set_var("ENC2FA_TEST_EXPORTED", "from-process");

        let provider = EnvFileSecretProvider::new(&path, "ENC2FA_TEST_EXPORTED");
        let secret = provider.secret().await;
        std::env::remove_var("ENC2FA_TEST_EXPORTED");
        assert_eq!(secret.expect("secret").expose(), "from-process");
    }

    #[tokio::test]
    async fn exported_empty_variable_is_rejected_not_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".env");
        fs::write(&path, "ENC2FA_TEST_EXPORTED_EMPTY=from-file\n").expect("write env");
        std::env::set_var("ENC2FA_TEST_EXPORTED_EMPTY", "");

        let provider = EnvFileSecretProvider::new(&path, "ENC2FA_TEST_EXPORTED_EMPTY");
        let result = provider.secret().await;
        std::env::remove_var("ENC2FA_TEST_EXPORTED_EMPTY");
        let err = result.expect_err("empty exported value");
        assert_eq!(
            err,
            SecretError::Empty {
                var: "ENC2FA_TEST_EXPORTED_EMPTY".into()
            }
        );
    }

    #[tokio::test]
    async fn unset_variable_falls_back_to_env_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".env");
        fs::write(&path, "ENC2FA_TEST_UNSET=from-file\n").expect("write env");
        std::env::remove_var("ENC2FA_TEST_UNSET");

        let provider = EnvFileSecretProvider::new(&path, "ENC2FA_TEST_UNSET");
        assert_eq!(provider.secret().await.expect("secret").expose(), "from-file");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exported_non_utf8_variable_is_unreadable() {
        use std::{ffi::OsStr, os::unix::ffi::OsStrExt};

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".env");
        fs::write(&path, "ENC2FA_TEST_NOT_UTF8=from-file\n").expect("write env");
        std::env::set_var("ENC2FA_TEST_NOT_UTF8", OsStr::from_bytes(&[0x66, 0xff]));

        let provider = EnvFileSecretProvider::new(&path, "ENC2FA_TEST_NOT_UTF8");
        let result = provider.secret().await;
        std::env::remove_var("ENC2FA_TEST_NOT_UTF8");
        assert!(matches!(result, Err(SecretError::Unreadable { .. })));
    }

    #[tokio::test]
    async fn appended_secret_is_readable_and_never_replaced() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join(".env");
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(&path, "OTHER=1").expect("write env without trailing newline");

        let first = Secret::generate();
        assert!(append_secret(&path, "ENC2FA_TEST_APPEND", &first).expect("append"));
        assert!(!append_secret(&path, "ENC2FA_TEST_APPEND", &Secret::generate())
            .expect("second append"));

        let provider = EnvFileSecretProvider::new(&path, "ENC2FA_TEST_APPEND");
        let loaded = provider.secret().await.expect("secret");
        assert_eq!(loaded.expose(), first.expose());

        let contents = fs::read_to_string(&path).expect("read");
        assert!(contents.starts_with("OTHER=1\n"));
    }

    #[tokio::test]
    async fn in_memory_provider_returns_its_secret() {
        let provider =
            InMemorySecretProvider::new(Secret::new("S", "some salt").expect("secret"));
        assert_eq!(provider.secret().await.expect("secret").expose(), "some salt");
    }
}
