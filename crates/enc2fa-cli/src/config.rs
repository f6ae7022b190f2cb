use std::{
    fs,
    path::{Path, PathBuf},
};

use color_eyre::Result;
use dirs::config_dir;
use enc2fa_storage::{
    kdf::KdfParams,
    secret_provider::{DEFAULT_ENV_FILE, DEFAULT_SECRET_VAR},
    StoreOptions,
};
use serde::{Deserialize, Serialize};

/// User-level configuration loaded from `~/.config/enc2fa/config.toml` (platform-specific).
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Env file holding the secret (default `.env` in the working directory).
    pub env_file: Option<PathBuf>,
    /// Variable name of the secret inside the env file.
    pub secret_var: Option<String>,
    /// Decrypt each written file once to confirm it reads back.
    pub verify_after_write: Option<bool>,
    /// Argon2id cost overrides.
    pub kdf: Option<KdfConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct KdfConfig {
    pub memory_kib: Option<u32>,
    pub iterations: Option<u32>,
    pub parallelism: Option<u32>,
}

impl Config {
    /// Every option spelled out with its default, for `config init`.
    pub fn with_defaults() -> Self {
        let kdf = KdfParams::default();
        Self {
            env_file: Some(PathBuf::from(DEFAULT_ENV_FILE)),
            secret_var: Some(DEFAULT_SECRET_VAR.to_string()),
            verify_after_write: Some(StoreOptions::default().verify_after_write),
            kdf: Some(KdfConfig {
                memory_kib: Some(kdf.memory_kib),
                iterations: Some(kdf.iterations),
                parallelism: Some(kdf.parallelism),
            }),
        }
    }

    pub fn env_file(&self) -> PathBuf {
        self.env_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ENV_FILE))
    }

    pub fn secret_var(&self) -> String {
        self.secret_var
            .clone()
            .unwrap_or_else(|| DEFAULT_SECRET_VAR.to_string())
    }

    pub fn store_options(&self) -> StoreOptions {
        let defaults = StoreOptions::default();
        let kdf = self.kdf.clone().unwrap_or_default();
        StoreOptions {
            kdf: KdfParams {
                memory_kib: kdf.memory_kib.unwrap_or(defaults.kdf.memory_kib),
                iterations: kdf.iterations.unwrap_or(defaults.kdf.iterations),
                parallelism: kdf.parallelism.unwrap_or(defaults.kdf.parallelism),
            },
            codec: defaults.codec,
            verify_after_write: self
                .verify_after_write
                .unwrap_or(defaults.verify_after_write),
        }
    }
}

/// Load config from the default path; if missing, return defaults.
pub fn load() -> Result<Config> {
    let path = default_path()?;
    load_from_path(path)
}

/// Load config from a given path; if missing or empty, return defaults.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    let cfg: Config = toml::from_str(&contents)?;
    Ok(cfg)
}

/// Resolve the default config path (platform aware).
pub fn default_path() -> Result<PathBuf> {
    let base = config_dir().ok_or_else(|| color_eyre::eyre::eyre!("no config dir available"))?;
    Ok(base.join("enc2fa").join("config.toml"))
}

/// Write the given config to `path` unless a file is already there,
/// creating parent directories as needed.
pub fn write_if_missing(config: &Config, path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Ok(path.to_path_buf());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let body = toml::to_string_pretty(config)?;
    fs::write(path, body)?;
    Ok(path.to_path_buf())
}
