use crate::config::Config;
#[cfg(test)]
use enc2fa_core::Secret;
#[cfg(test)]
use enc2fa_storage::{
    kdf::KdfParams,
    password_source::StaticPasswordSource,
    secret_provider::InMemorySecretProvider,
    StoreOptions,
};
use enc2fa_storage::{
    password_source::PromptPasswordSource, secret_provider::EnvFileSecretProvider,
    EncryptedFileStore,
};
use tracing::debug;

pub type CliStore = EncryptedFileStore<EnvFileSecretProvider, PromptPasswordSource>;

pub fn secret_provider(config: &Config) -> EnvFileSecretProvider {
    EnvFileSecretProvider::new(config.env_file(), config.secret_var())
}

/// Build the interactive store: secret from the env file, password from the terminal.
pub fn store_from_config(config: &Config) -> CliStore {
    let secrets = secret_provider(config);
    debug!(env_file = ?secrets.path(), var = secrets.var(), "initializing encrypted store");
    let store = EncryptedFileStore::new(secrets, PromptPasswordSource::default())
        .with_options(config.store_options());
    debug!(
        codec = %store.options().codec,
        verify_after_write = store.options().verify_after_write,
        "store options resolved"
    );
    store
}

/// Helper for tests: fixed factors and cheap key derivation.
#[cfg(test)]
pub fn test_store(
    secret: &str,
    password: &str,
) -> EncryptedFileStore<InMemorySecretProvider, StaticPasswordSource> {
    EncryptedFileStore::new(
        InMemorySecretProvider::new(Secret::new("TEST_SECRET", secret).expect("secret")),
        StaticPasswordSource::new(password).expect("password"),
    )
    .with_options(StoreOptions {
        kdf: KdfParams::insecure_fast(),
        ..StoreOptions::default()
    })
}
