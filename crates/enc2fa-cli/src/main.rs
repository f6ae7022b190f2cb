mod cli;
mod config;
mod files;
mod secret;
mod storage;

use crate::cli::{Command, ConfigCommand, SecretCommand};
use clap::Parser;
use color_eyre::{eyre::WrapErr, Result};
use enc2fa_core::{PasswordSource, SecretProvider};
use enc2fa_storage::EncryptedFileStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = cli::Cli::parse();
    let config = match &cli.config {
        Some(path) => config::load_from_path(path)?,
        None => config::load()?,
    };

    match cli.command {
        Command::Encrypt {
            input,
            output,
            json,
        } => {
            let store = storage::store_from_config(&config);
            files::encrypt(&store, &input, &output, json).await?;
            println!("Encrypted to {}", output.display());
        }
        Command::Read { file } => {
            let store = storage::store_from_config(&config);
            println!("{}", files::read(&store, &file).await?);
        }
        Command::Inspect { file } => println!("{}", files::inspect(&file)?),
        Command::Secret(SecretCommand::New { write }) => secret::new_secret(&config, write)?,
        Command::Health => run_health_check(&config).await?,
        Command::Config(ConfigCommand::Init) => init_config(cli.config.as_deref())?,
        Command::Version => print_version(),
    }

    Ok(())
}

fn init_tracing() {
    // Respect user-provided filters; logs go to stderr so decrypted output stays clean.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn print_version() {
    println!("enc2fa {}", env!("CARGO_PKG_VERSION"));
}

/// Runs a quick in-memory round trip with the configured secret and a prompted password.
async fn run_health_check(config: &config::Config) -> Result<()> {
    let store = storage::store_from_config(config);
    run_store_health(&store).await?;
    println!("Secret: ok ({})", config.env_file().display());
    println!("Encryption: ok");
    Ok(())
}

async fn run_store_health<S: SecretProvider, P: PasswordSource>(
    store: &EncryptedFileStore<S, P>,
) -> Result<()> {
    let context = "health/probe";
    let payload = "ok";
    let token = store
        .encrypt_data(payload, context)
        .await
        .wrap_err("encryption failed")?;
    let round_trip: String = store
        .decrypt_data(&token, context)
        .await
        .wrap_err("decryption failed")?;

    if round_trip != payload {
        color_eyre::eyre::bail!("encryption round-trip failed");
    }
    Ok(())
}

fn init_config(path: Option<&std::path::Path>) -> Result<()> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => config::default_path()?,
    };
    let path = config::write_if_missing(&config::Config::with_defaults(), &path)?;
    println!("Config initialized at {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage;

    #[tokio::test]
    async fn health_check_with_test_store_succeeds() {
        let store = storage::test_store("some salt", "dfdfdfdf");
        run_store_health(&store)
            .await
            .expect("health check should succeed");
    }

    #[test]
    fn init_config_writes_to_explicit_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        init_config(Some(path.as_path())).expect("init");

        let loaded = config::load_from_path(&path).expect("load");
        assert_eq!(loaded, config::Config::with_defaults());
    }
}
