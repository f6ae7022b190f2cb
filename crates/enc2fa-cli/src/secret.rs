use color_eyre::Result;
use enc2fa_core::Secret;
use enc2fa_storage::secret_provider::append_secret;
use tracing::info;

use crate::config::Config;

/// Generate a secret and either print it or append it to the configured env file.
pub fn new_secret(config: &Config, write: bool) -> Result<()> {
    let secret = Secret::generate();
    let var = config.secret_var();

    if !write {
        println!("{var}=\"{}\"", secret.expose());
        return Ok(());
    }

    let path = config.env_file();
    if append_secret(&path, &var, &secret)? {
        info!(path = ?path, "secret written");
        println!("Secret {var} written to {}", path.display());
    } else {
        println!(
            "{var} is already defined in {}; left unchanged",
            path.display()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn write_mode_appends_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let env_file = dir.path().join(".env");
        let config = Config {
            env_file: Some(env_file.clone()),
            secret_var: Some("ENC2FA_TEST_CLI_SECRET".into()),
            ..Config::default()
        };

        new_secret(&config, true).expect("first write");
        let first = fs::read_to_string(&env_file).expect("read");
        new_secret(&config, true).expect("second write");
        let second = fs::read_to_string(&env_file).expect("read");

        assert!(first.starts_with("ENC2FA_TEST_CLI_SECRET="));
        assert_eq!(first, second);
    }
}
