use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// CLI surface definition.
#[derive(Parser, Debug)]
#[command(
    name = "enc2fa",
    about = "Encrypt data with a secret from a .env file and a password as second factor",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Encrypt text (or JSON with --json) from INPUT into OUTPUT. Use `-` for stdin.
    Encrypt {
        input: PathBuf,
        output: PathBuf,
        /// Parse the input as JSON instead of storing it as a string.
        #[arg(long)]
        json: bool,
    },
    /// Decrypt a file and print its contents.
    Read { file: PathBuf },
    /// Show the header of an encrypted file without decrypting it.
    Inspect { file: PathBuf },
    /// Manage the secret held in the env file.
    #[command(subcommand)]
    Secret(SecretCommand),
    /// Check that the secret loads and an encrypt/decrypt round trip succeeds.
    Health,
    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version and exit.
    Version,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum SecretCommand {
    /// Generate a fresh random secret.
    New {
        /// Append it to the configured env file instead of printing it.
        #[arg(long)]
        write: bool,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Create a default config file if one does not exist.
    Init,
}
