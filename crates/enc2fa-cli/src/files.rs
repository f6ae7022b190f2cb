use std::{
    fs,
    io::{self, Read},
    path::Path,
};

use color_eyre::{eyre::WrapErr, Result};
use enc2fa_core::{Codec, PasswordSource, SecretProvider, StoreError};
use enc2fa_storage::EncryptedFileStore;
use serde_json::Value;

/// Encrypt `input` (a path, or `-` for stdin) into `output`.
pub async fn encrypt<S: SecretProvider, P: PasswordSource>(
    store: &EncryptedFileStore<S, P>,
    input: &Path,
    output: &Path,
    json: bool,
) -> Result<()> {
    let text = read_input(input)?;
    let payload = if json {
        serde_json::from_str::<Value>(&text).wrap_err("input is not valid JSON")?
    } else {
        Value::String(text)
    };

    store
        .save_encrypted(&payload, output)
        .await
        .wrap_err_with(|| format!("could not encrypt into {}", output.display()))
}

/// Decrypt `file` and render it for the terminal: strings verbatim, anything
/// else as pretty JSON.
///
/// Bincode is not self-describing, so bincode files are only shown when they
/// hold text.
pub async fn read<S: SecretProvider, P: PasswordSource>(
    store: &EncryptedFileStore<S, P>,
    file: &Path,
) -> Result<String> {
    let info = enc2fa_storage::inspect(file)
        .wrap_err_with(|| format!("could not decrypt {}", file.display()))?;

    let value = match info.codec {
        Codec::Json => store
            .read_encrypted::<Value>(file)
            .await
            .wrap_err_with(|| format!("could not decrypt {}", file.display()))?,
        Codec::Bincode => match store.read_encrypted::<String>(file).await {
            Ok(text) => Value::String(text),
            Err(err @ StoreError::Codec(_)) => {
                return Err(err).wrap_err_with(|| {
                    format!(
                        "{} holds a bincode payload that is not text; it needs a typed reader",
                        file.display()
                    )
                })
            }
            Err(err) => {
                return Err(err).wrap_err_with(|| format!("could not decrypt {}", file.display()))
            }
        },
    };
    match value {
        Value::String(text) => Ok(text),
        other => Ok(serde_json::to_string_pretty(&other)?),
    }
}

pub fn inspect(file: &Path) -> Result<String> {
    let info = enc2fa_storage::inspect(file)
        .wrap_err_with(|| format!("could not inspect {}", file.display()))?;
    Ok(format!(
        "format version: {}\ncodec: {}\nencrypted at: {} ({})",
        info.version,
        info.codec,
        info.created_at.to_rfc2822(),
        info.created_at.timestamp()
    ))
}

fn read_input(input: &Path) -> Result<String> {
    if input == Path::new("-") {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .wrap_err("could not read stdin")?;
        return Ok(buf);
    }
    fs::read_to_string(input).wrap_err_with(|| format!("could not read {}", input.display()))
}
