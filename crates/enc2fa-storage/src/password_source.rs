use async_trait::async_trait;
use enc2fa_core::{Password, PasswordError, PasswordSource};

/// Prompts on the controlling terminal without echoing input.
#[derive(Debug, Clone)]
pub struct PromptPasswordSource {
    prompt: String,
}

impl PromptPasswordSource {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }
}

impl Default for PromptPasswordSource {
    fn default() -> Self {
        Self::new("Password: ")
    }
}

#[async_trait]
impl PasswordSource for PromptPasswordSource {
    async fn password(&self) -> Result<Password, PasswordError> {
        // rpassword blocks on the tty; the prompt is the only thing in flight.
        let input = rpassword::prompt_password(&self.prompt).map_err(|e| PasswordError::Input {
            reason: e.to_string(),
        })?;
        Password::new(input)
    }
}

/// Fixed password, for tests and non-interactive embedding.
#[derive(Debug, Clone)]
pub struct StaticPasswordSource {
    password: Password,
}

impl StaticPasswordSource {
    pub fn new(password: impl Into<String>) -> Result<Self, PasswordError> {
        Ok(Self {
            password: Password::new(password)?,
        })
    }
}

#[async_trait]
impl PasswordSource for StaticPasswordSource {
    async fn password(&self) -> Result<Password, PasswordError> {
        Ok(self.password.clone())
    }
}
