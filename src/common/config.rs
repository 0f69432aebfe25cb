use crate::common::VaultError;
use crate::crypto::EncryptionKey;
use figment::{providers::Env, Figment};
use serde::Deserialize;

/// Raw environment values before validation.
#[derive(Deserialize)]
struct RawConfig {
    discord_token: String,
    discord_channel_id: String,
    allowed_users: Option<String>,
    encryption_key: String,
}

/// Validated process configuration.
///
/// All values are required at startup except the allow-list;
/// an empty allow-list means unrestricted command access.
#[derive(Clone)]
pub struct Config {
    pub token: String,
    pub channel_id: String,
    pub allowed_users: Vec<String>,
    pub key: EncryptionKey,
}

impl Config {
    /// Load and validate configuration from the environment.
    pub fn load() -> Result<Self, VaultError> {
        let raw: RawConfig = Figment::new()
            .merge(Env::raw().only(&[
                "DISCORD_TOKEN",
                "DISCORD_CHANNEL_ID",
                "ALLOWED_USERS",
                "ENCRYPTION_KEY",
            ]))
            .extract()
            .map_err(|e| VaultError::Config(e.to_string()))?;

        if raw.discord_token.is_empty() {
            return Err(VaultError::Config("DISCORD_TOKEN not set".to_string()));
        }
        if raw.discord_channel_id.is_empty() {
            return Err(VaultError::Config("DISCORD_CHANNEL_ID not set".to_string()));
        }

        let key = EncryptionKey::from_utf8(&raw.encryption_key)?;

        let allowed_users = raw
            .allowed_users
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            token: raw.discord_token,
            channel_id: raw.discord_channel_id,
            allowed_users,
            key,
        })
    }

    /// True when `user_id` may run commands. Empty allow-list admits everyone.
    pub fn is_allowed(&self, user_id: &str) -> bool {
        self.allowed_users.is_empty() || self.allowed_users.iter().any(|u| u == user_id)
    }
}
