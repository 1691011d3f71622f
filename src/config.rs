//! Configuration loading and validation.

use crate::error::{ConfigError, Result};

/// Default engine program when `EDITBOT_ENGINE` is unset.
pub const DEFAULT_ENGINE_PROGRAM: &str = "vedit";

/// Default REST base used for interaction webhook edits.
pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// editbot configuration.
#[derive(Clone)]
pub struct Config {
    /// Discord bot credential.
    pub bot_token: String,

    /// Application the `edit` command belongs to.
    pub application_id: u64,

    /// Guild the `edit` command is registered against.
    pub guild_id: u64,

    /// External media engine settings.
    pub engine: EngineConfig,

    /// REST base for deferred-response edits.
    pub api_base: String,
}

/// External media engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Program invoked once per edit.
    pub program: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_ENGINE_PROGRAM.into(),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bot_token", &"<redacted>")
            .field("application_id", &self.application_id)
            .field("guild_id", &self.guild_id)
            .field("engine", &self.engine)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let bot_token = lookup("BOT_TOKEN")
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingKey("BOT_TOKEN".into()))?;

        let application_id = parse_snowflake("APP_ID", lookup("APP_ID"))?;
        let guild_id = parse_snowflake("GUILD_ID", lookup("GUILD_ID"))?;

        let engine = EngineConfig {
            program: lookup("EDITBOT_ENGINE")
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_ENGINE_PROGRAM.into()),
        };

        let api_base = lookup("EDITBOT_API_BASE")
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.into())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            bot_token,
            application_id,
            guild_id,
            engine,
            api_base,
        })
    }
}

/// Discord ids are non-zero unsigned 64-bit integers.
fn parse_snowflake(key: &str, value: Option<String>) -> Result<u64> {
    let raw = value.ok_or_else(|| ConfigError::MissingKey(key.into()))?;
    match raw.trim().parse::<u64>() {
        Ok(0) | Err(_) => Err(ConfigError::Invalid(format!(
            "invalid snowflake for ${key}: {raw:?}"
        ))
        .into()),
        Ok(id) => Ok(id),
    }
}
