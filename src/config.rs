//! Configuration types.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::notify::OperatorRoster;

pub const DEFAULT_MANAGER_USERNAME: &str = "@manager";
pub const DEFAULT_PORT: u16 = 10000;
pub const DEFAULT_LEADS_PATH: &str = "./data/leads.json";

/// Bot configuration, read once at startup.
#[derive(Debug)]
pub struct BotConfig {
    /// Telegram bot token. `None` only in console mode.
    pub bot_token: Option<SecretString>,
    /// Operators who receive notifications and may claim leads.
    pub roster: OperatorRoster,
    /// Shown to customers as the direct contact.
    pub manager_username: String,
    /// Port of the liveness endpoint.
    pub port: u16,
    /// JSON file holding all leads.
    pub leads_path: PathBuf,
    /// Talk over stdin/stdout instead of Telegram.
    pub console: bool,
    /// Directory for daily-rolling log files, if any.
    pub log_dir: Option<PathBuf>,
}

impl BotConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let console = get("LEADBOT_CONSOLE").is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));

        let bot_token = get("BOT_TOKEN").map(SecretString::from);
        if bot_token.is_none() && !console {
            return Err(ConfigError::MissingEnvVar("BOT_TOKEN".to_string()));
        }

        let roster = match get("ADMIN_IDS") {
            Some(raw) => parse_admin_ids(&raw)?,
            None => OperatorRoster::default(),
        };

        let port = match get("PORT") {
            Some(raw) => raw.parse().map_err(|e| ConfigError::InvalidValue {
                key: "PORT".to_string(),
                message: format!("{raw:?}: {e}"),
            })?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            bot_token,
            roster,
            manager_username: get("MANAGER_USERNAME")
                .unwrap_or_else(|| DEFAULT_MANAGER_USERNAME.to_string()),
            port,
            leads_path: get("LEADS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LEADS_PATH)),
            console,
            log_dir: get("LOG_DIR").map(PathBuf::from),
        })
    }
}

/// Parse a comma-separated list of numeric operator ids.
pub fn parse_admin_ids(raw: &str) -> Result<OperatorRoster, ConfigError> {
    let ids = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>().map_err(|e| ConfigError::InvalidValue {
                key: "ADMIN_IDS".to_string(),
                message: format!("{s:?}: {e}"),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(OperatorRoster::new(ids))
}
