//! Bot configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format as _, Toml},
    value::Uncased,
};

use packrat_core::config::EngineConfig;

use serde::{Deserialize, Deserializer, de::Error as _};

/// The default config file.
pub const DEFAULT_CONFIG_PATH: &str = "packrat-bot.toml";

/// The main configuration struct.
#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    /// Card API access configuration.
    #[serde(default)]
    pub api: ApiConfig,
    /// Where collections are kept.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Pack and limit tunables.
    #[serde(default)]
    pub engine: EngineConfig,
}

impl Config {
    /// Loads a config from the environment and a given config path.
    ///
    /// Nested keys can be set from the environment with a double underscore,
    /// like `PACKRAT_ENGINE__DAILY_PULL_LIMIT`.
    pub fn load(config_path: impl AsRef<Path>) -> Result<Config, figment::Error> {
        Config::figment(config_path).extract()
    }

    fn figment(config_path: impl AsRef<Path>) -> Figment {
        Figment::new()
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("PACKRAT_").split("__"))
            .merge(
                Env::raw()
                    .only(&["DISCORD_TOKEN", "TOKEN"])
                    .map(|_| Uncased::from("GENERAL.DISCORD_TOKEN")),
            )
    }
}

/// General bot settings.
#[derive(Deserialize, Debug, Clone)]
pub struct GeneralConfig {
    /// The token the bot uses. Only maintenance commands run without one.
    #[serde(default)]
    pub discord_token: String,
    /// The default color of embeds.
    #[serde(
        deserialize_with = "deser_hex_color",
        default = "embed_color_default"
    )]
    pub embed_color: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            discord_token: String::new(),
            embed_color: embed_color_default(),
        }
    }
}

fn embed_color_default() -> u32 {
    0xFFCB05
}

/// Card API connectivity config.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ApiConfig {
    /// The API endpoint, without a trailing slash.
    pub endpoint: String,
    /// How many times a failed request is retried.
    pub retries: u32,
    /// The delay before the first retry, in milliseconds. Doubles on each
    /// retry.
    pub retry_backoff_ms: u64,
    /// How many card details are fetched at once.
    pub concurrency: usize,
}

impl ApiConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            endpoint: "https://api.tcgdex.net/v2/en".into(),
            retries: 3,
            retry_backoff_ms: 250,
            concurrency: 16,
        }
    }
}

/// Collection storage config.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// The directory collections are written to.
    pub directory: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            directory: PathBuf::from("collections"),
        }
    }
}

fn deser_hex_color<'de, D>(deser: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let color = String::deserialize(deser)?;
    let color = color.strip_prefix("#").unwrap_or(&color);
    u32::from_str_radix(color, 16).map_err(|e| D::Error::custom(e))
}
