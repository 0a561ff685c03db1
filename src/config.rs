//! Configuration types for the birthday bot.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the Discord bot token by default.
pub const DEFAULT_TOKEN_ENV: &str = "DISCORD_BOT_TOKEN";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CakedayConfig {
    /// Discord connection and command settings.
    pub discord: DiscordConfig,
    /// Birthday table persistence.
    pub store: StoreConfig,
    /// Daily sweep timing.
    pub sweep: SweepConfig,
    /// Celebration entry and announcement settings.
    pub celebration: CelebrationConfig,
    /// Log output.
    pub logging: LoggingConfig,
}

/// Discord adapter settings. The token itself is never stored here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    /// Name of the environment variable holding the bot token.
    pub token_env: String,
    /// REST API base URL.
    pub api_base: String,
    /// Prefix that marks a message as a command.
    pub command_prefix: String,
    /// Guild ids the bot answers in. Empty = every guild.
    pub allowed_guild_ids: Vec<String>,
    /// Seconds to wait before reconnecting after the gateway drops.
    pub reconnect_delay_secs: u64,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token_env: DEFAULT_TOKEN_ENV.to_owned(),
            api_base: "https://discord.com/api/v10".to_owned(),
            command_prefix: "!".to_owned(),
            allowed_guild_ids: Vec::new(),
            reconnect_delay_secs: 5,
        }
    }
}

impl DiscordConfig {
    /// Read the bot token from the configured environment variable.
    ///
    /// Returns `None` when the variable is unset or blank.
    pub fn read_token(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .map(|t| t.trim().to_owned())
            .filter(|t| !t.is_empty())
    }
}

/// Birthday table persistence settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Birthday table path (None = `cakeday_dirs::birthdays_file()`).
    pub path: Option<PathBuf>,
}

impl StoreConfig {
    /// Configured path or the platform default.
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(crate::cakeday_dirs::birthdays_file)
    }
}

/// Daily sweep settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Seconds between periodic sweeps.
    pub interval_secs: u64,
    /// Run a sweep as soon as the bot starts instead of waiting one interval.
    pub run_on_start: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: 24 * 3600,
            run_on_start: true,
        }
    }
}

impl SweepConfig {
    /// Sweep period, never shorter than one second.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

/// Celebration entry and announcement settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CelebrationConfig {
    /// Location label shown on celebration entries.
    pub location: String,
    /// Post an announcement message when a birthday is due.
    pub announce: bool,
    /// Create the celebration entry as soon as a birthday is set.
    pub create_on_set: bool,
    /// Announcement text. `{name}` and `{mention}` are substituted.
    pub announcement_template: String,
}

impl Default for CelebrationConfig {
    fn default() -> Self {
        Self {
            location: "Discord".to_owned(),
            announce: true,
            create_on_set: true,
            announcement_template:
                "🎉 Happy birthday {mention}! Check out the celebration event to join in the fun!"
                    .to_owned(),
        }
    }
}

/// Log output settings. `RUST_LOG` overrides `filter` when set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive.
    pub filter: String,
    /// Also write a daily-rolling log file under the logs directory.
    pub file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "cakeday=info".to_owned(),
            file: false,
        }
    }
}

impl CakedayConfig {
    /// Load configuration from a TOML file, falling back to defaults for
    /// missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::CakedayError::Config(e.to_string()))
    }

    /// Load from `path` when it exists, otherwise return defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> crate::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::CakedayError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> PathBuf {
        crate::cakeday_dirs::config_file()
    }
}
