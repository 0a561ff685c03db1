//! Centralized directory paths for the bot.
//!
//! Uses the [`dirs`] crate for platform-appropriate resolution.
//!
//! | Purpose | Linux | macOS |
//! |---------|-------|-------|
//! | Data | `~/.local/share/cakeday/` | `~/Library/Application Support/cakeday/` |
//! | Config | `~/.config/cakeday/` | `~/Library/Application Support/cakeday/` |
//!
//! # Environment Overrides
//!
//! - `CAKEDAY_DATA_DIR`: overrides [`data_dir`]
//! - `CAKEDAY_CONFIG_DIR`: overrides [`config_dir`]

use std::path::PathBuf;

/// Application data root: the birthday table and logs.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("CAKEDAY_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("cakeday"))
        .unwrap_or_else(|| PathBuf::from("/tmp/cakeday-data"))
}

/// Application config directory.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("CAKEDAY_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("cakeday"))
        .unwrap_or_else(|| PathBuf::from("/tmp/cakeday-config"))
}

/// Log file directory (`data_dir()/logs/`).
#[must_use]
pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Main config file path (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Default birthday table path (`data_dir()/birthdays.json`).
#[must_use]
pub fn birthdays_file() -> PathBuf {
    data_dir().join("birthdays.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_dir_is_nonempty() {
        assert!(!data_dir().as_os_str().is_empty());
    }

    #[test]
    fn config_file_ends_with_config_toml() {
        let path = config_file();
        let s = path.to_string_lossy();
        assert!(s.ends_with("config.toml"), "config_file: {s}");
    }

    #[test]
    fn birthdays_file_is_json_under_data_dir() {
        let path = birthdays_file();
        assert!(path.starts_with(data_dir()));
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("json"));
    }

    #[test]
    fn logs_dir_is_subpath_of_data_dir() {
        let logs = logs_dir();
        let data = data_dir();
        assert!(
            logs.starts_with(&data),
            "logs_dir ({}) should start with data_dir ({})",
            logs.display(),
            data.display()
        );
    }
}
