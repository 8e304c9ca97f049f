//! Settings loaded from `settings.toml`.
//!
//! The file is looked up at `$GMAIL_PROCESSOR_CONFIG`, then `settings.toml`
//! in the working directory. A missing or invalid file gives the defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "GMAIL_PROCESSOR_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "settings.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// OAuth client secret downloaded from the Google Cloud console.
    pub credentials_path: PathBuf,
    /// JSON rule file.
    pub rules_path: PathBuf,
    pub database_url: String,
    /// Days of history fetched on each run.
    pub look_back_days: u32,
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Message ids requested per list page.
    pub page_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            credentials_path: PathBuf::from("config/credentials.json"),
            rules_path: PathBuf::from("config/rules.json"),
            database_url: "sqlite:email.db?mode=rwc".to_string(),
            look_back_days: 7,
            log_level: "info".to_string(),
            page_size: 100,
        }
    }
}

impl Config {
    pub fn load() -> Self {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Self {
        use std::fs;
        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str::<Self>(&content) {
                Ok(config) => {
                    tracing::info!(path = %path.display(), "Loaded config");
                    config.validated()
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to parse config, using defaults"
                    );
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Replace values that would make a run silently do nothing.
    fn validated(mut self) -> Self {
        let defaults = Self::default();
        if self.look_back_days == 0 {
            tracing::warn!(
                default = defaults.look_back_days,
                "look_back_days must be at least 1, using default"
            );
            self.look_back_days = defaults.look_back_days;
        }
        if self.page_size == 0 {
            tracing::warn!(default = defaults.page_size, "page_size must be at least 1, using default");
            self.page_size = defaults.page_size;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Config::load_from(&dir.path().join("nope.toml")), Config::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "look_back_days = 30").unwrap();
        writeln!(file, "rules_path = \"/etc/rules.json\"").unwrap();

        let config = Config::load_from(file.path());
        assert_eq!(config.look_back_days, 30);
        assert_eq!(config.rules_path, PathBuf::from("/etc/rules.json"));
        assert_eq!(config.database_url, Config::default().database_url);
    }

    #[test]
    fn zero_look_back_falls_back_to_default() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "look_back_days = 0").unwrap();
        writeln!(file, "page_size = 0").unwrap();
        writeln!(file, "log_level = \"debug\"").unwrap();

        let config = Config::load_from(file.path());
        assert_eq!(config.look_back_days, 7);
        assert_eq!(config.page_size, 100);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn invalid_file_gives_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "look_back_days = \"many\"").unwrap();
        assert_eq!(Config::load_from(file.path()), Config::default());
    }
}
