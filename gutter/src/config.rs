//! User configuration and on-disk locations.
//!
//! Every key is optional. A missing file yields the defaults; an unreadable
//! or malformed one is logged and also yields the defaults, so a typo never
//! prevents startup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use gutter_core::markers::search::DEFAULT_DEBOUNCE;
use gutter_core::render::{ViewType, DEFAULT_SYNTAX_THEME};
use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// UI color theme: `"catppuccin-mocha"` or `"dark"`.
    pub theme: String,
    /// Initial diff layout.
    pub view: ViewType,
    /// Quiet period before search re-scans a changed view.
    pub search_debounce_ms: u64,
    /// syntect theme for code highlighting.
    pub syntax_theme: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            theme: "catppuccin-mocha".to_owned(),
            view: ViewType::Unified,
            search_debounce_ms: u64::try_from(DEFAULT_DEBOUNCE.as_millis()).unwrap_or(100),
            syntax_theme: DEFAULT_SYNTAX_THEME.to_owned(),
        }
    }
}

impl Config {
    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    /// Loads the config at `path`, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) => {
                debug!(path = %path.display(), error = %err, "no config file, using defaults");
                return Self::default();
            }
        };
        Self::parse(&raw).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "invalid config, using defaults");
            Self::default()
        })
    }

    pub fn parse(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

/// `$XDG_CONFIG_HOME/gutter/config.toml`, else `~/.config/gutter/config.toml`.
pub fn config_path() -> PathBuf {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| home_dir().map(|h| h.join(".config")))
        .unwrap_or_else(|| PathBuf::from(".config"));
    base.join("gutter").join("config.toml")
}

/// `$XDG_STATE_HOME/gutter/gutter.log`, else `~/.local/state/gutter/gutter.log`.
pub fn log_path() -> PathBuf {
    let base = std::env::var_os("XDG_STATE_HOME")
        .map(PathBuf::from)
        .or_else(|| home_dir().map(|h| h.join(".local").join("state")))
        .unwrap_or_else(|| PathBuf::from(".gutter"));
    base.join("gutter").join("gutter.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(Config::parse("").unwrap(), Config::default());
    }

    #[test]
    fn keys_override_defaults_individually() {
        let config = Config::parse("view = \"split\"\nsearch_debounce_ms = 250\n").unwrap();
        assert_eq!(config.view, ViewType::Split);
        assert_eq!(config.search_debounce(), Duration::from_millis(250));
        assert_eq!(config.theme, "catppuccin-mocha");
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(Config::parse("view = \"sideways\"").is_err());
        assert_eq!(Config::load(Path::new("/nonexistent/gutter.toml")), Config::default());
    }
}
