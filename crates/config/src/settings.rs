//! User settings
//!
//! Optional TOML file at `$XDG_CONFIG_HOME/hitch/config.toml`:
//!
//! ```toml
//! [run]
//! jobs = 4
//! color = "auto"
//!
//! [cache]
//! dir = "/var/cache/hitch"
//! ```
//!
//! Command line flags take precedence over these values.

use hitch_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Color output mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// Color when output is a terminal
    #[default]
    #[serde(alias = "automatic")]
    Auto,
    /// Always color
    Always,
    /// Never color
    Never,
}

impl ColorMode {
    /// Determine if output should be colored
    #[must_use]
    pub fn should_color(&self, is_tty: bool) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => is_tty,
        }
    }
}

impl std::str::FromStr for ColorMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "auto" | "automatic" => Ok(Self::Auto),
            "always" => Ok(Self::Always),
            "never" => Ok(Self::Never),
            other => Err(format!(
                "invalid color mode '{other}' (valid: auto, always, never)"
            )),
        }
    }
}

/// `[run]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Maximum hooks executing at once (unset = available parallelism)
    pub jobs: Option<usize>,

    /// Color output mode
    pub color: ColorMode,
}

/// `[cache]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Hook repository cache location (unset = XDG cache directory)
    pub dir: Option<PathBuf>,
}

/// User settings file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Run behavior
    pub run: RunSettings,

    /// Cache behavior
    pub cache: CacheSettings,
}

impl Settings {
    /// Load settings from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Message(format!(
                "Failed to read settings file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_toml_str(&content, path)
    }

    /// Parse settings from TOML text
    pub fn from_toml_str(content: &str, path: &Path) -> Result<Self> {
        let settings: Self = toml::from_str(content).map_err(|e| Error::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        if settings.run.jobs == Some(0) {
            return Err(Error::Validation(
                "[run] jobs must be at least 1".to_string(),
            ));
        }

        Ok(settings)
    }

    /// Load the user settings file, falling back to defaults when absent
    pub fn load_default() -> Result<Self> {
        match crate::dirs::settings_file() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Effective cache directory
    #[must_use]
    pub fn cache_dir(&self) -> Option<PathBuf> {
        if std::env::var_os(crate::dirs::HOME_ENV).is_some_and(|v| !v.is_empty()) {
            return crate::dirs::cache_dir();
        }
        self.cache.dir.clone().or_else(crate::dirs::cache_dir)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use serial_test::serial;

    fn parse(content: &str) -> Result<Settings> {
        Settings::from_toml_str(content, Path::new("config.toml"))
    }

    #[test]
    fn test_empty_settings_use_defaults() {
        let settings = parse("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.run.color, ColorMode::Auto);
        assert!(settings.run.jobs.is_none());
    }

    #[test]
    fn test_parse_sections() {
        let settings =
            parse("[run]\njobs = 3\ncolor = \"never\"\n[cache]\ndir = \"/tmp/c\"\n").unwrap();
        assert_eq!(settings.run.jobs, Some(3));
        assert_eq!(settings.run.color, ColorMode::Never);
        assert_eq!(settings.cache.dir, Some(PathBuf::from("/tmp/c")));
    }

    #[test]
    fn test_zero_jobs_rejected() {
        let err = parse("[run]\njobs = 0\n").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_bad_toml_is_parse_error() {
        assert!(matches!(parse("[run\n").unwrap_err(), Error::Parse { .. }));
    }

    #[test]
    fn test_color_mode() {
        assert!(ColorMode::Auto.should_color(true));
        assert!(!ColorMode::Auto.should_color(false));
        assert!(ColorMode::Always.should_color(false));
        assert!(!ColorMode::Never.should_color(true));
        assert_eq!("always".parse::<ColorMode>().unwrap(), ColorMode::Always);
        assert!("rainbow".parse::<ColorMode>().is_err());
    }

    #[test]
    #[serial]
    fn test_env_override_beats_settings_cache_dir() {
        let settings = parse("[cache]\ndir = \"/from/settings\"\n").unwrap();
        temp_env::with_var(crate::dirs::HOME_ENV, Some("/from/env"), || {
            assert_eq!(settings.cache_dir(), Some(PathBuf::from("/from/env")));
        });
        temp_env::with_var_unset(crate::dirs::HOME_ENV, || {
            assert_eq!(settings.cache_dir(), Some(PathBuf::from("/from/settings")));
        });
    }
}
