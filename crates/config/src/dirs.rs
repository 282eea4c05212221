//! XDG directory utilities
//!
//! Directory layout used by hitch, following the XDG Base Directory
//! specification through the `xdg` crate:
//! - `$XDG_CONFIG_HOME/hitch/config.toml` holds user settings
//! - `$XDG_CACHE_HOME/hitch` holds hook repository checkouts
//! - `$XDG_STATE_HOME/hitch` holds logs
//!
//! `HITCH_HOME` overrides the cache location.

use std::path::PathBuf;
use xdg::BaseDirectories;

/// Environment variable overriding the cache directory
pub const HOME_ENV: &str = "HITCH_HOME";

/// Get the hitch config directory
///
/// Returns `$XDG_CONFIG_HOME/hitch` or `~/.config/hitch`
#[must_use]
pub fn config_dir() -> Option<PathBuf> {
    BaseDirectories::with_prefix("hitch").get_config_home()
}

/// Get the user settings file path
#[must_use]
pub fn settings_file() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Get the hook repository cache directory
///
/// Returns `$HITCH_HOME` when set, else `$XDG_CACHE_HOME/hitch` or
/// `~/.cache/hitch`
#[must_use]
pub fn cache_dir() -> Option<PathBuf> {
    if let Some(home) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(home));
    }
    BaseDirectories::with_prefix("hitch")
        .get_cache_home()
        .or_else(|| dirs::cache_dir().map(|d| d.join("hitch")))
}

/// Get the hitch state directory
///
/// Returns `$XDG_STATE_HOME/hitch` or `~/.local/state/hitch`
#[must_use]
pub fn state_dir() -> Option<PathBuf> {
    BaseDirectories::with_prefix("hitch").get_state_home()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_cache_dir_honors_override() {
        let dir = tempfile::tempdir().unwrap();
        temp_env::with_var(HOME_ENV, Some(dir.path()), || {
            assert_eq!(cache_dir().unwrap(), dir.path());
        });
    }

    #[test]
    #[serial]
    fn test_cache_dir_default_contains_name() {
        temp_env::with_var_unset(HOME_ENV, || {
            if let Some(path) = cache_dir() {
                assert!(path.to_string_lossy().contains("hitch"), "{path:?}");
            }
        });
    }

    #[test]
    fn test_settings_file_is_inside_config_dir() {
        if let (Some(dir), Some(file)) = (config_dir(), settings_file()) {
            assert!(file.starts_with(&dir));
            assert_eq!(file.file_name().and_then(|n| n.to_str()), Some("config.toml"));
        }
    }

    #[test]
    fn test_state_dir_is_absolute() {
        if let Some(path) = state_dir() {
            assert!(path.is_absolute(), "{path:?}");
        }
    }
}
