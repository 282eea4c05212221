//! Configuration management for hitch
//!
//! This crate handles:
//! - The hook document (`.pre-commit-config.yaml`) model, loading and validation
//! - The hook manifest (`.pre-commit-hooks.yaml`) published by hook repositories
//! - Execution stages
//! - User settings and XDG directory management
//! - Logging initialization

pub mod dirs;
pub mod document;
pub mod logging;
pub mod manifest;
pub mod settings;
pub mod stage;

// Re-export error types from core
pub use hitch_core::{Error, Result};

// Re-export main types
pub use document::{Config, HookInvocation, RepoEntry, RepoKind};
pub use manifest::{Language, ManifestHook};
pub use settings::{CacheSettings, ColorMode, RunSettings, Settings};
pub use stage::Stage;

/// Default file name of the hook document at the repository root
pub const CONFIG_FILE: &str = ".pre-commit-config.yaml";

/// File name of the hook manifest inside a hook repository
pub const MANIFEST_FILE: &str = ".pre-commit-hooks.yaml";

/// Environment variable listing hook ids to skip
pub const SKIP_ENV: &str = "SKIP";
