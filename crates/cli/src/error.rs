//! Error types for CLI commands
//!
//! Command plumbing uses `anyhow` for context; the variants here are the
//! outcomes that decide the process exit status.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during command execution
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CommandError {
    /// Not inside a git working tree
    #[error("Not a git repository (or any of the parent directories): {}", .0.display())]
    NotInRepository(PathBuf),

    /// No hook document where one was expected
    #[error("No {} file was found", .0.display())]
    ConfigNotFound(PathBuf),

    /// One or more documents failed validation
    #[error("{0} file(s) failed validation")]
    InvalidFiles(usize),

    /// Library error (parse, validation, git, cache)
    #[error(transparent)]
    Core(#[from] hitch_core::Error),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic error with context
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for command operations
pub type Result<T> = std::result::Result<T, CommandError>;

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_config_not_found_message() {
        let error = CommandError::ConfigNotFound(PathBuf::from(".pre-commit-config.yaml"));
        assert_eq!(
            error.to_string(),
            "No .pre-commit-config.yaml file was found"
        );
    }

    #[test]
    fn test_core_error_is_transparent() {
        let error: CommandError = hitch_core::Error::Validation("bad pattern".into()).into();
        assert_eq!(error.to_string(), "Invalid configuration: bad pattern");
    }

    #[test]
    fn test_anyhow_error_conversion() {
        let error: CommandError = anyhow::anyhow!("something went wrong").into();
        assert!(matches!(error, CommandError::Other(_)));
        assert!(error.to_string().contains("something went wrong"));
    }
}
