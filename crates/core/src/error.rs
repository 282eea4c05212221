//! Base error types for hitch
//!
//! The variants mirror the phases of a run: a document that cannot be read
//! (`Parse`), a document that reads but is inconsistent (`Validation`), a
//! hook repository that cannot be obtained (`Resolution`) and a hook process
//! that terminated abnormally (`Execution`).

use std::path::PathBuf;
use thiserror::Error;

/// Base error type for shared functionality
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed configuration or manifest document
    #[error("Failed to parse {}: {message}", path.display())]
    Parse {
        /// Document that failed to parse
        path: PathBuf,
        /// Parser diagnostic
        message: String,
    },

    /// Structurally valid document with inconsistent content
    #[error("Invalid configuration: {0}")]
    Validation(String),

    /// Hook repository or pinned revision cannot be obtained
    #[error("Failed to resolve {repo}: {message}")]
    Resolution {
        /// Source identifier of the repository entry
        repo: String,
        /// Reason the revision could not be resolved
        message: String,
    },

    /// Hook process crashed, timed out or could not be spawned
    #[error("Hook '{hook}' errored: {message}")]
    Execution {
        /// Hook id
        hook: String,
        /// Description of the abnormal termination
        message: String,
    },

    /// Git operation error
    #[error("Git error: {0}")]
    Git(String),

    /// Hook repository cache error
    #[error("Cache error: {0}")]
    Cache(String),

    /// Generic error message
    #[error("{0}")]
    Message(String),
}

impl Error {
    /// Create a resolution error for a repository
    pub fn resolution(repo: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Resolution {
            repo: repo.into(),
            message: message.into(),
        }
    }

    /// Create an execution error for a hook
    pub fn execution(hook: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Execution {
            hook: hook.into(),
            message: message.into(),
        }
    }

    /// Whether this error must abort the run before any hook executes
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::Validation(_))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_parse_error_mentions_path() {
        let err = Error::Parse {
            path: PathBuf::from(".pre-commit-config.yaml"),
            message: "expected a mapping".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains(".pre-commit-config.yaml"));
        assert!(msg.contains("expected a mapping"));
    }

    #[test]
    fn test_resolution_error_mentions_repo() {
        let err = Error::resolution("https://example.com/hooks", "revision 'nope' not found");
        assert_eq!(
            err.to_string(),
            "Failed to resolve https://example.com/hooks: revision 'nope' not found"
        );
    }

    #[test]
    fn test_fatal_classification() {
        assert!(Error::Validation("bad".into()).is_fatal());
        assert!(
            Error::Parse {
                path: PathBuf::from("x"),
                message: String::new()
            }
            .is_fatal()
        );
        assert!(!Error::resolution("r", "m").is_fatal());
        assert!(!Error::execution("h", "m").is_fatal());
        assert!(!Error::Message("m".into()).is_fatal());
    }
}
