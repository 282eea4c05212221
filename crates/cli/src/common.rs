//! Common utilities and types shared across CLI commands

use crate::error::{CommandError, Result};
use hitch_config::{Config, Settings};
use hitch_engine::{CancelFlag, RepoCache, worktree};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Runtime context for CLI commands
///
/// Holds everything that is decided once per invocation: user settings, the
/// hook repository cache, the effective job count and color choice, and the
/// cancellation flag wired to Ctrl-C.
#[derive(Clone)]
pub struct RuntimeContext {
    /// User settings (`config.toml`)
    pub settings: Arc<Settings>,
    /// Hook repository cache
    pub cache: RepoCache,
    /// Cancellation flag set by the signal handler
    pub cancel: CancelFlag,
    /// Colorize terminal output
    pub color: bool,
    /// Default worker count for hook execution
    pub jobs: usize,
    cwd: PathBuf,
    config_override: Option<PathBuf>,
}

impl RuntimeContext {
    /// Create a context rooted at `cwd`
    pub fn new(
        settings: Settings,
        cache_dir: PathBuf,
        cwd: PathBuf,
        config_override: Option<PathBuf>,
    ) -> Self {
        let jobs = settings
            .run
            .jobs
            .unwrap_or_else(hitch_engine::hooks::runner::default_jobs);
        Self {
            settings: Arc::new(settings),
            cache: RepoCache::new(cache_dir),
            cancel: CancelFlag::new(),
            color: false,
            jobs,
            cwd,
            config_override,
        }
    }

    /// Directory the command was started from
    #[inline]
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Root of the enclosing git working tree
    pub fn work_tree(&self) -> Result<PathBuf> {
        worktree::find_working_tree(&self.cwd)
            .ok_or_else(|| CommandError::NotInRepository(self.cwd.clone()))
    }

    /// Path of the hook document for `work_tree`
    pub fn config_path(&self, work_tree: &Path) -> PathBuf {
        match &self.config_override {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => self.cwd.join(path),
            None => hitch_config::document::default_config_path(work_tree),
        }
    }

    /// Load the hook document of `work_tree`
    pub fn load_config(&self, work_tree: &Path) -> Result<(PathBuf, Config)> {
        let path = self.config_path(work_tree);
        if !path.exists() {
            return Err(CommandError::ConfigNotFound(path));
        }
        let config = Config::load(&path)?;

        if let Err(e) = self.cache.record_config(&path) {
            tracing::warn!(error = %e, "Failed to record configuration in cache index");
        }
        Ok((path, config))
    }
}

/// Express `path` relative to `work_tree`
///
/// Relative inputs are interpreted from `cwd`. Paths outside the working tree
/// are returned unchanged.
pub fn relative_to_work_tree(path: &Path, cwd: &Path, work_tree: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    };
    let work_tree = work_tree
        .canonicalize()
        .unwrap_or_else(|_| work_tree.to_path_buf());
    let absolute = absolute.canonicalize().unwrap_or(absolute);

    absolute
        .strip_prefix(&work_tree)
        .map_or_else(|_| path.to_path_buf(), Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_relative_to_work_tree() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/a.rs"), "").unwrap();

        let rel = relative_to_work_tree(
            Path::new("a.rs"),
            &dir.path().join("src"),
            dir.path(),
        );
        assert_eq!(rel, PathBuf::from("src/a.rs"));

        let abs = relative_to_work_tree(&dir.path().join("src/a.rs"), Path::new("/"), dir.path());
        assert_eq!(abs, PathBuf::from("src/a.rs"));
    }

    #[test]
    fn test_config_path_override() {
        let dir = TempDir::new().unwrap();
        let ctx = RuntimeContext::new(
            Settings::default(),
            dir.path().join("cache"),
            dir.path().to_path_buf(),
            Some(PathBuf::from("custom.yaml")),
        );
        assert_eq!(ctx.config_path(Path::new("/repo")), dir.path().join("custom.yaml"));

        let ctx = RuntimeContext::new(
            Settings::default(),
            dir.path().join("cache"),
            dir.path().to_path_buf(),
            None,
        );
        assert_eq!(
            ctx.config_path(Path::new("/repo")),
            Path::new("/repo/.pre-commit-config.yaml")
        );
    }

    #[test]
    fn test_missing_config_is_reported() {
        let dir = TempDir::new().unwrap();
        let ctx = RuntimeContext::new(
            Settings::default(),
            dir.path().join("cache"),
            dir.path().to_path_buf(),
            None,
        );
        let err = ctx.load_config(dir.path()).unwrap_err();
        assert!(matches!(err, CommandError::ConfigNotFound(_)));
    }
}
