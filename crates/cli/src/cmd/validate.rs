//! Validate-config and validate-manifest command implementations

use clap::Args;
use hitch_config::manifest::parse_manifest;
use hitch_config::{CONFIG_FILE, Config, MANIFEST_FILE};
use std::path::{Path, PathBuf};

use crate::command::Command;
use crate::common::RuntimeContext;
use crate::error::{CommandError, Result};
use crate::ui::StatusIcon;

/// Validate hook documents
#[derive(Debug, Args)]
pub struct ValidateConfigCommand {
    /// Documents to check (defaults to the project's document)
    pub files: Vec<PathBuf>,
}

/// Validate hook manifests
#[derive(Debug, Args)]
pub struct ValidateManifestCommand {
    /// Manifests to check (defaults to `.pre-commit-hooks.yaml`)
    pub files: Vec<PathBuf>,
}

fn check_manifest(path: &Path) -> hitch_core::Result<()> {
    let content = std::fs::read_to_string(path)?;
    parse_manifest(&content, path).map(|_| ())
}

/// Report each failure and count them
fn validate_all<F>(files: &[PathBuf], check: F) -> Result<()>
where
    F: Fn(&Path) -> hitch_core::Result<()>,
{
    let mut failures = 0;
    for file in files {
        match check(file) {
            Ok(()) => tracing::debug!(file = %file.display(), "Valid"),
            Err(e) => {
                failures += 1;
                eprintln!("{} {}: {e}", StatusIcon::Error.get(), file.display());
            }
        }
    }
    if failures == 0 {
        Ok(())
    } else {
        Err(CommandError::InvalidFiles(failures))
    }
}

fn resolve_files(context: &RuntimeContext, files: &[PathBuf], default: PathBuf) -> Vec<PathBuf> {
    if files.is_empty() {
        vec![default]
    } else {
        files.iter().map(|f| context.cwd().join(f)).collect()
    }
}

impl Command for ValidateConfigCommand {
    type Output = i32;

    fn execute(&self, context: &RuntimeContext) -> Result<i32> {
        let default = context.work_tree().map_or_else(
            |_| context.cwd().join(CONFIG_FILE),
            |work_tree| context.config_path(&work_tree),
        );
        let files = resolve_files(context, &self.files, default);
        validate_all(&files, |path| Config::load(path).map(|_| ()))?;
        Ok(0)
    }
}

impl Command for ValidateManifestCommand {
    type Output = i32;

    fn execute(&self, context: &RuntimeContext) -> Result<i32> {
        let files = resolve_files(context, &self.files, context.cwd().join(MANIFEST_FILE));
        validate_all(&files, check_manifest)?;
        Ok(0)
    }
}
