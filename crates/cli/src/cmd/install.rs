//! Install and uninstall command implementations
//!
//! Installed scripts live in the repository's hooks directory and forward to
//! `hitch hook-impl`. A foreign hook found at the target path is moved aside
//! to `<name>.legacy`; `hook-impl` still runs it first.

use anyhow::{Context, anyhow};
use clap::Args;
use hitch_config::Stage;
use hitch_engine::worktree;
use std::fs;
use std::path::{Path, PathBuf};

use crate::command::Command;
use crate::common::RuntimeContext;
use crate::error::Result;
use crate::ui::StatusIcon;

/// Line identifying scripts written by `install`
pub const MARKER: &str = "# hitch: managed hook script";

const LEGACY_SUFFIX: &str = ".legacy";

/// Install the git hook scripts
#[derive(Debug, Args)]
pub struct InstallCommand {
    /// Hook type to install (repeatable)
    #[arg(short = 't', long = "hook-type", default_value = "pre-commit")]
    pub hook_types: Vec<Stage>,

    /// Replace an existing foreign hook instead of keeping it as `.legacy`
    #[arg(short = 'f', long)]
    pub overwrite: bool,
}

/// Remove the git hook scripts
#[derive(Debug, Args)]
pub struct UninstallCommand {
    /// Hook type to remove (repeatable)
    #[arg(short = 't', long = "hook-type", default_value = "pre-commit")]
    pub hook_types: Vec<Stage>,
}

/// What `install_hook` did with the target path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Installed {
    /// Nothing was there before
    Fresh,
    /// Our previous script was rewritten
    Replaced,
    /// A foreign hook was moved to the given path
    MovedLegacy(PathBuf),
    /// A foreign hook was overwritten
    Overwrote,
}

fn legacy_path(hook: &Path) -> PathBuf {
    let mut name = hook.as_os_str().to_owned();
    name.push(LEGACY_SUFFIX);
    PathBuf::from(name)
}

/// Is the file at `path` a script written by `install`
#[must_use]
pub fn is_managed(path: &Path) -> bool {
    fs::read_to_string(path).is_ok_and(|content| content.contains(MARKER))
}

/// Render the script for `stage`
#[must_use]
pub fn hook_script(stage: Stage, exe: &Path) -> String {
    let exe = exe.display().to_string().replace('\'', r"'\''");
    format!(
        "#!/usr/bin/env sh\n\
         {MARKER}\n\
         HERE=\"$(cd \"$(dirname \"$0\")\" && pwd)\"\n\
         HITCH='{exe}'\n\
         if [ ! -x \"$HITCH\" ]; then\n    \
             HITCH=hitch\n\
         fi\n\
         exec \"$HITCH\" hook-impl --hook-type={stage} --hook-dir \"$HERE\" -- \"$@\"\n"
    )
}

fn ensure_installable(stage: Stage) -> Result<()> {
    if stage.is_installable() {
        Ok(())
    } else {
        Err(anyhow!("`{stage}` is not a git hook type and cannot be installed").into())
    }
}

/// Write the script for `stage` into `hooks_dir`
pub fn install_hook(
    hooks_dir: &Path,
    stage: Stage,
    exe: &Path,
    overwrite: bool,
) -> Result<Installed> {
    ensure_installable(stage)?;
    fs::create_dir_all(hooks_dir)
        .with_context(|| format!("Failed to create {}", hooks_dir.display()))?;

    let target = hooks_dir.join(stage.name());
    let legacy = legacy_path(&target);

    let outcome = if !target.exists() {
        Installed::Fresh
    } else if is_managed(&target) {
        Installed::Replaced
    } else if overwrite {
        if legacy.exists() {
            fs::remove_file(&legacy)?;
        }
        Installed::Overwrote
    } else {
        fs::rename(&target, &legacy)
            .with_context(|| format!("Failed to move {} aside", target.display()))?;
        Installed::MovedLegacy(legacy)
    };

    fs::write(&target, hook_script(stage, exe))
        .with_context(|| format!("Failed to write {}", target.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&target, fs::Permissions::from_mode(0o755))?;
    }

    tracing::debug!(hook = %target.display(), ?outcome, "Installed hook script");
    Ok(outcome)
}

/// Remove our script for `stage` and put a legacy hook back
///
/// Returns `false` when no managed script was present.
pub fn uninstall_hook(hooks_dir: &Path, stage: Stage) -> Result<bool> {
    let target = hooks_dir.join(stage.name());
    if !target.exists() || !is_managed(&target) {
        return Ok(false);
    }
    fs::remove_file(&target)?;

    let legacy = legacy_path(&target);
    if legacy.exists() {
        fs::rename(&legacy, &target)
            .with_context(|| format!("Failed to restore {}", legacy.display()))?;
    }
    Ok(true)
}

impl Command for InstallCommand {
    type Output = i32;

    fn execute(&self, context: &RuntimeContext) -> Result<i32> {
        let work_tree = context.work_tree()?;
        let hooks_dir = worktree::hooks_dir(&work_tree)?;
        let exe = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("hitch"));

        for stage in &self.hook_types {
            let outcome = install_hook(&hooks_dir, *stage, &exe, self.overwrite)?;
            if let Installed::MovedLegacy(legacy) = &outcome {
                println!(
                    "{} Existing hook moved to {}; it will still run first",
                    StatusIcon::Warning.get(),
                    legacy.display()
                );
            }
            println!(
                "{} hitch installed at {}",
                StatusIcon::Success.get(),
                hooks_dir.join(stage.name()).display()
            );
        }
        Ok(0)
    }
}

impl Command for UninstallCommand {
    type Output = i32;

    fn execute(&self, context: &RuntimeContext) -> Result<i32> {
        let work_tree = context.work_tree()?;
        let hooks_dir = worktree::hooks_dir(&work_tree)?;

        for stage in &self.hook_types {
            let target = hooks_dir.join(stage.name());
            if uninstall_hook(&hooks_dir, *stage)? {
                println!("{} {} uninstalled", StatusIcon::Success.get(), target.display());
                if target.exists() {
                    println!("{} Restored previous hook", StatusIcon::Info.get());
                }
            }
        }
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fresh_install_writes_managed_script() {
        let dir = TempDir::new().unwrap();
        let outcome =
            install_hook(dir.path(), Stage::PreCommit, Path::new("/usr/bin/hitch"), false).unwrap();
        assert_eq!(outcome, Installed::Fresh);

        let target = dir.path().join("pre-commit");
        let script = fs::read_to_string(&target).unwrap();
        assert!(script.starts_with("#!/usr/bin/env sh\n"));
        assert!(script.contains("hook-impl --hook-type=pre-commit"));
        assert!(is_managed(&target));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&target).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }

    #[test]
    fn test_foreign_hook_is_kept_as_legacy_and_restored() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("pre-push");
        fs::write(&target, "#!/bin/sh\necho mine\n").unwrap();

        let outcome = install_hook(dir.path(), Stage::PrePush, Path::new("hitch"), false).unwrap();
        assert_eq!(
            outcome,
            Installed::MovedLegacy(dir.path().join("pre-push.legacy"))
        );
        assert!(is_managed(&target));

        assert_eq!(
            install_hook(dir.path(), Stage::PrePush, Path::new("hitch"), false).unwrap(),
            Installed::Replaced
        );

        assert!(uninstall_hook(dir.path(), Stage::PrePush).unwrap());
        assert_eq!(fs::read_to_string(&target).unwrap(), "#!/bin/sh\necho mine\n");
        assert!(!dir.path().join("pre-push.legacy").exists());
    }

    #[test]
    fn test_overwrite_discards_foreign_hook() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("commit-msg"), "old").unwrap();

        let outcome = install_hook(dir.path(), Stage::CommitMsg, Path::new("hitch"), true).unwrap();
        assert_eq!(outcome, Installed::Overwrote);
        assert!(!dir.path().join("commit-msg.legacy").exists());
    }

    #[test]
    fn test_uninstall_leaves_foreign_hooks_alone() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("pre-commit"), "foreign").unwrap();
        assert!(!uninstall_hook(dir.path(), Stage::PreCommit).unwrap());
        assert!(dir.path().join("pre-commit").exists());
    }

    #[test]
    fn test_manual_stage_is_rejected() {
        let dir = TempDir::new().unwrap();
        assert!(install_hook(dir.path(), Stage::Manual, Path::new("hitch"), false).is_err());
    }
}
