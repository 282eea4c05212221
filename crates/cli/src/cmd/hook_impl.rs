//! Entry point of installed hook scripts
//!
//! Git calls the script, the script calls `hitch hook-impl`. The legacy hook
//! (if any) runs first; then the stage's hooks run with the file set and
//! environment derived from git's arguments.

use anyhow::Context;
use clap::Args;
use hitch_config::Stage;
use hitch_engine::worktree;
use std::io::Read;
use std::path::{Path, PathBuf};

use super::run::{FileSource, RunOptions, run_hooks};
use crate::command::Command;
use crate::common::RuntimeContext;
use crate::error::Result;
use crate::ui::StatusIcon;

/// Run the hooks of one stage on behalf of git
#[derive(Debug, Args)]
pub struct HookImplCommand {
    /// Stage the calling script was installed for
    #[arg(long = "hook-type")]
    pub hook_type: Stage,

    /// Directory holding the calling script
    #[arg(long)]
    pub hook_dir: Option<PathBuf>,

    /// Exit successfully when the project has no hook document
    #[arg(long, env = "PRE_COMMIT_ALLOW_NO_CONFIG")]
    pub skip_on_missing_config: bool,

    /// Arguments git passed to the hook
    #[arg(last = true)]
    pub args: Vec<String>,
}

/// One line of pre-push standard input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushUpdate {
    /// Local ref being pushed
    pub local_ref: String,
    /// Commit being pushed
    pub local_sha: String,
    /// Destination ref
    pub remote_ref: String,
    /// Commit the remote currently has (all zeros for a new ref)
    pub remote_sha: String,
}

fn is_null_sha(sha: &str) -> bool {
    !sha.is_empty() && sha.bytes().all(|b| b == b'0')
}

/// Parse pre-push standard input, skipping ref deletions
#[must_use]
pub fn parse_push_updates(input: &str) -> Vec<PushUpdate> {
    input
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let update = PushUpdate {
                local_ref: fields.next()?.to_string(),
                local_sha: fields.next()?.to_string(),
                remote_ref: fields.next()?.to_string(),
                remote_sha: fields.next()?.to_string(),
            };
            (!is_null_sha(&update.local_sha)).then_some(update)
        })
        .collect()
}

fn push_source(work_tree: &Path, update: &PushUpdate) -> Result<FileSource> {
    let from = if is_null_sha(&update.remote_sha) {
        worktree::unpushed_base(work_tree, &update.local_sha)?
    } else {
        Some(update.remote_sha.clone())
    };
    Ok(FileSource::Range {
        from,
        to: update.local_sha.clone(),
    })
}

fn env_pair(key: &str, value: &str) -> (String, String) {
    (key.to_string(), value.to_string())
}

impl HookImplCommand {
    fn legacy_hook(&self, work_tree: &Path) -> Option<PathBuf> {
        let dir = self
            .hook_dir
            .clone()
            .or_else(|| worktree::hooks_dir(work_tree).ok())?;
        let legacy = dir.join(format!("{}.legacy", self.hook_type));
        legacy.is_file().then_some(legacy)
    }

    fn run_legacy(&self, legacy: &Path, stdin: &[u8]) -> Result<bool> {
        tracing::debug!(hook = %legacy.display(), "Running legacy hook");
        let output = duct::cmd(legacy, &self.args)
            .stdin_bytes(stdin.to_vec())
            .unchecked()
            .run()
            .with_context(|| format!("Failed to run {}", legacy.display()))?;
        Ok(output.status.success())
    }

    /// Translate git's arguments into run options; `None` means nothing to do
    fn options(&self, work_tree: &Path, stdin: &str) -> Result<Option<RunOptions>> {
        let mut options = RunOptions::for_stage(self.hook_type);
        let arg = |i: usize| self.args.get(i).map(String::as_str);

        match self.hook_type {
            Stage::PreCommit | Stage::PreMergeCommit => {}
            Stage::CommitMsg | Stage::PrepareCommitMsg => {
                if let Some(file) = arg(0) {
                    options.files = FileSource::Message(PathBuf::from(file));
                }
                if let Some(source) = arg(1) {
                    options
                        .env
                        .push(env_pair("PRE_COMMIT_COMMIT_MSG_SOURCE", source));
                }
                if let Some(sha) = arg(2) {
                    options.env.push(env_pair("PRE_COMMIT_COMMIT_OBJECT_NAME", sha));
                }
            }
            Stage::PrePush => {
                let Some(update) = parse_push_updates(stdin).into_iter().next() else {
                    return Ok(None);
                };
                options.files = push_source(work_tree, &update)?;
                if let FileSource::Range { from: Some(from), .. } = &options.files {
                    options.env.push(env_pair("PRE_COMMIT_FROM_REF", from));
                }
                options.env.extend([
                    env_pair("PRE_COMMIT_TO_REF", &update.local_sha),
                    env_pair("PRE_COMMIT_LOCAL_BRANCH", &update.local_ref),
                    env_pair("PRE_COMMIT_REMOTE_BRANCH", &update.remote_ref),
                ]);
                if let Some(name) = arg(0) {
                    options.env.push(env_pair("PRE_COMMIT_REMOTE_NAME", name));
                }
                if let Some(url) = arg(1) {
                    options.env.push(env_pair("PRE_COMMIT_REMOTE_URL", url));
                }
            }
            Stage::PostCheckout => {
                for (key, i) in [
                    ("PRE_COMMIT_FROM_REF", 0),
                    ("PRE_COMMIT_TO_REF", 1),
                    ("PRE_COMMIT_CHECKOUT_TYPE", 2),
                ] {
                    if let Some(value) = arg(i) {
                        options.env.push(env_pair(key, value));
                    }
                }
            }
            Stage::PostMerge => {
                if let Some(squash) = arg(0) {
                    options.env.push(env_pair("PRE_COMMIT_IS_SQUASH_MERGE", squash));
                }
            }
            Stage::PostRewrite => {
                if let Some(command) = arg(0) {
                    options.env.push(env_pair("PRE_COMMIT_REWRITE_COMMAND", command));
                }
            }
            Stage::PostCommit | Stage::Manual => {}
        }
        Ok(Some(options))
    }
}

impl Command for HookImplCommand {
    type Output = i32;

    fn execute(&self, context: &RuntimeContext) -> Result<i32> {
        let work_tree = context.work_tree()?;

        let mut stdin = Vec::new();
        if self.hook_type == Stage::PrePush {
            std::io::stdin()
                .read_to_end(&mut stdin)
                .context("Failed to read pre-push input")?;
        }

        let legacy_ok = match self.legacy_hook(&work_tree) {
            Some(legacy) => self.run_legacy(&legacy, &stdin)?,
            None => true,
        };

        let config_path = context.config_path(&work_tree);
        if !config_path.exists() {
            if self.skip_on_missing_config {
                println!(
                    "{} No {} file was found, skipping hooks",
                    StatusIcon::Info.get(),
                    config_path.display()
                );
                return Ok(i32::from(!legacy_ok));
            }
            eprintln!(
                "{} No {} file was found. Run `hitch sample-config` to create one, \
                 or set PRE_COMMIT_ALLOW_NO_CONFIG=1 to skip.",
                StatusIcon::Error.get(),
                config_path.display()
            );
            return Ok(1);
        }

        let input = String::from_utf8_lossy(&stdin);
        let code = match self.options(&work_tree, &input)? {
            Some(options) => run_hooks(context, &options)?,
            None => 0,
        };

        Ok(if code == 0 && !legacy_ok { 1 } else { code })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;

    const ZERO: &str = "0000000000000000000000000000000000000000";

    fn command(stage: Stage, args: &[&str]) -> HookImplCommand {
        HookImplCommand {
            hook_type: stage,
            hook_dir: None,
            skip_on_missing_config: false,
            args: args.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn test_parse_push_updates_skips_deletions() {
        let input = format!(
            "refs/heads/gone {ZERO} refs/heads/gone abc123\n\
             refs/heads/main def456 refs/heads/main abc123\n\
             malformed line\n"
        );
        let updates = parse_push_updates(&input);
        assert_eq!(
            updates,
            vec![PushUpdate {
                local_ref: "refs/heads/main".to_string(),
                local_sha: "def456".to_string(),
                remote_ref: "refs/heads/main".to_string(),
                remote_sha: "abc123".to_string(),
            }]
        );
    }

    #[test]
    fn test_pre_push_existing_branch_uses_remote_sha() {
        let cmd = command(Stage::PrePush, &["origin", "git@example.com:x.git"]);
        let options = cmd
            .options(
                Path::new("/nonexistent"),
                "refs/heads/main def456 refs/heads/main abc123\n",
            )
            .unwrap()
            .unwrap();
        assert_eq!(
            options.files,
            FileSource::Range {
                from: Some("abc123".to_string()),
                to: "def456".to_string()
            }
        );
        assert!(options.env.contains(&env_pair("PRE_COMMIT_REMOTE_NAME", "origin")));
        assert!(options.env.contains(&env_pair("PRE_COMMIT_FROM_REF", "abc123")));
    }

    #[test]
    fn test_pre_push_with_only_deletions_does_nothing() {
        let cmd = command(Stage::PrePush, &["origin", "url"]);
        let input = format!("refs/heads/gone {ZERO} refs/heads/gone abc123\n");
        assert!(cmd.options(Path::new("/nonexistent"), &input).unwrap().is_none());
    }

    #[test]
    fn test_commit_msg_uses_message_file() {
        let cmd = command(Stage::CommitMsg, &[".git/COMMIT_EDITMSG"]);
        let options = cmd.options(Path::new("/repo"), "").unwrap().unwrap();
        assert_eq!(
            options.files,
            FileSource::Message(PathBuf::from(".git/COMMIT_EDITMSG"))
        );
    }

    #[test]
    fn test_post_checkout_exports_refs() {
        let cmd = command(Stage::PostCheckout, &["aaa", "bbb", "1"]);
        let options = cmd.options(Path::new("/repo"), "").unwrap().unwrap();
        assert_eq!(options.files, FileSource::Nothing);
        assert_eq!(
            options.env,
            vec![
                env_pair("PRE_COMMIT_FROM_REF", "aaa"),
                env_pair("PRE_COMMIT_TO_REF", "bbb"),
                env_pair("PRE_COMMIT_CHECKOUT_TYPE", "1"),
            ]
        );
    }
}
