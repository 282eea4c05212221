//! Run command implementation
//!
//! Loads the hook document, resolves its repositories, picks the candidate
//! files (staged, all, explicit or a ref range), runs the hooks and prints
//! the report in document order.

use anyhow::Context;
use clap::Args;
use hitch_config::{SKIP_ENV, Stage};
use hitch_engine::hooks::runner::parse_skip;
use hitch_engine::worktree::{self, UnstagedChanges};
use hitch_engine::{CandidateSet, Git2Provider, HookRunner, Resolver};
use owo_colors::OwoColorize;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use crate::command::Command;
use crate::common::{RuntimeContext, relative_to_work_tree};
use crate::error::Result;
use crate::ui::{Printer, ProgressObserver, StatusIcon, create_spinner};

/// Run hooks against the repository
#[derive(Debug, Args)]
pub struct RunCommand {
    /// Run only the hook with this id or alias
    pub hook: Option<String>,

    /// Run on every tracked file
    #[arg(short, long, conflicts_with_all = ["files", "from_ref"])]
    pub all_files: bool,

    /// Run on the given files
    #[arg(long, num_args = 1.., conflicts_with = "from_ref")]
    pub files: Vec<PathBuf>,

    /// Run on files changed since this revision
    #[arg(long, visible_alias = "source", short = 's', requires = "to_ref")]
    pub from_ref: Option<String>,

    /// Run on files changed up to this revision
    #[arg(long, visible_alias = "origin", short = 'o', requires = "from_ref")]
    pub to_ref: Option<String>,

    /// Stage whose hooks to run
    #[arg(long, default_value = "pre-commit")]
    pub hook_stage: Stage,

    /// Number of hooks to run concurrently (1 = sequential)
    #[arg(short, long, env = "HITCH_JOBS")]
    pub jobs: Option<usize>,

    /// Print the working tree diff when hooks fail
    #[arg(long)]
    pub show_diff_on_failure: bool,

    /// Commit message file for `commit-msg` and `prepare-commit-msg`
    #[arg(long, value_name = "FILE")]
    pub commit_msg_filename: Option<PathBuf>,
}

/// Which files a run hands to the hooks
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FileSource {
    /// Files staged in the index
    #[default]
    Staged,
    /// Every tracked file
    All,
    /// Explicit paths
    Explicit(Vec<PathBuf>),
    /// Files changed between two revisions (`from` absent = everything in `to`)
    Range {
        /// Older revision
        from: Option<String>,
        /// Newer revision
        to: String,
    },
    /// The commit message file
    Message(PathBuf),
    /// No files (post-* stages)
    Nothing,
}

/// Options shared by `run` and `hook-impl`
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Hook id or alias filter
    pub hook: Option<String>,
    /// Candidate files
    pub files: FileSource,
    /// Stage to run
    pub stage: Stage,
    /// Worker count
    pub jobs: Option<usize>,
    /// Print `git diff` on failure
    pub show_diff_on_failure: bool,
    /// Extra environment for hook processes
    pub env: Vec<(String, String)>,
}

impl RunOptions {
    /// Defaults for `stage`
    #[must_use]
    pub fn for_stage(stage: Stage) -> Self {
        let files = if stage.uses_staged_files() {
            FileSource::Staged
        } else {
            FileSource::Nothing
        };
        Self {
            hook: None,
            files,
            stage,
            jobs: None,
            show_diff_on_failure: false,
            env: Vec::new(),
        }
    }
}

impl RunCommand {
    fn options(&self) -> RunOptions {
        let mut options = RunOptions::for_stage(self.hook_stage);
        options.hook.clone_from(&self.hook);
        options.jobs = self.jobs;
        options.show_diff_on_failure = self.show_diff_on_failure;

        if self.all_files {
            options.files = FileSource::All;
        } else if !self.files.is_empty() {
            options.files = FileSource::Explicit(self.files.clone());
        } else if let (Some(from), Some(to)) = (&self.from_ref, &self.to_ref) {
            options.files = FileSource::Range {
                from: Some(from.clone()),
                to: to.clone(),
            };
            options.env.push(("PRE_COMMIT_FROM_REF".to_string(), from.clone()));
            options.env.push(("PRE_COMMIT_TO_REF".to_string(), to.clone()));
        } else if let Some(message) = &self.commit_msg_filename {
            options.files = FileSource::Message(message.clone());
        } else if self.hook_stage.uses_message_file() {
            options.files = FileSource::Nothing;
        } else if !self.hook_stage.uses_staged_files() {
            // `manual` and `pre-push` runs default to every file
            options.files = if self.hook_stage == Stage::Manual
                || self.hook_stage == Stage::PrePush
            {
                FileSource::All
            } else {
                FileSource::Nothing
            };
        }
        options
    }
}

impl Command for RunCommand {
    type Output = i32;

    fn execute(&self, context: &RuntimeContext) -> Result<i32> {
        run_hooks(context, &self.options())
    }
}

fn candidate_paths(
    context: &RuntimeContext,
    work_tree: &Path,
    source: &FileSource,
) -> Result<Vec<PathBuf>> {
    let paths = match source {
        FileSource::Staged => worktree::staged_files(work_tree)?,
        FileSource::All => worktree::all_files(work_tree)?,
        FileSource::Explicit(files) => files
            .iter()
            .map(|f| relative_to_work_tree(f, context.cwd(), work_tree))
            .collect(),
        FileSource::Range { from, to } => worktree::changed_files(work_tree, from.as_deref(), to)?,
        FileSource::Message(file) => vec![relative_to_work_tree(file, context.cwd(), work_tree)],
        FileSource::Nothing => Vec::new(),
    };
    Ok(paths)
}

/// Run the hooks of `options.stage`; returns the process exit code
pub fn run_hooks(context: &RuntimeContext, options: &RunOptions) -> Result<i32> {
    let work_tree = context.work_tree()?;
    let (_, config) = context.load_config(&work_tree)?;
    let interactive = std::io::stderr().is_terminal();

    let spinner = create_spinner("Initializing hook repositories...", interactive);
    let provider = Git2Provider::new();
    let resolution = Resolver::new(&context.cache, &provider).resolve(&config);
    spinner.finish_and_clear();
    let (hooks, resolution_errors) = resolution?.into_parts();

    if let Some(name) = &options.hook
        && !hooks
            .iter()
            .any(|h| h.matches_name(name) && h.runs_in(options.stage))
        && resolution_errors.is_empty()
    {
        eprintln!(
            "{} No hook with id `{name}` in stage `{}`",
            StatusIcon::Error.get(),
            options.stage
        );
        return Ok(1);
    }

    let paths = candidate_paths(context, &work_tree, &options.files)?;

    // Hooks must only see staged content
    let stash = if options.files == FileSource::Staged {
        UnstagedChanges::stash(&work_tree, &context.cache.scratch_dir())
            .context("Failed to stash unstaged changes")?
    } else {
        None
    };
    if let Some(stash) = &stash {
        eprintln!(
            "{} Unstaged files detected, stashed to {}",
            StatusIcon::Warning.get(),
            stash.patch_path().display()
        );
    }

    let candidates = CandidateSet::identify(&work_tree, paths);
    let skip = std::env::var(SKIP_ENV)
        .map(|value| parse_skip(&value))
        .unwrap_or_default();
    let jobs = options.jobs.unwrap_or(context.jobs);
    tracing::debug!(files = candidates.len(), jobs, stage = %options.stage, "Starting run");

    let observer = ProgressObserver::new(hooks.len(), interactive);
    let mut builder = HookRunner::builder(&hooks, &candidates, &work_tree)
        .global_patterns(config.files.clone(), config.exclude.clone())
        .stage(options.stage)
        .jobs(jobs)
        .skip(skip)
        .only(options.hook.clone())
        .fail_fast(config.fail_fast)
        .cancel_flag(context.cancel.clone())
        .observer(&observer);
    for (key, value) in &options.env {
        builder = builder.env(key.clone(), value.clone());
    }
    let outcome = builder.build().and_then(|runner| runner.run());
    observer.finish();

    let mut report = match outcome {
        Ok(report) => report,
        Err(e) => {
            if let Some(stash) = stash {
                stash.restore()?;
            }
            return Err(e.into());
        }
    };
    report.resolution_errors = resolution_errors;

    print!("{}", Printer::new(context.color).render(&report));

    if options.show_diff_on_failure && !report.passed() && !report.cancelled {
        print_diff(&work_tree, context.color)?;
    }

    if let Some(stash) = stash {
        stash
            .restore()
            .context("Failed to restore unstaged changes")?;
        eprintln!("{} Restored unstaged changes", StatusIcon::Info.get());
    }

    Ok(report.exit_code())
}

fn print_diff(work_tree: &Path, color: bool) -> Result<()> {
    let diff = worktree::worktree_diff(work_tree)?;
    if diff.is_empty() {
        return Ok(());
    }
    let heading = "All changes made by hooks:";
    if color {
        println!("{}", heading.bold());
    } else {
        println!("{heading}");
    }
    print!("{diff}");
    Ok(())
}
