//! Hook execution
//!
//! Runs a single resolved hook against its selected files. Subprocess hooks
//! are started through `duct` with stdout and stderr merged, polled so that a
//! timeout or a cancellation can kill them, and split into argument batches
//! that fit the platform's command line limit.

use super::definition::HookDefinition;
use super::{builtin, pygrep};
use crate::selector::Candidate;
use hitch_config::Language;
use hitch_core::platform::CURRENT_PLATFORM;
use hitch_core::{Error, Result};
use sha2::{Digest, Sha256};
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

const MODIFIED_MESSAGE: &str = "- files were modified by this hook";

/// Shared cancellation flag, set from the Ctrl-C handler
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// A flag that is not set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the run
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of one hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HookStatus {
    /// Listed in `SKIP`
    Skipped,
    /// No file matched and `always_run` is off
    NoFiles,
    /// Exit code 0 and no file modified
    Passed,
    /// Non-zero exit code or files modified
    Failed,
    /// Spawn failure, signal or timeout
    Errored,
    /// Interrupted by the user
    Cancelled,
}

impl HookStatus {
    /// Whether this status makes the run fail
    #[must_use]
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failed | Self::Errored | Self::Cancelled)
    }

    /// Label printed at the end of the status line
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Skipped => "Skipped",
            Self::NoFiles => "(no files to check)Skipped",
            Self::Passed => "Passed",
            Self::Failed => "Failed",
            Self::Errored => "Errored",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for HookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What a hook did
#[derive(Debug, Clone)]
pub struct HookReport {
    /// Hook id
    pub id: String,
    /// Display name
    pub name: String,
    /// Final status (worst batch status)
    pub status: HookStatus,
    /// Exit code of the last failing batch, if the hook ran a process
    pub exit_code: Option<i32>,
    /// Captured output of every batch
    pub output: String,
    /// Number of files handed to the hook
    pub files: usize,
    /// Wall-clock time spent
    pub duration: Duration,
    /// Print output even on success
    pub verbose: bool,
}

impl HookReport {
    /// Report for a hook that did not execute
    #[must_use]
    pub fn not_run(hook: &HookDefinition, status: HookStatus) -> Self {
        Self {
            id: hook.id.clone(),
            name: hook.name.clone(),
            status,
            exit_code: None,
            output: String::new(),
            files: 0,
            duration: Duration::ZERO,
            verbose: hook.verbose,
        }
    }
}

/// Per-run execution settings shared by all hooks
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Working tree root; hooks run from here
    pub work_tree: PathBuf,
    /// Extra environment passed to every hook process
    pub env: Vec<(String, String)>,
    /// Cancellation flag
    pub cancel: CancelFlag,
}

impl ExecutionContext {
    /// Context with the default hook environment
    #[must_use]
    pub fn new(work_tree: impl Into<PathBuf>, cancel: CancelFlag) -> Self {
        Self {
            work_tree: work_tree.into(),
            env: vec![("PRE_COMMIT".to_string(), "1".to_string())],
            cancel,
        }
    }

    /// Add an environment variable for hook processes
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

struct BatchOutcome {
    status: HookStatus,
    code: Option<i32>,
    output: String,
}

impl BatchOutcome {
    fn from_code(code: i32, output: String) -> Self {
        Self {
            status: if code == 0 {
                HookStatus::Passed
            } else {
                HookStatus::Failed
            },
            code: Some(code),
            output,
        }
    }

    fn errored(message: impl Into<String>) -> Self {
        Self {
            status: HookStatus::Errored,
            code: None,
            output: message.into(),
        }
    }

    fn cancelled() -> Self {
        Self {
            status: HookStatus::Cancelled,
            code: None,
            output: String::new(),
        }
    }
}

/// Run `hook` against `files`
///
/// Never returns an error: spawn failures, signals and timeouts are folded
/// into an [`HookStatus::Errored`] report.
#[tracing::instrument(skip_all, fields(hook = %hook.id, files = files.len()))]
pub fn execute(hook: &HookDefinition, files: &[&Candidate], ctx: &ExecutionContext) -> HookReport {
    let start = Instant::now();
    let mut report = HookReport::not_run(hook, HookStatus::Passed);
    report.files = files.len();

    if ctx.cancel.is_cancelled() {
        report.status = HookStatus::Cancelled;
        return report;
    }

    let paths: Vec<PathBuf> = files.iter().map(|c| c.path.clone()).collect();
    let before = fingerprint(&ctx.work_tree, &paths);

    let outcomes = match run_language(hook, &paths, ctx) {
        Ok(outcomes) => outcomes,
        Err(e) => vec![BatchOutcome::errored(e.to_string())],
    };

    for outcome in outcomes {
        if outcome.status >= report.status {
            report.status = outcome.status;
            report.exit_code = outcome.code.or(report.exit_code);
        }
        report.output.push_str(&outcome.output);
    }

    if matches!(report.status, HookStatus::Passed | HookStatus::Failed)
        && fingerprint(&ctx.work_tree, &paths) != before
    {
        tracing::debug!("Hook modified its files");
        report.status = HookStatus::Failed;
        report.output = format!("{MODIFIED_MESSAGE}\n\n{}", report.output);
    }

    report.duration = start.elapsed();
    tracing::debug!(
        status = %report.status,
        elapsed_ms = report.duration.as_millis(),
        "Hook finished"
    );
    report
}

fn fingerprint(work_tree: &Path, paths: &[PathBuf]) -> Vec<Option<Vec<u8>>> {
    paths
        .iter()
        .map(|p| {
            fs::read(work_tree.join(p))
                .ok()
                .map(|content| Sha256::digest(&content).to_vec())
        })
        .collect()
}

fn filenames(hook: &HookDefinition, paths: &[PathBuf]) -> Vec<PathBuf> {
    if hook.pass_filenames {
        paths.to_vec()
    } else {
        Vec::new()
    }
}

fn run_language(
    hook: &HookDefinition,
    paths: &[PathBuf],
    ctx: &ExecutionContext,
) -> Result<Vec<BatchOutcome>> {
    let files = filenames(hook, paths);
    match &hook.language {
        Language::Fail => {
            let mut output = format!("{}\n\n", hook.entry);
            for file in &files {
                output.push_str(&file.display().to_string());
                output.push('\n');
            }
            Ok(vec![BatchOutcome::from_code(1, output)])
        }
        Language::Pygrep => {
            let (code, output) =
                pygrep::run(&hook.id, &hook.entry, &hook.args, &files, &ctx.work_tree)?;
            Ok(vec![BatchOutcome::from_code(code, output)])
        }
        Language::Builtin => {
            let name = hook.entry.split_whitespace().next().unwrap_or(&hook.id);
            let out = builtin::run(name, &hook.args, &files, &ctx.work_tree)?;
            Ok(vec![BatchOutcome::from_code(out.code, out.output)])
        }
        Language::Script | Language::System | Language::Other(_) => {
            let command = command_line(hook, ctx)?;
            let batches = partition(&command, &files, hook.require_serial);
            let mut outcomes = Vec::with_capacity(batches.len());
            for batch in batches {
                let outcome = run_process(hook, &command, batch, ctx);
                let stop = matches!(outcome.status, HookStatus::Cancelled | HookStatus::Errored);
                outcomes.push(outcome);
                if stop {
                    break;
                }
            }
            Ok(outcomes)
        }
    }
}

/// Program and leading arguments (entry words followed by `args`)
fn command_line(hook: &HookDefinition, ctx: &ExecutionContext) -> Result<Vec<OsString>> {
    let words = shell_words::split(&hook.entry).map_err(|e| {
        Error::execution(&hook.id, format!("failed to parse entry '{}': {e}", hook.entry))
    })?;
    let Some((program, rest)) = words.split_first() else {
        return Err(Error::execution(&hook.id, "entry is empty"));
    };

    let program: OsString = if hook.language == Language::Script {
        let base = hook.repo_dir.as_deref().unwrap_or(&ctx.work_tree);
        base.join(program).into_os_string()
    } else {
        which::which(program)
            .map_err(|_| Error::execution(&hook.id, format!("executable `{program}` not found")))?
            .into_os_string()
    };

    let mut command = Vec::with_capacity(1 + rest.len() + hook.args.len());
    command.push(program);
    command.extend(rest.iter().map(OsString::from));
    command.extend(hook.args.iter().map(OsString::from));
    Ok(command)
}

/// Split `files` so every `command + batch` fits the command line limit
fn partition<'f>(command: &[OsString], files: &'f [PathBuf], serial: bool) -> Vec<&'f [PathBuf]> {
    if files.is_empty() || serial {
        return vec![files];
    }

    let limit = CURRENT_PLATFORM.max_command_length();
    let base: usize = command.iter().map(|a| a.len() + 1).sum();

    let mut batches = Vec::new();
    let mut start = 0;
    let mut size = base;
    for (i, file) in files.iter().enumerate() {
        let len = file.as_os_str().len() + 1;
        if i > start && size + len > limit {
            batches.push(&files[start..i]);
            start = i;
            size = base;
        }
        size += len;
    }
    batches.push(&files[start..]);
    batches
}

fn run_process(
    hook: &HookDefinition,
    command: &[OsString],
    batch: &[PathBuf],
    ctx: &ExecutionContext,
) -> BatchOutcome {
    let (program, leading) = match command.split_first() {
        Some(split) => split,
        None => return BatchOutcome::errored("entry is empty\n"),
    };
    let args: Vec<OsString> = leading
        .iter()
        .cloned()
        .chain(batch.iter().map(|p| p.clone().into_os_string()))
        .collect();

    tracing::debug!(
        "Executing: {} {:?}",
        Path::new(program).display(),
        args
    );

    let mut expr = duct::cmd(program, &args)
        .dir(&ctx.work_tree)
        .stdin_null()
        .stderr_to_stdout()
        .stdout_capture()
        .unchecked();
    for (key, value) in &ctx.env {
        expr = expr.env(key, value);
    }

    let handle = match expr.start() {
        Ok(handle) => handle,
        Err(e) => {
            return BatchOutcome::errored(format!(
                "failed to start `{}`: {e}\n",
                Path::new(program).display()
            ));
        }
    };

    let deadline = hook.timeout.map(|t| (Instant::now() + t, t));
    loop {
        match handle.wait_timeout(POLL_INTERVAL) {
            Ok(Some(output)) => {
                let text = String::from_utf8_lossy(&output.stdout).into_owned();
                return match output.status.code() {
                    Some(code) => BatchOutcome::from_code(code, text),
                    None => BatchOutcome {
                        status: HookStatus::Errored,
                        code: None,
                        output: format!("{text}hook terminated by signal\n"),
                    },
                };
            }
            Ok(None) => {}
            Err(e) => return BatchOutcome::errored(format!("failed to wait for hook: {e}\n")),
        }

        if ctx.cancel.is_cancelled() {
            tracing::debug!("Killing hook process after cancellation");
            if let Err(e) = handle.kill() {
                tracing::warn!(error = %e, "Failed to kill hook process");
            }
            return BatchOutcome::cancelled();
        }

        if let Some((deadline, timeout)) = deadline
            && Instant::now() >= deadline
        {
            if let Err(e) = handle.kill() {
                tracing::warn!(error = %e, "Failed to kill hook process");
            }
            return BatchOutcome::errored(format!(
                "hook timed out after {} seconds\n",
                timeout.as_secs()
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use crate::identify::tags_for;
    use hitch_config::{Config, ManifestHook};
    use tempfile::TempDir;

    fn hook(manifest_yaml: &str) -> HookDefinition {
        let manifest: ManifestHook =
            hitch_config::manifest::parse_manifest(manifest_yaml, Path::new("m.yaml"))
                .unwrap()
                .remove(0);
        let config = Config::from_yaml_str("repos: []\n", Path::new("c.yaml")).unwrap();
        let repo: hitch_config::RepoEntry =
            serde_yaml::from_str("repo: local\nhooks: []\n").unwrap();
        HookDefinition::merge(&manifest, &Default::default(), &repo, &config, None).unwrap()
    }

    fn candidates(dir: &TempDir, names: &[&str]) -> Vec<Candidate> {
        names
            .iter()
            .map(|n| Candidate {
                path: PathBuf::from(n),
                display: (*n).to_string(),
                tags: tags_for(&dir.path().join(n)),
            })
            .collect()
    }

    fn ctx(dir: &TempDir) -> ExecutionContext {
        ExecutionContext::new(dir.path(), CancelFlag::new())
    }

    #[test]
    fn test_fail_language_lists_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "x").unwrap();
        let hook = hook(
            "- id: no-txt\n  name: no txt\n  entry: txt files are not allowed\n  language: fail\n",
        );
        let files = candidates(&dir, &["a.txt"]);
        let refs: Vec<&Candidate> = files.iter().collect();

        let report = execute(&hook, &refs, &ctx(&dir));
        assert_eq!(report.status, HookStatus::Failed);
        assert_eq!(report.output, "txt files are not allowed\n\na.txt\n");
    }

    #[test]
    fn test_builtin_language() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.json"), "{}").unwrap();
        let hook = hook(
            "- id: check-json\n  name: check json\n  entry: check-json\n  language: builtin\n",
        );
        let files = candidates(&dir, &["a.json"]);
        let refs: Vec<&Candidate> = files.iter().collect();
        assert_eq!(execute(&hook, &refs, &ctx(&dir)).status, HookStatus::Passed);
    }

    #[test]
    fn test_fixer_reports_modification() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "text").unwrap();
        let hook = hook(
            "- id: end-of-file-fixer\n  name: eof\n  entry: end-of-file-fixer\n  language: builtin\n",
        );
        let files = candidates(&dir, &["a.txt"]);
        let refs: Vec<&Candidate> = files.iter().collect();

        let report = execute(&hook, &refs, &ctx(&dir));
        assert_eq!(report.status, HookStatus::Failed);
        assert!(report.output.starts_with(MODIFIED_MESSAGE));
    }

    #[test]
    fn test_cancelled_before_start() {
        let dir = TempDir::new().unwrap();
        let hook = hook("- id: x\n  name: x\n  entry: x\n  language: fail\n");
        let cancel = CancelFlag::new();
        cancel.cancel();
        let report = execute(&hook, &[], &ExecutionContext::new(dir.path(), cancel));
        assert_eq!(report.status, HookStatus::Cancelled);
    }

    #[test]
    fn test_missing_system_executable_errors() {
        let dir = TempDir::new().unwrap();
        let hook = hook(
            "- id: x\n  name: x\n  entry: definitely-not-a-real-program-hitch\n  language: system\n  always_run: true\n",
        );
        let report = execute(&hook, &[], &ctx(&dir));
        assert_eq!(report.status, HookStatus::Errored);
        assert!(report.output.contains("not found"));
    }

    #[cfg(unix)]
    #[test]
    fn test_system_exit_codes() {
        let dir = TempDir::new().unwrap();
        let pass = hook("- id: t\n  name: t\n  entry: 'true'\n  language: system\n");
        let fail = hook("- id: f\n  name: f\n  entry: 'false'\n  language: system\n");
        assert_eq!(execute(&pass, &[], &ctx(&dir)).status, HookStatus::Passed);
        let report = execute(&fail, &[], &ctx(&dir));
        assert_eq!(report.status, HookStatus::Failed);
        assert_eq!(report.exit_code, Some(1));
    }

    #[cfg(unix)]
    #[test]
    fn test_system_passes_args_and_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "x").unwrap();
        let hook = hook(
            "- id: e\n  name: e\n  entry: echo hello\n  language: system\n  args: [--flag]\n",
        );
        let files = candidates(&dir, &["a.txt"]);
        let refs: Vec<&Candidate> = files.iter().collect();

        let report = execute(&hook, &refs, &ctx(&dir));
        assert_eq!(report.status, HookStatus::Passed);
        assert_eq!(report.output, "hello --flag a.txt\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_process() {
        let dir = TempDir::new().unwrap();
        let hook = hook("- id: s\n  name: s\n  entry: sleep 5\n  language: system\n  timeout: 1\n");
        let start = Instant::now();
        let report = execute(&hook, &[], &ctx(&dir));
        assert_eq!(report.status, HookStatus::Errored);
        assert!(report.output.contains("timed out"));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn test_script_runs_relative_to_repo() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let script = dir.path().join("check.sh");
        fs::write(&script, "#!/bin/sh\necho \"checked $#\"\nexit 3\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        fs::write(dir.path().join("a.txt"), "x").unwrap();

        let mut hook = hook("- id: s\n  name: s\n  entry: check.sh\n  language: script\n");
        hook.repo_dir = Some(dir.path().to_path_buf());
        let files = candidates(&dir, &["a.txt"]);
        let refs: Vec<&Candidate> = files.iter().collect();

        let report = execute(&hook, &refs, &ctx(&dir));
        assert_eq!(report.status, HookStatus::Failed);
        assert_eq!(report.exit_code, Some(3));
        assert_eq!(report.output, "checked 1\n");
    }

    #[test]
    fn test_partition_respects_limit() {
        let command = vec![OsString::from("prog")];
        let long = "x".repeat(1000);
        let files: Vec<PathBuf> = (0..500).map(|i| PathBuf::from(format!("{long}{i}"))).collect();

        let batches = partition(&command, &files, false);
        let limit = CURRENT_PLATFORM.max_command_length();
        assert!(batches.len() > 1);
        assert_eq!(batches.iter().map(|b| b.len()).sum::<usize>(), files.len());
        for batch in &batches {
            let size: usize = 5 + batch.iter().map(|f| f.as_os_str().len() + 1).sum::<usize>();
            assert!(size <= limit);
        }

        assert_eq!(partition(&command, &files, true).len(), 1);
    }

    #[test]
    fn test_status_ordering() {
        assert!(HookStatus::Errored > HookStatus::Failed);
        assert!(HookStatus::Failed > HookStatus::Passed);
        assert!(!HookStatus::Skipped.is_failure());
        assert!(HookStatus::Cancelled.is_failure());
    }
}
