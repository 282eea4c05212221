//! Run orchestration
//!
//! Decides for every resolved hook whether it is skipped, has nothing to
//! check or executes, runs the executing hooks on a bounded rayon pool and
//! returns the reports in document order.

use super::definition::HookDefinition;
use super::executor::{self, CancelFlag, ExecutionContext, HookReport, HookStatus};
use crate::selector::{self, Candidate, CandidateSet, GlobalFilter};
use hitch_config::Stage;
use hitch_core::{Error, Result};
use rayon::prelude::*;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

/// Receives progress notifications while hooks execute
///
/// Called from worker threads.
pub trait RunObserver: Sync {
    /// A hook is about to start
    fn hook_started(&self, _hook: &HookDefinition) {}

    /// A hook finished (or was decided without running)
    fn hook_finished(&self, _report: &HookReport) {}
}

/// Observer that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl RunObserver for NoopObserver {}

/// Aggregate outcome of a run
#[derive(Debug, Default)]
pub struct RunReport {
    /// Per-hook reports in document order
    pub hooks: Vec<HookReport>,
    /// Repositories that could not be resolved
    pub resolution_errors: Vec<Error>,
    /// Whether the run was interrupted
    pub cancelled: bool,
}

impl RunReport {
    /// Whether every hook passed or was skipped and every repository resolved
    #[must_use]
    pub fn passed(&self) -> bool {
        !self.cancelled
            && self.resolution_errors.is_empty()
            && self.hooks.iter().all(|h| !h.status.is_failure())
    }

    /// Process exit code for this outcome
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        if self.cancelled {
            130
        } else if self.passed() {
            0
        } else {
            1
        }
    }
}

enum Plan<'c> {
    Decided(HookStatus),
    Execute(Vec<&'c Candidate>),
}

/// Hook runner bound to one set of hooks and candidate files
pub struct HookRunner<'a> {
    hooks: &'a [HookDefinition],
    candidates: &'a CandidateSet,
    global: GlobalFilter,
    context: ExecutionContext,
    stage: Stage,
    jobs: usize,
    skip: Vec<String>,
    only: Option<String>,
    fail_fast: bool,
    observer: &'a dyn RunObserver,
}

impl<'a> HookRunner<'a> {
    /// Create a builder for a runner
    ///
    /// ```ignore
    /// let report = HookRunner::builder(&hooks, &candidates, work_tree)
    ///     .stage(Stage::PreCommit)
    ///     .jobs(4)
    ///     .skip(["mypy"])
    ///     .build()?
    ///     .run()?;
    /// ```
    pub fn builder(
        hooks: &'a [HookDefinition],
        candidates: &'a CandidateSet,
        work_tree: &Path,
    ) -> HookRunnerBuilder<'a> {
        HookRunnerBuilder::new(hooks, candidates, work_tree)
    }

    fn plan(&self) -> Vec<(&'a HookDefinition, Plan<'a>)> {
        self.hooks
            .iter()
            .filter(|hook| hook.runs_in(self.stage))
            .filter(|hook| self.only.as_deref().is_none_or(|name| hook.matches_name(name)))
            .map(|hook| {
                if self.skip.iter().any(|name| hook.matches_name(name)) {
                    return (hook, Plan::Decided(HookStatus::Skipped));
                }
                let files = selector::select(self.candidates, &self.global, &hook.filters);
                if files.is_empty() && !hook.always_run {
                    return (hook, Plan::Decided(HookStatus::NoFiles));
                }
                (hook, Plan::Execute(files))
            })
            .collect()
    }

    fn execute_one(
        &self,
        hook: &HookDefinition,
        files: &[&Candidate],
        stop: &AtomicBool,
    ) -> Option<HookReport> {
        if self.context.cancel.is_cancelled() {
            return Some(HookReport::not_run(hook, HookStatus::Cancelled));
        }
        if stop.load(Ordering::SeqCst) {
            return None;
        }

        let span = tracing::info_span!(
            "hook_execution",
            hook_id = %hook.id,
            repo = %hook.repo,
            language = %hook.language,
            files = files.len(),
        );
        let _guard = span.enter();

        self.observer.hook_started(hook);
        let report = executor::execute(hook, files, &self.context);

        if report.status.is_failure() && (self.fail_fast || hook.fail_fast) {
            tracing::debug!("Hook failed with fail_fast set, not starting further hooks");
            stop.store(true, Ordering::SeqCst);
        }
        Some(report)
    }

    /// Execute the hooks
    ///
    /// Hooks that were not started because an earlier hook failed with
    /// `fail_fast` are left out of the report.
    #[tracing::instrument(skip(self), fields(stage = %self.stage, jobs = self.jobs))]
    pub fn run(&self) -> Result<RunReport> {
        let plan = self.plan();
        tracing::debug!(hooks = plan.len(), "Planned hooks");

        let stop = AtomicBool::new(false);
        let run_planned = |(hook, plan): &(&'a HookDefinition, Plan<'a>)| -> Option<HookReport> {
            let report = match plan {
                Plan::Decided(status) => Some(HookReport::not_run(hook, *status)),
                Plan::Execute(files) => self.execute_one(hook, files, &stop),
            };
            if let Some(report) = &report {
                self.observer.hook_finished(report);
            }
            report
        };

        let reports: Vec<Option<HookReport>> = if self.jobs <= 1 {
            plan.iter().map(run_planned).collect()
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.jobs)
                .thread_name(|i| format!("hitch-hook-{i}"))
                .build()
                .map_err(|e| Error::Message(format!("Failed to start worker pool: {e}")))?;
            pool.install(|| plan.par_iter().map(run_planned).collect())
        };

        Ok(RunReport {
            hooks: reports.into_iter().flatten().collect(),
            resolution_errors: Vec::new(),
            cancelled: self.context.cancel.is_cancelled(),
        })
    }
}

/// Builder for [`HookRunner`]
pub struct HookRunnerBuilder<'a> {
    hooks: &'a [HookDefinition],
    candidates: &'a CandidateSet,
    context: ExecutionContext,
    files: String,
    exclude: String,
    stage: Stage,
    jobs: usize,
    skip: Vec<String>,
    only: Option<String>,
    fail_fast: bool,
    observer: &'a dyn RunObserver,
}

impl<'a> HookRunnerBuilder<'a> {
    /// Create a builder with default settings
    pub fn new(
        hooks: &'a [HookDefinition],
        candidates: &'a CandidateSet,
        work_tree: &Path,
    ) -> Self {
        Self {
            hooks,
            candidates,
            context: ExecutionContext::new(work_tree, CancelFlag::new()),
            files: String::new(),
            exclude: "^$".to_string(),
            stage: Stage::PreCommit,
            jobs: default_jobs(),
            skip: Vec::new(),
            only: None,
            fail_fast: false,
            observer: &NoopObserver,
        }
    }

    /// Document-wide include and exclude patterns
    #[must_use]
    pub fn global_patterns(mut self, files: impl Into<String>, exclude: impl Into<String>) -> Self {
        self.files = files.into();
        self.exclude = exclude.into();
        self
    }

    /// Stage being run
    #[must_use]
    pub fn stage(mut self, stage: Stage) -> Self {
        self.stage = stage;
        self
    }

    /// Worker count; 1 runs hooks sequentially in document order
    #[must_use]
    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Hook ids or aliases to skip
    #[must_use]
    pub fn skip<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip.extend(names.into_iter().map(Into::into));
        self
    }

    /// Run only the hook with this id or alias
    #[must_use]
    pub fn only(mut self, name: Option<String>) -> Self {
        self.only = name;
        self
    }

    /// Stop starting hooks after the first failure
    #[must_use]
    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Cancellation flag shared with the signal handler
    #[must_use]
    pub fn cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.context.cancel = cancel;
        self
    }

    /// Add an environment variable for hook processes
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context = self.context.with_env(key, value);
        self
    }

    /// Progress observer
    #[must_use]
    pub fn observer(mut self, observer: &'a dyn RunObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Build the runner
    pub fn build(self) -> Result<HookRunner<'a>> {
        Ok(HookRunner {
            hooks: self.hooks,
            candidates: self.candidates,
            global: GlobalFilter::new(&self.files, &self.exclude)?,
            context: self.context,
            stage: self.stage,
            jobs: self.jobs,
            skip: self.skip,
            only: self.only,
            fail_fast: self.fail_fast,
            observer: self.observer,
        })
    }
}

/// Available parallelism, or 1 when it cannot be determined
#[must_use]
pub fn default_jobs() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}

/// Parse the comma separated `SKIP` variable
#[must_use]
pub fn parse_skip(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
