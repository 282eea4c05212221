//! Resolved hook definitions
//!
//! A [`HookDefinition`] is what actually runs: the repository manifest entry
//! overlaid by the invocation's overrides, then by the document's global
//! defaults.

use hitch_config::{Config, HookInvocation, Language, ManifestHook, RepoEntry, Stage};
use hitch_core::{Error, Result};
use regex::Regex;
use std::path::PathBuf;
use std::time::Duration;

/// File filters of a hook
#[derive(Debug, Clone)]
pub struct HookFilters {
    /// Include pattern
    pub files: Regex,
    /// Exclude pattern
    pub exclude: Regex,
    /// Tags that must all be present
    pub types: Vec<String>,
    /// Tags of which one must be present (empty = no constraint)
    pub types_or: Vec<String>,
    /// Tags that must be absent
    pub exclude_types: Vec<String>,
}

/// A hook ready to execute
#[derive(Debug, Clone)]
pub struct HookDefinition {
    /// Identifier from the manifest
    pub id: String,
    /// Alternative identifier from the invocation
    pub alias: Option<String>,
    /// Display name
    pub name: String,
    /// Source identifier of the repository the hook came from
    pub repo: String,
    /// Checkout of the hook repository (None for `local` and `builtin`)
    pub repo_dir: Option<PathBuf>,
    /// Command line prefix
    pub entry: String,
    /// How the entry is run
    pub language: Language,
    /// Arguments placed between the entry and the filenames
    pub args: Vec<String>,
    /// File filters
    pub filters: HookFilters,
    /// Packages the hook environment needs
    pub additional_dependencies: Vec<String>,
    /// Stages the hook runs in (None = every stage)
    pub stages: Option<Vec<Stage>>,
    /// Interpreter version
    pub language_version: String,
    /// Run even without matching files
    pub always_run: bool,
    /// Append filenames to the command line
    pub pass_filenames: bool,
    /// Never split filenames into batches
    pub require_serial: bool,
    /// Print output on success
    pub verbose: bool,
    /// Stop the run after this hook fails
    pub fail_fast: bool,
    /// Kill the hook after this long
    pub timeout: Option<Duration>,
}

fn compile(hook: &str, field: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| {
        Error::Validation(format!("hook '{hook}' has an invalid '{field}' pattern: {e}"))
    })
}

impl HookDefinition {
    /// Overlay `invocation` and the document defaults on a manifest entry
    pub fn merge(
        manifest: &ManifestHook,
        invocation: &HookInvocation,
        repo: &RepoEntry,
        config: &Config,
        repo_dir: Option<PathBuf>,
    ) -> Result<Self> {
        let id = manifest.id.clone();
        let language = invocation
            .language
            .clone()
            .unwrap_or_else(|| manifest.language.clone());

        let files = invocation.files.as_deref().unwrap_or(&manifest.files);
        let exclude = invocation.exclude.as_deref().unwrap_or(&manifest.exclude);

        let language_version = invocation
            .language_version
            .clone()
            .or_else(|| {
                (manifest.language_version != "default")
                    .then(|| manifest.language_version.clone())
            })
            .or_else(|| {
                config
                    .default_language_version
                    .get(language.as_str())
                    .cloned()
            })
            .unwrap_or_else(|| "default".to_string());

        let timeout = invocation.timeout.unwrap_or(manifest.timeout);
        let stages = match invocation.stage_list()? {
            Some(stages) => Some(stages),
            None if manifest.stages.is_some() => manifest.stages.clone(),
            None => config.default_stage_list()?,
        };

        Ok(Self {
            alias: invocation.alias.clone(),
            name: invocation
                .name
                .clone()
                .unwrap_or_else(|| manifest.name.clone()),
            repo: repo.repo.clone(),
            repo_dir,
            entry: invocation
                .entry
                .clone()
                .unwrap_or_else(|| manifest.entry.clone()),
            args: invocation
                .args
                .clone()
                .unwrap_or_else(|| manifest.args.clone()),
            filters: HookFilters {
                files: compile(&id, "files", files)?,
                exclude: compile(&id, "exclude", exclude)?,
                types: invocation
                    .types
                    .clone()
                    .unwrap_or_else(|| manifest.types.clone()),
                types_or: invocation
                    .types_or
                    .clone()
                    .unwrap_or_else(|| manifest.types_or.clone()),
                exclude_types: invocation
                    .exclude_types
                    .clone()
                    .unwrap_or_else(|| manifest.exclude_types.clone()),
            },
            additional_dependencies: invocation
                .additional_dependencies
                .clone()
                .unwrap_or_else(|| manifest.additional_dependencies.clone()),
            stages,
            language,
            language_version,
            always_run: invocation.always_run.unwrap_or(manifest.always_run),
            pass_filenames: invocation.pass_filenames.unwrap_or(manifest.pass_filenames),
            require_serial: invocation.require_serial.unwrap_or(manifest.require_serial),
            verbose: invocation.verbose.unwrap_or(manifest.verbose),
            fail_fast: invocation.fail_fast.unwrap_or(manifest.fail_fast),
            timeout: (timeout > 0).then(|| Duration::from_secs(timeout)),
            id,
        })
    }

    /// Whether the hook takes part in `stage`
    #[must_use]
    pub fn runs_in(&self, stage: Stage) -> bool {
        self.stages
            .as_ref()
            .is_none_or(|stages| stages.contains(&stage))
    }

    /// Whether `name` is this hook's id or alias
    #[must_use]
    pub fn matches_name(&self, name: &str) -> bool {
        self.id == name || self.alias.as_deref() == Some(name)
    }
}
