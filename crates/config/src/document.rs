//! Hook document model
//!
//! The project document (`.pre-commit-config.yaml`) enumerates hook
//! repositories, the revision each one is pinned to, and for every hook the
//! arguments and filters that override the repository's defaults.
//!
//! ```yaml
//! exclude: '^vendor/'
//! repos:
//!   - repo: https://github.com/pre-commit/pre-commit-hooks
//!     rev: v4.5.0
//!     hooks:
//!       - id: check-json
//!       - id: trailing-whitespace
//!         args: [--markdown-linebreak-ext=md]
//! ```

use crate::manifest::{self, Language, ManifestHook};
use crate::stage::Stage;
use hitch_core::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Source identifier of repositories whose hooks are defined inline
pub const LOCAL_REPO: &str = "local";

/// Source identifier of the hooks implemented inside hitch
pub const BUILTIN_REPO: &str = "builtin";

/// Source identifier of the reference runner's self-check hooks (not supported)
pub const META_REPO: &str = "meta";

/// Parsed hook document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Interpreter version per language, used when a hook does not set one
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub default_language_version: IndexMap<String, String>,

    /// Stages hooks run in when neither the hook nor its manifest restricts them
    ///
    /// Kept as written; see [`Config::default_stage_list`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_stages: Option<Vec<String>>,

    /// Global include pattern (regex), empty matches everything
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub files: String,

    /// Global exclude pattern (regex), applied to every hook
    #[serde(
        default = "manifest::default_exclude",
        skip_serializing_if = "is_default_exclude"
    )]
    pub exclude: String,

    /// Stop after the first failing hook
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fail_fast: bool,

    /// Oldest runner version this document expects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_pre_commit_version: Option<String>,

    /// Hook repositories in document order
    pub repos: Vec<RepoEntry>,

    /// Keys hitch does not know about (kept so they survive re-serialization)
    #[serde(flatten)]
    pub unknown: IndexMap<String, serde_yaml::Value>,
}

/// Kind of hook repository referenced by an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoKind {
    /// Remote git repository pinned to a revision
    Remote,
    /// Hooks defined inline in the document
    Local,
    /// Hooks implemented by hitch
    Builtin,
    /// Self-check hooks of the reference runner, ignored
    Meta,
}

/// One repository block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoEntry {
    /// Source identifier: a git URL or path, `local` or `builtin`
    pub repo: String,

    /// Pinned revision (tag, branch or commit), required for remote repositories
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,

    /// Hooks selected from the repository, in document order
    pub hooks: Vec<HookInvocation>,

    /// Keys hitch does not know about
    #[serde(flatten)]
    pub unknown: IndexMap<String, serde_yaml::Value>,
}

impl RepoEntry {
    /// Classify the entry by its source identifier
    #[must_use]
    pub fn kind(&self) -> RepoKind {
        match self.repo.as_str() {
            LOCAL_REPO => RepoKind::Local,
            BUILTIN_REPO => RepoKind::Builtin,
            META_REPO => RepoKind::Meta,
            _ => RepoKind::Remote,
        }
    }

    /// Pinned revision, or an empty string for repositories without one
    #[must_use]
    pub fn rev(&self) -> &str {
        self.rev.as_deref().unwrap_or_default()
    }

    fn validate(&self, index: usize) -> Result<()> {
        if self.repo.trim().is_empty() {
            return Err(Error::Validation(format!(
                "repos[{index}] has an empty 'repo'"
            )));
        }

        match self.kind() {
            RepoKind::Remote => {
                if self.rev().trim().is_empty() {
                    return Err(Error::Validation(format!(
                        "repository '{}' must pin a 'rev'",
                        self.repo
                    )));
                }
            }
            RepoKind::Local | RepoKind::Builtin | RepoKind::Meta => {
                if self.rev.is_some() {
                    tracing::warn!(repo = %self.repo, "'rev' is ignored for this repository");
                }
            }
        }

        if self.hooks.is_empty() {
            tracing::warn!(repo = %self.repo, "Repository entry selects no hooks");
        }
        for key in self.unknown.keys() {
            tracing::warn!(repo = %self.repo, key = %key, "Unexpected key in repository entry");
        }

        for hook in &self.hooks {
            hook.validate(&self.repo)?;
            if self.kind() == RepoKind::Local {
                hook.to_local_hook()?;
            }
        }

        Ok(())
    }
}

/// A hook selected from a repository, with local overrides
///
/// Every field except `id` is optional; unset fields fall back to the
/// repository manifest and then to the document-wide defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HookInvocation {
    /// Hook id from the repository manifest
    pub id: String,

    /// Alternative id usable with `hitch run` and `SKIP`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Entry point (required for local hooks)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,

    /// Language (required for local hooks)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,

    /// Arguments replacing the manifest defaults
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,

    /// Include pattern (regex)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<String>,

    /// Exclude pattern (regex)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<String>,

    /// File type tags that must all match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types: Option<Vec<String>>,

    /// File type tags of which one must match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types_or: Option<Vec<String>>,

    /// File type tags that must not match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_types: Option<Vec<String>>,

    /// Extra packages for the hook environment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_dependencies: Option<Vec<String>>,

    /// Stages the hook runs in, as written; see [`HookInvocation::stage_list`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stages: Option<Vec<String>>,

    /// Interpreter version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_version: Option<String>,

    /// Run even without matching files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub always_run: Option<bool>,

    /// Append filenames to the command line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pass_filenames: Option<bool>,

    /// Never split filenames into several invocations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_serial: Option<bool>,

    /// Print output even on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbose: Option<bool>,

    /// Stop the run when this hook fails
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_fast: Option<bool>,

    /// Seconds before the hook is killed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Keys hitch does not know about
    #[serde(flatten)]
    pub unknown: IndexMap<String, serde_yaml::Value>,
}

impl HookInvocation {
    /// Whether `name` refers to this hook by id or alias
    #[must_use]
    pub fn matches_name(&self, name: &str) -> bool {
        self.id == name || self.alias.as_deref() == Some(name)
    }

    /// Stages the hook is restricted to, legacy names normalized
    pub fn stage_list(&self) -> Result<Option<Vec<Stage>>> {
        self.stages
            .as_deref()
            .map(|names| parse_stages(names, &format!("hook '{}'", self.id)))
            .transpose()
    }

    fn validate(&self, repo: &str) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::Validation(format!(
                "repository '{repo}' has a hook with an empty 'id'"
            )));
        }

        for (field, pattern) in [("files", &self.files), ("exclude", &self.exclude)] {
            if let Some(pattern) = pattern {
                regex::Regex::new(pattern).map_err(|e| {
                    Error::Validation(format!(
                        "hook '{}' has an invalid '{field}' pattern: {e}",
                        self.id
                    ))
                })?;
            }
        }

        self.stage_list()?;
        for key in self.unknown.keys() {
            tracing::warn!(hook = %self.id, key = %key, "Unexpected key in hook entry");
        }

        Ok(())
    }

    /// Build the manifest entry of a hook declared in a `local` repository
    pub fn to_local_hook(&self) -> Result<ManifestHook> {
        let missing = |field: &str| {
            Error::Validation(format!(
                "local hook '{}' is missing required field '{field}'",
                self.id
            ))
        };

        let name = self.name.clone().ok_or_else(|| missing("name"))?;
        let entry = self.entry.clone().ok_or_else(|| missing("entry"))?;
        let language = self.language.clone().ok_or_else(|| missing("language"))?;

        let hook = ManifestHook {
            id: self.id.clone(),
            name,
            entry,
            language,
            files: String::new(),
            exclude: manifest::default_exclude(),
            types: manifest::default_types(),
            types_or: Vec::new(),
            exclude_types: Vec::new(),
            args: Vec::new(),
            additional_dependencies: Vec::new(),
            stages: None,
            always_run: false,
            pass_filenames: true,
            require_serial: false,
            verbose: false,
            fail_fast: false,
            language_version: manifest::default_language_version(),
            timeout: 0,
            description: self.description.clone(),
            minimum_pre_commit_version: None,
        };
        hook.validate()?;
        Ok(hook)
    }
}

impl Config {
    /// Load and validate a document from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::Parse {
            path: path.to_path_buf(),
            message: format!("cannot read file: {e}"),
        })?;
        Self::from_yaml_str(&content, path)
    }

    /// Parse and validate a document
    ///
    /// `path` is only used to label errors.
    pub fn from_yaml_str(content: &str, path: &Path) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content).map_err(|e| Error::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the document back to YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| Error::Message(format!("Failed to serialize configuration: {e}")))
    }

    /// Check patterns and repository entries
    pub fn validate(&self) -> Result<()> {
        for (field, pattern) in [("files", &self.files), ("exclude", &self.exclude)] {
            regex::Regex::new(pattern).map_err(|e| {
                Error::Validation(format!("invalid top-level '{field}' pattern: {e}"))
            })?;
        }

        self.default_stage_list()?;
        for key in self.unknown.keys() {
            tracing::warn!(key = %key, "Unexpected key in configuration");
        }

        for (index, repo) in self.repos.iter().enumerate() {
            repo.validate(index)?;
        }

        Ok(())
    }

    /// Document-wide default stages, legacy names normalized
    pub fn default_stage_list(&self) -> Result<Option<Vec<Stage>>> {
        self.default_stages
            .as_deref()
            .map(|names| parse_stages(names, "'default_stages'"))
            .transpose()
    }

    /// Iterate every hook invocation with its repository, in document order
    pub fn hooks(&self) -> impl Iterator<Item = (&RepoEntry, &HookInvocation)> {
        self.repos
            .iter()
            .flat_map(|repo| repo.hooks.iter().map(move |hook| (repo, hook)))
    }

    /// Remote repository entries, in document order
    pub fn remote_repos(&self) -> impl Iterator<Item = &RepoEntry> {
        self.repos
            .iter()
            .filter(|repo| repo.kind() == RepoKind::Remote)
    }
}

/// Locate the hook document for a working tree
#[must_use]
pub fn default_config_path(work_tree: &Path) -> PathBuf {
    work_tree.join(crate::CONFIG_FILE)
}

fn parse_stages(names: &[String], owner: &str) -> Result<Vec<Stage>> {
    names
        .iter()
        .map(|name| {
            name.parse::<Stage>()
                .map_err(|e| Error::Validation(format!("{owner} lists an {e}")))
        })
        .collect()
}

fn is_default_exclude(value: &str) -> bool {
    value == "^$"
}

/// A minimal document to bootstrap a project
pub const SAMPLE_CONFIG: &str = "\
# See https://pre-commit.com for more information
# See https://pre-commit.com/hooks.html for more hooks
repos:
  - repo: builtin
    hooks:
      - id: trailing-whitespace
      - id: end-of-file-fixer
      - id: check-yaml
      - id: check-added-large-files
";
