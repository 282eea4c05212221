//! Hook resolution
//!
//! Turns each repository entry of the document into hook definitions.
//! Remote repositories are checked out through the [`RepoCache`] at their
//! pinned revision and their manifest is read; `local` hooks come from the
//! document itself and `builtin` hooks from hitch.
//!
//! A repository that cannot be obtained fails only its own hooks. A hook id
//! that does not exist in a manifest fails the whole run.

use crate::cache::RepoCache;
use crate::git::GitProvider;
use crate::hooks::{HookDefinition, builtin};
use hitch_config::{Config, Language, ManifestHook, RepoEntry, RepoKind, manifest};
use hitch_core::{Error, Result};
use rayon::prelude::*;
use std::path::PathBuf;

/// Resolution outcome of one repository entry
#[derive(Debug)]
pub struct ResolvedRepo {
    /// Source identifier
    pub source: String,
    /// Pinned revision, if any
    pub rev: Option<String>,
    /// Hook definitions in document order, or why the repository failed
    pub hooks: Result<Vec<HookDefinition>>,
}

/// Every repository entry of a document, in document order
#[derive(Debug, Default)]
pub struct Resolution {
    /// Per-repository outcomes
    pub repos: Vec<ResolvedRepo>,
}

impl Resolution {
    /// Split into the resolved hooks (document order) and the failures
    #[must_use]
    pub fn into_parts(self) -> (Vec<HookDefinition>, Vec<Error>) {
        let mut hooks = Vec::new();
        let mut errors = Vec::new();
        for repo in self.repos {
            match repo.hooks {
                Ok(resolved) => hooks.extend(resolved),
                Err(e) => errors.push(e),
            }
        }
        (hooks, errors)
    }
}

/// Resolves repository entries against the cache
pub struct Resolver<'a> {
    cache: &'a RepoCache,
    provider: &'a dyn GitProvider,
}

impl<'a> Resolver<'a> {
    /// Create a resolver
    pub fn new(cache: &'a RepoCache, provider: &'a dyn GitProvider) -> Self {
        Self { cache, provider }
    }

    /// Resolve every repository of `config`, remote ones in parallel
    ///
    /// Returns an error only for failures that invalidate the whole document
    /// (an unknown hook id, an unreadable manifest).
    #[tracing::instrument(skip_all, fields(repos = config.repos.len()))]
    pub fn resolve(&self, config: &Config) -> Result<Resolution> {
        let outcomes: Vec<Result<Vec<HookDefinition>>> = config
            .repos
            .par_iter()
            .map(|repo| self.resolve_repo(repo, config))
            .collect();

        let mut repos = Vec::with_capacity(outcomes.len());
        for (entry, outcome) in config.repos.iter().zip(outcomes) {
            let hooks = match outcome {
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!(repo = %entry.repo, error = %e, "Repository failed to resolve");
                    Err(e)
                }
                Ok(hooks) => Ok(hooks),
            };
            repos.push(ResolvedRepo {
                source: entry.repo.clone(),
                rev: entry.rev.clone(),
                hooks,
            });
        }
        Ok(Resolution { repos })
    }

    fn resolve_repo(&self, repo: &RepoEntry, config: &Config) -> Result<Vec<HookDefinition>> {
        match repo.kind() {
            RepoKind::Meta => {
                tracing::warn!("Hooks from the 'meta' repository are not supported, ignoring");
                Ok(Vec::new())
            }
            RepoKind::Local => repo
                .hooks
                .iter()
                .map(|invocation| {
                    let manifest = invocation.to_local_hook()?;
                    let hook = HookDefinition::merge(&manifest, invocation, repo, config, None)?;
                    check_dependencies(&hook)?;
                    Ok(hook)
                })
                .collect(),
            RepoKind::Builtin => {
                let manifest = builtin::manifest();
                merge_all(repo, config, &manifest, None)
            }
            RepoKind::Remote => {
                let dir = self.cache.checkout(&repo.repo, repo.rev(), self.provider)?;
                let manifest = manifest::load_manifest(&dir)?;
                merge_all(repo, config, &manifest, Some(dir))
            }
        }
    }
}

fn merge_all(
    repo: &RepoEntry,
    config: &Config,
    manifest: &[ManifestHook],
    repo_dir: Option<PathBuf>,
) -> Result<Vec<HookDefinition>> {
    repo.hooks
        .iter()
        .map(|invocation| {
            let found = manifest
                .iter()
                .find(|m| m.id == invocation.id)
                .ok_or_else(|| {
                    Error::Validation(format!(
                        "hook '{}' is not present in repository {} (rev: {})",
                        invocation.id,
                        repo.repo,
                        repo.rev.as_deref().unwrap_or("none")
                    ))
                })?;
            let hook = HookDefinition::merge(found, invocation, repo, config, repo_dir.clone())?;
            if hook.language == Language::Builtin && !builtin::exists(&hook.entry) {
                return Err(Error::resolution(
                    &repo.repo,
                    format!("hook '{}' names unknown builtin '{}'", hook.id, hook.entry),
                ));
            }
            check_dependencies(&hook)?;
            Ok(hook)
        })
        .collect()
}

/// Languages hitch does not bootstrap must find their tool on `PATH`
fn check_dependencies(hook: &HookDefinition) -> Result<()> {
    let Language::Other(name) = &hook.language else {
        return Ok(());
    };

    if !hook.additional_dependencies.is_empty() {
        return Err(Error::resolution(
            &hook.repo,
            format!(
                "missing dependency: hook '{}' requests additional_dependencies for language '{name}', which hitch cannot install",
                hook.id
            ),
        ));
    }

    let program = hook.entry.split_whitespace().next().unwrap_or_default();
    which::which(program).map_err(|_| {
        Error::resolution(
            &hook.repo,
            format!(
                "missing dependency: executable `{program}` for {name} hook '{}' not found",
                hook.id
            ),
        )
    })?;
    Ok(())
}
