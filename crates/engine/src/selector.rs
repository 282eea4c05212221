//! File selection
//!
//! The candidate set is identified once per run and shared read-only by every
//! hook. Selection applies, in order: the document's `files` and `exclude`
//! patterns, the hook's `files` and `exclude` patterns, then the `types`,
//! `types_or` and `exclude_types` tag filters.

use crate::hooks::HookFilters;
use crate::identify::{Tags, tags_for};
use hitch_core::{Error, Result};
use rayon::prelude::*;
use regex::Regex;
use std::path::{Path, PathBuf};

/// A candidate file with its identification tags
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Path relative to the working tree
    pub path: PathBuf,
    /// Path with `/` separators, as matched by patterns
    pub display: String,
    /// Identification tags
    pub tags: Tags,
}

/// Files a run may hand to hooks
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    files: Vec<Candidate>,
}

impl CandidateSet {
    /// Identify `paths` (relative to `work_tree`) in parallel
    pub fn identify(work_tree: &Path, paths: Vec<PathBuf>) -> Self {
        let files = paths
            .into_par_iter()
            .map(|path| {
                let tags = tags_for(&work_tree.join(&path));
                let display = path.to_string_lossy().replace('\\', "/");
                Candidate {
                    path,
                    display,
                    tags,
                }
            })
            .collect();
        Self { files }
    }

    /// Build from already tagged candidates
    #[must_use]
    pub fn from_candidates(files: Vec<Candidate>) -> Self {
        Self { files }
    }

    /// Candidates in input order
    #[must_use]
    pub fn files(&self) -> &[Candidate] {
        &self.files
    }

    /// Number of candidates
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether there are no candidates
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// The document's include and exclude patterns
#[derive(Debug, Clone)]
pub struct GlobalFilter {
    files: Regex,
    exclude: Regex,
}

impl GlobalFilter {
    /// Compile the document-wide patterns
    pub fn new(files: &str, exclude: &str) -> Result<Self> {
        let compile = |field: &str, pattern: &str| {
            Regex::new(pattern).map_err(|e| {
                Error::Validation(format!("invalid top-level '{field}' pattern: {e}"))
            })
        };
        Ok(Self {
            files: compile("files", files)?,
            exclude: compile("exclude", exclude)?,
        })
    }

    /// Whether `path` survives the document-wide patterns
    #[must_use]
    pub fn admits(&self, path: &str) -> bool {
        self.files.is_match(path) && !self.exclude.is_match(path)
    }
}

fn tags_match(tags: &Tags, filters: &HookFilters) -> bool {
    filters.types.iter().all(|t| tags.contains(t.as_str()))
        && (filters.types_or.is_empty()
            || filters.types_or.iter().any(|t| tags.contains(t.as_str())))
        && !filters.exclude_types.iter().any(|t| tags.contains(t.as_str()))
}

/// Candidates a hook applies to, in candidate order
#[must_use]
pub fn select<'a>(
    candidates: &'a CandidateSet,
    global: &GlobalFilter,
    filters: &HookFilters,
) -> Vec<&'a Candidate> {
    candidates
        .files
        .iter()
        .filter(|c| global.admits(&c.display))
        .filter(|c| filters.files.is_match(&c.display) && !filters.exclude.is_match(&c.display))
        .filter(|c| tags_match(&c.tags, filters))
        .collect()
}
