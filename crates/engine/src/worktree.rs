//! Access to the project working tree
//!
//! Candidate file sets (staged, tracked, changed between two refs), the git
//! hooks directory, and the guard that sets unstaged edits aside while hooks
//! look at the staged content.

use crate::git::git_err;
use hitch_core::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Find git working tree root starting from the given path
///
/// Searches upward from the given path to find a .git directory or file.
/// Returns the working tree root path if found, None otherwise.
#[must_use]
pub fn find_working_tree(start_path: &Path) -> Option<PathBuf> {
    use git2::Repository;

    if let Ok(repo) = Repository::discover(start_path)
        && let Some(workdir) = repo.workdir()
    {
        return Some(workdir.to_path_buf());
    }

    None
}

fn open(work_tree: &Path) -> Result<git2::Repository> {
    git2::Repository::open(work_tree).map_err(git_err)
}

/// Directory git runs hook scripts from
///
/// Honors `core.hooksPath` (relative values are resolved against the working
/// tree), else `<git dir>/hooks`.
pub fn hooks_dir(work_tree: &Path) -> Result<PathBuf> {
    let repo = open(work_tree)?;
    let configured = repo
        .config()
        .and_then(|c| c.get_path("core.hooksPath"))
        .ok();

    Ok(match configured {
        Some(path) if path.is_absolute() => path,
        Some(path) => work_tree.join(path),
        None => repo.path().join("hooks"),
    })
}

/// Whether a merge is in progress
#[must_use]
pub fn merge_in_progress(work_tree: &Path) -> bool {
    open(work_tree).is_ok_and(|repo| repo.path().join("MERGE_HEAD").exists())
}

fn delta_paths(diff: &git2::Diff<'_>) -> Vec<PathBuf> {
    use git2::Delta;

    let mut paths: Vec<PathBuf> = diff
        .deltas()
        .filter(|d| {
            matches!(
                d.status(),
                Delta::Added | Delta::Modified | Delta::Renamed | Delta::Copied | Delta::Typechange
            )
        })
        .filter_map(|d| d.new_file().path().map(Path::to_path_buf))
        .collect();
    paths.sort();
    paths.dedup();
    paths
}

fn head_tree(repo: &git2::Repository) -> Option<git2::Tree<'_>> {
    repo.head().ok().and_then(|h| h.peel_to_tree().ok())
}

/// Files added, copied, modified or renamed in the index relative to HEAD
pub fn staged_files(work_tree: &Path) -> Result<Vec<PathBuf>> {
    let repo = open(work_tree)?;
    let index = repo.index().map_err(git_err)?;
    let head = head_tree(&repo);
    let diff = repo
        .diff_tree_to_index(head.as_ref(), Some(&index), None)
        .map_err(git_err)?;
    Ok(delta_paths(&diff))
}

/// Every file tracked in the index
pub fn all_files(work_tree: &Path) -> Result<Vec<PathBuf>> {
    let repo = open(work_tree)?;
    let index = repo.index().map_err(git_err)?;
    let mut files: Vec<PathBuf> = index
        .iter()
        .map(|entry| PathBuf::from(String::from_utf8_lossy(&entry.path).into_owned()))
        .collect();
    files.dedup();
    Ok(files)
}

fn commit_of<'r>(repo: &'r git2::Repository, spec: &str) -> Result<git2::Commit<'r>> {
    repo.revparse_single(spec)
        .and_then(|o| o.peel_to_commit())
        .map_err(|_| Error::Git(format!("unknown revision '{spec}'")))
}

/// Files changed between `from` and `to`
///
/// Compares against the merge base of the two revisions, so changes that only
/// exist on `from`'s side are not reported. Without `from` every file of `to`
/// is reported.
pub fn changed_files(work_tree: &Path, from: Option<&str>, to: &str) -> Result<Vec<PathBuf>> {
    let repo = open(work_tree)?;
    let to_commit = commit_of(&repo, to)?;
    let to_tree = to_commit.tree().map_err(git_err)?;

    let base_tree = match from {
        Some(from) => {
            let from_commit = commit_of(&repo, from)?;
            let base = repo
                .merge_base(from_commit.id(), to_commit.id())
                .unwrap_or(from_commit.id());
            Some(
                repo.find_commit(base)
                    .and_then(|c| c.tree())
                    .map_err(git_err)?,
            )
        }
        None => None,
    };

    let diff = repo
        .diff_tree_to_tree(base_tree.as_ref(), Some(&to_tree), None)
        .map_err(git_err)?;
    Ok(delta_paths(&diff))
}

/// First revision of a push range that is not on any remote
///
/// Returns the parent of the oldest unpushed ancestor of `local`, or `None`
/// when that ancestor is a root commit (every file is then new to the remote).
pub fn unpushed_base(work_tree: &Path, local: &str) -> Result<Option<String>> {
    use git2::Sort;

    let repo = open(work_tree)?;
    let local_commit = commit_of(&repo, local)?;

    let mut walk = repo.revwalk().map_err(git_err)?;
    walk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)
        .map_err(git_err)?;
    walk.push(local_commit.id()).map_err(git_err)?;
    walk.hide_glob("refs/remotes/*").map_err(git_err)?;

    let Some(oldest) = walk.next() else {
        return Ok(Some(local_commit.id().to_string()));
    };
    let oldest = repo
        .find_commit(oldest.map_err(git_err)?)
        .map_err(git_err)?;

    Ok(oldest.parent_id(0).ok().map(|id| id.to_string()))
}

fn unstaged_diff(repo: &git2::Repository) -> Result<git2::Diff<'_>> {
    let mut options = git2::DiffOptions::new();
    options.show_binary(true);
    repo.diff_index_to_workdir(None, Some(&mut options))
        .map_err(git_err)
}

fn patch_bytes(diff: &git2::Diff<'_>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    diff.print(git2::DiffFormat::Patch, |_delta, _hunk, line| {
        if matches!(line.origin(), '+' | '-' | ' ') {
            buf.push(line.origin() as u8);
        }
        buf.extend_from_slice(line.content());
        true
    })
    .map_err(git_err)?;
    Ok(buf)
}

/// Unstaged changes of tracked files as a patch
pub fn worktree_diff(work_tree: &Path) -> Result<String> {
    let repo = open(work_tree)?;
    let diff = unstaged_diff(&repo)?;
    Ok(String::from_utf8_lossy(&patch_bytes(&diff)?).into_owned())
}

fn checkout_index(repo: &git2::Repository) -> Result<()> {
    let mut checkout = git2::build::CheckoutBuilder::new();
    checkout.force();
    repo.checkout_index(None, Some(&mut checkout))
        .map_err(git_err)
}

/// Unstaged edits set aside while hooks run against the staged content
///
/// [`UnstagedChanges::stash`] writes the unstaged diff of tracked files to a
/// patch file and resets those files to their index content.
/// [`UnstagedChanges::restore`] applies the patch again; if hook fixes
/// conflict with it, the fixes are discarded in favor of the user's edits.
#[derive(Debug)]
pub struct UnstagedChanges {
    work_tree: PathBuf,
    patch_path: PathBuf,
    restored: bool,
}

impl UnstagedChanges {
    /// Set aside unstaged changes, returning `None` when there are none
    pub fn stash(work_tree: &Path, patch_dir: &Path) -> Result<Option<Self>> {
        let repo = open(work_tree)?;
        let diff = unstaged_diff(&repo)?;
        if diff.deltas().next().is_none() {
            return Ok(None);
        }

        let patch = patch_bytes(&diff)?;
        fs::create_dir_all(patch_dir)?;
        let stamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let patch_path = patch_dir.join(format!("patch{stamp}-{}", std::process::id()));
        fs::write(&patch_path, &patch)?;

        tracing::info!(patch = %patch_path.display(), "Stashing unstaged changes");
        checkout_index(&repo)?;

        Ok(Some(Self {
            work_tree: work_tree.to_path_buf(),
            patch_path,
            restored: false,
        }))
    }

    /// Location of the saved patch
    #[must_use]
    pub fn patch_path(&self) -> &Path {
        &self.patch_path
    }

    /// Reapply the unstaged changes
    pub fn restore(mut self) -> Result<()> {
        self.restored = true;
        self.apply()
    }

    fn apply(&self) -> Result<()> {
        let repo = open(&self.work_tree)?;
        let patch = fs::read(&self.patch_path)?;
        let diff = git2::Diff::from_buffer(&patch).map_err(git_err)?;

        if repo
            .apply(&diff, git2::ApplyLocation::WorkDir, None)
            .is_err()
        {
            tracing::warn!("Stashed changes conflicted with hook auto-fixes, rolling back fixes");
            checkout_index(&repo)?;
            repo.apply(&diff, git2::ApplyLocation::WorkDir, None)
                .map_err(git_err)?;
        }

        tracing::info!("Restored unstaged changes");
        fs::remove_file(&self.patch_path)?;
        Ok(())
    }
}

impl Drop for UnstagedChanges {
    fn drop(&mut self) {
        if !self.restored
            && let Err(e) = self.apply()
        {
            tracing::error!(
                patch = %self.patch_path.display(),
                error = %e,
                "Failed to restore unstaged changes"
            );
        }
    }
}
