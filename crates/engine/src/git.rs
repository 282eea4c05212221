//! Git access for hook repositories
//!
//! Hook repositories are cloned into the cache and pinned to the revision the
//! project document asks for. The [`GitProvider`] trait is the seam used by
//! the resolver and by `autoupdate`; [`Git2Provider`] implements it with
//! libgit2.

use hitch_core::{Error, Result};
use std::path::Path;

/// Helper function to convert git2 errors to `hitch_core` errors
#[inline]
#[allow(clippy::needless_pass_by_value)]
pub(crate) fn git_err(e: git2::Error) -> Error {
    Error::Git(e.message().to_string())
}

/// Git operations needed to obtain hook repositories
pub trait GitProvider: Sync {
    /// Clone `url` into `target` and check out `rev` (tag, branch or commit)
    ///
    /// # Errors
    ///
    /// Returns a resolution error when the repository cannot be cloned or the
    /// revision does not exist
    fn clone_at(&self, url: &str, rev: &str, target: &Path) -> Result<()>;

    /// Newest revision of `url`: the most recent tag reachable from the
    /// default branch, or the branch head with `bleeding_edge`
    ///
    /// # Errors
    ///
    /// Returns a resolution error when the repository cannot be cloned
    fn latest_revision(&self, url: &str, bleeding_edge: bool) -> Result<String>;
}

/// Type alias for progress callback function
/// Arguments: (received objects, total objects)
type ProgressCallback = Box<dyn Fn(usize, usize) + Send + Sync>;

/// Git provider implementation using git2 (libgit2)
pub struct Git2Provider {
    progress_callback: Option<ProgressCallback>,
}

impl Git2Provider {
    /// Create a new Git2 provider
    #[must_use]
    pub fn new() -> Self {
        Self {
            progress_callback: None,
        }
    }

    /// Set progress callback for clone operations
    #[must_use]
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Box::new(callback));
        self
    }

    fn clone_repo(&self, url: &str, target: &Path) -> Result<git2::Repository> {
        use git2::{AutotagOption, FetchOptions, RemoteCallbacks, build::RepoBuilder};

        let mut callbacks = RemoteCallbacks::new();
        if let Some(progress_fn) = &self.progress_callback {
            callbacks.transfer_progress(move |stats| {
                progress_fn(stats.received_objects(), stats.total_objects());
                true
            });
        }

        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(callbacks);
        fetch_options.download_tags(AutotagOption::All);

        let mut builder = RepoBuilder::new();
        builder.fetch_options(fetch_options);

        tracing::debug!(url, target = %target.display(), "Cloning hook repository");

        builder.clone(url, target).map_err(|e| {
            Error::resolution(url, format!("failed to clone repository: {}", e.message()))
        })
    }
}

impl Default for Git2Provider {
    fn default() -> Self {
        Self::new()
    }
}

impl GitProvider for Git2Provider {
    fn clone_at(&self, url: &str, rev: &str, target: &Path) -> Result<()> {
        use git2::build::CheckoutBuilder;

        let repo = self.clone_repo(url, target)?;

        // Branch names only exist as remote-tracking refs after a clone
        let object = repo
            .revparse_single(rev)
            .or_else(|_| repo.revparse_single(&format!("origin/{rev}")))
            .map_err(|_| Error::resolution(url, format!("revision '{rev}' not found")))?;
        let commit = object
            .peel_to_commit()
            .map_err(|_| Error::resolution(url, format!("revision '{rev}' is not a commit")))?;

        repo.checkout_tree(commit.as_object(), Some(CheckoutBuilder::new().force()))
            .map_err(git_err)?;
        repo.set_head_detached(commit.id()).map_err(git_err)?;

        tracing::debug!(url, rev, commit = %commit.id(), "Checked out hook repository");
        Ok(())
    }

    fn latest_revision(&self, url: &str, bleeding_edge: bool) -> Result<String> {
        let staging = tempfile::tempdir()?;
        let repo = self.clone_repo(url, &staging.path().join("repo"))?;

        let head = repo
            .head()
            .and_then(|h| h.peel_to_commit())
            .map_err(|e| Error::resolution(url, format!("cannot read HEAD: {}", e.message())))?;

        if bleeding_edge {
            return Ok(head.id().to_string());
        }

        match nearest_tag(&repo, head.id()) {
            Some(tag) => Ok(tag),
            None => {
                tracing::debug!(url, "No tags reachable from HEAD, using commit");
                Ok(head.id().to_string())
            }
        }
    }
}

/// Most recent tag reachable from `commit`
///
/// When several tags point at the same commit, the ones that look like
/// versions (contain a dot) win.
fn nearest_tag(repo: &git2::Repository, commit: git2::Oid) -> Option<String> {
    use git2::{DescribeFormatOptions, DescribeOptions};

    let object = repo.find_object(commit, None).ok()?;
    let mut options = DescribeOptions::new();
    options.describe_tags();
    let describe = object.describe(&options).ok()?;
    let mut format = DescribeFormatOptions::new();
    format.abbreviated_size(0);
    let name = describe.format(Some(&format)).ok()?;

    let tagged = repo.revparse_single(&name).ok()?.peel_to_commit().ok()?.id();
    let mut siblings: Vec<String> = repo
        .tag_names(None)
        .ok()?
        .iter()
        .flatten()
        .filter(|tag| {
            repo.revparse_single(tag)
                .and_then(|o| o.peel_to_commit())
                .is_ok_and(|c| c.id() == tagged)
        })
        .map(str::to_string)
        .collect();
    siblings.sort();

    siblings
        .iter()
        .find(|tag| tag.contains('.'))
        .cloned()
        .or(Some(name))
}
