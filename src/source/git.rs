//! Native git management using the `git2` crate.
//!
//! Wraps `libgit2` for firmware source tree operations: cloning a branch,
//! pinning a commit, and restoring tracked files.

use std::fs;
use std::panic::Location;
use std::path::{Path, PathBuf};

use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::Repository;
use thiserror::Error;

use crate::error::StepError;

/// Status reported for failed git operations (the code `git` itself exits with).
pub const GIT_FAILURE_STATUS: i32 = 128;

/// Errors that can occur during git operations
#[derive(Debug, Error)]
pub enum GitError {
    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Clone error: {0}")]
    Clone(String),

    #[error("Checkout error: {0}")]
    Checkout(String),

    #[error("Reference not found: {0}")]
    RefNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Git2 error: {0}")]
    Git2(#[from] git2::Error),
}

/// Result type for git operations
pub type GitResult<T> = Result<T, GitError>;

impl GitError {
    /// Convert into a step failure attributed to the caller, keeping this
    /// error's message as the failure detail.
    #[track_caller]
    pub fn into_step_error(self, operation: &str) -> StepError {
        StepError::External {
            operation: operation.to_string(),
            status: GIT_FAILURE_STATUS,
            detail: Some(self.to_string()),
            location: Location::caller(),
        }
    }
}

/// Manages a source tree repository through native git bindings
pub struct GitManager {
    repo_path: PathBuf,
}

impl GitManager {
    /// Opens an existing repository
    pub fn open(repo_path: impl AsRef<Path>) -> GitResult<Self> {
        let repo_path = repo_path.as_ref().to_path_buf();
        Repository::open(&repo_path).map_err(|e| {
            GitError::Repository(format!(
                "Failed to open repository at {:?}: {}",
                repo_path, e
            ))
        })?;
        Ok(GitManager { repo_path })
    }

    /// Whether `path` holds a git repository
    pub fn is_repository(path: impl AsRef<Path>) -> bool {
        Repository::open(path.as_ref()).is_ok()
    }

    /// Clones `branch` of `url` into `target_path`.
    ///
    /// With `shallow` set, a depth=1 clone is attempted first and a full clone
    /// is used if the remote (or transport) refuses it. The fallback only runs
    /// when `target_path` was missing or empty beforehand; anything the failed
    /// attempt left there is removed, and nothing else is.
    pub fn clone_branch(
        url: &str,
        branch: &str,
        target_path: impl AsRef<Path>,
        shallow: bool,
    ) -> GitResult<Self> {
        let target_path = target_path.as_ref();
        log::info!("cloning {} (branch {}) into {}", url, branch, target_path.display());

        let existed = target_path.exists();
        if existed && !is_empty_dir(target_path)? {
            return Err(GitError::Clone(format!(
                "Refusing to clone into {:?}: directory exists and is not empty",
                target_path
            )));
        }

        let cloned = if shallow {
            Self::clone_with_depth(url, branch, target_path, Some(1)).or_else(|shallow_err| -> GitResult<()> {
                log::warn!("shallow clone failed ({}); falling back to full clone", shallow_err);
                discard_partial_clone(target_path, existed)?;
                Self::clone_with_depth(url, branch, target_path, None)
            })
        } else {
            Self::clone_with_depth(url, branch, target_path, None)
        };
        cloned?;

        crate::log_success!("cloned {} into {}", url, target_path.display());
        GitManager::open(target_path)
    }

    fn clone_with_depth(
        url: &str,
        branch: &str,
        target_path: &Path,
        depth: Option<i32>,
    ) -> GitResult<()> {
        let mut fetch_options = git2::FetchOptions::new();
        if let Some(depth) = depth {
            fetch_options.depth(depth);
        }

        let mut builder = RepoBuilder::new();
        builder.branch(branch);
        builder.fetch_options(fetch_options);
        builder.clone(url, target_path).map_err(|e| {
            GitError::Clone(format!(
                "Failed to clone {} ({}) to {:?}: {}",
                url, branch, target_path, e
            ))
        })?;
        Ok(())
    }

    /// Checks out a specific commit, tag, or branch (detached HEAD)
    pub fn checkout(&self, reference: &str) -> GitResult<()> {
        let repo = self.repository()?;

        let obj = repo.revparse_single(reference).map_err(|e| {
            GitError::RefNotFound(format!(
                "Failed to resolve reference '{}': {}",
                reference, e
            ))
        })?;

        let mut checkout = CheckoutBuilder::new();
        checkout.force();
        repo.checkout_tree(&obj, Some(&mut checkout)).map_err(|e| {
            GitError::Checkout(format!("Failed to check out {}: {}", reference, e))
        })?;

        let commit = obj
            .peel_to_commit()
            .map_err(|e| GitError::Checkout(format!("'{}' is not a commit: {}", reference, e)))?;
        repo.set_head_detached(commit.id())
            .map_err(|e| GitError::Checkout(format!("Failed to set HEAD: {}", e)))?;

        Ok(())
    }

    /// Restores a tracked file to its HEAD content, discarding local edits
    pub fn restore_path(&self, relative: &str) -> GitResult<()> {
        let repo = self.repository()?;
        let mut checkout = CheckoutBuilder::new();
        checkout.force().path(relative);
        repo.checkout_head(Some(&mut checkout)).map_err(|e| {
            GitError::Checkout(format!("Failed to restore {}: {}", relative, e))
        })?;
        Ok(())
    }

    /// Gets the current HEAD commit hash
    pub fn get_head_commit(&self) -> GitResult<String> {
        let repo = self.repository()?;
        let head = repo
            .head()
            .map_err(|e| GitError::Repository(format!("Failed to read HEAD: {}", e)))?;
        let commit = head
            .peel_to_commit()
            .map_err(|e| GitError::Repository(format!("HEAD is not a commit: {}", e)))?;
        Ok(commit.id().to_string())
    }

    fn repository(&self) -> GitResult<Repository> {
        Repository::open(&self.repo_path)
            .map_err(|e| GitError::Repository(format!("Failed to open repository: {}", e)))
    }
}

fn is_empty_dir(path: &Path) -> GitResult<bool> {
    if !path.is_dir() {
        return Ok(false);
    }
    Ok(fs::read_dir(path)?.next().is_none())
}

/// Undo what a failed clone wrote: the whole directory when the clone created
/// it, only its contents when it was an empty directory already.
fn discard_partial_clone(target_path: &Path, existed: bool) -> GitResult<()> {
    if !target_path.exists() {
        return Ok(());
    }
    if !existed {
        fs::remove_dir_all(target_path)?;
        return Ok(());
    }
    for entry in fs::read_dir(target_path)? {
        let path = entry?.path();
        if path.is_dir() && !path.is_symlink() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}
