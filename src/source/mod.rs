//! Source tree management: version-control access to the firmware tree.

pub mod git;

pub use git::{GitError, GitManager, GitResult, GIT_FAILURE_STATUS};
