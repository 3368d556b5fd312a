//! Source tree steps: clone, clean, and feed configuration reset.

use crate::error::StepError;
use crate::log_collector::Logger;
use crate::models::ExecutionContext;
use crate::source::GitManager;

use super::remove_path;

/// Build artifacts `clean_up` removes from the tree root.
pub const CLEAN_PATHS: &[&str] = &[".config", "tmp", "logs"];

/// Tracked feed list restored by `reset_feeds_conf`.
pub const FEEDS_CONF: &str = "feeds.conf.default";

/// Clone the branch into the build directory (unless it already holds a
/// repository) and check out the pinned commit when one is set.
pub fn clone_repo(ctx: &ExecutionContext, logger: &Logger) -> Result<(), StepError> {
    if GitManager::is_repository(&ctx.build_dir) {
        logger.info(format!(
            "{} already holds a repository; skipping clone",
            ctx.build_dir.display()
        ));
    } else {
        // A pinned commit is rarely reachable from a depth=1 history
        let shallow = ctx.commit.is_none();
        GitManager::clone_branch(&ctx.repo_url, &ctx.branch, &ctx.build_dir, shallow)
            .map_err(|e| e.into_step_error(&format!("git clone {}", ctx.repo_url)))?;
    }

    if let Some(commit) = &ctx.commit {
        let operation = format!("git checkout {}", commit);
        let manager = GitManager::open(&ctx.build_dir).map_err(|e| e.into_step_error(&operation))?;
        manager
            .checkout(commit)
            .map_err(|e| e.into_step_error(&operation))?;
        logger.info(format!("checked out {}", commit));
    }

    Ok(())
}

pub fn clean_up(ctx: &ExecutionContext, logger: &Logger) -> Result<(), StepError> {
    for relative in CLEAN_PATHS {
        if remove_path(&ctx.build_dir.join(relative))? {
            logger.info(format!("removed {}", relative));
        }
    }
    Ok(())
}

/// Restore `feeds.conf.default` to its committed content.
pub fn reset_feeds_conf(ctx: &ExecutionContext, logger: &Logger) -> Result<(), StepError> {
    let operation = format!("git checkout HEAD -- {}", FEEDS_CONF);
    let manager = GitManager::open(&ctx.build_dir).map_err(|e| e.into_step_error(&operation))?;
    manager
        .restore_path(FEEDS_CONF)
        .map_err(|e| e.into_step_error(&operation))?;
    logger.info(format!("restored {} from HEAD", FEEDS_CONF));
    Ok(())
}
