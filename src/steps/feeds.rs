//! Package feed steps: feed list rewrite, feed update/install, golang swap.

use crate::error::StepError;
use crate::log_collector::Logger;
use crate::models::ExecutionContext;
use crate::source::GitManager;
use crate::system::run_command;

use super::source::FEEDS_CONF;
use super::{edit_file, remove_path};

/// Name of the extra feed appended to the feed list.
pub const EXTRA_FEED_NAME: &str = "small8";
pub const EXTRA_FEED_URL: &str = "https://github.com/kenzok8/small-package";

pub const GOLANG_REPO: &str = "https://github.com/sbwml/packages_lang_golang";
pub const GOLANG_BRANCH: &str = "24.x";
pub const GOLANG_DIR: &str = "feeds/packages/lang/golang";

const FEEDS_SCRIPT: &str = "./scripts/feeds";

/// Rewrite a feed list: drop commented-out `#src-git` entries and any
/// earlier extra-feed entry, then append the extra feed once.
pub fn rewrite_feeds_conf(content: &str) -> String {
    let entry = format!("src-git {} {}", EXTRA_FEED_NAME, EXTRA_FEED_URL);
    let mut lines: Vec<&str> = content
        .lines()
        .filter(|line| {
            let trimmed = line.trim_start();
            if trimmed.starts_with("#src-git") {
                return false;
            }
            let mut fields = trimmed.split_whitespace();
            let is_feed = fields.next().map_or(false, |kind| kind.starts_with("src-"));
            !(is_feed && fields.next() == Some(EXTRA_FEED_NAME))
        })
        .collect();

    while lines.last().map_or(false, |line| line.trim().is_empty()) {
        lines.pop();
    }

    lines.push(&entry);

    let mut rewritten = lines.join("\n");
    rewritten.push('\n');
    rewritten
}

/// Add the extra feed, then refresh every feed index.
pub fn update_feeds(ctx: &ExecutionContext, logger: &Logger) -> Result<(), StepError> {
    let conf = ctx.build_dir.join(FEEDS_CONF);
    if edit_file(&conf, |content| Ok(rewrite_feeds_conf(content)))? {
        logger.info(format!("added feed {} to {}", EXTRA_FEED_NAME, FEEDS_CONF));
    }

    run_command(FEEDS_SCRIPT, &["clean"], &ctx.build_dir, logger)?;
    run_command(FEEDS_SCRIPT, &["update", "-a"], &ctx.build_dir, logger)?;
    Ok(())
}

pub fn install_feeds(ctx: &ExecutionContext, logger: &Logger) -> Result<(), StepError> {
    run_command(FEEDS_SCRIPT, &["install", "-a"], &ctx.build_dir, logger)
}

/// Replace the feed's golang toolchain package with a newer one.
pub fn update_golang(ctx: &ExecutionContext, logger: &Logger) -> Result<(), StepError> {
    let target = ctx.build_dir.join(GOLANG_DIR);
    if remove_path(&target)? {
        logger.info(format!("removed {}", GOLANG_DIR));
    }

    GitManager::clone_branch(GOLANG_REPO, GOLANG_BRANCH, &target, true)
        .map_err(|e| e.into_step_error(&format!("git clone {}", GOLANG_REPO)))?;
    logger.info(format!(
        "installed golang packages from {} ({})",
        GOLANG_REPO, GOLANG_BRANCH
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::test_support::{context_for, quiet_logger, write};
    use std::fs;
    use tempfile::TempDir;

    const STOCK: &str = "\
src-git packages https://github.com/immortalwrt/packages.git;openwrt-24.10
src-git luci https://github.com/immortalwrt/luci.git;openwrt-24.10
#src-git oldpackages http://git.openwrt.org/packages.git
src-git routing https://github.com/openwrt/routing.git;openwrt-24.10
";

    #[test]
    fn test_rewrite_appends_extra_feed() {
        let rewritten = rewrite_feeds_conf(STOCK);
        assert!(!rewritten.contains("#src-git"));
        assert!(rewritten.contains("src-git luci "));
        assert!(rewritten.ends_with("src-git small8 https://github.com/kenzok8/small-package\n"));
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let once = rewrite_feeds_conf(STOCK);
        let twice = rewrite_feeds_conf(&once);
        assert_eq!(once, twice);
        assert_eq!(twice.matches("small8").count(), 1);
    }

    #[test]
    fn test_rewrite_replaces_stale_extra_feed() {
        let stale = "src-git small8 https://example.invalid/old\nsrc-git packages x\n\n\n";
        let rewritten = rewrite_feeds_conf(stale);
        assert_eq!(
            rewritten,
            "src-git packages x\nsrc-git small8 https://github.com/kenzok8/small-package\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_update_feeds_runs_feeds_script() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let logger = quiet_logger(&dir);
        let tree = dir.path().join("tree");
        write(&tree, FEEDS_CONF, STOCK);
        write(&tree, "scripts/feeds", "#!/bin/sh\necho \"$@\" >> feeds-calls\n");
        let script = tree.join("scripts/feeds");
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let ctx = context_for(&tree);
        update_feeds(&ctx, &logger).unwrap();
        install_feeds(&ctx, &logger).unwrap();

        let calls = fs::read_to_string(tree.join("feeds-calls")).unwrap();
        assert_eq!(calls, "clean\nupdate -a\ninstall -a\n");
        let conf = fs::read_to_string(tree.join(FEEDS_CONF)).unwrap();
        assert!(conf.contains("src-git small8"));
    }

    #[test]
    fn test_update_feeds_without_feed_list_fails() {
        let dir = TempDir::new().unwrap();
        let logger = quiet_logger(&dir);
        let err = update_feeds(&context_for(dir.path()), &logger).unwrap_err();
        assert_eq!(err.status(), crate::error::IO_FAILURE_STATUS);
    }
}
