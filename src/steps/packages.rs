//! Removal of stock feed packages that clash with the extra feed's versions.

use std::path::Path;

use crate::error::StepError;
use crate::log_collector::Logger;
use crate::models::ExecutionContext;

use super::remove_path;

/// Package directories (relative to the tree root) replaced by the extra feed.
pub const UNWANTED_PACKAGES: &[&str] = &[
    "feeds/luci/applications/luci-app-mosdns",
    "feeds/luci/applications/luci-app-passwall",
    "feeds/luci/applications/luci-app-smartdns",
    "feeds/luci/applications/luci-app-argon-config",
    "feeds/luci/themes/luci-theme-argon",
    "feeds/packages/net/mosdns",
    "feeds/packages/net/smartdns",
    "feeds/packages/net/v2ray-geodata",
    "feeds/packages/utils/v2dat",
];

/// Remove each listed package directory under `root`.
///
/// Entries that do not exist are ignored. Returns how many were removed.
pub fn remove_packages(root: &Path, packages: &[&str], logger: &Logger) -> Result<usize, StepError> {
    let mut removed = 0;
    for package in packages {
        if remove_path(&root.join(package))? {
            logger.info(format!("removed package {}", package));
            removed += 1;
        }
    }
    Ok(removed)
}

pub fn remove_unwanted_packages(ctx: &ExecutionContext, logger: &Logger) -> Result<(), StepError> {
    let removed = remove_packages(&ctx.build_dir, UNWANTED_PACKAGES, logger)?;
    logger.info(format!(
        "removed {} of {} unwanted packages",
        removed,
        UNWANTED_PACKAGES.len()
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::test_support::{context_for, quiet_logger, write};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_packages_are_ignored() {
        let dir = TempDir::new().unwrap();
        let logger = quiet_logger(&dir);
        assert_eq!(remove_packages(dir.path(), UNWANTED_PACKAGES, &logger).unwrap(), 0);
    }

    #[test]
    fn test_only_listed_packages_are_removed() {
        let dir = TempDir::new().unwrap();
        let logger = quiet_logger(&dir);
        let tree = dir.path().join("tree");
        write(&tree, "feeds/packages/net/mosdns/Makefile", "PKG_NAME:=mosdns\n");
        write(&tree, "feeds/packages/net/curl/Makefile", "PKG_NAME:=curl\n");

        remove_unwanted_packages(&context_for(&tree), &logger).unwrap();
        assert!(!tree.join("feeds/packages/net/mosdns").exists());
        assert!(tree.join("feeds/packages/net/curl/Makefile").exists());

        let log = fs::read_to_string(logger.path()).unwrap();
        assert!(log.contains("removed package feeds/packages/net/mosdns"));
        assert!(log.contains(&format!("removed 1 of {} unwanted packages", UNWANTED_PACKAGES.len())));
    }
}
