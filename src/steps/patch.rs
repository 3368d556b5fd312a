//! In-place edits of the source tree's build metadata: kernel vermagic,
//! kernel patch version, and the firmware revision string.

use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::{Captures, NoExpand, Regex};

use crate::error::StepError;
use crate::log_collector::Logger;
use crate::models::ExecutionContext;
use crate::source::GitManager;

use super::edit_file;

pub const KERNEL_DEFAULTS_MK: &str = "include/kernel-defaults.mk";
pub const TARGET_LINUX_DIR: &str = "target/linux";
pub const OPENWRT_RELEASE: &str = "package/base-files/files/etc/openwrt_release";

// Pre-compiled regex patterns (compiled once at startup)
static VERMAGIC_RULE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^([ \t]*)(?:.*\$\(MKHASH\) md5|echo [0-9A-Za-z]+) > \$\(LINUX_DIR\)/\.vermagic[ \t]*$")
        .expect("Invalid vermagic rule regex")
});
static VERMAGIC_VALUE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-fA-F]{32}$").expect("Invalid vermagic value regex"));
static PATCHVER_LINE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^KERNEL_PATCHVER[ \t]*:?=.*$").expect("Invalid KERNEL_PATCHVER regex")
});
static PATCHVER_VALUE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.\d+$").expect("Invalid patch version regex"));
static REVISION_LINE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^DISTRIB_REVISION=.*$").expect("Invalid DISTRIB_REVISION regex"));

/// Replace the hashed vermagic rule with a fixed value.
///
/// Fails when the tree has no vermagic rule to replace.
pub fn pin_vermagic(content: &str, vermagic: &str) -> Result<String, StepError> {
    if !VERMAGIC_VALUE_REGEX.is_match(vermagic) {
        return Err(StepError::Configuration(format!(
            "kernel vermagic '{}' is not a 32-digit hex hash",
            vermagic
        )));
    }
    if !VERMAGIC_RULE_REGEX.is_match(content) {
        return Err(StepError::Configuration(format!(
            "no vermagic rule found in {}",
            KERNEL_DEFAULTS_MK
        )));
    }
    let pinned = VERMAGIC_RULE_REGEX.replace_all(content, |caps: &Captures| {
        format!("{}echo {} > $(LINUX_DIR)/.vermagic", &caps[1], vermagic)
    });
    Ok(pinned.into_owned())
}

/// Rewrite every `KERNEL_PATCHVER` assignment to `patchver`.
pub fn pin_patchver(content: &str, patchver: &str) -> String {
    let line = format!("KERNEL_PATCHVER:={}", patchver);
    PATCHVER_LINE_REGEX
        .replace_all(content, NoExpand(&line))
        .into_owned()
}

/// `'<branch>@<short commit> built <date>'`, quotes stripped from the inputs.
pub fn render_signature(branch: &str, commit: &str, date: &str) -> String {
    let clean = |s: &str| s.replace('\'', "");
    format!("'{}@{} built {}'", clean(branch), clean(commit), clean(date))
}

/// Set `DISTRIB_REVISION`, appending the line when the file lacks one.
pub fn apply_signature(content: &str, signature: &str) -> String {
    let line = format!("DISTRIB_REVISION={}", signature);
    if REVISION_LINE_REGEX.is_match(content) {
        return REVISION_LINE_REGEX
            .replace_all(content, NoExpand(&line))
            .into_owned();
    }
    let mut updated = content.to_string();
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    updated.push_str(&line);
    updated.push('\n');
    updated
}

pub fn fix_kernel_vermagic(ctx: &ExecutionContext, logger: &Logger) -> Result<(), StepError> {
    let Some(vermagic) = ctx.kernel_vermagic.as_deref() else {
        logger.info("no kernel vermagic pinned; leaving the hashed rule in place");
        return Ok(());
    };

    let path = ctx.build_dir.join(KERNEL_DEFAULTS_MK);
    if edit_file(&path, |content| pin_vermagic(content, vermagic))? {
        logger.info(format!("pinned kernel vermagic to {}", vermagic));
    } else {
        logger.info(format!("kernel vermagic already pinned to {}", vermagic));
    }
    Ok(())
}

/// Every `target/linux/<target>/Makefile` under `root`, sorted.
fn target_makefiles(root: &Path) -> Result<Vec<PathBuf>, StepError> {
    let dir = root.join(TARGET_LINUX_DIR);
    let entries =
        fs::read_dir(&dir).map_err(|e| StepError::io(format!("read {}", dir.display()), e))?;

    let mut makefiles = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| StepError::io(format!("read {}", dir.display()), e))?;
        let makefile = entry.path().join("Makefile");
        if makefile.is_file() {
            makefiles.push(makefile);
        }
    }
    makefiles.sort();
    Ok(makefiles)
}

pub fn pin_kernel_patchver(ctx: &ExecutionContext, logger: &Logger) -> Result<(), StepError> {
    let Some(patchver) = ctx.kernel_patchver.as_deref() else {
        logger.info("no kernel patch version pinned; keeping target defaults");
        return Ok(());
    };
    if !PATCHVER_VALUE_REGEX.is_match(patchver) {
        return Err(StepError::Configuration(format!(
            "kernel patch version '{}' is not of the form <major>.<minor>",
            patchver
        )));
    }

    let mut pinned = 0;
    for makefile in target_makefiles(&ctx.build_dir)? {
        if edit_file(&makefile, |content| Ok(pin_patchver(content, patchver)))? {
            pinned += 1;
        }
    }

    if pinned == 0 {
        logger.warning(format!(
            "no target Makefile needed KERNEL_PATCHVER:={}",
            patchver
        ));
    } else {
        logger.info(format!(
            "pinned KERNEL_PATCHVER:={} in {} target Makefiles",
            patchver, pinned
        ));
    }
    Ok(())
}

/// Short commit naming the checked-out tree.
fn short_commit(ctx: &ExecutionContext) -> String {
    let full = GitManager::open(&ctx.build_dir)
        .and_then(|manager| manager.get_head_commit())
        .ok()
        .or_else(|| ctx.commit.clone());
    match full {
        Some(commit) => commit.chars().take(7).collect(),
        None => "HEAD".to_string(),
    }
}

pub fn set_build_signature(ctx: &ExecutionContext, logger: &Logger) -> Result<(), StepError> {
    let date = chrono::Local::now().format("%Y-%m-%d").to_string();
    let signature = render_signature(&ctx.branch, &short_commit(ctx), &date);

    let path = ctx.build_dir.join(OPENWRT_RELEASE);
    edit_file(&path, |content| Ok(apply_signature(content, &signature)))?;
    logger.info(format!("build signature set to {}", signature));
    Ok(())
}
