//! Command-line surface. Positionals follow the historical argument order of
//! the preparation script so existing invocations keep working.

use std::path::PathBuf;

use clap::Parser;

use crate::log_collector::LOG_DIR_ENV;
use crate::models::{optional_param, ExecutionContext};

pub const DEFAULT_REPO_URL: &str = "https://github.com/immortalwrt/immortalwrt.git";
pub const DEFAULT_BRANCH: &str = "openwrt-24.10";
pub const DEFAULT_BUILD_DIR: &str = "./immortalwrt";
pub const DEFAULT_CONFIG_FILE: &str = "./configs/default.config";

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(
    name = "wrtprep",
    version,
    about = "Prepare an ImmortalWrt/OpenWrt source tree for building"
)]
pub struct Cli {
    /// Source repository URL (or local path)
    #[arg(default_value = DEFAULT_REPO_URL)]
    pub repo_url: String,

    /// Branch to clone
    #[arg(default_value = DEFAULT_BRANCH)]
    pub branch: String,

    /// Working directory for the source tree
    #[arg(default_value = DEFAULT_BUILD_DIR)]
    pub build_dir: PathBuf,

    /// Commit to check out after cloning ("none" for the branch tip)
    #[arg(default_value = "none")]
    pub commit: String,

    /// Build configuration installed as <build_dir>/.config
    #[arg(default_value = DEFAULT_CONFIG_FILE)]
    pub config_file: PathBuf,

    /// Steps to skip (names separated by commas or spaces, `*` wildcard)
    #[arg(default_value = "")]
    pub disabled: String,

    /// Optional steps to force on (same syntax as `disabled`)
    #[arg(default_value = "")]
    pub enabled: String,

    /// Kernel vermagic hash to pin ("none" to keep the computed one)
    #[arg(default_value = "none")]
    pub kernel_vermagic: String,

    /// Kernel patch version to pin, e.g. 6.6 ("none" for target defaults)
    #[arg(default_value = "none")]
    pub kernel_patchver: String,

    /// TOML pipeline manifest (step order and command steps)
    #[arg(long, value_name = "FILE")]
    pub pipeline: Option<PathBuf>,

    /// Directory for run log files
    #[arg(long, value_name = "DIR", env = LOG_DIR_ENV)]
    pub log_dir: Option<PathBuf>,

    /// Print each step's disposition and exit without running anything
    #[arg(long)]
    pub plan: bool,
}

impl Cli {
    /// The read-only context every step receives.
    pub fn execution_context(&self) -> ExecutionContext {
        ExecutionContext {
            repo_url: self.repo_url.clone(),
            branch: self.branch.clone(),
            build_dir: self.build_dir.clone(),
            commit: optional_param(&self.commit),
            config_file: self.config_file.clone(),
            disabled: self.disabled.clone(),
            enabled: self.enabled.clone(),
            kernel_vermagic: optional_param(&self.kernel_vermagic),
            kernel_patchver: optional_param(&self.kernel_patchver),
        }
    }
}
