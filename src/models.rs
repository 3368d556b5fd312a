//! Core data structures shared across the pipeline.

use std::fmt;
use std::path::PathBuf;

use crate::error::StepError;

/// Sigil marking a step declaration as optional (off unless force-enabled).
pub const OPTIONAL_SIGIL: char = '~';

/// Read-only run parameters, built once at startup and passed by reference
/// into every step invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    /// Source repository URL (or local path) to prepare.
    pub repo_url: String,
    /// Branch to clone.
    pub branch: String,
    /// Working directory holding the source tree.
    pub build_dir: PathBuf,
    /// Optional commit pin checked out after cloning.
    pub commit: Option<String>,
    /// Build configuration installed as `<build_dir>/.config`.
    pub config_file: PathBuf,
    /// Pattern of normally-on steps to silence.
    pub disabled: String,
    /// Pattern of optional steps to force-enable.
    pub enabled: String,
    /// Pinned kernel vermagic hash.
    pub kernel_vermagic: Option<String>,
    /// Pinned kernel patch version (e.g. `6.6`).
    pub kernel_patchver: Option<String>,
}

impl ExecutionContext {
    /// Identity of this run, used to name its log file.
    ///
    /// `<repo-name>-<branch>` with anything outside `[A-Za-z0-9._-]` replaced by `_`.
    pub fn run_id(&self) -> String {
        let repo_name = self
            .repo_url
            .trim_end_matches('/')
            .rsplit(['/', ':'])
            .next()
            .unwrap_or("")
            .trim_end_matches(".git");
        let raw = if repo_name.is_empty() {
            self.branch.clone()
        } else {
            format!("{}-{}", repo_name, self.branch)
        };
        raw.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }
}

/// Normalize an optional CLI parameter: `none` and blank mean unset.
pub fn optional_param(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Whether `name` is a valid bare step name: non-empty, `[A-Za-z0-9_.-]` only.
pub fn is_valid_step_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// One declared unit of pipeline work.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StepDecl {
    name: String,
    optional: bool,
}

impl StepDecl {
    /// Parse a declaration such as `clone_repo` or `~update_golang`.
    ///
    /// Malformed declarations are configuration errors.
    pub fn parse(raw: &str) -> Result<Self, StepError> {
        let (optional, bare) = match raw.strip_prefix(OPTIONAL_SIGIL) {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        if !is_valid_step_name(bare) {
            return Err(StepError::Configuration(format!(
                "malformed step declaration '{}'",
                raw
            )));
        }
        Ok(StepDecl {
            name: bare.to_string(),
            optional,
        })
    }

    /// The bare name, sigil stripped. Registry lookups use this.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }
}

impl fmt::Display for StepDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.optional {
            write!(f, "{}{}", OPTIONAL_SIGIL, self.name)
        } else {
            f.write_str(&self.name)
        }
    }
}

/// Per-run decision for one declaration. Computed, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disposition {
    Run,
    Skip,
    ForceRun,
}

impl Disposition {
    pub fn executes(self) -> bool {
        matches!(self, Disposition::Run | Disposition::ForceRun)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Run => "run",
            Disposition::Skip => "skip",
            Disposition::ForceRun => "force-run",
        }
    }
}

/// Non-fatal result of dispatching one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The handler ran and succeeded.
    Completed,
    /// No handler is registered under that name; the run continues.
    NotFound,
}
