//! wrtprep: ImmortalWrt/OpenWrt source tree preparation pipeline
//!
//! Prepares a firmware source tree for building by running an ordered,
//! overridable sequence of named steps (clone, feed setup, kernel pinning,
//! configuration) with dual-sink logging and exit-status propagation.
//!
//! The system is organized into functional modules:
//! - **error**: Step, configuration, and fatal failure types
//! - **models**: Execution context, step declarations, dispositions
//! - **log_collector**: Terminal + log file logger (also the `log` facade backend)
//! - **orchestrator**: Override resolution, registry, progress, driver, fatal trap
//! - **steps**: Built-in step catalog and manifest command steps
//! - **source**: Version-control access to the source tree
//! - **system**: External command execution
//! - **config**: Pipeline manifest loading and run assembly
//! - **cli**: Command-line arguments

// Core foundational modules
pub mod error;
pub mod models;

// Robust, dual-sink logging system
pub mod log_collector;

// Step pipeline orchestration
pub mod orchestrator;

// Built-in steps and their collaborators
pub mod source;
pub mod steps;
pub mod system;

// Pipeline manifests and command-line surface
pub mod cli;
pub mod config;

// Re-export the log crate for macro usage
pub use log;

// ============================================================================
// PUBLIC RE-EXPORTS FOR CONVENIENCE
// ============================================================================

pub use error::{ConfigError, FatalFailure, StepError};

pub use models::{Disposition, ExecutionContext, StepDecl, StepOutcome};

pub use log_collector::{LogLevel, Logger};

pub use orchestrator::{
    FatalErrorTrap, OverrideSet, Pipeline, PipelineDriver, ProgressReporter, RunSummary,
    StepHandler, StepRegistry, StepTracker, TrapOutcome,
};

pub use config::RunPlan;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_constant() {
        assert_eq!(VERSION, "0.1.0");
    }

    #[test]
    fn test_error_reexport() {
        assert_eq!(StepError::external("make", 3).status(), 3);
        assert_eq!(FatalFailure::Misconfigured("x".into()).status(), 2);
    }

    #[test]
    fn test_models_reexport() {
        assert!(Disposition::ForceRun.executes());
        assert!(StepDecl::parse("~update_golang").unwrap().is_optional());
    }
}
