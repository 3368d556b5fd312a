//! Unified error type hierarchy for wrtprep
//!
//! Provides structured error handling with StepError (what a step handler
//! reports), ConfigError (CLI and manifest problems) and FatalFailure (what
//! the pipeline driver hands to the fatal error trap).

use std::io;
use std::panic::Location;
use thiserror::Error;

/// Exit status used for file-edit I/O failures.
pub const IO_FAILURE_STATUS: i32 = 1;

/// Exit status used for configuration errors (malformed declarations, bad manifests).
pub const CONFIG_FAILURE_STATUS: i32 = 2;

/// Exit status used when a step handler panics.
pub const PANIC_STATUS: i32 = 101;

/// Failure reported by a step handler.
///
/// Every variant is fatal to the run. A missing handler is not an error,
/// see [`crate::models::StepOutcome::NotFound`].
#[derive(Error, Debug)]
pub enum StepError {
    /// An external operation (command, version control) reported failure.
    #[error("operation '{operation}' failed with status {status}{}", detail_suffix(.detail))]
    External {
        operation: String,
        status: i32,
        /// What the operation itself reported, when more than a status is known.
        detail: Option<String>,
        location: &'static Location<'static>,
    },

    /// A declaration or runtime configuration is malformed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A file edit inside the source tree failed.
    #[error("operation '{operation}' failed: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
        location: &'static Location<'static>,
    },
}

impl StepError {
    /// Build an external-operation failure located at the caller.
    #[track_caller]
    pub fn external(operation: impl Into<String>, status: i32) -> Self {
        StepError::External {
            operation: operation.into(),
            status,
            detail: None,
            location: Location::caller(),
        }
    }

    /// Attach the operation's own failure message.
    pub fn with_detail(mut self, message: impl Into<String>) -> Self {
        if let StepError::External { detail, .. } = &mut self {
            *detail = Some(message.into());
        }
        self
    }

    /// Wrap a file-edit I/O failure located at the caller.
    #[track_caller]
    pub fn io(operation: impl Into<String>, source: io::Error) -> Self {
        StepError::Io {
            operation: operation.into(),
            source,
            location: Location::caller(),
        }
    }

    /// The exit status the process terminates with when this error is fatal.
    pub fn status(&self) -> i32 {
        match self {
            StepError::External { status, .. } => *status,
            StepError::Io { .. } => IO_FAILURE_STATUS,
            StepError::Configuration(_) => CONFIG_FAILURE_STATUS,
        }
    }

    /// The failing operation's identity.
    pub fn operation(&self) -> &str {
        match self {
            StepError::External { operation, .. } | StepError::Io { operation, .. } => {
                operation.as_str()
            }
            StepError::Configuration(_) => "configuration",
        }
    }

    /// The underlying failure message, without the operation identity.
    pub fn detail(&self) -> Option<String> {
        match self {
            StepError::External { detail, .. } => detail.clone(),
            StepError::Io { source, .. } => Some(source.to_string()),
            StepError::Configuration(message) => Some(message.clone()),
        }
    }

    /// Where the failing operation was started, when known.
    pub fn location(&self) -> Option<&'static Location<'static>> {
        match self {
            StepError::External { location, .. } | StepError::Io { location, .. } => {
                Some(*location)
            }
            StepError::Configuration(_) => None,
        }
    }
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail
        .as_deref()
        .map(|detail| format!(": {}", detail))
        .unwrap_or_default()
}

impl From<ConfigError> for StepError {
    fn from(e: ConfigError) -> Self {
        StepError::Configuration(e.to_string())
    }
}

/// Configuration file parsing and validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid TOML in pipeline manifest: {0}")]
    InvalidToml(#[from] toml::de::Error),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("IO error during config operations: {0}")]
    IoError(#[from] io::Error),
}

/// Failure propagated from the pipeline driver to the fatal error trap.
#[derive(Error, Debug)]
pub enum FatalFailure {
    /// A dispatched, registered step failed.
    #[error("step '{step}' failed: {error}")]
    Step {
        step: String,
        #[source]
        error: StepError,
    },

    /// The pipeline itself is misconfigured (malformed declaration).
    #[error("pipeline misconfigured: {0}")]
    Misconfigured(String),

    /// A step handler panicked.
    #[error("step panicked: {message}")]
    Panic {
        message: String,
        location: Option<String>,
    },
}

impl FatalFailure {
    /// Pass-through exit status for this failure.
    pub fn status(&self) -> i32 {
        match self {
            FatalFailure::Step { error, .. } => error.status(),
            FatalFailure::Misconfigured(_) => CONFIG_FAILURE_STATUS,
            FatalFailure::Panic { .. } => PANIC_STATUS,
        }
    }

    /// Identity of the failing operation.
    pub fn operation(&self) -> String {
        match self {
            FatalFailure::Step { error, .. } => error.operation().to_string(),
            FatalFailure::Misconfigured(_) => "pipeline declaration".to_string(),
            FatalFailure::Panic { .. } => "step handler".to_string(),
        }
    }

    /// What went wrong underneath the failing operation, when known.
    pub fn detail(&self) -> Option<String> {
        match self {
            FatalFailure::Step { error, .. } => error.detail(),
            FatalFailure::Misconfigured(message) => Some(message.clone()),
            FatalFailure::Panic { message, .. } => Some(message.clone()),
        }
    }

    /// Originating source location, formatted as `file:line`.
    pub fn location(&self) -> String {
        let location = match self {
            FatalFailure::Step { error, .. } => error
                .location()
                .map(|loc| format!("{}:{}", loc.file(), loc.line())),
            FatalFailure::Misconfigured(_) => None,
            FatalFailure::Panic { location, .. } => location.clone(),
        };
        location.unwrap_or_else(|| "unknown".to_string())
    }
}
