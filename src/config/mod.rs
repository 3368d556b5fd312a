//! Run configuration: pipeline order and handler registry assembly.
//!
//! The built-in catalog is always registered. An optional manifest adds
//! command steps and may replace the default declaration order.

pub mod loader;

use std::path::Path;

use crate::error::{ConfigError, StepError};
use crate::orchestrator::{Pipeline, StepRegistry};
use crate::steps::{self, CommandStep};

pub use loader::{load_manifest, parse_manifest, CommandSpec, Manifest};

/// Everything the Driver needs besides the execution context.
pub struct RunPlan {
    pub pipeline: Pipeline,
    pub registry: StepRegistry,
}

fn invalid(e: StepError) -> ConfigError {
    ConfigError::ValidationFailed(e.to_string())
}

impl RunPlan {
    /// Built-in pipeline and catalog only.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_manifest(&Manifest::default())
    }

    pub fn from_manifest(manifest: &Manifest) -> Result<Self, ConfigError> {
        let pipeline = match &manifest.pipeline.steps {
            Some(declared) => Pipeline::parse(declared).map_err(invalid)?,
            None => steps::default_pipeline().map_err(invalid)?,
        };

        let mut registry = steps::builtin_registry().map_err(invalid)?;
        for (name, spec) in &manifest.commands {
            registry
                .register(name, CommandStep::new(spec.run.clone(), spec.cwd.clone()))
                .map_err(invalid)?;
        }

        Ok(RunPlan { pipeline, registry })
    }

    /// Load from the manifest at `path`, or the built-ins when none is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_manifest(&load_manifest(path)?),
            None => Self::builtin(),
        }
    }
}
