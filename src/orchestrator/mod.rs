//! Step pipeline orchestration: ordered declarations -> dispositions -> dispatch.
//!
//! A run visits every declaration in order. Each one is resolved to
//! Run / Skip / ForceRun by the override set; executing steps are dispatched
//! through the registry. The first fatal step failure stops the run and is
//! returned to the caller (the fatal error trap) untouched.

pub mod fatal;
pub mod overrides;
pub mod progress;
pub mod registry;
pub mod state;

pub use fatal::{FatalErrorTrap, TrapOutcome};
pub use overrides::{OverridePattern, OverrideSet};
pub use progress::{ProgressReporter, ProgressState};
pub use registry::{StepHandler, StepRegistry};
pub use state::{RunSummary, StepTracker};

use crate::error::{FatalFailure, StepError};
use crate::log_collector::Logger;
use crate::models::{Disposition, ExecutionContext, StepDecl, StepOutcome};

/// Ordered, fixed sequence of step declarations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pipeline {
    steps: Vec<StepDecl>,
}

impl Pipeline {
    pub fn new(steps: Vec<StepDecl>) -> Self {
        Pipeline { steps }
    }

    /// Parse raw declarations (`name` or `~name`).
    ///
    /// Any malformed entry rejects the whole pipeline.
    pub fn parse<I, S>(raw: I) -> Result<Self, StepError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let steps = raw
            .into_iter()
            .map(|decl| StepDecl::parse(decl.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Pipeline { steps })
    }

    pub fn steps(&self) -> &[StepDecl] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Non-optional bare names with no registered handler, first occurrence order.
    pub fn unregistered(&self, registry: &StepRegistry) -> Vec<&str> {
        let mut missing: Vec<&str> = Vec::new();
        for decl in self.steps.iter().filter(|d| !d.is_optional()) {
            if !registry.contains(decl.name()) && !missing.contains(&decl.name()) {
                missing.push(decl.name());
            }
        }
        missing
    }

    /// Disposition of every declaration under `overrides`, in order.
    pub fn plan(&self, overrides: &OverrideSet) -> Vec<(&StepDecl, Disposition)> {
        self.steps
            .iter()
            .map(|decl| (decl, overrides.resolve(decl)))
            .collect()
    }
}

/// Drives one pipeline run.
pub struct PipelineDriver<'a> {
    registry: &'a StepRegistry,
    logger: &'a Logger,
    progress: ProgressReporter,
}

impl<'a> PipelineDriver<'a> {
    pub fn new(registry: &'a StepRegistry, logger: &'a Logger, progress: ProgressReporter) -> Self {
        PipelineDriver {
            registry,
            logger,
            progress,
        }
    }

    /// Visit every declaration in order, dispatching those that resolve to
    /// Run or ForceRun.
    ///
    /// Returns the first fatal failure without running anything after it.
    pub fn run(
        &mut self,
        pipeline: &Pipeline,
        ctx: &ExecutionContext,
        tracker: &StepTracker,
    ) -> Result<RunSummary, FatalFailure> {
        let overrides = OverrideSet::new(&ctx.disabled, &ctx.enabled);
        let total = pipeline.len();
        let mut summary = RunSummary::default();

        let unregistered = pipeline.unregistered(self.registry);
        if !unregistered.is_empty() {
            self.logger.warning(format!(
                "pipeline declares steps with no registered handler: {}",
                unregistered.join(", ")
            ));
        }

        self.logger.info(format!(
            "starting pipeline: {} steps (disabled: '{}', enabled: '{}')",
            total,
            overrides.disabled().as_str(),
            overrides.enabled().as_str()
        ));

        for (index, decl) in pipeline.steps().iter().enumerate() {
            self.progress.report(index + 1, total, decl.name());

            let disposition = overrides.resolve(decl);
            if !disposition.executes() {
                self.logger.info(format!(
                    "[{}/{}] skipped {}",
                    index + 1,
                    total,
                    decl
                ));
                summary.skipped.push(decl.name().to_string());
                continue;
            }

            self.logger.info(format!(
                "[{}/{}] executing {} ({})",
                index + 1,
                total,
                decl,
                disposition.as_str()
            ));
            tracker.enter(decl.name());

            match self.registry.dispatch(decl.name(), ctx, self.logger) {
                Ok(StepOutcome::Completed) => {
                    summary.executed.push(decl.name().to_string());
                }
                Ok(StepOutcome::NotFound) => {
                    summary.missing.push(decl.name().to_string());
                }
                Err(error) => {
                    return Err(FatalFailure::Step {
                        step: decl.name().to_string(),
                        error,
                    });
                }
            }
        }

        self.logger.success(format!(
            "pipeline complete: {} executed, {} skipped, {} missing",
            summary.executed.len(),
            summary.skipped.len(),
            summary.missing.len()
        ));
        Ok(summary)
    }
}
