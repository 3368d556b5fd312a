//! Step registry and dispatcher.
//!
//! Maps bare step names to handler capabilities. Built once at startup and
//! read-only during a run. An unknown name is the one non-fatal failure in
//! the pipeline: dispatch logs a WARNING and reports `StepOutcome::NotFound`.

use std::collections::BTreeMap;

use crate::error::StepError;
use crate::log_collector::Logger;
use crate::models::{is_valid_step_name, ExecutionContext, StepOutcome};

/// A unit of step work. Receives the read-only run context and the logger.
pub trait StepHandler {
    fn run(&self, ctx: &ExecutionContext, logger: &Logger) -> Result<(), StepError>;
}

impl<F> StepHandler for F
where
    F: Fn(&ExecutionContext, &Logger) -> Result<(), StepError>,
{
    fn run(&self, ctx: &ExecutionContext, logger: &Logger) -> Result<(), StepError> {
        self(ctx, logger)
    }
}

/// Name → handler table.
#[derive(Default)]
pub struct StepRegistry {
    handlers: BTreeMap<String, Box<dyn StepHandler>>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under an exact bare name.
    ///
    /// Fails on malformed names and on duplicates.
    pub fn register<H>(&mut self, name: &str, handler: H) -> Result<(), StepError>
    where
        H: StepHandler + 'static,
    {
        if !is_valid_step_name(name) {
            return Err(StepError::Configuration(format!(
                "cannot register handler under malformed name '{}'",
                name
            )));
        }
        if self.handlers.contains_key(name) {
            return Err(StepError::Configuration(format!(
                "handler '{}' registered twice",
                name
            )));
        }
        self.handlers.insert(name.to_string(), Box::new(handler));
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    /// Invoke the handler registered under `name`.
    ///
    /// A missing handler is logged as a WARNING and is not an error.
    pub fn dispatch(
        &self,
        name: &str,
        ctx: &ExecutionContext,
        logger: &Logger,
    ) -> Result<StepOutcome, StepError> {
        match self.handlers.get(name) {
            Some(handler) => {
                handler.run(ctx, logger)?;
                Ok(StepOutcome::Completed)
            }
            None => {
                logger.warning(format!(
                    "no handler registered for step '{}'; continuing",
                    name
                ));
                Ok(StepOutcome::NotFound)
            }
        }
    }
}
