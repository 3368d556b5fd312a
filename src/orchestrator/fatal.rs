//! Fatal error trap: the single top-level boundary around a pipeline run.
//!
//! Any failure the Driver propagates (and any handler panic) lands here. The
//! trap logs one ERROR summary naming the operation, its source location, the
//! last-known step and the log file, then hands back the status the process
//! must exit with. `main` performs the exit; nothing else in the crate does.

use std::any::Any;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};

use crate::error::FatalFailure;
use crate::log_collector::Logger;
use crate::orchestrator::state::{RunSummary, StepTracker};

static PANIC_HOOK: Once = Once::new();

thread_local! {
    static LAST_PANIC_LOCATION: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Install the process-wide panic hook. Later calls are no-ops.
fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let location = info
                .location()
                .map(|loc| format!("{}:{}", loc.file(), loc.line()));
            LAST_PANIC_LOCATION.with(|slot| *slot.borrow_mut() = location);
            previous(info);
        }));
    });
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// How a supervised run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrapOutcome {
    /// Every declaration was visited.
    Completed(RunSummary),
    /// A fatal failure stopped the run.
    Halted { status: i32 },
}

impl TrapOutcome {
    /// Process exit status for this outcome.
    pub fn exit_status(&self) -> i32 {
        match self {
            TrapOutcome::Completed(_) => 0,
            TrapOutcome::Halted { status } => *status,
        }
    }
}

/// Process-wide guard around the pipeline.
#[derive(Clone)]
pub struct FatalErrorTrap {
    logger: Logger,
    tracker: StepTracker,
    triggered: Arc<AtomicBool>,
}

impl FatalErrorTrap {
    /// Install the trap. Must happen before the Driver starts.
    pub fn install(logger: Logger) -> Self {
        install_panic_hook();
        FatalErrorTrap {
            logger,
            tracker: StepTracker::new(),
            triggered: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Run the pipeline behind the trap.
    pub fn supervise<F>(&self, run: F) -> TrapOutcome
    where
        F: FnOnce(&StepTracker) -> Result<RunSummary, FatalFailure>,
    {
        let tracker = self.tracker.clone();
        match panic::catch_unwind(AssertUnwindSafe(|| run(&tracker))) {
            Ok(Ok(summary)) => TrapOutcome::Completed(summary),
            Ok(Err(failure)) => TrapOutcome::Halted {
                status: self.trip(&failure),
            },
            Err(payload) => {
                let failure = FatalFailure::Panic {
                    message: panic_message(payload.as_ref()),
                    location: LAST_PANIC_LOCATION.with(|slot| slot.borrow_mut().take()),
                };
                TrapOutcome::Halted {
                    status: self.trip(&failure),
                }
            }
        }
    }

    /// Log the ERROR summary for `failure` and return its exit status.
    pub fn trip(&self, failure: &FatalFailure) -> i32 {
        let status = failure.status();
        if self.triggered.swap(true, Ordering::SeqCst) {
            return status;
        }

        let step = match failure {
            FatalFailure::Step { step, .. } => Some(step.clone()),
            _ => None,
        }
        .or_else(|| self.tracker.last_step())
        .unwrap_or_else(|| "<none>".to_string());

        let detail = failure
            .detail()
            .map(|detail| format!(" ({})", detail))
            .unwrap_or_default();
        self.logger.error(format!(
            "fatal: operation '{}' failed with status {} at {} during step '{}'{}; see {}",
            failure.operation(),
            status,
            failure.location(),
            step,
            detail,
            self.logger.path().display()
        ));
        status
    }

    /// Terminate the process with the outcome's status.
    pub fn terminate(outcome: &TrapOutcome) -> ! {
        std::process::exit(outcome.exit_status())
    }
}
