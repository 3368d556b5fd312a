//! End-to-end pipeline scenarios through the public Driver and fatal trap.

use std::cell::RefCell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tempfile::{tempdir, TempDir};
use wrtprep::{
    ExecutionContext, FatalErrorTrap, Logger, Pipeline, PipelineDriver, ProgressReporter,
    StepError, StepRegistry, TrapOutcome,
};

type Calls = Rc<RefCell<Vec<String>>>;

fn context(build_dir: &Path, disabled: &str, enabled: &str) -> ExecutionContext {
    ExecutionContext {
        repo_url: "https://github.com/immortalwrt/immortalwrt.git".to_string(),
        branch: "openwrt-24.10".to_string(),
        build_dir: build_dir.to_path_buf(),
        commit: None,
        config_file: PathBuf::from("./configs/default.config"),
        disabled: disabled.to_string(),
        enabled: enabled.to_string(),
        kernel_vermagic: None,
        kernel_patchver: None,
    }
}

fn record(registry: &mut StepRegistry, name: &str, calls: &Calls) {
    let calls = Rc::clone(calls);
    let owned = name.to_string();
    registry
        .register(name, move |_: &ExecutionContext, _: &Logger| -> Result<(), StepError> {
            calls.borrow_mut().push(owned.clone());
            Ok(())
        })
        .expect("Failed to register step");
}

struct Harness {
    dir: TempDir,
    logger: Logger,
}

impl Harness {
    fn new() -> Self {
        let dir = tempdir().expect("Failed to create temp dir");
        let logger = Logger::with_terminal(dir.path().join("logs/run.log"), Box::new(io::sink()))
            .expect("Failed to open run log");
        Harness { dir, logger }
    }

    fn run(&self, pipeline: &Pipeline, registry: &StepRegistry, disabled: &str, enabled: &str) -> TrapOutcome {
        let ctx = context(self.dir.path(), disabled, enabled);
        let trap = FatalErrorTrap::install(self.logger.clone());
        trap.supervise(|tracker| {
            let mut driver =
                PipelineDriver::new(registry, &self.logger, ProgressReporter::new(Box::new(io::sink())));
            driver.run(pipeline, &ctx, tracker)
        })
    }

    fn log(&self) -> String {
        fs::read_to_string(self.logger.path()).expect("Failed to read run log")
    }
}

fn abc_registry(calls: &Calls) -> StepRegistry {
    let mut registry = StepRegistry::new();
    for name in ["A", "B", "C"] {
        record(&mut registry, name, calls);
    }
    registry
}

#[test]
fn test_optional_step_is_skipped_by_default() {
    let harness = Harness::new();
    let calls = Calls::default();
    let pipeline = Pipeline::parse(["A", "~B", "C"]).expect("Failed to parse pipeline");

    let outcome = harness.run(&pipeline, &abc_registry(&calls), "", "");
    assert_eq!(outcome.exit_status(), 0);
    assert_eq!(*calls.borrow(), vec!["A", "C"]);
}

#[test]
fn test_optional_step_runs_when_enabled() {
    let harness = Harness::new();
    let calls = Calls::default();
    let pipeline = Pipeline::parse(["A", "~B", "C"]).expect("Failed to parse pipeline");

    let outcome = harness.run(&pipeline, &abc_registry(&calls), "", "B");
    assert_eq!(outcome.exit_status(), 0);
    assert_eq!(*calls.borrow(), vec!["A", "B", "C"]);
    assert!(harness.log().contains("executing ~B (force-run)"));
}

#[test]
fn test_disabled_step_is_skipped() {
    let harness = Harness::new();
    let calls = Calls::default();
    let pipeline = Pipeline::parse(["A", "C"]).expect("Failed to parse pipeline");

    let outcome = harness.run(&pipeline, &abc_registry(&calls), "A", "");
    assert_eq!(outcome.exit_status(), 0);
    assert_eq!(*calls.borrow(), vec!["C"]);
    assert!(harness.log().contains("[1/2] skipped A"));
}

#[test]
fn test_unknown_step_warns_and_continues() {
    let harness = Harness::new();
    let calls = Calls::default();
    let pipeline = Pipeline::parse(["A", "X"]).expect("Failed to parse pipeline");

    let outcome = harness.run(&pipeline, &abc_registry(&calls), "", "");
    match outcome {
        TrapOutcome::Completed(summary) => {
            assert_eq!(summary.executed, vec!["A"]);
            assert_eq!(summary.missing, vec!["X"]);
        }
        other => panic!("run halted: {:?}", other),
    }
    assert_eq!(*calls.borrow(), vec!["A"]);

    let log = harness.log();
    assert!(log.contains("[WARNING] no handler registered for step 'X'; continuing"));
    assert!(!log.contains("[ERROR]"));
}

#[test]
fn test_failing_step_stops_run_with_its_status() {
    let harness = Harness::new();
    let calls = Calls::default();
    let mut registry = StepRegistry::new();
    registry
        .register("A", |_: &ExecutionContext, _: &Logger| -> Result<(), StepError> {
            Err(StepError::external("./scripts/feeds update -a", 7))
        })
        .expect("Failed to register step");
    record(&mut registry, "C", &calls);
    let pipeline = Pipeline::parse(["A", "C"]).expect("Failed to parse pipeline");

    let outcome = harness.run(&pipeline, &registry, "", "");
    assert_eq!(outcome, TrapOutcome::Halted { status: 7 });
    assert!(calls.borrow().is_empty());

    let log = harness.log();
    let errors: Vec<_> = log.lines().filter(|line| line.contains("[ERROR]")).collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("operation './scripts/feeds update -a' failed with status 7"));
    assert!(errors[0].contains("pipeline_scenarios.rs:"));
    assert!(errors[0].contains("during step 'A'"));
    assert!(errors[0].contains(&harness.logger.path().display().to_string()));
}

#[test]
fn test_io_failure_in_handler_exits_one() {
    let harness = Harness::new();
    let mut registry = StepRegistry::new();
    registry
        .register("apply_config", |ctx: &ExecutionContext, _: &Logger| -> Result<(), StepError> {
            fs::read_to_string(ctx.build_dir.join("absent.config"))
                .map_err(|e| StepError::io("read absent.config", e))?;
            Ok(())
        })
        .expect("Failed to register step");
    let pipeline = Pipeline::parse(["apply_config"]).expect("Failed to parse pipeline");

    let outcome = harness.run(&pipeline, &registry, "", "");
    assert_eq!(outcome.exit_status(), 1);
}
