//! Manifest-declared shell command steps.

use std::path::PathBuf;

use crate::error::StepError;
use crate::log_collector::Logger;
use crate::models::ExecutionContext;
use crate::orchestrator::StepHandler;
use crate::system::run_shell;

/// Runs one shell snippet with `sh -c`, relative to the build directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandStep {
    script: String,
    cwd: Option<PathBuf>,
}

impl CommandStep {
    pub fn new(script: impl Into<String>, cwd: Option<PathBuf>) -> Self {
        CommandStep {
            script: script.into(),
            cwd,
        }
    }
}

impl StepHandler for CommandStep {
    fn run(&self, ctx: &ExecutionContext, logger: &Logger) -> Result<(), StepError> {
        let cwd = match &self.cwd {
            Some(relative) => ctx.build_dir.join(relative),
            None => ctx.build_dir.clone(),
        };
        if !cwd.is_dir() {
            return Err(StepError::io(
                format!("enter {}", cwd.display()),
                std::io::Error::new(std::io::ErrorKind::NotFound, "no such directory"),
            ));
        }
        run_shell(&self.script, &cwd, logger)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::steps::test_support::{context_for, quiet_logger};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_command_runs_in_build_dir() {
        let dir = TempDir::new().unwrap();
        let logger = quiet_logger(&dir);
        let step = CommandStep::new("echo ok > marker", None);
        step.run(&context_for(dir.path()), &logger).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("marker")).unwrap(), "ok\n");
    }

    #[test]
    fn test_command_honors_relative_cwd() {
        let dir = TempDir::new().unwrap();
        let logger = quiet_logger(&dir);
        fs::create_dir_all(dir.path().join("package")).unwrap();
        let step = CommandStep::new("pwd > where", Some(PathBuf::from("package")));
        step.run(&context_for(dir.path()), &logger).unwrap();
        assert!(dir.path().join("package/where").exists());
    }

    #[test]
    fn test_command_failure_keeps_exit_status() {
        let dir = TempDir::new().unwrap();
        let logger = quiet_logger(&dir);
        let err = CommandStep::new("exit 7", None)
            .run(&context_for(dir.path()), &logger)
            .unwrap_err();
        assert_eq!(err.status(), 7);
        assert_eq!(err.operation(), "sh -c exit 7");
    }

    #[test]
    fn test_missing_cwd_is_io_failure() {
        let dir = TempDir::new().unwrap();
        let logger = quiet_logger(&dir);
        let err = CommandStep::new("true", Some(PathBuf::from("absent")))
            .run(&context_for(dir.path()), &logger)
            .unwrap_err();
        assert_eq!(err.status(), crate::error::IO_FAILURE_STATUS);
    }
}
