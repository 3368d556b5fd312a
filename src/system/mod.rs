//! System module: external command execution with exit-status pass-through

use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use crate::error::StepError;
use crate::log_collector::Logger;

/// Status reported when a command cannot be started at all (shell convention).
pub const SPAWN_FAILURE_STATUS: i32 = 127;

/// Exit code of a finished process; signals map to `128 + signal`.
pub fn exit_code(status: &ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

/// Run `program args...` in `cwd`, logging its output line by line.
///
/// A non-zero exit becomes `StepError::External` carrying the command's own
/// status and the caller's source location.
#[track_caller]
pub fn run_command(
    program: &str,
    args: &[&str],
    cwd: &Path,
    logger: &Logger,
) -> Result<(), StepError> {
    let display = std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ");

    logger.info(format!("$ {} (in {})", display, cwd.display()));

    // Relative program paths (`./scripts/feeds`) resolve against `cwd`
    let executable = if program.contains('/') && Path::new(program).is_relative() {
        let base = if cwd.is_absolute() {
            cwd.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|dir| dir.join(cwd))
                .unwrap_or_else(|_| cwd.to_path_buf())
        };
        base.join(program)
    } else {
        PathBuf::from(program)
    };

    // SAFE: arguments are passed separately, never shell-interpolated
    let output = match Command::new(&executable).args(args).current_dir(cwd).output() {
        Ok(output) => output,
        Err(e) => {
            return Err(StepError::external(display, SPAWN_FAILURE_STATUS)
                .with_detail(format!("failed to start: {}", e)));
        }
    };

    // Capture and log stdout / stderr
    for line in String::from_utf8_lossy(&output.stdout).lines() {
        if !line.trim().is_empty() {
            logger.info(format!("[{}] {}", program, line));
        }
    }
    for line in String::from_utf8_lossy(&output.stderr).lines() {
        if !line.trim().is_empty() {
            logger.info(format!("[{} stderr] {}", program, line));
        }
    }

    if output.status.success() {
        Ok(())
    } else {
        Err(StepError::external(display, exit_code(&output.status)))
    }
}

/// Run a shell snippet with `sh -c` in `cwd`.
#[track_caller]
pub fn run_shell(script: &str, cwd: &Path, logger: &Logger) -> Result<(), StepError> {
    run_command("sh", &["-c", script], cwd, logger)
}
