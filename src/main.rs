//! wrtprep CLI: prepare a firmware source tree through the step pipeline.

use anyhow::Context;
use clap::Parser;

use wrtprep::cli::Cli;
use wrtprep::error::IO_FAILURE_STATUS;
use wrtprep::log_collector::{get_global_logs_path, run_log_path};
use wrtprep::{
    ExecutionContext, FatalErrorTrap, FatalFailure, Logger, OverrideSet, PipelineDriver,
    ProgressReporter, RunPlan, RunSummary, VERSION,
};

fn open_logger(cli: &Cli, ctx: &ExecutionContext) -> anyhow::Result<Logger> {
    let log_dir = get_global_logs_path(cli.log_dir.as_deref())
        .map_err(anyhow::Error::msg)
        .context("cannot determine log directory")?;
    let path = run_log_path(&log_dir, &ctx.run_id());
    Logger::open(path.clone()).with_context(|| format!("cannot open log file {}", path.display()))
}

fn print_plan(plan: &RunPlan, ctx: &ExecutionContext) {
    let overrides = OverrideSet::new(&ctx.disabled, &ctx.enabled);
    for (decl, disposition) in plan.pipeline.plan(&overrides) {
        let handler = if plan.registry.contains(decl.name()) {
            ""
        } else {
            "  (no handler)"
        };
        println!("{:<28} {}{}", decl.to_string(), disposition.as_str(), handler);
    }
}

fn main() {
    let cli = Cli::parse();
    let ctx = cli.execution_context();

    let logger = match open_logger(&cli, &ctx) {
        Ok(logger) => logger,
        Err(e) => {
            eprintln!("error: {:#}", e);
            std::process::exit(IO_FAILURE_STATUS);
        }
    };
    if !logger.install_as_global() {
        logger.warning("another global logger is installed; library records bypass the log file");
    }
    logger.info(format!(
        "wrtprep {} preparing {} ({}) in {}; log file {}",
        VERSION,
        ctx.repo_url,
        ctx.branch,
        ctx.build_dir.display(),
        logger.path().display()
    ));

    let trap = FatalErrorTrap::install(logger.clone());
    let outcome = trap.supervise(|tracker| {
        let plan = RunPlan::load(cli.pipeline.as_deref())
            .map_err(|e| FatalFailure::Misconfigured(e.to_string()))?;

        if cli.plan {
            print_plan(&plan, &ctx);
            return Ok(RunSummary::default());
        }

        let mut driver = PipelineDriver::new(&plan.registry, &logger, ProgressReporter::stderr());
        driver.run(&plan.pipeline, &ctx, tracker)
    });

    FatalErrorTrap::terminate(&outcome)
}
