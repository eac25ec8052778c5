//! `run` and `run-rerun` command handlers

use super::{orchestrator, resolve_project};
use crate::commands::{ProjectArgs, RerunArgs, RunArgs};
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::ProgressReporter;
use std::path::{Path, PathBuf};
use stepwright::{
    FailedRecord, LifecycleHook, Outcome, ResolvedConfig, StepRegistry, TestSelection,
    FAILED_RECORD_FILE,
};
use tracing::{debug, info};

/// Where the failed-test record of a project lives
#[must_use]
pub fn failed_record_path(resolved: &ResolvedConfig) -> PathBuf {
    resolved
        .test_root
        .join(resolved.config.output_dir())
        .join(FAILED_RECORD_FILE)
}

/// Execute the run command
pub async fn execute_run(
    config: &CliConfig,
    args: &RunArgs,
    steps: &StepRegistry,
    hooks: Vec<Box<dyn LifecycleHook>>,
) -> CliResult<()> {
    let resolved = resolve_project(&args.project)?;
    let mut selection = TestSelection::all();
    if let Some(pattern) = &args.test_pattern {
        selection = selection.with_pattern(pattern.clone());
    }
    if let Some(grep) = &args.grep {
        selection = selection.with_grep(grep.clone());
    }
    execute(config, &resolved, &args.project, selection, steps, hooks).await
}

/// Execute the run-rerun command
pub async fn execute_rerun(
    config: &CliConfig,
    args: &RerunArgs,
    steps: &StepRegistry,
    hooks: Vec<Box<dyn LifecycleHook>>,
) -> CliResult<()> {
    let resolved = resolve_project(&args.project)?;
    let record_path = args
        .failed
        .clone()
        .unwrap_or_else(|| failed_record_path(&resolved));
    let record = load_record(&record_path)?;

    let reporter = reporter(config);
    if record.failed.is_empty() {
        reporter.success("No failed tests recorded, nothing to re-run");
        return Ok(());
    }
    reporter.info(&format!(
        "Re-running {} failed test(s) recorded at {}",
        record.failed.len(),
        record.recorded_at.to_rfc3339()
    ));

    let mut selection = TestSelection::all().with_rerun(record.failed);
    if let Some(pattern) = &args.test_pattern {
        selection = selection.with_pattern(pattern.clone());
    }
    if let Some(grep) = &args.grep {
        selection = selection.with_grep(grep.clone());
    }
    execute(config, &resolved, &args.project, selection, steps, hooks).await
}

fn load_record(path: &Path) -> CliResult<FailedRecord> {
    if !path.is_file() {
        return Err(CliError::invalid_argument(format!(
            "no failed-test record at '{}'; run the suite first",
            path.display()
        )));
    }
    debug!(record = %path.display(), "reading failed-test record");
    Ok(FailedRecord::load(path)?)
}

fn reporter(config: &CliConfig) -> ProgressReporter {
    ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet())
        .with_steps(config.verbosity.is_verbose())
}

async fn execute(
    config: &CliConfig,
    resolved: &ResolvedConfig,
    project: &ProjectArgs,
    selection: TestSelection,
    steps: &StepRegistry,
    hooks: Vec<Box<dyn LifecycleHook>>,
) -> CliResult<()> {
    let mut orchestrator = hooks
        .into_iter()
        .fold(orchestrator(resolved, project, selection), |o, hook| {
            o.with_hook(hook)
        });

    let mut reporter = reporter(config);
    let Outcome {
        value,
        error,
        teardown_error,
        ..
    } = orchestrator
        .run(&resolved.test_root, steps, &mut reporter)
        .await;
    reporter.finish();

    let failures = value.map(|results| {
        reporter.summary(results.passed(), results.failed(), results.duration);
        (results.failed(), results.total(), FailedRecord::from_results(&results))
    });

    let mut errors: Vec<_> = error.into_iter().collect();
    if let Some((_, _, record)) = &failures {
        let path = failed_record_path(resolved);
        match record.save(&path) {
            Ok(()) => info!(
                record = %path.display(),
                failed = record.failed.len(),
                "failed-test record written"
            ),
            Err(e) => errors.push(e),
        }
    }
    errors.extend(teardown_error);

    if let Some(err) = CliError::from_lifecycle(errors) {
        return Err(err);
    }
    match failures {
        Some((failed, total, _)) if failed > 0 => Err(CliError::TestsFailed { failed, total }),
        _ => Ok(()),
    }
}
