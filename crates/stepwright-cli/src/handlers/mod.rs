//! Command handlers
//!
//! One module per subcommand. Each exposes an `execute_*` entry point plus the
//! pure helpers it is built from, so the helpers can be tested without a
//! process.

pub mod dry_run;
pub mod run;
pub mod steps;

use crate::commands::ProjectArgs;
use crate::error::CliResult;
use stepwright::{config, Orchestrator, PluginSelector, ResolvedConfig, TestSelection};

pub use dry_run::{execute_dry_run, render_listing};
pub use run::{execute_rerun, execute_run, failed_record_path};
pub use steps::{execute_steps, render_steps};

/// Read the config named by `--config`, then apply `--profile` and `--override`
pub fn resolve_project(project: &ProjectArgs) -> CliResult<ResolvedConfig> {
    Ok(config::resolve(
        &project.config,
        project.profile.as_deref(),
        project.override_json.as_deref(),
    )?)
}

/// Orchestrator for a resolved project with the selected plugins and tests
#[must_use]
pub fn orchestrator(
    resolved: &ResolvedConfig,
    project: &ProjectArgs,
    selection: TestSelection,
) -> Orchestrator {
    Orchestrator::new(resolved.config.clone())
        .with_profile(project.profile.clone())
        .with_plugins(PluginSelector::parse(project.plugins.as_deref()))
        .with_selection(selection)
}
