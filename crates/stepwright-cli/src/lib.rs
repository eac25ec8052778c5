//! Stepwright CLI Library
//!
//! Command-line front end for the Stepwright runner. The bundled binary uses
//! the built-in steps; a project with its own steps builds a binary around
//! [`run_with`]:
//!
//! ```no_run
//! use std::process::ExitCode;
//! use stepwright::StepRegistry;
//!
//! fn main() -> ExitCode {
//!     let mut steps = StepRegistry::with_builtins();
//!     steps
//!         .given("the shop is open", |world, _| {
//!             world.data.set("Shop.open", true)?;
//!             Ok(())
//!         })
//!         .expect("valid step pattern");
//!     stepwright_cli::run_with(steps, Vec::new())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod config;
mod error;
pub mod handlers;
mod output;

pub use commands::{
    Cli, ColorArg, Commands, DryRunArgs, ListDetail, ListFormat, ProjectArgs, RerunArgs, RunArgs,
    StepsArgs,
};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{phase_message, CliError, CliResult};
pub use output::ProgressReporter;

use clap::Parser;
use std::process::ExitCode;
use stepwright::{LifecycleHook, StepRegistry};
use tracing_subscriber::EnvFilter;

/// Parse the process arguments, run the command and map the result to an
/// exit code
pub fn run_with(steps: StepRegistry, hooks: Vec<Box<dyn LifecycleHook>>) -> ExitCode {
    let cli = Cli::parse();
    let config = build_config(&cli);
    init_tracing(config.verbosity);

    match dispatch(&config, cli.command, &steps, hooks) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// CLI configuration from the global flags
#[must_use]
pub fn build_config(cli: &Cli) -> CliConfig {
    CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(cli.color.into())
}

fn init_tracing(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.log_filter()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Run one command on a fresh current-thread runtime
pub fn dispatch(
    config: &CliConfig,
    command: Commands,
    steps: &StepRegistry,
    hooks: Vec<Box<dyn LifecycleHook>>,
) -> CliResult<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    match command {
        Commands::Run(args) => {
            runtime.block_on(handlers::execute_run(config, &args, steps, hooks))
        }
        Commands::RunRerun(args) => {
            runtime.block_on(handlers::execute_rerun(config, &args, steps, hooks))
        }
        Commands::DryRun(args) => {
            runtime.block_on(handlers::execute_dry_run(config, &args, steps))
        }
        Commands::GherkinSteps(args) => handlers::execute_steps(&args, steps),
    }
}
