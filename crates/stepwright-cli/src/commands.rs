//! CLI command definitions using clap

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Stepwright: run Gherkin feature files against registered steps
#[derive(Parser, Debug)]
#[command(name = "stepwright")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run tests
    Run(RunArgs),

    /// Re-run the tests that failed in the last run
    #[command(name = "run-rerun")]
    RunRerun(RerunArgs),

    /// List suites and tests without running them
    #[command(name = "dry-run")]
    DryRun(DryRunArgs),

    /// Print registered step definitions
    #[command(name = "gherkin:steps")]
    GherkinSteps(StepsArgs),
}

/// Options shared by every command that loads a project
#[derive(Args, Debug, Clone)]
pub struct ProjectArgs {
    /// Config file, or the directory holding stepwright.{json,yaml,yml}
    #[arg(short, long, default_value = ".")]
    pub config: PathBuf,

    /// JSON object merged over the config file
    #[arg(long = "override", value_name = "JSON")]
    pub override_json: Option<String>,

    /// Config profile to overlay (profiles.<name>)
    #[arg(short, long, env = "STEPWRIGHT_PROFILE")]
    pub profile: Option<String>,

    /// Plugins to enable: `all` or a comma-separated list of names
    #[arg(long, value_name = "all|a,b")]
    pub plugins: Option<String>,
}

/// Arguments for the run command
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Feature glob, relative to the test root
    pub test_pattern: Option<String>,

    /// Project options
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Only run suites whose title contains this text (case-insensitive)
    #[arg(short, long, env = "STEPWRIGHT_GREP")]
    pub grep: Option<String>,
}

/// Arguments for the run-rerun command
#[derive(Args, Debug, Clone)]
pub struct RerunArgs {
    /// Feature glob, relative to the test root
    pub test_pattern: Option<String>,

    /// Project options
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Failed-test record to read (default: <output>/failed-tests.json)
    #[arg(long, value_name = "PATH")]
    pub failed: Option<PathBuf>,

    /// Only re-run suites whose title contains this text (case-insensitive)
    #[arg(short, long, env = "STEPWRIGHT_GREP")]
    pub grep: Option<String>,
}

/// Arguments for the dry-run command
#[derive(Args, Debug, Clone)]
pub struct DryRunArgs {
    /// Feature glob, relative to the test root
    pub test_pattern: Option<String>,

    /// Project options
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Only list suites whose title contains this text (case-insensitive)
    #[arg(short, long, env = "STEPWRIGHT_GREP")]
    pub grep: Option<String>,

    /// List each test's steps
    #[arg(long)]
    pub steps: bool,

    /// List steps and the definition each one matches
    #[arg(long)]
    pub debug: bool,

    /// Output format
    #[arg(long, default_value = "text")]
    pub format: ListFormat,
}

impl DryRunArgs {
    /// How much detail to print
    #[must_use]
    pub const fn detail(&self) -> ListDetail {
        if self.debug {
            ListDetail::Definitions
        } else if self.steps {
            ListDetail::Steps
        } else {
            ListDetail::Tests
        }
    }
}

/// Arguments for the gherkin:steps command
#[derive(Args, Debug, Clone)]
pub struct StepsArgs {
    /// Project directory (same as --config)
    pub path: Option<PathBuf>,

    /// Config file, or the directory holding it
    #[arg(short, long, default_value = ".")]
    pub config: PathBuf,
}

impl StepsArgs {
    /// Positional path wins over `--config`
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| self.config.clone())
    }
}

/// Dry-run listing detail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListDetail {
    /// Suites and tests
    Tests,
    /// Plus each test's steps
    Steps,
    /// Plus the matching definition of each step
    Definitions,
}

/// Dry-run output format
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListFormat {
    /// Human-readable tree
    #[default]
    Text,
    /// JSON document
    Json,
}

/// Color argument
#[derive(ValueEnum, Debug, Clone, Copy, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}
