//! Stepwright CLI: run Gherkin suites with the built-in steps
//!
//! ## Usage
//!
//! ```bash
//! stepwright run                          # Run every feature under ./features
//! stepwright run --grep cart              # Only suites whose title mentions "cart"
//! stepwright run-rerun                    # Re-run what failed last time
//! stepwright dry-run --steps              # List suites, tests and steps
//! stepwright gherkin:steps                # Print step definitions
//! ```

use std::process::ExitCode;
use stepwright::StepRegistry;

fn main() -> ExitCode {
    stepwright_cli::run_with(StepRegistry::with_builtins(), Vec::new())
}
