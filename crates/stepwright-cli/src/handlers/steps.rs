//! `gherkin:steps` command handler

use crate::commands::StepsArgs;
use crate::error::{CliError, CliResult};
use std::fmt::Write as _;
use stepwright::{config, StepRegistry};

/// Execute the gherkin:steps command
pub fn execute_steps(args: &StepsArgs, steps: &StepRegistry) -> CliResult<()> {
    let (root, file) = config::locate_config(&args.config_path())?;
    tracing::debug!(
        root = %root.display(),
        config = ?file,
        "listing step definitions"
    );
    if steps.is_empty() {
        return Err(CliError::NoSteps);
    }
    print!("{}", render_steps(steps));
    Ok(())
}

/// One line per definition: keyword, then the pattern as written
#[must_use]
pub fn render_steps(steps: &StepRegistry) -> String {
    let mut out = String::new();
    for definition in steps.definitions() {
        let _ = writeln!(
            out,
            "{:<5} {}",
            definition.kind().to_string(),
            definition.pattern()
        );
    }
    out
}
