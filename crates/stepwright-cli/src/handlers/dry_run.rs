//! `dry-run` command handler

use super::{orchestrator, resolve_project};
use crate::commands::{DryRunArgs, ListDetail, ListFormat};
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::ProgressReporter;
use std::fmt::Write as _;
use stepwright::{DryRunReport, Outcome, StepRegistry, TestSelection};

/// Execute the dry-run command
pub async fn execute_dry_run(
    config: &CliConfig,
    args: &DryRunArgs,
    steps: &StepRegistry,
) -> CliResult<()> {
    let resolved = resolve_project(&args.project)?;
    let mut selection = TestSelection::all();
    if let Some(pattern) = &args.test_pattern {
        selection = selection.with_pattern(pattern.clone());
    }
    if let Some(grep) = &args.grep {
        selection = selection.with_grep(grep.clone());
    }

    let detail = args.detail();
    let registry = (detail == ListDetail::Definitions).then_some(steps);
    let Outcome {
        value,
        error,
        teardown_error,
        ..
    } = orchestrator(&resolved, &args.project, selection)
        .dry_run(&resolved.test_root, registry)
        .await;

    if let Some(err) = CliError::from_lifecycle(error.into_iter().chain(teardown_error).collect()) {
        return Err(err);
    }
    let Some(report) = value else {
        return Ok(());
    };

    match args.format {
        ListFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        ListFormat::Text => print!("{}", render_listing(&report, detail)),
    }

    let undefined = report.undefined_steps();
    if registry.is_some() && !undefined.is_empty() {
        let reporter = ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet());
        reporter.warning(&format!("{} step(s) have no matching definition", undefined.len()));
    }
    Ok(())
}

/// Plain-text tree of suites, tests and (optionally) steps
#[must_use]
pub fn render_listing(report: &DryRunReport, detail: ListDetail) -> String {
    let mut out = String::new();
    for suite in &report.suites {
        let _ = writeln!(out, "{}", suite.title);
        for test in &suite.tests {
            let _ = writeln!(out, "  {}", test.title);
            if detail == ListDetail::Tests {
                continue;
            }
            for step in &test.steps {
                match (&step.definition, detail) {
                    (Some(pattern), ListDetail::Definitions) => {
                        let _ = writeln!(out, "    {}  -> {pattern}", step.text);
                    }
                    (None, ListDetail::Definitions) => {
                        let _ = writeln!(out, "    {}  (undefined)", step.text);
                    }
                    _ => {
                        let _ = writeln!(out, "    {}", step.text);
                    }
                }
            }
        }
    }
    let _ = writeln!(
        out,
        "\nTotal: {} suites, {} tests",
        report.suite_count(),
        report.test_count()
    );
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use stepwright::report::{StepListing, SuiteListing, TestListing};

    fn report() -> DryRunReport {
        DryRunReport {
            suites: vec![SuiteListing {
                title: "Cart".to_string(),
                file: "features/cart.feature".to_string(),
                tests: vec![TestListing {
                    title: "add item".to_string(),
                    steps: vec![
                        StepListing {
                            text: "Given I store \"1\" as \"Cart.count\"".to_string(),
                            definition: Some("I store \"(.*)\" as \"(.*)\"".to_string()),
                        },
                        StepListing {
                            text: "Then the badge shows 1".to_string(),
                            definition: None,
                        },
                    ],
                }],
            }],
        }
    }

    mod render_tests {
        use super::*;

        #[test]
        fn test_tests_only() {
            let text = render_listing(&report(), ListDetail::Tests);
            assert!(text.starts_with("Cart\n  add item\n"));
            assert!(!text.contains("Given"));
            assert!(text.contains("Total: 1 suites, 1 tests"));
        }

        #[test]
        fn test_steps_listed() {
            let text = render_listing(&report(), ListDetail::Steps);
            assert!(text.contains("    Given I store \"1\" as \"Cart.count\"\n"));
            assert!(!text.contains("(undefined)"));
        }

        #[test]
        fn test_definitions_marked() {
            let text = render_listing(&report(), ListDetail::Definitions);
            assert!(text.contains("-> I store"));
            assert!(text.contains("Then the badge shows 1  (undefined)"));
        }
    }

    mod execute_tests {
        use super::*;
        use crate::commands::ProjectArgs;
        use crate::config::{ColorChoice, Verbosity};
        use std::fs;
        use tempfile::TempDir;

        fn args(dir: &TempDir) -> DryRunArgs {
            DryRunArgs {
                test_pattern: None,
                project: ProjectArgs {
                    config: dir.path().to_path_buf(),
                    override_json: None,
                    profile: None,
                    plugins: None,
                },
                grep: None,
                steps: false,
                debug: true,
                format: ListFormat::Json,
            }
        }

        fn quiet() -> CliConfig {
            CliConfig::new()
                .with_verbosity(Verbosity::Quiet)
                .with_color(ColorChoice::Never)
        }

        #[tokio::test]
        async fn test_dry_run_never_runs_hooks() {
            let dir = TempDir::new().unwrap();
            fs::create_dir_all(dir.path().join("features")).unwrap();
            fs::write(
                dir.path().join("features/a.feature"),
                "Feature: A\n  Scenario: one\n    Given I store \"1\" as \"A.b\"\n",
            )
            .unwrap();
            fs::write(
                dir.path().join("stepwright.json"),
                r#"{"bootstrap": "touch booted"}"#,
            )
            .unwrap();

            execute_dry_run(&quiet(), &args(&dir), &StepRegistry::with_builtins())
                .await
                .unwrap();
            assert!(!dir.path().join("booted").exists());
        }

        #[tokio::test]
        async fn test_missing_config_path_is_init_error() {
            let dir = TempDir::new().unwrap();
            let mut args = args(&dir);
            args.project.config = dir.path().join("nope");
            let err = execute_dry_run(&quiet(), &args, &StepRegistry::with_builtins())
                .await
                .unwrap_err();
            assert!(err.to_string().starts_with("[init]"));
        }
    }
}
