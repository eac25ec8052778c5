//! Output formatting and progress reporting

use console::{style, Style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use stepwright::{RunObserver, Step, Suite, TestResult};

/// Progress reporter for test execution
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    progress_bar: Option<ProgressBar>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
    /// Print every step as it finishes
    pub show_steps: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            progress_bar: None,
            use_color,
            quiet,
            show_steps: false,
        }
    }

    /// Print each step as it finishes
    #[must_use]
    pub const fn with_steps(mut self, show_steps: bool) -> Self {
        self.show_steps = show_steps;
        self
    }

    /// Start a progress bar for multiple tests
    pub fn start_progress(&mut self, total: u64, message: &str) {
        if self.quiet || total == 0 {
            return;
        }

        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb.set_message(message.to_string());
        self.progress_bar = Some(pb);
    }

    /// Increment progress
    pub fn increment(&self, delta: u64) {
        if let Some(ref pb) = self.progress_bar {
            pb.inc(delta);
        }
    }

    /// Update progress message
    pub fn set_message(&self, message: &str) {
        if let Some(ref pb) = self.progress_bar {
            pb.set_message(message.to_string());
        }
    }

    /// Finish progress bar
    pub fn finish(&mut self) {
        if let Some(pb) = self.progress_bar.take() {
            pb.finish_and_clear();
        }
    }

    fn line(&self, text: &str) {
        match &self.progress_bar {
            Some(pb) => pb.suspend(|| {
                let _ = self.term.write_line(text);
            }),
            None => {
                let _ = self.term.write_line(text);
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("✓").green().bold().to_string()
        } else {
            "PASS".to_string()
        };

        self.line(&format!("{prefix} {message}"));
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // Always print failures, even in quiet mode
        let prefix = if self.use_color {
            style("✗").red().bold().to_string()
        } else {
            "FAIL".to_string()
        };

        self.line(&format!("{prefix} {message}"));
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("⚠").yellow().bold().to_string()
        } else {
            "WARN".to_string()
        };

        self.line(&format!("{prefix} {message}"));
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("ℹ").blue().bold().to_string()
        } else {
            "INFO".to_string()
        };

        self.line(&format!("{prefix} {message}"));
    }

    /// Print a section header
    pub fn header(&self, title: &str) {
        if self.quiet {
            return;
        }

        let styled = if self.use_color {
            style(title).bold().underlined().to_string()
        } else {
            format!("=== {title} ===")
        };

        self.line("");
        self.line(&styled);
    }

    /// Print test summary
    pub fn summary(&self, passed: usize, failed: usize, duration: Duration) {
        if self.quiet && failed == 0 {
            return;
        }

        let _ = self.term.write_line("");

        let total = passed + failed;
        let duration_secs = duration.as_secs_f64();

        if self.use_color {
            let passed_style = Style::new().green().bold();
            let failed_style = Style::new().red().bold();

            let status = if failed > 0 {
                failed_style.apply_to("FAILED")
            } else {
                passed_style.apply_to("PASSED")
            };

            let _ = self.term.write_line(&format!(
                "{} {} tests in {:.2}s ({} passed, {} failed)",
                status,
                total,
                duration_secs,
                passed_style.apply_to(passed),
                if failed > 0 {
                    failed_style.apply_to(failed).to_string()
                } else {
                    failed.to_string()
                },
            ));
        } else {
            let status = if failed > 0 { "FAILED" } else { "PASSED" };
            let _ = self.term.write_line(&format!(
                "{status} {total} tests in {duration_secs:.2}s ({passed} passed, {failed} failed)"
            ));
        }
    }
}

impl RunObserver for ProgressReporter {
    fn run_started(&mut self, total: usize) {
        self.start_progress(total as u64, "Running tests");
    }

    fn suite_started(&mut self, suite: &Suite) {
        self.header(&suite.title);
    }

    fn test_started(&mut self, name: &str) {
        self.set_message(name);
    }

    fn step_finished(&mut self, step: &Step, passed: bool) {
        if !self.show_steps || self.quiet {
            return;
        }
        let mark = match (passed, self.use_color) {
            (true, true) => style("·").green().to_string(),
            (false, true) => style("✗").red().to_string(),
            (true, false) => "ok".to_string(),
            (false, false) => "!!".to_string(),
        };
        self.line(&format!("    {mark} {}", step.display()));
    }

    fn test_finished(&mut self, result: &TestResult) {
        self.increment(1);
        if result.passed {
            self.success(&result.name);
        } else {
            self.failure(&result.name);
            if let Some(error) = &result.error {
                self.line(&format!("    {error}"));
            }
        }
    }
}
