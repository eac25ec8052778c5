//! Feature discovery and test selection.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::gherkin::{read_feature, Suite};
use crate::report::FailedTest;
use crate::result::{StepwrightError, StepwrightResult};

/// What to load and which tests to keep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestSelection {
    /// Glob relative to the test root; overrides `gherkin.features`
    pub pattern: Option<String>,
    /// Case-insensitive substring matched against suite titles
    pub grep: Option<String>,
    /// Previously failed tests to re-run, in this order
    pub rerun: Option<Vec<FailedTest>>,
}

impl TestSelection {
    /// Select every test matched by the configured glob
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Override the feature glob
    #[must_use]
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Narrow suites by title
    #[must_use]
    pub fn with_grep(mut self, grep: impl Into<String>) -> Self {
        self.grep = Some(grep.into());
        self
    }

    /// Narrow to previously failed tests
    #[must_use]
    pub fn with_rerun(mut self, failed: Vec<FailedTest>) -> Self {
        self.rerun = Some(failed);
        self
    }
}

/// Expand `pattern` under `root`, sorted.
///
/// Relative patterns are anchored at `root`; a leading `./` is ignored.
///
/// # Errors
///
/// [`StepwrightError::Discovery`] when the pattern is not a valid glob.
pub fn discover_files(root: &Path, pattern: &str) -> StepwrightResult<Vec<PathBuf>> {
    let relative = pattern.trim_start_matches("./");
    let full = if Path::new(relative).is_absolute() {
        relative.to_string()
    } else {
        format!(
            "{}/{}",
            glob::Pattern::escape(&root.to_string_lossy()),
            relative
        )
    };
    let entries = glob::glob(&full)
        .map_err(|e| StepwrightError::discovery(format!("invalid pattern '{pattern}': {e}")))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    debug!(pattern = %full, count = files.len(), "discovered feature files");
    Ok(files)
}

/// Read every feature file matched by `pattern` under `root`.
///
/// # Errors
///
/// The first unreadable or malformed file aborts discovery.
pub fn load_suites(root: &Path, pattern: &str) -> StepwrightResult<Vec<Suite>> {
    discover_files(root, pattern)?
        .iter()
        .map(|file| read_feature(file))
        .collect()
}

/// Keep suites whose title contains `grep`, ignoring case
#[must_use]
pub fn apply_grep(suites: Vec<Suite>, grep: &str) -> Vec<Suite> {
    let needle = grep.to_lowercase();
    suites
        .into_iter()
        .filter(|suite| suite.title.to_lowercase().contains(&needle))
        .collect()
}

/// Path of `file` relative to `root`, as stored in run results
#[must_use]
pub fn relative_file(root: &Path, file: &Path) -> String {
    file.strip_prefix(root)
        .unwrap_or(file)
        .display()
        .to_string()
}

/// Keep only the recorded tests, in recorded order.
///
/// Located entries match on title, file and line; title-only entries take
/// the first test with that title not already picked. Each test is picked
/// at most once. Consecutive recorded tests from the same suite share one
/// suite entry. Recorded tests that no longer exist are dropped.
#[must_use]
pub fn apply_rerun(root: &Path, suites: &[Suite], failed: &[FailedTest]) -> Vec<Suite> {
    let files: Vec<String> = suites
        .iter()
        .map(|suite| relative_file(root, &suite.file))
        .collect();
    let mut taken: HashSet<(usize, usize)> = HashSet::new();

    let mut selected: Vec<(usize, Suite)> = Vec::new();
    for entry in failed {
        let found = suites.iter().enumerate().find_map(|(suite_idx, suite)| {
            suite
                .tests
                .iter()
                .enumerate()
                .find(|&(test_idx, test)| {
                    !taken.contains(&(suite_idx, test_idx))
                        && suite.full_title(test) == entry.title
                        && (!entry.is_located()
                            || (test.line == entry.line && files[suite_idx] == entry.file))
                })
                .map(|(test_idx, _)| (suite_idx, test_idx))
        });
        let Some((suite_idx, test_idx)) = found else {
            debug!(
                test = %entry.title,
                file = %entry.file,
                line = entry.line,
                "recorded failure no longer exists"
            );
            continue;
        };
        taken.insert((suite_idx, test_idx));
        let test = suites[suite_idx].tests[test_idx].clone();
        match selected.last_mut() {
            Some((last_idx, suite)) if *last_idx == suite_idx => suite.tests.push(test),
            _ => {
                let mut suite = suites[suite_idx].clone();
                suite.tests = vec![test];
                selected.push((suite_idx, suite));
            }
        }
    }
    selected.into_iter().map(|(_, suite)| suite).collect()
}

/// Load and narrow suites according to `selection`.
///
/// # Errors
///
/// See [`load_suites`].
pub fn select(
    root: &Path,
    default_pattern: &str,
    selection: &TestSelection,
) -> StepwrightResult<Vec<Suite>> {
    let pattern = selection.pattern.as_deref().unwrap_or(default_pattern);
    let mut suites = load_suites(root, pattern)?;
    if let Some(grep) = &selection.grep {
        suites = apply_grep(suites, grep);
    }
    if let Some(failed) = &selection.rerun {
        suites = apply_rerun(root, &suites, failed);
    }
    Ok(suites)
}
