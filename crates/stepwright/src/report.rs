//! Run results, the failed-test record and dry-run listings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::gherkin::Suite;
use crate::result::StepwrightResult;
use crate::steps::StepRegistry;

/// File name of the failed-test record inside the output directory
pub const FAILED_RECORD_FILE: &str = "failed-tests.json";

/// Outcome of one test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    /// `"<suite>: <test>"`
    pub name: String,
    /// Whether every step passed
    pub passed: bool,
    /// Failure message, prefixed with the failing step
    pub error: Option<String>,
    /// Wall time
    pub duration: Duration,
    /// Steps that ran (including the failing one)
    pub steps_run: usize,
    /// Steps in the test
    pub steps_total: usize,
    /// Feature file, relative to the test root
    #[serde(default)]
    pub file: String,
    /// Line the test starts on; 0 when unknown
    #[serde(default)]
    pub line: usize,
}

impl TestResult {
    /// Passing result
    #[must_use]
    pub fn pass(name: impl Into<String>, steps: usize, duration: Duration) -> Self {
        Self {
            name: name.into(),
            passed: true,
            error: None,
            duration,
            steps_run: steps,
            steps_total: steps,
            file: String::new(),
            line: 0,
        }
    }

    /// Failing result
    #[must_use]
    pub fn fail(
        name: impl Into<String>,
        error: impl Into<String>,
        steps_run: usize,
        steps_total: usize,
        duration: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            passed: false,
            error: Some(error.into()),
            duration,
            steps_run,
            steps_total,
            file: String::new(),
            line: 0,
        }
    }

    /// Attach the source location of the test
    #[must_use]
    pub fn at(mut self, file: impl Into<String>, line: usize) -> Self {
        self.file = file.into();
        self.line = line;
        self
    }
}

/// Aggregated test results
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestResults {
    /// Individual test results in execution order
    pub results: Vec<TestResult>,
    /// Total duration
    pub duration: Duration,
}

impl TestResults {
    /// Create new empty results
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a test result
    pub fn add(&mut self, result: TestResult) {
        self.results.push(result);
    }

    /// Get number of passed tests
    #[must_use]
    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.passed).count()
    }

    /// Get number of failed tests
    #[must_use]
    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| !r.passed).count()
    }

    /// Get total number of tests
    #[must_use]
    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// Check if all tests passed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }

    /// Get failed tests
    #[must_use]
    pub fn failures(&self) -> Vec<&TestResult> {
        self.results.iter().filter(|r| !r.passed).collect()
    }
}

/// One failed test, identified by title and source location.
///
/// Titles alone are ambiguous: two scenarios may share a name. An entry
/// with `line == 0` matches by title only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedTest {
    /// `"<suite>: <test>"`
    pub title: String,
    /// Feature file, relative to the test root
    #[serde(default)]
    pub file: String,
    /// Line the test starts on
    #[serde(default)]
    pub line: usize,
}

impl FailedTest {
    /// Entry located at `file:line`
    #[must_use]
    pub fn new(title: impl Into<String>, file: impl Into<String>, line: usize) -> Self {
        Self {
            title: title.into(),
            file: file.into(),
            line,
        }
    }

    /// Entry that matches any test with this title
    #[must_use]
    pub fn titled(title: impl Into<String>) -> Self {
        Self::new(title, String::new(), 0)
    }

    /// Whether the entry carries a source location
    #[must_use]
    pub const fn is_located(&self) -> bool {
        self.line > 0
    }
}

/// The tests that failed in the last run.
///
/// `run` writes it after every execution (an empty list on a green run);
/// `run-rerun` reads it back to narrow selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedRecord {
    /// When the record was written
    pub recorded_at: DateTime<Utc>,
    /// Failed tests in execution order
    pub failed: Vec<FailedTest>,
}

impl FailedRecord {
    /// Record the failures of `results`
    #[must_use]
    pub fn from_results(results: &TestResults) -> Self {
        Self {
            recorded_at: Utc::now(),
            failed: results
                .failures()
                .iter()
                .map(|r| FailedTest::new(r.name.clone(), r.file.clone(), r.line))
                .collect(),
        }
    }

    /// Read a record.
    ///
    /// # Errors
    ///
    /// I/O and JSON errors.
    pub fn load(path: &Path) -> StepwrightResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Write the record, creating parent directories.
    ///
    /// # Errors
    ///
    /// I/O and JSON errors.
    pub fn save(&self, path: &Path) -> StepwrightResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// A step as listed by a dry run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepListing {
    /// `keyword text`
    pub text: String,
    /// Matching definition pattern, when definitions were checked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
}

/// A test as listed by a dry run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestListing {
    /// Test title
    pub title: String,
    /// Steps, in execution order
    pub steps: Vec<StepListing>,
}

/// A suite as listed by a dry run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuiteListing {
    /// Suite title
    pub title: String,
    /// Source file
    pub file: String,
    /// Tests
    pub tests: Vec<TestListing>,
}

/// What a dry run would execute
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DryRunReport {
    /// Suites in execution order
    pub suites: Vec<SuiteListing>,
}

impl DryRunReport {
    /// List `suites`; with `steps`, record which definition each step would hit
    #[must_use]
    pub fn from_suites(suites: &[Suite], steps: Option<&StepRegistry>) -> Self {
        let suites = suites
            .iter()
            .map(|suite| SuiteListing {
                title: suite.title.clone(),
                file: suite.file.display().to_string(),
                tests: suite
                    .tests
                    .iter()
                    .map(|test| TestListing {
                        title: test.title.clone(),
                        steps: test
                            .steps
                            .iter()
                            .map(|step| StepListing {
                                text: step.display(),
                                definition: steps.and_then(|registry| {
                                    registry
                                        .find(&step.text)
                                        .map(|m| m.definition.pattern().to_string())
                                }),
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect();
        Self { suites }
    }

    /// Number of suites
    #[must_use]
    pub fn suite_count(&self) -> usize {
        self.suites.len()
    }

    /// Number of tests across all suites
    #[must_use]
    pub fn test_count(&self) -> usize {
        self.suites.iter().map(|s| s.tests.len()).sum()
    }

    /// Steps with no matching definition, as `"<test>: <step>"`
    #[must_use]
    pub fn undefined_steps(&self) -> Vec<String> {
        self.suites
            .iter()
            .flat_map(|suite| {
                suite.tests.iter().flat_map(move |test| {
                    test.steps
                        .iter()
                        .filter(|step| step.definition.is_none())
                        .map(move |step| format!("{}: {}: {}", suite.title, test.title, step.text))
                })
            })
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::gherkin::parse_feature;
    use tempfile::TempDir;

    mod results_tests {
        use super::*;

        #[test]
        fn test_counts() {
            let mut results = TestResults::new();
            results.add(TestResult::pass("A: one", 2, Duration::from_millis(5)));
            results.add(TestResult::fail("A: two", "boom", 1, 3, Duration::ZERO));
            assert_eq!(results.total(), 2);
            assert_eq!(results.passed(), 1);
            assert_eq!(results.failed(), 1);
            assert!(!results.all_passed());
            assert_eq!(results.failures()[0].name, "A: two");
        }

        #[test]
        fn test_empty_results_pass() {
            assert!(TestResults::new().all_passed());
        }
    }

    mod record_tests {
        use super::*;

        #[test]
        fn test_record_lists_failures_in_order() {
            let mut results = TestResults::new();
            results.add(TestResult::fail("B: x", "e", 1, 1, Duration::ZERO).at("b.feature", 2));
            results.add(TestResult::pass("A: y", 1, Duration::ZERO).at("a.feature", 2));
            results.add(TestResult::fail("A: z", "e", 1, 1, Duration::ZERO).at("a.feature", 5));
            let record = FailedRecord::from_results(&results);
            assert_eq!(
                record.failed,
                vec![
                    FailedTest::new("B: x", "b.feature", 2),
                    FailedTest::new("A: z", "a.feature", 5),
                ]
            );
        }

        #[test]
        fn test_same_titles_stay_distinct() {
            let mut results = TestResults::new();
            results.add(TestResult::fail("A: dup", "e", 1, 1, Duration::ZERO).at("a.feature", 2));
            results.add(TestResult::fail("A: dup", "e", 1, 1, Duration::ZERO).at("a.feature", 6));
            let record = FailedRecord::from_results(&results);
            assert_eq!(record.failed[0].line, 2);
            assert_eq!(record.failed[1].line, 6);
        }

        #[test]
        fn test_title_only_entry_loads() {
            let record: FailedRecord = serde_json::from_str(
                r#"{"recordedAt":"2024-01-01T00:00:00Z","failed":[{"title":"Login: locked"}]}"#,
            )
            .unwrap();
            assert_eq!(record.failed, vec![FailedTest::titled("Login: locked")]);
            assert!(!record.failed[0].is_located());
        }

        #[test]
        fn test_save_and_load() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("output").join(FAILED_RECORD_FILE);
            let record = FailedRecord {
                recorded_at: Utc::now(),
                failed: vec![FailedTest::new("Login: locked", "features/login.feature", 7)],
            };
            record.save(&path).unwrap();
            let text = std::fs::read_to_string(&path).unwrap();
            assert!(text.contains("recordedAt"));
            assert_eq!(FailedRecord::load(&path).unwrap(), record);
        }

        #[test]
        fn test_load_missing_is_io_error() {
            let dir = TempDir::new().unwrap();
            let err = FailedRecord::load(&dir.path().join("nope.json")).unwrap_err();
            assert!(matches!(err, crate::StepwrightError::Io(_)));
        }
    }

    mod dry_run_tests {
        use super::*;

        fn suites() -> Vec<Suite> {
            vec![parse_feature(
                "Feature: Data\nScenario: store\n  Given I store \"1\" as \"a\"\n  Then nobody knows\nScenario: empty\n",
                Path::new("data.feature"),
            )
            .unwrap()]
        }

        #[test]
        fn test_counts_without_registry() {
            let report = DryRunReport::from_suites(&suites(), None);
            assert_eq!(report.suite_count(), 1);
            assert_eq!(report.test_count(), 2);
            assert_eq!(report.suites[0].tests[0].steps[0].definition, None);
        }

        #[test]
        fn test_marks_definitions() {
            let registry = StepRegistry::with_builtins();
            let report = DryRunReport::from_suites(&suites(), Some(&registry));
            let steps = &report.suites[0].tests[0].steps;
            assert_eq!(steps[0].text, "Given I store \"1\" as \"a\"");
            assert!(steps[0].definition.is_some());
            assert_eq!(report.undefined_steps(), vec!["Data: store: Then nobody knows"]);
        }
    }
}
