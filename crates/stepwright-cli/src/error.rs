//! Error types for the CLI

use stepwright::StepwrightError;
use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid argument
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message
        message: String,
    },

    /// Tests ran and some failed
    #[error("{failed} of {total} tests failed")]
    TestsFailed {
        /// Failed test count
        failed: usize,
        /// Total test count
        total: usize,
    },

    /// No step definitions registered
    #[error("No step definitions found")]
    NoSteps,

    /// A lifecycle phase failed; the message is prefixed with the phase
    #[error("{}", phase_message(.0))]
    Lifecycle(#[from] StepwrightError),

    /// Several lifecycle errors, e.g. a bootstrap error and a teardown error
    #[error("{}", .0.iter().map(phase_message).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<StepwrightError>),

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON output error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// `[phase] message`, or the bare message for errors without a phase
#[must_use]
pub fn phase_message(err: &StepwrightError) -> String {
    err.phase()
        .map_or_else(|| err.to_string(), |phase| format!("[{phase}] {err}"))
}

impl CliError {
    /// Create an invalid argument error
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Collapse fatal lifecycle errors into one CLI error.
    ///
    /// Test-level failures are not fatal; they are reported through
    /// [`CliError::TestsFailed`] instead.
    #[must_use]
    pub fn from_lifecycle(errors: Vec<StepwrightError>) -> Option<Self> {
        let mut errors: Vec<_> = errors.into_iter().filter(StepwrightError::is_fatal).collect();
        match errors.len() {
            0 => None,
            1 => errors.pop().map(Self::Lifecycle),
            _ => Some(Self::Multiple(errors)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_argument_error() {
        let err = CliError::invalid_argument("bad arg");
        assert!(err.to_string().contains("Invalid argument"));
        assert!(err.to_string().contains("bad arg"));
    }

    #[test]
    fn test_lifecycle_error_carries_phase() {
        let err = CliError::from(StepwrightError::bootstrap("db down"));
        assert_eq!(err.to_string(), "[bootstrap] Bootstrap failed: db down");
    }

    #[test]
    fn test_tests_failed_message() {
        let err = CliError::TestsFailed { failed: 2, total: 5 };
        assert_eq!(err.to_string(), "2 of 5 tests failed");
    }

    #[test]
    fn test_from_lifecycle_collapses() {
        assert!(CliError::from_lifecycle(Vec::new()).is_none());
        let single = CliError::from_lifecycle(vec![StepwrightError::init("x")]).unwrap();
        assert!(matches!(single, CliError::Lifecycle(_)));
        let both = CliError::from_lifecycle(vec![
            StepwrightError::bootstrap("a"),
            StepwrightError::teardown("b"),
        ])
        .unwrap();
        let text = both.to_string();
        assert!(text.contains("[bootstrap]"));
        assert!(text.contains("[teardown]"));
    }

    #[test]
    fn test_from_lifecycle_ignores_test_failures() {
        assert!(CliError::from_lifecycle(vec![StepwrightError::assertion("x")]).is_none());
        let mixed = CliError::from_lifecycle(vec![
            StepwrightError::TestFailure {
                test: "A: b".to_string(),
                message: "nope".to_string(),
            },
            StepwrightError::teardown("b"),
        ])
        .unwrap();
        assert_eq!(mixed.to_string(), "[teardown] Teardown failed: b");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: CliError = io_err.into();
        assert!(err.to_string().contains("I/O error"));
    }
}
