//! Result and error types for Stepwright.

use std::fmt;
use thiserror::Error;

use crate::data_store::DataStoreError;

/// Result type for Stepwright operations
pub type StepwrightResult<T> = Result<T, StepwrightError>;

/// Lifecycle phase an error originated in.
///
/// Used to tell "setup broke" apart from "a test failed" in user output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Loading and merging configuration
    Config,
    /// Binding the test root and activating plugins
    Init,
    /// Running bootstrap hooks
    Bootstrap,
    /// Discovering feature files
    Discovery,
    /// Running tests
    Execution,
    /// Running teardown hooks
    Teardown,
}

impl Phase {
    /// Short lowercase name used in messages
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Init => "init",
            Self::Bootstrap => "bootstrap",
            Self::Discovery => "discovery",
            Self::Execution => "execution",
            Self::Teardown => "teardown",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur in Stepwright
#[derive(Debug, Error)]
pub enum StepwrightError {
    /// Configuration text (file or override) is not valid structured data
    #[error("Config parse error: {message}")]
    ConfigParse {
        /// Error message
        message: String,
    },

    /// Test root unresolvable, invalid config, or unknown plugin
    #[error("Initialization failed: {message}")]
    Init {
        /// Error message
        message: String,
    },

    /// A bootstrap hook failed
    #[error("Bootstrap failed: {message}")]
    Bootstrap {
        /// Error message
        message: String,
    },

    /// Feature files could not be discovered or read
    #[error("Test discovery failed: {message}")]
    Discovery {
        /// Error message
        message: String,
    },

    /// An individual test failed
    #[error("Test '{test}' failed: {message}")]
    TestFailure {
        /// Full test title
        test: String,
        /// Error message
        message: String,
    },

    /// A teardown hook failed
    #[error("Teardown failed: {message}")]
    Teardown {
        /// Error message
        message: String,
    },

    /// Lifecycle operation called in the wrong state
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Error message
        message: String,
    },

    /// Step definition pattern could not be compiled
    #[error("Invalid step definition '{pattern}': {message}")]
    StepDefinition {
        /// The offending pattern
        pattern: String,
        /// Error message
        message: String,
    },

    /// Assertion inside a step failed
    #[error("Assertion failed: {message}")]
    AssertionFailed {
        /// Error message
        message: String,
    },

    /// Data store path error
    #[error(transparent)]
    DataStore(#[from] DataStoreError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl StepwrightError {
    /// Create a config parse error
    #[must_use]
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
        }
    }

    /// Create an initialization error
    #[must_use]
    pub fn init(message: impl Into<String>) -> Self {
        Self::Init {
            message: message.into(),
        }
    }

    /// Create a bootstrap error
    #[must_use]
    pub fn bootstrap(message: impl Into<String>) -> Self {
        Self::Bootstrap {
            message: message.into(),
        }
    }

    /// Create a discovery error
    #[must_use]
    pub fn discovery(message: impl Into<String>) -> Self {
        Self::Discovery {
            message: message.into(),
        }
    }

    /// Create a teardown error
    #[must_use]
    pub fn teardown(message: impl Into<String>) -> Self {
        Self::Teardown {
            message: message.into(),
        }
    }

    /// Create an invalid state error
    #[must_use]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create an assertion error
    #[must_use]
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::AssertionFailed {
            message: message.into(),
        }
    }

    /// Phase this error belongs to, if it is a lifecycle error
    #[must_use]
    pub const fn phase(&self) -> Option<Phase> {
        match self {
            Self::ConfigParse { .. } | Self::Yaml(_) | Self::Json(_) => Some(Phase::Config),
            Self::Init { .. } | Self::InvalidState { .. } => Some(Phase::Init),
            Self::Bootstrap { .. } => Some(Phase::Bootstrap),
            Self::Discovery { .. } => Some(Phase::Discovery),
            Self::TestFailure { .. }
            | Self::AssertionFailed { .. }
            | Self::StepDefinition { .. }
            | Self::DataStore(_) => Some(Phase::Execution),
            Self::Teardown { .. } => Some(Phase::Teardown),
            Self::Io(_) => None,
        }
    }

    /// Whether this error aborts the lifecycle (everything except test failures)
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::TestFailure { .. } | Self::AssertionFailed { .. })
    }
}
