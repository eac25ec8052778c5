//! Per-test context handed to every step.

use std::sync::Arc;

use crate::data_store::{DataStore, LOCATOR_LIST};
use crate::filter::FilterChain;
use crate::locator::{Locator, LocatorInput};
use crate::result::{StepwrightError, StepwrightResult};

/// State a step can read and write.
///
/// Each test gets its own `World`: a copy of the run's seeded data store and a
/// shared handle to the run's filter chain.
#[derive(Debug, Clone)]
pub struct World {
    /// Data store for this test
    pub data: DataStore,
    locators: Arc<FilterChain>,
    profile: Option<String>,
    test_title: String,
}

impl Default for World {
    fn default() -> Self {
        Self::new(DataStore::new(), Arc::new(FilterChain::new()))
    }
}

impl World {
    /// Create a world over a store and a filter chain
    #[must_use]
    pub fn new(data: DataStore, locators: Arc<FilterChain>) -> Self {
        Self {
            data,
            locators,
            profile: None,
            test_title: String::new(),
        }
    }

    /// Set the active profile name
    #[must_use]
    pub fn with_profile(mut self, profile: Option<String>) -> Self {
        self.profile = profile;
        self
    }

    /// Set the title of the test this world belongs to
    #[must_use]
    pub fn with_test_title(mut self, title: impl Into<String>) -> Self {
        self.test_title = title.into();
        self
    }

    /// Active config profile, if any
    #[must_use]
    pub fn profile(&self) -> Option<&str> {
        self.profile.as_deref()
    }

    /// Full title of the running test
    #[must_use]
    pub fn test_title(&self) -> &str {
        &self.test_title
    }

    /// Run caller input through the filter chain
    #[must_use]
    pub fn resolve(&self, input: impl Into<LocatorInput>) -> Locator {
        self.locators.resolve(input)
    }

    /// Resolve the `LocatorList.<key>` template.
    ///
    /// # Errors
    ///
    /// Fails when no template is stored under `key`.
    pub fn locator(&self, key: &str) -> StepwrightResult<Locator> {
        let template = self.data.locator_template(key).ok_or_else(|| {
            StepwrightError::assertion(format!("no locator template '{LOCATOR_LIST}.{key}'"))
        })?;
        Ok(self.resolve(template.clone()))
    }
}
