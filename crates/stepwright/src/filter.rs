//! Ordered locator filter chain.
//!
//! Filters run in registration order. Each receives the caller's original
//! input alongside the locator as left by the previous filter, and returns the
//! locator to hand to the next one. A filter whose precondition does not hold
//! must return the locator untouched so that independent strategies compose.

use std::fmt;

use crate::locator::{Locator, LocatorInput};

/// A locator rewrite step
pub trait LocatorFilter: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Rewrite `locator`, or return it unchanged when not applicable
    fn apply(&self, input: &LocatorInput, locator: Locator) -> Locator;
}

impl<F> LocatorFilter for (&'static str, F)
where
    F: Fn(&LocatorInput, Locator) -> Locator + Send + Sync,
{
    fn name(&self) -> &str {
        self.0
    }

    fn apply(&self, input: &LocatorInput, locator: Locator) -> Locator {
        (self.1)(input, locator)
    }
}

/// Filters applied to every locator before it reaches the driver
#[derive(Default)]
pub struct FilterChain {
    filters: Vec<Box<dyn LocatorFilter>>,
}

impl fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterChain")
            .field("filters", &self.names())
            .finish()
    }
}

impl FilterChain {
    /// Create an empty chain
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a filter; it runs after every filter already registered
    pub fn push(&mut self, filter: Box<dyn LocatorFilter>) {
        self.filters.push(filter);
    }

    /// Number of registered filters
    #[must_use]
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Whether no filter is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Filter names in execution order
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    /// Build a locator from `input` and run it through every filter
    #[must_use]
    pub fn resolve(&self, input: impl Into<LocatorInput>) -> Locator {
        let input = input.into();
        let initial = Locator::from_input(&input);
        self.filters
            .iter()
            .fold(initial, |locator, filter| filter.apply(&input, locator))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::locator::LocatorKind;

    fn append(tag: &'static str) -> Box<dyn LocatorFilter> {
        Box::new((tag, move |_: &LocatorInput, locator: Locator| {
            let query = format!("{}{}", locator.query().unwrap_or_default(), tag);
            locator.rewritten(LocatorKind::Css, query)
        }))
    }

    #[test]
    fn test_empty_chain_is_identity() {
        let chain = FilterChain::new();
        let resolved = chain.resolve("#login");
        assert_eq!(resolved, Locator::from_input(&"#login".into()));
        assert!(chain.is_empty());
    }

    #[test]
    fn test_filters_run_in_registration_order() {
        let mut chain = FilterChain::new();
        chain.push(append("-a"));
        chain.push(append("-b"));
        let resolved = chain.resolve("x");
        assert_eq!(resolved.query(), Some("x-a-b"));
        assert_eq!(chain.names(), vec!["-a", "-b"]);
    }

    #[test]
    fn test_later_filter_sees_earlier_mutation() {
        let mut chain = FilterChain::new();
        chain.push(append("-a"));
        chain.push(Box::new((
            "only-after-a",
            |_: &LocatorInput, locator: Locator| {
                if locator.query() == Some("x-a") {
                    locator.with_output("saw -a")
                } else {
                    locator
                }
            },
        )));
        assert_eq!(chain.resolve("x").display(), "saw -a");
    }

    #[test]
    fn test_filter_receives_original_input() {
        let mut chain = FilterChain::new();
        chain.push(append("-a"));
        chain.push(Box::new(("echo", |input: &LocatorInput, locator: Locator| {
            locator.with_output(input.to_string())
        })));
        let resolved = chain.resolve("orig");
        assert_eq!(resolved.query(), Some("orig-a"));
        assert_eq!(resolved.display(), "orig");
    }

    #[test]
    fn test_debug_lists_names() {
        let mut chain = FilterChain::new();
        chain.push(append("-a"));
        assert!(format!("{chain:?}").contains("-a"));
    }
}
