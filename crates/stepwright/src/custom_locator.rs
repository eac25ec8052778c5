//! Custom locator filter.
//!
//! Rewrites prefixed shorthand such as `$login-button` into a concrete XPath
//! or CSS query over one or more test attributes:
//!
//! ```text
//! prefix "$", attribute ["data-qa", "data-test"]
//!
//!   xpath:  .//*[@data-qa="login-button" or @data-test="login-button"]
//!   css:    [data-qa=login-button],[data-test=login-button]
//! ```
//!
//! Inputs without the prefix pass through untouched so other strategies in the
//! chain still get their turn.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::filter::LocatorFilter;
use crate::locator::{Locator, LocatorInput, LocatorKind};

/// Plugin name as used in config and on the command line
pub const PLUGIN_NAME: &str = "customLocator";

/// Query language the shorthand is rewritten into
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// `.//*[@attr="val" or ...]`
    Xpath,
    /// `[attr=val],...`
    Css,
    /// Anything else; the filter stays inert
    #[serde(other)]
    Unknown,
}

/// Which attributes to match
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attributes {
    /// Ordered attribute names
    List(Vec<String>),
    /// Option was neither a string nor a list of strings
    Malformed,
}

impl Attributes {
    fn from_value(value: &Value) -> Self {
        match value {
            Value::String(s) => Self::List(vec![s.clone()]),
            Value::Array(items) => {
                let names: Vec<String> = items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect();
                if names.is_empty() {
                    Self::Malformed
                } else {
                    Self::List(names)
                }
            }
            _ => Self::Malformed,
        }
    }
}

/// Default options, before user options are laid over them
#[must_use]
pub fn default_options() -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("prefix".to_string(), json!("$"));
    map.insert("attribute".to_string(), json!("data-test-id"));
    map.insert("strategy".to_string(), json!("xpath"));
    map.insert("showActual".to_string(), json!(false));
    map
}

/// The prefix-shorthand rewriter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomLocator {
    prefix: String,
    attributes: Attributes,
    strategy: Strategy,
    show_actual: bool,
}

impl CustomLocator {
    /// Build from merged plugin options.
    ///
    /// Malformed options never fail: they produce an inert filter.
    #[must_use]
    pub fn from_options(options: &Map<String, Value>) -> Self {
        let prefix = options
            .get("prefix")
            .and_then(Value::as_str)
            .unwrap_or("$")
            .to_string();
        let attributes = options
            .get("attribute")
            .map_or(Attributes::Malformed, Attributes::from_value);
        let strategy = options.get("strategy").map_or(Strategy::Xpath, |v| {
            serde_json::from_value(v.clone()).unwrap_or(Strategy::Unknown)
        });
        let show_actual = options
            .get("showActual")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        if attributes == Attributes::Malformed {
            warn!(
                plugin = PLUGIN_NAME,
                "'attribute' must be a string or a list of strings; locators will not be rewritten"
            );
        }
        if strategy == Strategy::Unknown {
            warn!(
                plugin = PLUGIN_NAME,
                "'strategy' must be 'xpath' or 'css'; locators will not be rewritten"
            );
        }

        Self {
            prefix,
            attributes,
            strategy,
            show_actual,
        }
    }

    /// Rewrite a bare identifier into a query, if the options allow it
    #[must_use]
    pub fn query_for(&self, val: &str) -> Option<(LocatorKind, String)> {
        let Attributes::List(attrs) = &self.attributes else {
            return None;
        };
        match self.strategy {
            Strategy::Xpath => {
                let literal = xpath_literal(val);
                let predicates: Vec<String> = attrs
                    .iter()
                    .map(|attr| format!("@{attr}={literal}"))
                    .collect();
                Some((
                    LocatorKind::XPath,
                    format!(".//*[{}]", predicates.join(" or ")),
                ))
            }
            Strategy::Css => {
                let selectors: Vec<String> =
                    attrs.iter().map(|attr| format!("[{attr}={val}]")).collect();
                Some((LocatorKind::Css, selectors.join(",")))
            }
            Strategy::Unknown => None,
        }
    }
}

impl LocatorFilter for CustomLocator {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn apply(&self, input: &LocatorInput, locator: Locator) -> Locator {
        let Some(val) = input.as_str().and_then(|s| s.strip_prefix(self.prefix.as_str())) else {
            return locator;
        };
        let Some((kind, query)) = self.query_for(val) else {
            return locator;
        };
        let rewritten = locator.rewritten(kind, query.clone());
        if self.show_actual {
            rewritten.with_output(query)
        } else {
            rewritten
        }
    }
}

/// Quote `val` as an XPath string literal.
///
/// XPath 1.0 has no escape sequences, so a value holding both quote kinds is
/// spliced together with `concat()`.
#[must_use]
pub fn xpath_literal(val: &str) -> String {
    if !val.contains('"') {
        return format!("\"{val}\"");
    }
    if !val.contains('\'') {
        return format!("'{val}'");
    }
    let parts: Vec<String> = val
        .split('"')
        .map(|part| format!("\"{part}\""))
        .collect();
    format!("concat({})", parts.join(", '\"', "))
}
