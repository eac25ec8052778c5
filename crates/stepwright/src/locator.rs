//! Locator value object.
//!
//! A [`Locator`] says how the driver should find an element: a [`LocatorKind`]
//! plus a query (or a structured descriptor the driver understands). Locators
//! are built fresh for every resolution from caller input and handed through
//! the [`FilterChain`](crate::FilterChain) by value; nothing keeps them around
//! after the driver call.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// How a locator's value is interpreted by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocatorKind {
    /// XPath expression
    XPath,
    /// CSS selector
    Css,
    /// Element id
    Id,
    /// Visible text
    Text,
    /// Driver-specific structured object, passed through untouched
    Opaque,
}

impl LocatorKind {
    /// Lowercase name, also the descriptor key for this kind
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::XPath => "xpath",
            Self::Css => "css",
            Self::Id => "id",
            Self::Text => "text",
            Self::Opaque => "opaque",
        }
    }

    fn from_descriptor_key(key: &str) -> Option<Self> {
        match key {
            "xpath" => Some(Self::XPath),
            "css" => Some(Self::Css),
            "id" => Some(Self::Id),
            "text" => Some(Self::Text),
            _ => None,
        }
    }
}

impl fmt::Display for LocatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Query payload of a locator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocatorValue {
    /// A query string
    Query(String),
    /// A structured descriptor
    Structured(Value),
}

/// What a caller asked to locate, before any rewriting
#[derive(Debug, Clone, PartialEq)]
pub enum LocatorInput {
    /// A plain string such as `"//button"` or `"$login"`
    Text(String),
    /// A structured descriptor such as `{"css": "button"}`
    Descriptor(Value),
}

impl LocatorInput {
    /// The input as a string, if it is one
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Descriptor(_) => None,
        }
    }
}

impl From<&str> for LocatorInput {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for LocatorInput {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Value> for LocatorInput {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => Self::Text(s),
            other => Self::Descriptor(other),
        }
    }
}

impl fmt::Display for LocatorInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Descriptor(v) => write!(f, "{v}"),
        }
    }
}

/// A driver-consumable description of how to find an element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Locator {
    /// Query kind
    pub kind: LocatorKind,
    /// Query payload
    pub value: LocatorValue,
    /// Human-readable rendering for messages
    pub output: Option<String>,
    /// Rendering of the caller's original input
    source: String,
}

impl Locator {
    /// Build a locator from caller input, guessing the kind of plain strings.
    #[must_use]
    pub fn from_input(input: &LocatorInput) -> Self {
        let source = input.to_string();
        match input {
            LocatorInput::Text(s) => Self {
                kind: guess_kind(s),
                value: LocatorValue::Query(s.clone()),
                output: None,
                source,
            },
            LocatorInput::Descriptor(value) => {
                let (kind, value) = descriptor_parts(value);
                Self {
                    kind,
                    value,
                    output: None,
                    source,
                }
            }
        }
    }

    /// XPath locator
    #[must_use]
    pub fn xpath(query: impl Into<String>) -> Self {
        Self::with_kind(LocatorKind::XPath, query.into())
    }

    /// CSS locator
    #[must_use]
    pub fn css(query: impl Into<String>) -> Self {
        Self::with_kind(LocatorKind::Css, query.into())
    }

    /// Id locator
    #[must_use]
    pub fn id(id: impl Into<String>) -> Self {
        Self::with_kind(LocatorKind::Id, id.into())
    }

    /// Text locator
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::with_kind(LocatorKind::Text, text.into())
    }

    fn with_kind(kind: LocatorKind, query: String) -> Self {
        Self {
            kind,
            source: query.clone(),
            value: LocatorValue::Query(query),
            output: None,
        }
    }

    /// Replace kind and query, keeping the original source for display
    #[must_use]
    pub fn rewritten(mut self, kind: LocatorKind, query: impl Into<String>) -> Self {
        self.kind = kind;
        self.value = LocatorValue::Query(query.into());
        self
    }

    /// Set the display override
    #[must_use]
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// The query string, unless the value is structured
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        match &self.value {
            LocatorValue::Query(q) => Some(q),
            LocatorValue::Structured(_) => None,
        }
    }

    /// Text shown to test authors: `output` if set, else the original input
    #[must_use]
    pub fn display(&self) -> &str {
        self.output.as_deref().unwrap_or(&self.source)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.display())
    }
}

fn guess_kind(s: &str) -> LocatorKind {
    if ["//", ".//", "(//", "./"].iter().any(|p| s.starts_with(p)) {
        return LocatorKind::XPath;
    }
    if s.starts_with(['#', '.', '[']) {
        return LocatorKind::Css;
    }
    // tag name directly followed by a selector marker, e.g. `button.primary`
    let tag_len = s
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(s.len());
    let starts_with_letter = s.starts_with(|c: char| c.is_ascii_alphabetic());
    if starts_with_letter && s[tag_len..].starts_with(['.', '#', '[', ':']) {
        return LocatorKind::Css;
    }
    LocatorKind::Text
}

fn descriptor_parts(value: &Value) -> (LocatorKind, LocatorValue) {
    if let Some(map) = value.as_object() {
        if map.len() == 1 {
            if let Some((key, Value::String(query))) = map.iter().next() {
                if let Some(kind) = LocatorKind::from_descriptor_key(key) {
                    return (kind, LocatorValue::Query(query.clone()));
                }
            }
        }
    }
    (LocatorKind::Opaque, LocatorValue::Structured(value.clone()))
}
