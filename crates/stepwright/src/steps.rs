//! Step definition registry.
//!
//! A registry is an ordered table of (pattern, handler) pairs. Step text is
//! matched against the patterns in registration order and the first match
//! wins, so more specific patterns must be registered before broader ones
//! they overlap with. Patterns are regular expressions anchored at both ends;
//! capture groups become the handler's arguments.

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::locator::Locator;
use crate::result::{StepwrightError, StepwrightResult};
use crate::world::World;

/// Keyword a definition was registered under (informational; matching ignores it)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    /// `Given`
    Given,
    /// `When`
    When,
    /// `Then`
    Then,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Given => "Given",
            Self::When => "When",
            Self::Then => "Then",
        })
    }
}

/// Body of a step definition
#[async_trait]
pub trait StepHandler: Send + Sync {
    /// Run the step against `world` with the pattern's captures
    async fn call(&self, world: &mut World, args: &[String]) -> StepwrightResult<()>;
}

struct SyncStep<F>(F);

#[async_trait]
impl<F> StepHandler for SyncStep<F>
where
    F: Fn(&mut World, &[String]) -> StepwrightResult<()> + Send + Sync,
{
    async fn call(&self, world: &mut World, args: &[String]) -> StepwrightResult<()> {
        (self.0)(world, args)
    }
}

/// A registered step definition
#[derive(Clone)]
pub struct StepDefinition {
    kind: StepKind,
    source: String,
    pattern: Regex,
    handler: Arc<dyn StepHandler>,
}

impl fmt::Debug for StepDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDefinition")
            .field("kind", &self.kind)
            .field("pattern", &self.source)
            .finish_non_exhaustive()
    }
}

impl StepDefinition {
    /// Keyword the definition was registered under
    #[must_use]
    pub const fn kind(&self) -> StepKind {
        self.kind
    }

    /// Pattern as written by the author
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.source
    }

    /// Run the handler
    pub async fn invoke(&self, world: &mut World, args: &[String]) -> StepwrightResult<()> {
        self.handler.call(world, args).await
    }
}

/// A definition matched against step text
#[derive(Debug)]
pub struct StepMatch<'a> {
    /// Matched definition
    pub definition: &'a StepDefinition,
    /// Capture groups; unmatched optional groups are empty strings
    pub args: Vec<String>,
}

/// Ordered step definition table
#[derive(Debug, Clone, Default)]
pub struct StepRegistry {
    definitions: Vec<StepDefinition>,
}

impl StepRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in data-store steps
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        register_builtins(&mut registry);
        registry
    }

    /// Register an async handler.
    ///
    /// # Errors
    ///
    /// [`StepwrightError::StepDefinition`] when `pattern` is not a valid regex.
    pub fn add(
        &mut self,
        kind: StepKind,
        pattern: &str,
        handler: impl StepHandler + 'static,
    ) -> StepwrightResult<&mut Self> {
        let compiled = Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
            StepwrightError::StepDefinition {
                pattern: pattern.to_string(),
                message: e.to_string(),
            }
        })?;
        self.definitions.push(StepDefinition {
            kind,
            source: pattern.to_string(),
            pattern: compiled,
            handler: Arc::new(handler),
        });
        Ok(self)
    }

    /// Register a synchronous `Given` step
    pub fn given<F>(&mut self, pattern: &str, f: F) -> StepwrightResult<&mut Self>
    where
        F: Fn(&mut World, &[String]) -> StepwrightResult<()> + Send + Sync + 'static,
    {
        self.add(StepKind::Given, pattern, SyncStep(f))
    }

    /// Register a synchronous `When` step
    pub fn when<F>(&mut self, pattern: &str, f: F) -> StepwrightResult<&mut Self>
    where
        F: Fn(&mut World, &[String]) -> StepwrightResult<()> + Send + Sync + 'static,
    {
        self.add(StepKind::When, pattern, SyncStep(f))
    }

    /// Register a synchronous `Then` step
    pub fn then<F>(&mut self, pattern: &str, f: F) -> StepwrightResult<&mut Self>
    where
        F: Fn(&mut World, &[String]) -> StepwrightResult<()> + Send + Sync + 'static,
    {
        self.add(StepKind::Then, pattern, SyncStep(f))
    }

    /// First definition matching `text`
    #[must_use]
    pub fn find(&self, text: &str) -> Option<StepMatch<'_>> {
        self.definitions.iter().find_map(|definition| {
            let captures = definition.pattern.captures(text)?;
            let args = captures
                .iter()
                .skip(1)
                .map(|m| m.map_or_else(String::new, |m| m.as_str().to_string()))
                .collect();
            Some(StepMatch { definition, args })
        })
    }

    /// Registered definitions in registration order
    #[must_use]
    pub fn definitions(&self) -> &[StepDefinition] {
        &self.definitions
    }

    /// Number of definitions
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn locator_value(locator: &Locator) -> Value {
    match locator.query() {
        Some(query) => Value::String(query.to_string()),
        None => serde_json::to_value(&locator.value).unwrap_or(Value::Null),
    }
}

// Patterns are literal and known to compile.
#[allow(clippy::expect_used)]
fn register_builtins(registry: &mut StepRegistry) {
    registry
        .given(r#"I store "([^"]*)" as "([^"]*)""#, |world, args| {
            world.data.set(&args[1], args[0].clone())?;
            Ok(())
        })
        .and_then(|r| {
            r.given(r#"I copy "([^"]*)" to "([^"]*)""#, |world, args| {
                let value = world.data.get(&args[0]).cloned().ok_or_else(|| {
                    StepwrightError::assertion(format!("'{}' is not set", args[0]))
                })?;
                world.data.set(&args[1], value)?;
                Ok(())
            })
        })
        .and_then(|r| {
            r.when(
                r#"I resolve the locator template "([^"]*)" into "([^"]*)""#,
                |world, args| {
                    let locator = world.locator(&args[0])?;
                    world.data.set(&args[1], locator_value(&locator))?;
                    Ok(())
                },
            )
        })
        .and_then(|r| {
            r.when(
                r#"I resolve the locator "([^"]*)" into "([^"]*)""#,
                |world, args| {
                    let locator = world.resolve(args[0].as_str());
                    world.data.set(&args[1], locator_value(&locator))?;
                    Ok(())
                },
            )
        })
        .and_then(|r| {
            r.then(r#""([^"]*)" should equal "([^"]*)""#, |world, args| {
                let actual = world.data.get(&args[0]).map(render);
                if actual.as_deref() == Some(args[1].as_str()) {
                    Ok(())
                } else {
                    Err(StepwrightError::assertion(format!(
                        "expected '{}' to equal '{}', got {}",
                        args[0],
                        args[1],
                        actual.map_or_else(|| "nothing".to_string(), |a| format!("'{a}'"))
                    )))
                }
            })
        })
        .and_then(|r| {
            r.then(r#""([^"]*)" should be set"#, |world, args| {
                if world.data.contains(&args[0]) {
                    Ok(())
                } else {
                    Err(StepwrightError::assertion(format!("'{}' is not set", args[0])))
                }
            })
        })
        .expect("built-in step patterns compile");
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::custom_locator::{default_options, CustomLocator};
    use crate::data_store::DataStore;
    use crate::filter::FilterChain;
    use serde_json::json;

    mod matching_tests {
        use super::*;

        #[test]
        fn test_first_registered_wins() {
            let mut registry = StepRegistry::new();
            registry
                .given(r"I open (.*)", |world, _| Ok(world.data.set("hit", "first")?))
                .unwrap();
            registry
                .given(r"I open the (.*) page", |world, _| Ok(world.data.set("hit", "second")?))
                .unwrap();
            let matched = registry.find("I open the login page").unwrap();
            assert_eq!(matched.definition.pattern(), "I open (.*)");
            assert_eq!(matched.args, vec!["the login page".to_string()]);
        }

        #[test]
        fn test_patterns_are_anchored() {
            let mut registry = StepRegistry::new();
            registry.when("I click", |_, _| Ok(())).unwrap();
            assert!(registry.find("I click").is_some());
            assert!(registry.find("I click twice").is_none());
            assert!(registry.find("then I click").is_none());
        }

        #[test]
        fn test_optional_group_is_empty_string() {
            let mut registry = StepRegistry::new();
            registry.then(r"I see (\d+)( items)?", |_, _| Ok(())).unwrap();
            let matched = registry.find("I see 3").unwrap();
            assert_eq!(matched.args, vec!["3".to_string(), String::new()]);
        }

        #[test]
        fn test_invalid_pattern_rejected() {
            let mut registry = StepRegistry::new();
            let err = registry.given("I (unclosed", |_, _| Ok(())).unwrap_err();
            assert!(matches!(err, StepwrightError::StepDefinition { .. }));
            assert!(registry.is_empty());
        }

        #[test]
        fn test_definitions_keep_kind_and_order() {
            let mut registry = StepRegistry::new();
            registry.given("a", |_, _| Ok(())).unwrap();
            registry.then("b", |_, _| Ok(())).unwrap();
            let kinds: Vec<StepKind> = registry.definitions().iter().map(StepDefinition::kind).collect();
            assert_eq!(kinds, vec![StepKind::Given, StepKind::Then]);
            assert_eq!(registry.len(), 2);
        }
    }

    mod builtin_tests {
        use super::*;

        async fn run(registry: &StepRegistry, world: &mut World, text: &str) -> StepwrightResult<()> {
            let matched = registry.find(text).expect("step should match");
            matched.definition.invoke(world, &matched.args).await
        }

        #[tokio::test]
        async fn test_store_and_assert() {
            let registry = StepRegistry::with_builtins();
            let mut world = World::default();
            run(&registry, &mut world, r#"I store "A-1001" as "Order.number""#).await.unwrap();
            run(&registry, &mut world, r#""Order.number" should equal "A-1001""#).await.unwrap();
            run(&registry, &mut world, r#""Order.number" should be set"#).await.unwrap();
        }

        #[tokio::test]
        async fn test_assert_mismatch_fails() {
            let registry = StepRegistry::with_builtins();
            let mut world = World::default();
            let err = run(&registry, &mut world, r#""Order.number" should equal "x""#)
                .await
                .unwrap_err();
            assert!(err.to_string().contains("got nothing"));
        }

        #[tokio::test]
        async fn test_copy_data_list_value() {
            let registry = StepRegistry::with_builtins();
            let mut data = DataStore::new();
            data.set("DataList.users.admin", json!({"name": "root"})).unwrap();
            let mut world = World::new(data, Arc::new(FilterChain::new()));
            run(&registry, &mut world, r#"I copy "DataList.users.admin" to "Current.user""#)
                .await
                .unwrap();
            assert_eq!(world.data.get("Current.user.name"), Some(&json!("root")));
        }

        #[tokio::test]
        async fn test_resolve_locator_through_chain() {
            let registry = StepRegistry::with_builtins();
            let mut options = default_options();
            options.insert("attribute".to_string(), json!(["data-qa", "data-test"]));
            options.insert("strategy".to_string(), json!("css"));
            let mut chain = FilterChain::new();
            chain.push(Box::new(CustomLocator::from_options(&options)));
            let mut world = World::new(DataStore::new(), Arc::new(chain));

            run(&registry, &mut world, r#"I resolve the locator "$user" into "Resolved.user""#)
                .await
                .unwrap();
            assert_eq!(
                world.data.get_str("Resolved.user"),
                Some("[data-qa=user],[data-test=user]")
            );
        }

        #[tokio::test]
        async fn test_resolve_template() {
            let registry = StepRegistry::with_builtins();
            let mut world = World::default();
            world.data.set("LocatorList.search", "//input").unwrap();
            run(&registry, &mut world, r#"I resolve the locator template "search" into "q""#)
                .await
                .unwrap();
            assert_eq!(world.data.get_str("q"), Some("//input"));
        }

        #[test]
        fn test_builtins_registered() {
            assert_eq!(StepRegistry::with_builtins().len(), 6);
        }
    }
}
