//! Plugin catalog, activation policy, and filter chain construction.
//!
//! Plugins are off unless the run selects them. A run with no selector
//! activates nothing, whatever the config file says, so a test run does not
//! depend on a developer's local defaults. `all` activates every plugin the
//! config declares; a comma-separated list activates exactly those names.

use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::config::EffectiveConfig;
use crate::custom_locator::{self, CustomLocator};
use crate::filter::{FilterChain, LocatorFilter};
use crate::result::{StepwrightError, StepwrightResult};

/// An optional named behavior activated per run
pub trait Plugin: fmt::Debug + Send + Sync {
    /// Plugin name
    fn name(&self) -> &str;

    /// Locator rewrite contributed to the filter chain, if any
    fn locator_filter(&self) -> Option<Box<dyn LocatorFilter>> {
        None
    }
}

/// Builds a plugin from its merged options
pub type PluginFactory = fn(&Map<String, Value>) -> StepwrightResult<Box<dyn Plugin>>;

/// A plugin the catalog knows how to build
#[derive(Clone)]
pub struct PluginDescriptor {
    /// Plugin name
    pub name: String,
    /// Default options
    pub defaults: fn() -> Map<String, Value>,
    /// Constructor
    pub factory: PluginFactory,
}

impl fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("name", &self.name)
            .field("defaults", &(self.defaults)())
            .finish_non_exhaustive()
    }
}

/// Known plugins
#[derive(Debug, Clone, Default)]
pub struct PluginCatalog {
    descriptors: Vec<PluginDescriptor>,
}

impl PluginCatalog {
    /// Empty catalog
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with the built-in plugins registered
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        catalog.register(
            custom_locator::PLUGIN_NAME,
            custom_locator::default_options,
            build_custom_locator,
        );
        catalog
    }

    /// Register a plugin; a later registration under the same name replaces it
    pub fn register(
        &mut self,
        name: impl Into<String>,
        defaults: fn() -> Map<String, Value>,
        factory: PluginFactory,
    ) {
        let name = name.into();
        self.descriptors.retain(|d| d.name != name);
        self.descriptors.push(PluginDescriptor {
            name,
            defaults,
            factory,
        });
    }

    /// Find a plugin by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PluginDescriptor> {
        self.descriptors.iter().find(|d| d.name == name)
    }

    /// Registered names
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.descriptors.iter().map(|d| d.name.as_str()).collect()
    }
}

#[derive(Debug)]
struct CustomLocatorPlugin {
    filter: CustomLocator,
}

impl Plugin for CustomLocatorPlugin {
    fn name(&self) -> &str {
        custom_locator::PLUGIN_NAME
    }

    fn locator_filter(&self) -> Option<Box<dyn LocatorFilter>> {
        Some(Box::new(self.filter.clone()))
    }
}

fn build_custom_locator(options: &Map<String, Value>) -> StepwrightResult<Box<dyn Plugin>> {
    Ok(Box::new(CustomLocatorPlugin {
        filter: CustomLocator::from_options(options),
    }))
}

/// Run-time plugin selection
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PluginSelector {
    /// No selector given: everything stays disabled
    #[default]
    None,
    /// Every declared plugin
    All,
    /// Exactly these plugins, in this order
    Only(Vec<String>),
}

impl PluginSelector {
    /// Parse an optional `--plugins` value
    #[must_use]
    pub fn parse(value: Option<&str>) -> Self {
        value.map_or(Self::None, |v| v.parse().unwrap_or_default())
    }
}

impl FromStr for PluginSelector {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        let names: Vec<String> = trimmed
            .split(',')
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .collect();
        Ok(if names.is_empty() {
            Self::None
        } else {
            Self::Only(names)
        })
    }
}

/// Names to enable, in activation order.
///
/// Pure policy: `declared` is the config's plugin list in declaration order.
#[must_use]
pub fn enabled_names(declared: &[String], selector: &PluginSelector) -> Vec<String> {
    match selector {
        PluginSelector::None => Vec::new(),
        PluginSelector::All => declared.to_vec(),
        PluginSelector::Only(names) => {
            let mut seen = Vec::new();
            for name in names {
                if !seen.contains(name) {
                    seen.push(name.clone());
                }
            }
            seen
        }
    }
}

/// An instantiated plugin with the options it was built from
#[derive(Debug)]
pub struct ActivePlugin {
    /// Plugin name
    pub name: String,
    /// Defaults overlaid with user options
    pub options: Map<String, Value>,
    plugin: Box<dyn Plugin>,
}

/// Plugins active for one run
#[derive(Debug, Default)]
pub struct PluginRegistry {
    active: Vec<ActivePlugin>,
}

impl PluginRegistry {
    /// Activate plugins from config according to `selector`.
    ///
    /// # Errors
    ///
    /// [`StepwrightError::Init`] when an explicitly selected plugin is not in
    /// the catalog or its factory fails.
    pub fn activate(
        config: &EffectiveConfig,
        selector: &PluginSelector,
        catalog: &PluginCatalog,
    ) -> StepwrightResult<Self> {
        let declared = config.plugins();
        let declared_names: Vec<String> = declared.iter().map(|(n, _)| n.clone()).collect();

        let selected = enabled_names(&declared_names, selector);

        for (name, entry) in &declared {
            if entry.enabled && !selected.contains(name) {
                debug!(plugin = %name, "enabled in config but not selected for this run");
            }
        }

        let mut active = Vec::new();
        for name in selected {
            let Some(descriptor) = catalog.get(&name) else {
                if matches!(selector, PluginSelector::All) {
                    warn!(plugin = %name, "declared plugin is not available, skipping");
                    continue;
                }
                return Err(StepwrightError::init(format!(
                    "unknown plugin '{name}' (available: {})",
                    catalog.names().join(", ")
                )));
            };

            let mut options = (descriptor.defaults)();
            if let Some((_, entry)) = declared.iter().find(|(n, _)| *n == name) {
                options.extend(entry.options.clone());
            }

            let plugin = (descriptor.factory)(&options).map_err(|e| {
                StepwrightError::init(format!("plugin '{name}' failed to start: {e}"))
            })?;
            info!(plugin = %name, "plugin activated");
            active.push(ActivePlugin {
                name,
                options,
                plugin,
            });
        }

        Ok(Self { active })
    }

    /// Active plugin names, in activation order
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.active.iter().map(|p| p.name.as_str()).collect()
    }

    /// Whether `name` is active
    #[must_use]
    pub fn is_active(&self, name: &str) -> bool {
        self.active.iter().any(|p| p.name == name)
    }

    /// Active plugins
    #[must_use]
    pub fn plugins(&self) -> &[ActivePlugin] {
        &self.active
    }

    /// Build the filter chain from every active plugin's filter, in order
    #[must_use]
    pub fn filter_chain(&self) -> FilterChain {
        let mut chain = FilterChain::new();
        for active in &self.active {
            if let Some(filter) = active.plugin.locator_filter() {
                debug!(plugin = %active.name, filter = filter.name(), "installing locator filter");
                chain.push(filter);
            }
        }
        chain
    }
}
