//! Configuration loading and merging.
//!
//! A run's effective configuration is built from three layers, each deep-merged
//! onto the previous one: the base config file, the selected profile
//! (`profiles.<name>` inside the base file) and an optional JSON override blob
//! supplied on the command line. Objects merge recursively; scalars and arrays
//! from the later layer replace the earlier ones. Keys this crate does not know
//! about are carried through untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::result::{StepwrightError, StepwrightResult};

/// Config file names searched for in a config directory, in order
pub const CONFIG_FILE_NAMES: [&str; 3] = ["stepwright.json", "stepwright.yaml", "stepwright.yml"];

/// Default glob for feature files, relative to the test root
pub const DEFAULT_FEATURES: &str = "./features/**/*.feature";

/// Default output directory, relative to the test root
pub const DEFAULT_OUTPUT_DIR: &str = "./output";

/// Recursively merge `overlay` onto `base`; the overlay wins on conflicts.
pub fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                if let Some(base_val) = base_map.get_mut(key) {
                    deep_merge(base_val, overlay_val);
                } else {
                    base_map.insert(key.clone(), overlay_val.clone());
                }
            }
        }
        (base, overlay) => {
            *base = overlay.clone();
        }
    }
}

/// Parse override text into a JSON object.
///
/// # Errors
///
/// Returns [`StepwrightError::ConfigParse`] when the text is not valid JSON or
/// its top level is not an object.
pub fn parse_override(text: &str) -> StepwrightResult<Value> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| StepwrightError::config_parse(format!("override is not valid JSON: {e}")))?;
    if !value.is_object() {
        return Err(StepwrightError::config_parse(
            "override must be a JSON object",
        ));
    }
    Ok(value)
}

/// Merge an optional override blob onto a base configuration.
///
/// Neither input is modified.
///
/// # Errors
///
/// Returns [`StepwrightError::ConfigParse`] when the override text is invalid.
pub fn merge(base: &Value, override_text: Option<&str>) -> StepwrightResult<EffectiveConfig> {
    let mut merged = base.clone();
    if let Some(text) = override_text {
        let overlay = parse_override(text)?;
        deep_merge(&mut merged, &overlay);
    }
    EffectiveConfig::from_value(merged)
}

/// Read a JSON or YAML file into a value, choosing the format by extension.
///
/// # Errors
///
/// [`StepwrightError::Init`] naming the file when it cannot be read,
/// [`StepwrightError::ConfigParse`] when it is not valid JSON or YAML.
pub fn read_structured(path: &Path) -> StepwrightResult<Value> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        StepwrightError::init(format!("cannot read '{}': {e}", path.display()))
    })?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml")
    );
    if is_yaml {
        serde_yaml_ng::from_str(&text).map_err(|e| {
            StepwrightError::config_parse(format!("{}: {e}", path.display()))
        })
    } else {
        serde_json::from_str(&text).map_err(|e| {
            StepwrightError::config_parse(format!("{}: {e}", path.display()))
        })
    }
}

/// Per-plugin configuration entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Whether the config file marks the plugin enabled.
    ///
    /// Informational only: activation is decided by the run-time selector.
    pub enabled: bool,
    /// Remaining plugin options
    pub options: Map<String, Value>,
}

/// Data files loaded into the store before execution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataFiles {
    /// File loaded into the `LocatorList` namespace
    pub locators: Option<PathBuf>,
    /// File loaded into the `DataList` namespace
    pub data: Option<PathBuf>,
}

/// The merged configuration a run reads from
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveConfig {
    value: Value,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            value: Value::Object(Map::new()),
        }
    }
}

impl EffectiveConfig {
    /// Wrap a JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`StepwrightError::ConfigParse`] when `value` is not an object.
    pub fn from_value(value: Value) -> StepwrightResult<Self> {
        if value.is_object() {
            Ok(Self { value })
        } else {
            Err(StepwrightError::config_parse(
                "configuration must be an object",
            ))
        }
    }

    /// Borrow the raw merged value
    #[must_use]
    pub const fn as_value(&self) -> &Value {
        &self.value
    }

    /// Look up a dot path
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        path.split('.')
            .try_fold(&self.value, |node, segment| node.get(segment))
    }

    fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    /// Overlay `profiles.<name>`; unknown profiles leave the config unchanged.
    #[must_use]
    pub fn with_profile(&self, name: &str) -> Self {
        let mut merged = self.value.clone();
        match self.get("profiles").and_then(|p| p.get(name)) {
            Some(overlay) => {
                debug!(profile = name, "applying config profile");
                deep_merge(&mut merged, overlay);
            }
            None => warn!(profile = name, "profile not declared in config, ignoring"),
        }
        Self { value: merged }
    }

    /// Glob for feature files
    #[must_use]
    pub fn features_pattern(&self) -> &str {
        self.get_str("gherkin.features").unwrap_or(DEFAULT_FEATURES)
    }

    /// Output directory (relative paths are resolved against the test root)
    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(self.get_str("output").unwrap_or(DEFAULT_OUTPUT_DIR))
    }

    /// Shell command run as the bootstrap hook
    #[must_use]
    pub fn bootstrap_command(&self) -> Option<&str> {
        self.get_str("bootstrap")
    }

    /// Shell command run as the teardown hook
    #[must_use]
    pub fn teardown_command(&self) -> Option<&str> {
        self.get_str("teardown")
    }

    /// Data files to seed the store with
    #[must_use]
    pub fn data_files(&self) -> DataFiles {
        DataFiles {
            locators: self.get_str("dataFiles.locators").map(PathBuf::from),
            data: self.get_str("dataFiles.data").map(PathBuf::from),
        }
    }

    /// Declared plugins, in declaration order.
    ///
    /// A non-object entry is treated as an entry with no options.
    #[must_use]
    pub fn plugins(&self) -> Vec<(String, PluginConfig)> {
        let Some(Value::Object(plugins)) = self.get("plugins") else {
            return Vec::new();
        };
        plugins
            .iter()
            .map(|(name, entry)| {
                let mut options = entry.as_object().cloned().unwrap_or_default();
                let enabled = options
                    .remove("enabled")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                (name.clone(), PluginConfig { enabled, options })
            })
            .collect()
    }
}

/// A configuration resolved from disk together with the test root it binds
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Effective configuration
    pub config: EffectiveConfig,
    /// Directory holding the config file
    pub test_root: PathBuf,
    /// Config file that was read, if any
    pub file: Option<PathBuf>,
}

/// Locate the config file for `path` (a file or a directory).
///
/// # Errors
///
/// Returns [`StepwrightError::Init`] when `path` does not exist.
pub fn locate_config(path: &Path) -> StepwrightResult<(PathBuf, Option<PathBuf>)> {
    if path.is_file() {
        let root = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        return Ok((root, Some(path.to_path_buf())));
    }
    if path.is_dir() {
        let file = CONFIG_FILE_NAMES
            .iter()
            .map(|name| path.join(name))
            .find(|candidate| candidate.is_file());
        return Ok((path.to_path_buf(), file));
    }
    Err(StepwrightError::init(format!(
        "config path '{}' does not exist",
        path.display()
    )))
}

/// Load the base config, apply the profile and then the override blob.
///
/// # Errors
///
/// [`StepwrightError::Init`] when the path is missing,
/// [`StepwrightError::ConfigParse`] when a layer is not valid structured data.
pub fn resolve(
    path: &Path,
    profile: Option<&str>,
    override_text: Option<&str>,
) -> StepwrightResult<ResolvedConfig> {
    let (test_root, file) = locate_config(path)?;
    let base = match &file {
        Some(file) => {
            debug!(config = %file.display(), "loading config file");
            read_structured(file)?
        }
        None => {
            warn!(dir = %test_root.display(), "no config file found, using defaults");
            Value::Object(Map::new())
        }
    };

    let mut config = EffectiveConfig::from_value(base)?;
    if let Some(name) = profile {
        config = config.with_profile(name);
    }
    let config = merge(config.as_value(), override_text)?;

    Ok(ResolvedConfig {
        config,
        test_root,
        file,
    })
}
