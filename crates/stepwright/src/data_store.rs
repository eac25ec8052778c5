//! Nested key-path data store.
//!
//! Values are addressed with dot-delimited paths such as `"Section.field"` or
//! `"DataList.users.0.email"`. Two namespaces are reserved by convention:
//! [`LOCATOR_LIST`] holds test-authored locator templates and [`DATA_LIST`]
//! holds test-authored literal data. Everything else is free-form storage for
//! values captured while a test runs.
//!
//! The store is a plain owned value. A run seeds one store and every test gets
//! its own copy through its [`World`](crate::World), so captures made by one
//! test are never visible to the next.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::deep_merge;

/// Namespace for locator templates
pub const LOCATOR_LIST: &str = "LocatorList";

/// Namespace for literal test data
pub const DATA_LIST: &str = "DataList";

/// Errors raised by [`DataStore::set`] and friends
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataStoreError {
    /// Path was empty or contained an empty segment
    #[error("Data store path is empty")]
    EmptyPath,

    /// Path descends through a scalar value
    #[error("Cannot descend into '{at}' while writing '{path}': value is not an object or array")]
    NotAContainer {
        /// Full path being written
        path: String,
        /// Prefix that holds the scalar
        at: String,
    },

    /// Segment addressing an array is not a valid index
    #[error("'{segment}' is not a valid index into the array at '{at}' (path '{path}')")]
    BadIndex {
        /// Full path being written
        path: String,
        /// Prefix that holds the array
        at: String,
        /// Offending segment
        segment: String,
    },
}

/// Dot-path addressed JSON value tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataStore {
    root: Value,
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DataStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: Value::Object(Map::new()),
        }
    }

    /// Get the value at `path`; `None` when any segment is unset
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        let segments = split_path(path).ok()?;
        let mut cursor = &self.root;
        for segment in segments {
            cursor = match cursor {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(cursor)
    }

    /// Get the value at `path` if it is a string
    #[must_use]
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    /// Check whether `path` is set
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Store `value` at `path`, creating intermediate objects on demand.
    ///
    /// # Errors
    ///
    /// Fails when the path is empty, when a prefix of it holds a scalar, or
    /// when a segment addressing an array is not an in-bounds index.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> Result<(), DataStoreError> {
        let segments = split_path(path)?;
        let Some((last, parents)) = segments.split_last() else {
            return Err(DataStoreError::EmptyPath);
        };

        let mut cursor = &mut self.root;
        for (depth, segment) in parents.iter().enumerate() {
            let at = segments[..depth].join(".");
            cursor = match cursor {
                Value::Object(map) => map
                    .entry((*segment).to_string())
                    .or_insert_with(|| Value::Object(Map::new())),
                Value::Array(items) => {
                    let index = array_index(items.len(), segment, path, &at)?;
                    &mut items[index]
                }
                _ => {
                    return Err(DataStoreError::NotAContainer {
                        path: path.to_string(),
                        at,
                    })
                }
            };
        }

        let at = parents.join(".");
        match cursor {
            Value::Object(map) => {
                map.insert((*last).to_string(), value.into());
                Ok(())
            }
            Value::Array(items) => {
                let index = array_index(items.len(), last, path, &at)?;
                items[index] = value.into();
                Ok(())
            }
            _ => Err(DataStoreError::NotAContainer {
                path: path.to_string(),
                at,
            }),
        }
    }

    /// Remove and return the value at `path`
    pub fn remove(&mut self, path: &str) -> Option<Value> {
        let segments = split_path(path).ok()?;
        let (last, parents) = segments.split_last()?;
        let mut cursor = &mut self.root;
        for segment in parents {
            cursor = match cursor {
                Value::Object(map) => map.get_mut(*segment)?,
                _ => return None,
            };
        }
        cursor.as_object_mut()?.remove(*last)
    }

    /// Deep-merge an object into a namespace, replacing scalars and arrays.
    ///
    /// # Errors
    ///
    /// Fails when the namespace path cannot be written.
    pub fn merge_into(&mut self, namespace: &str, value: Value) -> Result<(), DataStoreError> {
        match self.get(namespace) {
            Some(existing) => {
                let mut merged = existing.clone();
                deep_merge(&mut merged, &value);
                self.set(namespace, merged)
            }
            None => self.set(namespace, value),
        }
    }

    /// Look up a locator template in the [`LOCATOR_LIST`] namespace
    #[must_use]
    pub fn locator_template(&self, key: &str) -> Option<&Value> {
        self.get(&format!("{LOCATOR_LIST}.{key}"))
    }

    /// Look up literal data in the [`DATA_LIST`] namespace
    #[must_use]
    pub fn data(&self, key: &str) -> Option<&Value> {
        self.get(&format!("{DATA_LIST}.{key}"))
    }

    /// Borrow the whole tree
    #[must_use]
    pub const fn as_value(&self) -> &Value {
        &self.root
    }

    /// Drop every stored value
    pub fn clear(&mut self) {
        self.root = Value::Object(Map::new());
    }
}

fn split_path(path: &str) -> Result<Vec<&str>, DataStoreError> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(DataStoreError::EmptyPath);
    }
    Ok(segments)
}

fn array_index(len: usize, segment: &str, path: &str, at: &str) -> Result<usize, DataStoreError> {
    segment
        .parse::<usize>()
        .ok()
        .filter(|i| *i < len)
        .ok_or_else(|| DataStoreError::BadIndex {
            path: path.to_string(),
            at: at.to_string(),
            segment: segment.to_string(),
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    mod get_set_tests {
        use super::*;

        #[test]
        fn test_set_then_get_scalar() {
            let mut store = DataStore::new();
            store.set("Order.number", "A-1001").unwrap();
            assert_eq!(store.get_str("Order.number"), Some("A-1001"));
        }

        #[test]
        fn test_set_then_get_structured() {
            let mut store = DataStore::new();
            let value = json!({"name": "Ada", "roles": ["admin", "qa"]});
            store.set("User", value.clone()).unwrap();
            assert_eq!(store.get("User"), Some(&value));
            assert_eq!(store.get_str("User.roles.1"), Some("qa"));
        }

        #[test]
        fn test_unset_path_is_none() {
            let store = DataStore::new();
            assert_eq!(store.get("Nothing.here"), None);
            assert!(!store.contains("Nothing"));
        }

        #[test]
        fn test_intermediate_segments_created() {
            let mut store = DataStore::new();
            store.set("a.b.c.d", 4).unwrap();
            assert!(store.get("a.b.c").unwrap().is_object());
            assert_eq!(store.get("a.b.c.d"), Some(&json!(4)));
        }

        #[test]
        fn test_overwrite_keeps_siblings() {
            let mut store = DataStore::new();
            store.set("Cart.total", 10).unwrap();
            store.set("Cart.items", 2).unwrap();
            store.set("Cart.total", 12).unwrap();
            assert_eq!(store.get("Cart"), Some(&json!({"total": 12, "items": 2})));
        }

        #[test]
        fn test_descend_through_scalar_is_error() {
            let mut store = DataStore::new();
            store.set("a", 1).unwrap();
            let err = store.set("a.b", 2).unwrap_err();
            assert_eq!(
                err,
                DataStoreError::NotAContainer {
                    path: "a.b".to_string(),
                    at: "a".to_string(),
                }
            );
            // The original value is untouched
            assert_eq!(store.get("a"), Some(&json!(1)));
        }

        #[test]
        fn test_deep_descend_through_scalar_reports_prefix() {
            let mut store = DataStore::new();
            store.set("a.b", "leaf").unwrap();
            let err = store.set("a.b.c.d", 1).unwrap_err();
            assert!(matches!(err, DataStoreError::NotAContainer { ref at, .. } if at == "a.b"));
        }

        #[test]
        fn test_empty_path_rejected() {
            let mut store = DataStore::new();
            assert_eq!(store.set("", 1), Err(DataStoreError::EmptyPath));
            assert_eq!(store.set("a..b", 1), Err(DataStoreError::EmptyPath));
            assert_eq!(store.get(""), None);
        }

        #[test]
        fn test_array_index_write() {
            let mut store = DataStore::new();
            store.set("list", json!([1, 2, 3])).unwrap();
            store.set("list.1", 20).unwrap();
            assert_eq!(store.get("list"), Some(&json!([1, 20, 3])));
        }

        #[test]
        fn test_array_index_out_of_bounds() {
            let mut store = DataStore::new();
            store.set("list", json!([1])).unwrap();
            let err = store.set("list.5", 0).unwrap_err();
            assert!(matches!(err, DataStoreError::BadIndex { ref segment, .. } if segment == "5"));
        }
    }

    mod namespace_tests {
        use super::*;

        #[test]
        fn test_locator_template_lookup() {
            let mut store = DataStore::new();
            store
                .set("LocatorList.login.submit", "$login-submit")
                .unwrap();
            assert_eq!(
                store.locator_template("login.submit"),
                Some(&json!("$login-submit"))
            );
        }

        #[test]
        fn test_data_lookup() {
            let mut store = DataStore::new();
            store
                .merge_into(DATA_LIST, json!({"users": {"admin": "root"}}))
                .unwrap();
            assert_eq!(store.data("users.admin"), Some(&json!("root")));
        }

        #[test]
        fn test_merge_into_existing_namespace() {
            let mut store = DataStore::new();
            store
                .merge_into(DATA_LIST, json!({"a": 1, "nested": {"x": 1}}))
                .unwrap();
            store
                .merge_into(DATA_LIST, json!({"b": 2, "nested": {"y": 2}}))
                .unwrap();
            assert_eq!(
                store.get(DATA_LIST),
                Some(&json!({"a": 1, "b": 2, "nested": {"x": 1, "y": 2}}))
            );
        }
    }

    mod removal_tests {
        use super::*;

        #[test]
        fn test_remove() {
            let mut store = DataStore::new();
            store.set("Session.token", "abc").unwrap();
            assert_eq!(store.remove("Session.token"), Some(json!("abc")));
            assert!(!store.contains("Session.token"));
            assert!(store.contains("Session"));
        }

        #[test]
        fn test_clear() {
            let mut store = DataStore::new();
            store.set("x", 1).unwrap();
            store.clear();
            assert_eq!(store.as_value(), &json!({}));
        }

        #[test]
        fn test_clone_is_independent() {
            let mut seeded = DataStore::new();
            seeded.set("DataList.user", "ada").unwrap();
            let mut per_test = seeded.clone();
            per_test.set("captured", true).unwrap();
            assert!(!seeded.contains("captured"));
            assert_eq!(per_test.get_str("DataList.user"), Some("ada"));
        }
    }
}
