//! Property-based tests for stepwright.
//!
//! Uses proptest to check the data store, the locator filter chain and the
//! config merger over arbitrary inputs.

#![allow(clippy::unwrap_used)]

use proptest::prelude::*;
use serde_json::{json, Value};
use stepwright::config::{deep_merge, merge};
use stepwright::custom_locator::{default_options, CustomLocator};
use stepwright::{DataStore, FilterChain, LocatorKind};

fn segment() -> impl Strategy<Value = String> {
    "[A-Za-z_][A-Za-z0-9_]{0,8}"
}

fn path() -> impl Strategy<Value = String> {
    prop::collection::vec(segment(), 1..5).prop_map(|segments| segments.join("."))
}

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        "[ -~]{0,16}".prop_map(Value::String),
    ]
}

fn custom_chain(prefix: &str, strategy: &str) -> FilterChain {
    let mut options = default_options();
    options.insert("prefix".to_string(), json!(prefix));
    options.insert("attribute".to_string(), json!(["data-qa", "data-test"]));
    options.insert("strategy".to_string(), json!(strategy));
    let mut chain = FilterChain::new();
    chain.push(Box::new(CustomLocator::from_options(&options)));
    chain
}

// === Data Store Property Tests ===

proptest! {
    /// A value written at a path reads back unchanged.
    #[test]
    fn prop_set_then_get(path in path(), value in scalar()) {
        let mut store = DataStore::new();
        store.set(&path, value.clone()).unwrap();
        prop_assert_eq!(store.get(&path), Some(&value));
    }

    /// Writing one path never disturbs a sibling.
    #[test]
    fn prop_sibling_untouched(
        parent in segment(),
        a in segment(),
        b in segment(),
        va in scalar(),
        vb in scalar(),
    ) {
        prop_assume!(a != b);
        let mut store = DataStore::new();
        store.set(&format!("{parent}.{a}"), va.clone()).unwrap();
        store.set(&format!("{parent}.{b}"), vb).unwrap();
        prop_assert_eq!(store.get(&format!("{parent}.{a}")), Some(&va));
    }

    /// A path never written reads as unset.
    #[test]
    fn prop_unset_path_is_none(written in path(), other in path()) {
        prop_assume!(!other.starts_with(&written) && !written.starts_with(&other));
        let mut store = DataStore::new();
        store.set(&written, 1).unwrap();
        prop_assert!(store.get(&other).is_none());
    }
}

// === Custom Locator Property Tests ===

proptest! {
    /// Input without the prefix resolves exactly as with no filter at all.
    #[test]
    fn prop_unprefixed_is_fixed_point(input in "[A-Za-z0-9/.#\\[\\] =_-]{0,24}") {
        let chain = custom_chain("$", "xpath");
        prop_assert_eq!(chain.resolve(input.as_str()), FilterChain::new().resolve(input.as_str()));
    }

    /// Prefixed input always becomes a query of the configured kind.
    #[test]
    fn prop_prefixed_is_rewritten(val in "[A-Za-z0-9_-]{1,16}", css in any::<bool>()) {
        let chain = custom_chain("=", if css { "css" } else { "xpath" });
        let locator = chain.resolve(format!("={val}"));
        let query = locator.query().unwrap().to_string();
        if css {
            prop_assert_eq!(locator.kind, LocatorKind::Css);
            prop_assert_eq!(query, format!("[data-qa={val}],[data-test={val}]"));
        } else {
            prop_assert_eq!(locator.kind, LocatorKind::XPath);
            prop_assert_eq!(
                query,
                format!(".//*[@data-qa=\"{val}\" or @data-test=\"{val}\"]")
            );
        }
        prop_assert_eq!(locator.display(), format!("={val}"));
    }
}

// === Config Merge Property Tests ===

proptest! {
    /// Merging an empty override leaves the base unchanged.
    #[test]
    fn prop_empty_override_is_identity(key in segment(), value in scalar()) {
        let mut map = serde_json::Map::new();
        map.insert(key, value);
        let base = Value::Object(map);
        let merged = merge(&base, Some("{}")).unwrap();
        prop_assert_eq!(merged.as_value(), &base);
    }

    /// Override scalars win; untouched base keys survive.
    #[test]
    fn prop_override_wins(a in scalar(), b in scalar(), keep in scalar()) {
        let mut base = json!({"nested": {"x": a, "keep": keep.clone()}});
        deep_merge(&mut base, &json!({"nested": {"x": b.clone()}}));
        prop_assert_eq!(&base["nested"]["x"], &b);
        prop_assert_eq!(&base["nested"]["keep"], &keep);
    }
}
