//! Prop hygiene between spec props and component factories.
//!
//! [`RawProps`] is whatever the resolver assembled; [`CleanProps`] can only be
//! produced by [`sanitize`], so a factory never sees an engine-reserved key.

use std::collections::btree_map;
use std::collections::BTreeMap;
use tracing::debug;

/// Keys the engine consumes itself. They never reach a component.
pub const ENGINE_RESERVED_KEYS: [&str; 8] = [
    "parentContext",
    "spec",
    "theme",
    "state",
    "conditionalProps",
    "computedProps",
    "eventActions",
    "when",
];

struct Alias {
    /// `None` applies to every component type.
    target: Option<&'static str>,
    from: &'static str,
    to: &'static str,
}

const ALIASES: &[Alias] = &[
    Alias { target: Some("Input"), from: "inputType", to: "type" },
    Alias { target: Some("Button"), from: "buttonType", to: "type" },
    Alias { target: Some("Label"), from: "htmlFor", to: "for" },
    Alias { target: None, from: "testId", to: "data-testid" },
    Alias { target: None, from: "ariaLabel", to: "aria-label" },
    Alias { target: None, from: "ariaDescribedBy", to: "aria-describedby" },
    Alias { target: None, from: "ariaControls", to: "aria-controls" },
    Alias { target: None, from: "ariaExpanded", to: "aria-expanded" },
    Alias { target: None, from: "ariaHidden", to: "aria-hidden" },
    Alias { target: None, from: "ariaLive", to: "aria-live" },
];

pub fn is_reserved(key: &str) -> bool {
    ENGINE_RESERVED_KEYS.contains(&key)
}

/// Renamed key for `key` on `target`, type-specific aliases first.
pub fn alias_for(target: &str, key: &str) -> Option<&'static str> {
    ALIASES
        .iter()
        .filter(|a| a.from == key)
        .find(|a| a.target == Some(target))
        .or_else(|| ALIASES.iter().find(|a| a.from == key && a.target.is_none()))
        .map(|a| a.to)
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawProps<V>(BTreeMap<String, V>);

impl<V> Default for RawProps<V> {
    fn default() -> Self {
        Self(BTreeMap::new())
    }
}

impl<V> RawProps<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<V>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Option<V> {
        self.0.insert(key.into(), value)
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<V> FromIterator<(String, V)> for RawProps<V> {
    fn from_iter<I: IntoIterator<Item = (String, V)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Props safe to hand to a component factory.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanProps<V>(BTreeMap<String, V>);

impl<V> Default for CleanProps<V> {
    fn default() -> Self {
        Self(BTreeMap::new())
    }
}

impl<V> CleanProps<V> {
    pub fn get(&self, key: &str) -> Option<&V> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Insert a prop after sanitization. Reserved keys are refused and
    /// `None` is returned without storing anything.
    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Option<V> {
        let key = key.into();
        if is_reserved(&key) {
            debug!(key = %key, "refusing reserved key on clean props");
            return None;
        }
        self.0.insert(key, value)
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.0.remove(key)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, V> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a, V> IntoIterator for &'a CleanProps<V> {
    type Item = (&'a String, &'a V);
    type IntoIter = btree_map::Iter<'a, String, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Strip reserved keys and apply the alias table for `target`.
///
/// Never fails; the output has at most as many entries as the input. When an
/// alias lands on a key that is also present literally, the aliased value wins.
pub fn sanitize<V>(raw: RawProps<V>, target: &str) -> CleanProps<V> {
    let mut clean = BTreeMap::new();
    let mut renamed = Vec::new();

    for (key, value) in raw.0 {
        if is_reserved(&key) {
            continue;
        }
        match alias_for(target, &key) {
            Some(to) => renamed.push((to, value)),
            None => {
                clean.insert(key, value);
            }
        }
    }

    for (key, value) in renamed {
        if clean.insert(key.to_string(), value).is_some() {
            debug!(key, target, "aliased prop replaced an explicit one");
        }
    }

    CleanProps(clean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn raw(pairs: &[(&str, i64)]) -> RawProps<i64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn keys(props: &CleanProps<i64>) -> Vec<&str> {
        props.keys().collect()
    }

    #[test]
    fn test_reserved_keys_are_stripped() {
        let mut pairs: Vec<(&str, i64)> = ENGINE_RESERVED_KEYS.iter().map(|k| (*k, 1)).collect();
        pairs.push(("variant", 2));
        let clean = sanitize(raw(&pairs), "Button");
        assert_eq!(keys(&clean), vec!["variant"]);
    }

    #[test]
    fn test_input_type_alias() {
        let clean = sanitize(raw(&[("inputType", 1), ("placeholder", 2)]), "Input");
        assert_eq!(keys(&clean), vec!["placeholder", "type"]);
        assert_eq!(clean.get("type"), Some(&1));
    }

    #[test]
    fn test_alias_is_type_specific() {
        let clean = sanitize(raw(&[("inputType", 1)]), "Text");
        assert_eq!(keys(&clean), vec!["inputType"]);
    }

    #[test]
    fn test_alias_wins_over_literal_key() {
        let clean = sanitize(raw(&[("inputType", 1), ("type", 2)]), "Input");
        assert_eq!(clean.len(), 1);
        assert_eq!(clean.get("type"), Some(&1));
    }

    #[test]
    fn test_global_aliases() {
        let clean = sanitize(raw(&[("testId", 1), ("ariaLabel", 2)]), "Card");
        assert_eq!(keys(&clean), vec!["aria-label", "data-testid"]);
    }

    #[test]
    fn test_box_element_is_retained() {
        let clean = sanitize(raw(&[("element", 1)]), "Box");
        assert_eq!(keys(&clean), vec!["element"]);
    }

    #[test]
    fn test_output_never_exceeds_input() {
        let inputs = [
            raw(&[]),
            raw(&[("a", 1)]),
            raw(&[("inputType", 1), ("type", 2), ("state", 3), ("when", 4)]),
            raw(&[("testId", 1), ("data-testid", 2)]),
        ];
        for input in inputs {
            let count = input.len();
            for target in ["Input", "Button", "Box", "Unknown"] {
                assert!(sanitize(input.clone(), target).len() <= count);
            }
        }
    }

    #[test]
    fn test_clean_insert_refuses_reserved() {
        let mut clean = sanitize(raw(&[]), "Box");
        assert_eq!(clean.insert("theme", 1), None);
        assert!(clean.is_empty());
        clean.insert("role", 2);
        assert_eq!(clean.get("role"), Some(&2));
    }
}
