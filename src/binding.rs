//! `{{path}}` bindings.
//!
//! A string that is exactly one placeholder resolves to the bound value with
//! its type preserved. A string mixing text and placeholders resolves to a
//! string, and placeholders whose path is missing are left in the output
//! verbatim. Bare paths (`user.name`) and `state.`-prefixed paths read the
//! same state root.

use crate::error::{SduiError, SduiResult};
use crate::state::StateSnapshot;
use dashmap::DashMap;
use regex::Regex;
use serde_json::Value;
use std::sync::{Arc, OnceLock};

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{([^{}]*)\}\}").expect("valid placeholder regex"))
}

/// A dot path into state. `items[0].name` and `items.0.name` are equivalent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingPath {
    raw: String,
    segments: Vec<String>,
}

impl BindingPath {
    pub fn parse(raw: &str) -> SduiResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SduiError::InvalidBinding {
                expr: raw.to_string(),
                reason: "empty path".to_string(),
            });
        }

        let normalized = trimmed.replace('[', ".").replace(']', "");
        let mut segments: Vec<String> = normalized.split('.').map(str::to_string).collect();
        if let Some(bad) = segments
            .iter()
            .find(|s| s.is_empty() || !s.chars().all(is_path_char))
        {
            return Err(SduiError::InvalidBinding {
                expr: raw.to_string(),
                reason: format!("invalid path segment '{}'", bad),
            });
        }
        if segments.first().map(String::as_str) == Some("state") {
            segments.remove(0);
        }

        Ok(Self {
            raw: trimmed.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn lookup<'a>(&self, state: &'a StateSnapshot) -> Option<&'a Value> {
        state.lookup(&self.segments)
    }

    /// Owned value at this path; `items.length` counts an array.
    pub fn resolve(&self, state: &StateSnapshot) -> Option<Value> {
        state.resolve(&self.segments)
    }
}

pub(crate) fn is_path_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '-'
}

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Text(String),
    Placeholder(BindingPath),
}

/// A parsed string prop.
#[derive(Debug, Clone, PartialEq)]
pub enum Template {
    /// No placeholders.
    Literal(String),
    /// Exactly one placeholder and nothing else.
    Placeholder(BindingPath),
    /// Text interleaved with placeholders.
    Concat(Vec<Segment>),
}

impl Template {
    pub fn parse(source: &str) -> SduiResult<Self> {
        let re = placeholder_regex();
        let mut segments = Vec::new();
        let mut cursor = 0;

        for caps in re.captures_iter(source) {
            let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if whole.start() > cursor {
                segments.push(Segment::Text(source[cursor..whole.start()].to_string()));
            }
            segments.push(Segment::Placeholder(BindingPath::parse(inner.as_str())?));
            cursor = whole.end();
        }

        let tail = &source[cursor..];
        if tail.contains("{{") {
            return Err(SduiError::InvalidBinding {
                expr: source.to_string(),
                reason: "unterminated placeholder".to_string(),
            });
        }
        if segments.is_empty() {
            return Ok(Template::Literal(source.to_string()));
        }
        if !tail.is_empty() {
            segments.push(Segment::Text(tail.to_string()));
        }

        if segments.len() == 1 {
            if let Some(Segment::Placeholder(path)) = segments.pop() {
                return Ok(Template::Placeholder(path));
            }
        }
        Ok(Template::Concat(segments))
    }

    /// Resolve against state. `None` means the single bound path is missing.
    pub fn resolve(&self, state: &StateSnapshot) -> Option<Value> {
        match self {
            Template::Literal(text) => Some(Value::String(text.clone())),
            Template::Placeholder(path) => path.resolve(state),
            Template::Concat(segments) => {
                let mut out = String::new();
                for segment in segments {
                    match segment {
                        Segment::Text(text) => out.push_str(text),
                        Segment::Placeholder(path) => match path.resolve(state) {
                            Some(value) => out.push_str(&display_value(&value)),
                            None => {
                                out.push_str("{{");
                                out.push_str(path.as_str());
                                out.push_str("}}");
                            }
                        },
                    }
                }
                Some(Value::String(out))
            }
        }
    }

    /// Like [`resolve`](Self::resolve), but `None` as soon as any placeholder
    /// is missing. Guards use this so unbound paths stay falsy.
    pub fn resolve_complete(&self, state: &StateSnapshot) -> Option<Value> {
        if self.paths().iter().any(|path| path.resolve(state).is_none()) {
            return None;
        }
        self.resolve(state)
    }

    pub fn paths(&self) -> Vec<&BindingPath> {
        match self {
            Template::Literal(_) => Vec::new(),
            Template::Placeholder(path) => vec![path],
            Template::Concat(segments) => segments
                .iter()
                .filter_map(|s| match s {
                    Segment::Placeholder(path) => Some(path),
                    Segment::Text(_) => None,
                })
                .collect(),
        }
    }
}

/// Text form of a value when interpolated into a larger string.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Parsed templates keyed by source string. Invalid templates are cached as
/// literals so the same bad input is only reported once.
#[derive(Debug, Default)]
pub struct BindingCache {
    templates: DashMap<String, Arc<Template>>,
}

impl BindingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn template(&self, source: &str) -> Arc<Template> {
        if let Some(found) = self.templates.get(source) {
            return Arc::clone(found.value());
        }
        let parsed = match Template::parse(source) {
            Ok(template) => template,
            Err(err) => {
                tracing::warn!(error = %err, "treating malformed binding as literal text");
                Template::Literal(source.to_string())
            }
        };
        let parsed = Arc::new(parsed);
        self.templates
            .insert(source.to_string(), Arc::clone(&parsed));
        parsed
    }

    /// Resolve a prop value. Strings are scanned for placeholders; arrays and
    /// objects are resolved element by element; other values pass through.
    pub fn resolve(&self, expr: &Value, state: &StateSnapshot) -> Option<Value> {
        match expr {
            Value::String(source) => self.template(source).resolve(state),
            Value::Array(items) => Some(Value::Array(
                items
                    .iter()
                    .map(|item| self.resolve(item, state).unwrap_or(Value::Null))
                    .collect(),
            )),
            Value::Object(map) => Some(Value::Object(
                map.iter()
                    .filter_map(|(k, v)| self.resolve(v, state).map(|r| (k.clone(), r)))
                    .collect(),
            )),
            other => Some(other.clone()),
        }
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// One-shot resolution without a cache.
pub fn resolve_value(expr: &Value, state: &StateSnapshot) -> Option<Value> {
    BindingCache::new().resolve(expr, state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state() -> StateSnapshot {
        StateSnapshot::from_value(json!({
            "count": 5,
            "user": { "name": "Ada" },
            "items": [{ "title": "first" }],
            "dialogOpen": false
        }))
    }

    #[test]
    fn test_single_placeholder_keeps_type() {
        let state = state();
        assert_eq!(resolve_value(&json!("{{state.count}}"), &state), Some(json!(5)));
        assert_eq!(resolve_value(&json!("{{ dialogOpen }}"), &state), Some(json!(false)));
        assert_eq!(resolve_value(&json!("{{state.user}}"), &state), Some(json!({ "name": "Ada" })));
    }

    #[test]
    fn test_concat_produces_string() {
        assert_eq!(
            resolve_value(&json!("Count: {{state.count}}"), &state()),
            Some(json!("Count: 5"))
        );
    }

    #[test]
    fn test_missing_single_placeholder_is_undefined() {
        assert_eq!(resolve_value(&json!("{{state.nope}}"), &state()), None);
    }

    #[test]
    fn test_missing_placeholder_in_concat_is_kept() {
        assert_eq!(
            resolve_value(&json!("Hi {{user.name}}, {{user.missing}}!"), &state()),
            Some(json!("Hi Ada, {{user.missing}}!"))
        );
    }

    #[test]
    fn test_array_index_paths() {
        let state = state();
        assert_eq!(resolve_value(&json!("{{items.0.title}}"), &state), Some(json!("first")));
        assert_eq!(resolve_value(&json!("{{items[0].title}}"), &state), Some(json!("first")));
    }

    #[test]
    fn test_non_strings_pass_through() {
        let state = state();
        assert_eq!(resolve_value(&json!(42), &state), Some(json!(42)));
        assert_eq!(resolve_value(&json!(true), &state), Some(json!(true)));
    }

    #[test]
    fn test_nested_objects_resolve_and_drop_missing() {
        let resolved = resolve_value(
            &json!({ "label": "{{user.name}}", "gone": "{{nope}}" }),
            &state(),
        );
        assert_eq!(resolved, Some(json!({ "label": "Ada" })));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            Template::parse("{{ }}"),
            Err(SduiError::InvalidBinding { .. })
        ));
        assert!(matches!(
            Template::parse("open {{state.x"),
            Err(SduiError::InvalidBinding { .. })
        ));
        assert!(matches!(
            Template::parse("{{a b}}"),
            Err(SduiError::InvalidBinding { .. })
        ));
    }

    #[test]
    fn test_cache_reuses_parsed_templates() {
        let cache = BindingCache::new();
        let a = cache.template("Hello {{user.name}}");
        let b = cache.template("Hello {{user.name}}");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);

        let bad = cache.template("{{ }}");
        assert_eq!(*bad, Template::Literal("{{ }}".to_string()));
    }
}
