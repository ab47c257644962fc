use crate::error::{SduiError, SduiResult};
use crate::spec::ComponentSpec;
use crate::state::StateSnapshot;
use crate::theme::ThemeOverride;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Major document version this crate understands.
pub const SUPPORTED_MAJOR: u64 = 1;

/// Descriptive metadata; never affects resolution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Lowercase, no spaces, at most 10.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSpec {
    #[serde(default)]
    pub initial: Map<String, Value>,
}

/// A complete, versioned UI document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UISpecification {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<ThemeOverride>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<StateSpec>,
    pub root: ComponentSpec,
}

impl UISpecification {
    pub fn new(version: impl Into<String>, root: ComponentSpec) -> Self {
        Self {
            version: version.into(),
            metadata: None,
            theme: None,
            state: None,
            root,
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.metadata.as_ref().and_then(|m| m.title.as_deref())
    }

    /// Seed state for a host store: `state.initial`, with any `state.initial`
    /// declared on the root node merged over it.
    pub fn initial_state(&self) -> StateSnapshot {
        let mut snapshot = StateSnapshot::from_map(
            self.state
                .as_ref()
                .map(|s| s.initial.clone())
                .unwrap_or_default(),
        );
        if let Some(Value::Object(local)) = self.root.prop("state").and_then(|s| s.get("initial")) {
            snapshot.merge(local.clone());
        }
        snapshot
    }

    pub fn to_json(&self) -> SduiResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// A parsed input file: either a full document or a bare component tree.
#[derive(Debug, Clone, PartialEq)]
pub enum SpecDocument {
    Full(Box<UISpecification>),
    Component(ComponentSpec),
}

impl SpecDocument {
    pub fn root_component(&self) -> &ComponentSpec {
        match self {
            SpecDocument::Full(doc) => &doc.root,
            SpecDocument::Component(spec) => spec,
        }
    }

    pub fn specification(&self) -> Option<&UISpecification> {
        match self {
            SpecDocument::Full(doc) => Some(doc),
            SpecDocument::Component(_) => None,
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, SpecDocument::Full(_))
    }

    /// Wrap a bare component in a document at the supported version.
    pub fn into_specification(self) -> UISpecification {
        match self {
            SpecDocument::Full(doc) => *doc,
            SpecDocument::Component(spec) => {
                UISpecification::new(format!("{}.0.0", SUPPORTED_MAJOR), spec)
            }
        }
    }
}

/// Parse `MAJOR[.MINOR[.PATCH]]`.
pub fn parse_version(version: &str) -> SduiResult<(u64, u64, u64)> {
    let invalid = || SduiError::InvalidVersion {
        version: version.to_string(),
    };
    let parts: Vec<&str> = version.trim().split('.').collect();
    if parts.is_empty() || parts.len() > 3 {
        return Err(invalid());
    }
    let mut numbers = [0u64; 3];
    for (slot, part) in numbers.iter_mut().zip(&parts) {
        *slot = part.parse::<u64>().map_err(|_| invalid())?;
    }
    Ok((numbers[0], numbers[1], numbers[2]))
}

/// Reject documents whose major version differs from `supported_major`.
pub fn check_version(version: &str, supported_major: u64) -> SduiResult<()> {
    let (major, _, _) = parse_version(version)?;
    if major != supported_major {
        return Err(SduiError::UnsupportedVersion {
            version: version.to_string(),
            supported: supported_major,
        });
    }
    Ok(())
}

/// Parse a full JSON document and check its version.
pub fn parse_specification(json: &str) -> SduiResult<UISpecification> {
    let doc: UISpecification = serde_json::from_str(json)?;
    check_version(&doc.version, SUPPORTED_MAJOR)?;
    Ok(doc)
}

pub fn parse_specification_yaml(yaml: &str) -> SduiResult<UISpecification> {
    let doc: UISpecification = serde_yaml::from_str(yaml)?;
    check_version(&doc.version, SUPPORTED_MAJOR)?;
    Ok(doc)
}

/// Parse a single component tree with no document envelope.
pub fn parse_component(json: &str) -> SduiResult<ComponentSpec> {
    ComponentSpec::from_value(serde_json::from_str(json)?)
}

/// Parse JSON that is either a full document (`version` + `root`) or a bare
/// component tree.
pub fn parse_document(json: &str) -> SduiResult<SpecDocument> {
    document_from_value(serde_json::from_str(json)?)
}

pub fn parse_document_yaml(yaml: &str) -> SduiResult<SpecDocument> {
    document_from_value(serde_yaml::from_str(yaml)?)
}

fn document_from_value(value: Value) -> SduiResult<SpecDocument> {
    let is_full = value
        .as_object()
        .map(|obj| obj.contains_key("version") && obj.contains_key("root"))
        .unwrap_or(false);

    if is_full {
        let doc: UISpecification = serde_json::from_value(value)?;
        check_version(&doc.version, SUPPORTED_MAJOR)?;
        Ok(SpecDocument::Full(Box::new(doc)))
    } else {
        Ok(SpecDocument::Component(ComponentSpec::from_value(value)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("1.2.3"), Ok((1, 2, 3)));
        assert_eq!(parse_version("1"), Ok((1, 0, 0)));
        assert_eq!(parse_version("2.0"), Ok((2, 0, 0)));
        assert!(matches!(parse_version("v1"), Err(SduiError::InvalidVersion { .. })));
        assert!(matches!(parse_version("1.2.3.4"), Err(SduiError::InvalidVersion { .. })));
        assert!(matches!(parse_version(""), Err(SduiError::InvalidVersion { .. })));
    }

    #[test]
    fn test_unsupported_major_is_rejected() {
        let json = r#"{ "version": "2.0.0", "root": { "type": "Box" } }"#;
        assert!(matches!(
            parse_specification(json),
            Err(SduiError::UnsupportedVersion { supported: 1, .. })
        ));
    }

    #[test]
    fn test_parse_full_document() {
        let json = r##"{
            "version": "1.0.0",
            "metadata": { "title": "Settings", "tags": ["admin"] },
            "theme": { "mode": "light" },
            "state": { "initial": { "count": 1 } },
            "root": { "type": "Text", "children": "Hello" }
        }"##;
        let doc = parse_specification(json).unwrap();
        assert_eq!(doc.title(), Some("Settings"));
        assert_eq!(doc.initial_state().get("count"), Some(&json!(1)));
        assert_eq!(doc.root.component_type, "Text");
    }

    #[test]
    fn test_root_state_initial_is_merged() {
        let json = r#"{
            "version": "1.0.0",
            "state": { "initial": { "a": 1, "b": 1 } },
            "root": { "type": "Box", "state": { "initial": { "b": 2 } } }
        }"#;
        let state = parse_specification(json).unwrap().initial_state();
        assert_eq!(state.get("a"), Some(&json!(1)));
        assert_eq!(state.get("b"), Some(&json!(2)));
    }

    #[test]
    fn test_parse_document_detects_format() {
        let full = parse_document(r#"{ "version": "1", "root": { "type": "Box" } }"#).unwrap();
        assert!(full.is_full());

        let bare = parse_document(r#"{ "type": "Card", "children": [] }"#).unwrap();
        assert!(!bare.is_full());
        assert_eq!(bare.root_component().component_type, "Card");
        assert_eq!(bare.into_specification().version, "1.0.0");
    }

    #[test]
    fn test_yaml_document() {
        let yaml = "version: '1.0'\nroot:\n  type: Button\n  variant: outline\n  children: Save\n";
        let doc = parse_specification_yaml(yaml).unwrap();
        assert_eq!(doc.root.raw_props()["variant"], json!("outline"));
    }

    #[test]
    fn test_malformed_root_is_an_error() {
        assert!(parse_specification(r#"{ "version": "1.0.0", "root": { "children": [] } }"#).is_err());
        assert!(parse_component("[1, 2]").is_err());
        assert!(matches!(parse_component("{ not json"), Err(SduiError::Json(_))));
    }
}
