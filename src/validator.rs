use crate::actions::is_action_key;
use crate::binding::Template;
use crate::condition::Condition;
use crate::document::{check_version, Metadata, UISpecification, SUPPORTED_MAJOR};
use crate::error::{SduiError, SduiResult};
use crate::registry::ComponentRegistry;
use crate::resolver::DEFAULT_MAX_DEPTH;
use crate::spec::{nested_specs, Children, ComponentSpec, SpecNode, When};
use serde_json::Value;
use std::collections::HashSet;

const MAX_TAGS: usize = 10;

/// Validate a whole document. When `registry` is given, every component type
/// must be registered in it.
pub fn validate_specification(
    doc: &UISpecification,
    registry: Option<&ComponentRegistry>,
) -> SduiResult<()> {
    check_version(&doc.version, SUPPORTED_MAJOR)?;
    if let Some(metadata) = &doc.metadata {
        validate_metadata(metadata)?;
    }
    validate_component_with_registry(&doc.root, registry)
}

/// Validate a component tree without checking types against a registry.
pub fn validate_component(spec: &ComponentSpec) -> SduiResult<()> {
    validate_component_with_registry(spec, None)
}

pub fn validate_component_with_registry(
    spec: &ComponentSpec,
    registry: Option<&ComponentRegistry>,
) -> SduiResult<()> {
    validate_id_uniqueness(spec)?;
    validate_component_recursive(spec, "root", 0, registry)
}

fn validate_metadata(metadata: &Metadata) -> SduiResult<()> {
    if let Some(tags) = &metadata.tags {
        if tags.len() > MAX_TAGS {
            return Err(SduiError::MalformedSpec {
                path: "metadata.tags".to_string(),
                reason: format!("at most {} tags are allowed", MAX_TAGS),
            });
        }
        for tag in tags {
            validate_tag(tag)?;
        }
    }
    Ok(())
}

/// Tags are lowercase, non-empty and have no spaces.
fn validate_tag(tag: &str) -> SduiResult<()> {
    if tag.is_empty() || tag.contains(' ') || tag != tag.to_lowercase() {
        return Err(SduiError::InvalidTag { tag: tag.to_string() });
    }
    Ok(())
}

/// Ids must be unique across the tree, including specs nested in props.
pub fn validate_id_uniqueness(spec: &ComponentSpec) -> SduiResult<()> {
    let mut seen = HashSet::new();
    collect_ids(spec, &mut seen)
}

fn collect_ids(spec: &ComponentSpec, seen: &mut HashSet<String>) -> SduiResult<()> {
    if let Some(id) = &spec.id {
        if !seen.insert(id.clone()) {
            return Err(SduiError::DuplicateId { id: id.clone() });
        }
    }
    for value in spec.raw_props().values() {
        for nested in nested_specs(value) {
            collect_ids(&nested, seen)?;
        }
    }
    for child in spec.child_specs() {
        collect_ids(child, seen)?;
    }
    Ok(())
}

fn validate_component_recursive(
    spec: &ComponentSpec,
    path: &str,
    depth: usize,
    registry: Option<&ComponentRegistry>,
) -> SduiResult<()> {
    if depth > DEFAULT_MAX_DEPTH {
        return Err(SduiError::MaxNestingDepthExceeded {
            max_depth: DEFAULT_MAX_DEPTH,
        });
    }

    if spec.component_type.trim().is_empty() {
        return Err(SduiError::MalformedSpec {
            path: path.to_string(),
            reason: "'type' must be a non-empty string".to_string(),
        });
    }

    if let Some(registry) = registry {
        registry.lookup(&spec.component_type)?;
    }

    if let Some(When::Expr(expr)) = &spec.when {
        validate_when(expr)?;
    }

    for (name, value) in spec.raw_props() {
        if is_action_key(&name) {
            validate_action(&name, &value)?;
            continue;
        }
        let nested = nested_specs(&value);
        if nested.is_empty() {
            validate_bindings(&value)?;
        }
        for (index, child) in nested.iter().enumerate() {
            let nested_path = format!("{path}.{name}[{index}]");
            validate_component_recursive(child, &nested_path, depth + 1, registry)?;
        }
    }

    validate_children(spec, path, depth, registry)
}

fn validate_children(
    spec: &ComponentSpec,
    path: &str,
    depth: usize,
    registry: Option<&ComponentRegistry>,
) -> SduiResult<()> {
    match &spec.children {
        None => Ok(()),
        Some(Children::Text(text)) => validate_template(text),
        Some(Children::One(node)) => {
            validate_node(node, &format!("{path}.children"), depth + 1, registry)
        }
        Some(Children::Many(nodes)) => {
            for (index, node) in nodes.iter().enumerate() {
                validate_node(node, &format!("{path}.children[{index}]"), depth + 1, registry)?;
            }
            Ok(())
        }
    }
}

fn validate_node(
    node: &SpecNode,
    path: &str,
    depth: usize,
    registry: Option<&ComponentRegistry>,
) -> SduiResult<()> {
    match node {
        SpecNode::Component(spec) => validate_component_recursive(spec, path, depth, registry),
        SpecNode::Text(text) => validate_template(text),
        // Skipped or rendered as literals by the resolver.
        SpecNode::Malformed(Value::Null | Value::Bool(_) | Value::Number(_)) => Ok(()),
        SpecNode::Malformed(value) => {
            let reason = match ComponentSpec::from_value(value.clone()) {
                Err(SduiError::MalformedSpec { reason, .. }) => reason,
                Err(other) => other.to_string(),
                Ok(_) => "child is not a component spec".to_string(),
            };
            Err(SduiError::MalformedSpec {
                path: path.to_string(),
                reason,
            })
        }
    }
}

fn validate_when(expr: &str) -> SduiResult<()> {
    if expr.contains("{{") {
        return validate_template(expr);
    }
    Condition::parse(expr).map(|_| ())
}

fn validate_action(property: &str, value: &Value) -> SduiResult<()> {
    match value.as_str() {
        Some(name) if !name.trim().is_empty() => Ok(()),
        _ => Err(SduiError::InvalidAction {
            property: property.to_string(),
            reason: "must name a handler with a non-empty string".to_string(),
        }),
    }
}

fn validate_bindings(value: &Value) -> SduiResult<()> {
    match value {
        Value::String(s) => validate_template(s),
        Value::Array(items) => items.iter().try_for_each(validate_bindings),
        Value::Object(map) => map.values().try_for_each(validate_bindings),
        _ => Ok(()),
    }
}

fn validate_template(source: &str) -> SduiResult<()> {
    if source.contains("{{") {
        Template::parse(source)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(value: Value) -> ComponentSpec {
        ComponentSpec::from_value(value).unwrap()
    }

    #[test]
    fn test_valid_tree() {
        let tree = spec(json!({
            "type": "Stack",
            "children": [
                { "type": "Heading", "level": 1, "children": "Hello {{state.user.name}}" },
                { "type": "Button", "when": "state.count > 0 && !state.busy", "onClickAction": "save" },
                { "type": "Text", "when": "{{state.visible}}", "children": "shown" }
            ]
        }));
        assert!(validate_component(&tree).is_ok());
        assert!(validate_component_with_registry(&tree, Some(&ComponentRegistry::with_builtins())).is_ok());
    }

    #[test]
    fn test_duplicate_ids() {
        let tree = spec(json!({
            "type": "Box",
            "children": [
                { "type": "Text", "id": "title" },
                { "type": "Card", "footer": { "type": "Text", "id": "title" } }
            ]
        }));
        assert_eq!(
            validate_component(&tree),
            Err(SduiError::DuplicateId { id: "title".to_string() })
        );
    }

    #[test]
    fn test_unknown_type_against_registry() {
        let tree = spec(json!({ "type": "Box", "children": [{ "type": "Marquee" }] }));
        assert!(validate_component(&tree).is_ok());
        assert!(matches!(
            validate_component_with_registry(&tree, Some(&ComponentRegistry::with_builtins())),
            Err(SduiError::UnknownComponentType { component }) if component == "Marquee"
        ));
    }

    #[test]
    fn test_bad_condition_and_binding() {
        let bad_when = spec(json!({ "type": "Text", "when": "state.count >" }));
        assert!(matches!(validate_component(&bad_when), Err(SduiError::InvalidCondition { .. })));

        let bad_binding = spec(json!({ "type": "Text", "title": "Hi {{state.name" }));
        assert!(matches!(validate_component(&bad_binding), Err(SduiError::InvalidBinding { .. })));
    }

    #[test]
    fn test_action_must_be_string() {
        let tree = spec(json!({ "type": "Button", "onClickAction": 42 }));
        assert!(matches!(
            validate_component(&tree),
            Err(SduiError::InvalidAction { property, .. }) if property == "onClickAction"
        ));
    }

    #[test]
    fn test_malformed_child_reports_path() {
        let tree = spec(json!({ "type": "Box", "children": [{ "type": "Text" }, { "kind": "Text" }] }));
        assert!(matches!(
            validate_component(&tree),
            Err(SduiError::MalformedSpec { path, .. }) if path == "root.children[1]"
        ));
    }

    #[test]
    fn test_depth_limit() {
        let mut nested = ComponentSpec::new("Text");
        for _ in 0..=DEFAULT_MAX_DEPTH {
            nested = ComponentSpec::new("Box").with_children(vec![nested.into()]);
        }
        assert!(matches!(
            validate_component(&nested),
            Err(SduiError::MaxNestingDepthExceeded { .. })
        ));
    }

    #[test]
    fn test_document_tags_and_version() {
        let mut doc = UISpecification::new("1.0.0", spec(json!({ "type": "Box" })));
        doc.metadata = Some(Metadata {
            tags: Some(vec!["Admin Panel".to_string()]),
            ..Metadata::default()
        });
        assert!(matches!(validate_specification(&doc, None), Err(SduiError::InvalidTag { .. })));

        doc.metadata = None;
        doc.version = "3.1.0".to_string();
        assert!(matches!(
            validate_specification(&doc, None),
            Err(SduiError::UnsupportedVersion { .. })
        ));
    }
}
