use crate::actions::Callback;
use crate::binding::display_value;
use crate::sanitize::CleanProps;
use serde_json::Value;

/// A resolved prop. Specs nested inside props become nodes; `on<Event>Action`
/// references become callbacks.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Value(Value),
    Node(Box<Node>),
    Nodes(Vec<Node>),
    Callback(Callback),
}

impl PropValue {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            PropValue::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_value().and_then(Value::as_str)
    }

    pub fn as_callback(&self) -> Option<&Callback> {
        match self {
            PropValue::Callback(callback) => Some(callback),
            _ => None,
        }
    }
}

impl From<Value> for PropValue {
    fn from(value: Value) -> Self {
        PropValue::Value(value)
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Value(Value::String(value.to_string()))
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Value(Value::String(value))
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Value(Value::Bool(value))
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        PropValue::Value(Value::from(value))
    }
}

impl From<Callback> for PropValue {
    fn from(callback: Callback) -> Self {
        PropValue::Callback(callback)
    }
}

impl From<Node> for PropValue {
    fn from(node: Node) -> Self {
        PropValue::Node(Box::new(node))
    }
}

/// A host element produced by a component factory.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Component type name, e.g. `Button`.
    pub kind: String,
    /// Host tag, e.g. `button`.
    pub tag: String,
    pub key: Option<String>,
    pub props: CleanProps<PropValue>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(kind: impl Into<String>, tag: impl Into<String>, props: CleanProps<PropValue>, children: Vec<Node>) -> Self {
        Self {
            kind: kind.into(),
            tag: tag.into(),
            key: None,
            props,
            children,
        }
    }

    pub fn prop(&self, key: &str) -> Option<&PropValue> {
        self.props.get(key)
    }

    pub fn prop_value(&self, key: &str) -> Option<&Value> {
        self.prop(key).and_then(PropValue::as_value)
    }

    pub fn prop_str(&self, key: &str) -> Option<&str> {
        self.prop(key).and_then(PropValue::as_str)
    }

    pub fn callback(&self, key: &str) -> Option<&Callback> {
        self.prop(key).and_then(PropValue::as_callback)
    }
}

/// Placeholder rendered in place of a node that could not be built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fallback {
    pub component_type: String,
    pub reason: String,
    pub key: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    /// Text or scalar content.
    Literal(Value),
    Fallback(Fallback),
}

impl Node {
    pub fn text(text: impl Into<String>) -> Self {
        Node::Literal(Value::String(text.into()))
    }

    pub fn fallback(component_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Node::Fallback(Fallback {
            component_type: component_type.into(),
            reason: reason.into(),
            key: None,
        })
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn key(&self) -> Option<&str> {
        match self {
            Node::Element(element) => element.key.as_deref(),
            Node::Fallback(fallback) => fallback.key.as_deref(),
            Node::Literal(_) => None,
        }
    }

    /// Set the sibling key unless the node already carries one.
    pub fn with_default_key(mut self, key: Option<String>) -> Self {
        match &mut self {
            Node::Element(element) if element.key.is_none() => element.key = key,
            Node::Fallback(fallback) if fallback.key.is_none() => fallback.key = key,
            _ => {}
        }
        self
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Node::Fallback(_))
    }

    /// Concatenated text of this subtree.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            Node::Literal(value) => out.push_str(&display_value(value)),
            Node::Element(element) => {
                for child in &element.children {
                    child.collect_text(out);
                }
            }
            Node::Fallback(_) => {}
        }
    }

    /// Pre-order walk over this node and every descendant.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Node)) {
        visit(self);
        if let Node::Element(element) = self {
            for child in &element.children {
                child.walk(visit);
            }
        }
    }

    pub fn fallbacks(&self) -> Vec<&Fallback> {
        let mut found = Vec::new();
        self.walk(&mut |node| {
            if let Node::Fallback(fallback) = node {
                found.push(fallback);
            }
        });
        found
    }

    /// First element of the given component type, in document order.
    pub fn find_kind(&self, kind: &str) -> Option<&Element> {
        let mut found = None;
        self.walk(&mut |node| {
            if found.is_none() {
                if let Node::Element(element) = node {
                    if element.kind == kind {
                        found = Some(element);
                    }
                }
            }
        });
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sanitize::{sanitize, RawProps};
    use serde_json::json;

    fn element(kind: &str, children: Vec<Node>) -> Node {
        Node::Element(Element::new(kind, "div", sanitize(RawProps::new(), kind), children))
    }

    #[test]
    fn test_text_content_concatenates_in_order() {
        let tree = element(
            "Box",
            vec![
                Node::text("Count: "),
                Node::Literal(json!(3)),
                element("Box", vec![Node::text("!")]),
                Node::fallback("Mystery", "unknown"),
            ],
        );
        assert_eq!(tree.text_content(), "Count: 3!");
    }

    #[test]
    fn test_default_key_does_not_override() {
        let keyed = element("Box", vec![]).with_default_key(Some("a".into()));
        assert_eq!(keyed.key(), Some("a"));
        let kept = keyed.with_default_key(Some("b".into()));
        assert_eq!(kept.key(), Some("a"));
        assert_eq!(Node::text("x").with_default_key(Some("c".into())).key(), None);
    }

    #[test]
    fn test_find_kind_and_fallbacks() {
        let tree = element(
            "Box",
            vec![
                element("Card", vec![Node::fallback("Nope", "unknown")]),
                element("Card", vec![]),
            ],
        );
        assert!(tree.find_kind("Card").is_some());
        assert!(tree.find_kind("Dialog").is_none());
        assert_eq!(tree.fallbacks().len(), 1);
    }
}
