use crate::actions::{event_prop_name, is_action_key};
use crate::error::{SduiError, SduiResult};
use crate::theme::ThemeOverride;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

pub type Props = Map<String, Value>;

/// A declarative description of one UI node.
///
/// Props may be written flat on the node (`"variant": "outline"`) or under an
/// explicit `props` object; when both name the same key the explicit `props`
/// entry wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSpec {
    #[serde(rename = "type")]
    pub component_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<When>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Children>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<ThemeOverride>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub props: Props,

    #[serde(flatten)]
    pub extra: Props,
}

/// Render guard: a literal flag or an expression evaluated against state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum When {
    Flag(bool),
    Expr(String),
}

/// One entry of a `children` list.
///
/// A child that fails to decode as a component is kept as `Malformed` so the
/// failure stays local to that node instead of rejecting the whole document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpecNode {
    Component(Box<ComponentSpec>),
    Text(String),
    Malformed(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Children {
    Text(String),
    Many(Vec<SpecNode>),
    One(Box<SpecNode>),
}

impl ComponentSpec {
    pub fn new(component_type: impl Into<String>) -> Self {
        Self {
            component_type: component_type.into(),
            id: None,
            when: None,
            children: None,
            theme: None,
            props: Map::new(),
            extra: Map::new(),
        }
    }

    /// Decode a spec from an already-parsed JSON value.
    pub fn from_value(value: Value) -> SduiResult<Self> {
        let spec: ComponentSpec =
            serde_json::from_value(value).map_err(|e| SduiError::MalformedSpec {
                path: "root".to_string(),
                reason: e.to_string(),
            })?;
        if spec.component_type.trim().is_empty() {
            return Err(SduiError::MalformedSpec {
                path: "root".to_string(),
                reason: "'type' must be a non-empty string".to_string(),
            });
        }
        Ok(spec)
    }

    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    pub fn with_children(mut self, children: Vec<SpecNode>) -> Self {
        self.children = Some(Children::Many(children));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children = Some(Children::Text(text.into()));
        self
    }

    pub fn with_when(mut self, when: When) -> Self {
        self.when = Some(when);
        self
    }

    /// Flat props with the explicit `props` object merged over them.
    pub fn raw_props(&self) -> Props {
        let mut merged = self.extra.clone();
        for (key, value) in &self.props {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }

    pub fn prop(&self, key: &str) -> Option<&Value> {
        self.props.get(key).or_else(|| self.extra.get(key))
    }

    /// Explicit sibling key: a `key` prop, else the node id.
    pub fn explicit_key(&self) -> Option<String> {
        match self.prop("key") {
            Some(Value::String(key)) => Some(key.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => self.id.clone(),
        }
    }

    /// `(eventProp, actionName)` pairs for every `on<Event>Action` prop.
    pub fn action_refs(&self) -> Vec<(String, String)> {
        self.raw_props()
            .iter()
            .filter(|(key, _)| is_action_key(key))
            .filter_map(|(key, value)| {
                let event = event_prop_name(key)?;
                value.as_str().map(|name| (event.to_string(), name.to_string()))
            })
            .collect()
    }

    /// Child specs that decoded as components, in document order.
    pub fn child_specs(&self) -> Vec<&ComponentSpec> {
        match &self.children {
            Some(Children::Many(nodes)) => nodes.iter().filter_map(SpecNode::as_component).collect(),
            Some(Children::One(node)) => node.as_component().into_iter().collect(),
            _ => Vec::new(),
        }
    }

    /// Every action name referenced anywhere in this subtree, including
    /// component specs nested inside props.
    pub fn action_names(&self) -> BTreeSet<String> {
        collect_action_names(self)
    }
}

/// Every action name referenced in `spec`'s subtree.
pub fn collect_action_names(spec: &ComponentSpec) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    gather_actions(spec, &mut names);
    names
}

fn gather_actions(spec: &ComponentSpec, names: &mut BTreeSet<String>) {
    for (_, action) in spec.action_refs() {
        names.insert(action);
    }
    for value in spec.raw_props().values() {
        for nested in nested_specs(value) {
            gather_actions(&nested, names);
        }
    }
    for child in spec.child_specs() {
        gather_actions(child, names);
    }
}

/// Component specs embedded in a prop value: a single object with a string
/// `type`, or an array made only of such objects.
pub fn nested_specs(value: &Value) -> Vec<ComponentSpec> {
    match value {
        Value::Object(_) if looks_like_spec(value) => {
            ComponentSpec::from_value(value.clone()).into_iter().collect()
        }
        Value::Array(items) if !items.is_empty() && items.iter().all(looks_like_spec) => items
            .iter()
            .filter_map(|item| ComponentSpec::from_value(item.clone()).ok())
            .collect(),
        _ => Vec::new(),
    }
}

pub fn looks_like_spec(value: &Value) -> bool {
    value
        .as_object()
        .and_then(|obj| obj.get("type"))
        .map(Value::is_string)
        .unwrap_or(false)
}

impl SpecNode {
    pub fn as_component(&self) -> Option<&ComponentSpec> {
        match self {
            SpecNode::Component(spec) => Some(spec.as_ref()),
            _ => None,
        }
    }
}

impl From<ComponentSpec> for SpecNode {
    fn from(spec: ComponentSpec) -> Self {
        SpecNode::Component(Box::new(spec))
    }
}

impl From<&str> for SpecNode {
    fn from(text: &str) -> Self {
        SpecNode::Text(text.to_string())
    }
}
