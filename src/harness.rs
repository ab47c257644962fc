//! Differential test harness for the two render paths.
//!
//! A [`DualModeHarness`] mounts the same UI twice: once from a hand-written
//! render function and once from a component spec through the [`Resolver`].
//! Each path gets its own [`StateStore`] and handler map. The harness replays
//! one interaction script against both and compares what a user could
//! observe after every step: visible text, accessible roles and names, the
//! attributes each host element ends up with, and host state.

use crate::actions::{Callback, HandlerMap};
use crate::error::{SduiError, SduiResult};
use crate::node::{Element, Node, PropValue};
use crate::resolver::{RenderContext, Resolver};
use crate::spec::ComponentSpec;
use crate::state::{StateSnapshot, StateStore};
use crate::theme::ThemeTokens;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub type RenderFn<'a> = Box<dyn Fn(&RenderContext<'_>) -> SduiResult<Option<Node>> + 'a>;
type HandlerFactory = Box<dyn Fn(&StateStore) -> HandlerMap>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessibleNode {
    pub role: String,
    pub name: String,
}

impl fmt::Display for AccessibleNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} \"{}\"", self.role, self.name)
    }
}

/// A host element as the page sees it: its tag and scalar attributes.
/// Callbacks, styles and nested nodes are left out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostElement {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
}

impl fmt::Display for HostElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.tag)?;
        for (name, value) in &self.attributes {
            write!(f, " {}=\"{}\"", name, value)?;
        }
        write!(f, ">")
    }
}

/// What a user (or assistive technology) can observe of a mounted UI.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub text: String,
    pub accessible: Vec<AccessibleNode>,
    pub elements: Vec<HostElement>,
    pub state: StateSnapshot,
}

impl Observation {
    pub fn of(tree: Option<&Node>, state: StateSnapshot) -> Self {
        Self {
            text: tree.map(visible_text).unwrap_or_default(),
            accessible: tree.map(accessibility_tree).unwrap_or_default(),
            elements: tree.map(host_elements).unwrap_or_default(),
            state,
        }
    }

    pub fn has_role(&self, role: &str, name: &str) -> bool {
        self.accessible.iter().any(|node| node.role == role && node.name == name)
    }

    /// First field that differs from `other`, described for a failure message.
    fn difference(&self, other: &Observation) -> Option<String> {
        if self.text != other.text {
            return Some(format!("visible text {:?} != {:?}", self.text, other.text));
        }
        if self.accessible != other.accessible {
            let left: Vec<String> = self.accessible.iter().map(ToString::to_string).collect();
            let right: Vec<String> = other.accessible.iter().map(ToString::to_string).collect();
            return Some(format!("accessible tree [{}] != [{}]", left.join(", "), right.join(", ")));
        }
        if let Some((left, right)) = self
            .elements
            .iter()
            .zip(&other.elements)
            .find(|(left, right)| left != right)
        {
            return Some(format!("host element {} != {}", left, right));
        }
        if self.elements.len() != other.elements.len() {
            return Some(format!(
                "{} host elements != {}",
                self.elements.len(),
                other.elements.len()
            ));
        }
        if self.state != other.state {
            return Some(format!(
                "state {} != {}",
                self.state.as_value(),
                other.state.as_value()
            ));
        }
        None
    }
}

/// Text content of the subtree with whitespace collapsed; element boundaries
/// count as whitespace.
pub fn visible_text(node: &Node) -> String {
    let mut pieces = Vec::new();
    node.walk(&mut |n| {
        if let Node::Literal(_) = n {
            pieces.push(n.text_content());
        }
    });
    collapse_whitespace(&pieces.join(" "))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Elements carrying an explicit or implicit ARIA role, in document order.
pub fn accessibility_tree(node: &Node) -> Vec<AccessibleNode> {
    let mut nodes = Vec::new();
    node.walk(&mut |n| {
        if let Node::Element(element) = n {
            if let Some(role) = role_of(element) {
                nodes.push(AccessibleNode {
                    role,
                    name: accessible_name(element),
                });
            }
        }
    });
    nodes
}

/// Every host element in document order with its scalar attributes.
pub fn host_elements(node: &Node) -> Vec<HostElement> {
    let mut elements = Vec::new();
    node.walk(&mut |n| {
        if let Node::Element(element) = n {
            let attributes = element
                .props
                .iter()
                .filter_map(|(name, value)| match value {
                    PropValue::Value(Value::String(s)) => Some((name.clone(), s.clone())),
                    PropValue::Value(v @ (Value::Number(_) | Value::Bool(_))) => Some((name.clone(), v.to_string())),
                    _ => None,
                })
                .collect();
            elements.push(HostElement {
                tag: element.tag.clone(),
                attributes,
            });
        }
    });
    elements
}

pub fn role_of(element: &Element) -> Option<String> {
    if let Some(role) = element.prop_str("role") {
        return Some(role.to_string());
    }
    let role = match element.tag.as_str() {
        "button" => "button",
        "a" => "link",
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => "heading",
        "img" => "img",
        "input" if element.prop_str("type") == Some("checkbox") => "checkbox",
        "input" | "textarea" => "textbox",
        "hr" => "separator",
        _ => return None,
    };
    Some(role.to_string())
}

pub fn accessible_name(element: &Element) -> String {
    ["aria-label", "alt", "placeholder"]
        .iter()
        .find_map(|key| element.prop_str(key))
        .map(collapse_whitespace)
        .unwrap_or_else(|| {
            let mut pieces = Vec::new();
            for child in &element.children {
                pieces.push(visible_text(child));
            }
            collapse_whitespace(&pieces.join(" "))
        })
}

/// One scripted interaction or assertion.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Click the element whose accessible name matches.
    Click(String),
    /// Fire `onChange` on the named element with `value`.
    Change { name: String, value: Value },
    ExpectText(String),
    ExpectNoText(String),
    ExpectRole { role: String, name: String },
    /// `path` is a dotted state path; a leading `state.` is optional.
    ExpectState { path: String, value: Value },
}

impl Step {
    pub fn click(name: impl Into<String>) -> Self {
        Step::Click(name.into())
    }

    pub fn change(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Step::Change {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn expect_text(text: impl Into<String>) -> Self {
        Step::ExpectText(text.into())
    }

    pub fn expect_no_text(text: impl Into<String>) -> Self {
        Step::ExpectNoText(text.into())
    }

    pub fn expect_role(role: impl Into<String>, name: impl Into<String>) -> Self {
        Step::ExpectRole {
            role: role.into(),
            name: name.into(),
        }
    }

    pub fn expect_state(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Step::ExpectState {
            path: path.into(),
            value: value.into(),
        }
    }

    /// Check an assertion step against `observation`. Interaction steps
    /// always pass.
    fn check(&self, step: usize, observation: &Observation) -> SduiResult<()> {
        let failure = match self {
            Step::Click(_) | Step::Change { .. } => None,
            Step::ExpectText(text) if !observation.text.contains(text.as_str()) => {
                Some(format!("expected text {:?} in {:?}", text, observation.text))
            }
            Step::ExpectNoText(text) if observation.text.contains(text.as_str()) => {
                Some(format!("did not expect text {:?}", text))
            }
            Step::ExpectRole { role, name } if !observation.has_role(role, name) => {
                Some(format!("no {} named {:?}", role, name))
            }
            Step::ExpectState { path, value } => {
                let path = path.strip_prefix("state.").unwrap_or(path);
                let actual = observation.state.get(path);
                if actual == Some(value) {
                    None
                } else {
                    Some(format!("state {} is {:?}, expected {}", path, actual, value))
                }
            }
            _ => None,
        };
        match failure {
            Some(message) => Err(SduiError::AssertionFailed { step, message }),
            None => Ok(()),
        }
    }
}

/// A UI mounted against its own state store.
pub struct Mounted<'a> {
    store: StateStore,
    handlers: HandlerMap,
    theme: ThemeTokens,
    render: RenderFn<'a>,
    tree: Option<Node>,
}

impl<'a> Mounted<'a> {
    pub fn new(
        store: StateStore,
        handlers: HandlerMap,
        theme: ThemeTokens,
        render: RenderFn<'a>,
    ) -> SduiResult<Self> {
        let mut mounted = Self {
            store,
            handlers,
            theme,
            render,
            tree: None,
        };
        mounted.rerender()?;
        Ok(mounted)
    }

    pub fn tree(&self) -> Option<&Node> {
        self.tree.as_ref()
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn rerender(&mut self) -> SduiResult<()> {
        let snapshot = self.store.snapshot();
        let ctx = RenderContext::new(&snapshot, &self.handlers).with_theme(self.theme.clone());
        self.tree = (self.render)(&ctx)?;
        Ok(())
    }

    pub fn observe(&self) -> Observation {
        Observation::of(self.tree.as_ref(), self.store.snapshot())
    }

    pub fn click(&mut self, name: &str) -> SduiResult<()> {
        let callback = self.find_callback("onClick", "button", name)?;
        callback.invoke(&[]);
        self.rerender()
    }

    pub fn change(&mut self, name: &str, value: Value) -> SduiResult<()> {
        let callback = self.find_callback("onChange", "textbox", name)?;
        callback.invoke(&[value]);
        self.rerender()
    }

    /// The `event` callback of the first element named `name`. The callback is
    /// cloned so it can run after the tree it came from is replaced.
    fn find_callback(&self, event: &str, role: &str, name: &str) -> SduiResult<Callback> {
        let mut found = None;
        if let Some(tree) = &self.tree {
            tree.walk(&mut |node| {
                if found.is_some() {
                    return;
                }
                if let Node::Element(element) = node {
                    if let Some(callback) = element.callback(event) {
                        if accessible_name(element) == name {
                            found = Some(callback.clone());
                        }
                    }
                }
            });
        }
        found.ok_or_else(|| SduiError::InteractionTarget {
            role: role.to_string(),
            name: name.to_string(),
        })
    }
}

impl fmt::Debug for Mounted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mounted")
            .field("store", &self.store)
            .field("handlers", &self.handlers)
            .field("tree", &self.tree)
            .finish()
    }
}

/// Observations recorded after mounting and after each step.
#[derive(Debug, Clone, PartialEq)]
pub struct ParityReport {
    pub observations: Vec<Observation>,
}

impl ParityReport {
    pub fn last(&self) -> Option<&Observation> {
        self.observations.last()
    }
}

pub struct DualModeHarness {
    resolver: Arc<Resolver>,
    spec: ComponentSpec,
    direct: RenderFn<'static>,
    initial: StateSnapshot,
    handlers: HandlerFactory,
    theme: ThemeTokens,
}

impl DualModeHarness {
    pub fn new(
        resolver: Arc<Resolver>,
        spec: ComponentSpec,
        direct: impl Fn(&RenderContext<'_>) -> SduiResult<Option<Node>> + 'static,
    ) -> Self {
        Self {
            resolver,
            spec,
            direct: Box::new(direct),
            initial: StateSnapshot::new(),
            handlers: Box::new(|_| HandlerMap::new()),
            theme: ThemeTokens::default(),
        }
    }

    pub fn with_state(mut self, initial: StateSnapshot) -> Self {
        self.initial = initial;
        self
    }

    /// Builds each path's handlers against that path's own store.
    pub fn with_handlers(mut self, handlers: impl Fn(&StateStore) -> HandlerMap + 'static) -> Self {
        self.handlers = Box::new(handlers);
        self
    }

    pub fn with_theme(mut self, theme: ThemeTokens) -> Self {
        self.theme = theme;
        self
    }

    pub fn mount_direct(&self) -> SduiResult<Mounted<'_>> {
        self.mount(Box::new(|ctx: &RenderContext<'_>| (self.direct)(ctx)))
    }

    pub fn mount_resolved(&self) -> SduiResult<Mounted<'_>> {
        let resolver = &self.resolver;
        let spec = &self.spec;
        self.mount(Box::new(
            move |ctx: &RenderContext<'_>| -> SduiResult<Option<Node>> { Ok(resolver.resolve(spec, ctx)) },
        ))
    }

    fn mount<'a>(&'a self, render: RenderFn<'a>) -> SduiResult<Mounted<'a>> {
        let store = StateStore::new(self.initial.clone());
        let handlers = (self.handlers)(&store);
        Mounted::new(store, handlers, self.theme.clone(), render)
    }

    /// Replay `steps` on both paths, failing at the first divergence or
    /// failed assertion.
    pub fn run(&self, steps: &[Step]) -> SduiResult<ParityReport> {
        let mut direct = self.mount_direct()?;
        let mut resolved = self.mount_resolved()?;
        let mut observations = vec![compare(0, &direct, &resolved)?];

        for (index, step) in steps.iter().enumerate() {
            let number = index + 1;
            match step {
                Step::Click(name) => {
                    direct.click(name)?;
                    resolved.click(name)?;
                }
                Step::Change { name, value } => {
                    direct.change(name, value.clone())?;
                    resolved.change(name, value.clone())?;
                }
                _ => {}
            }
            let observation = compare(number, &direct, &resolved)?;
            step.check(number, &observation)?;
            debug!(step = number, ?step, "parity step passed");
            observations.push(observation);
        }

        Ok(ParityReport { observations })
    }
}

impl fmt::Debug for DualModeHarness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DualModeHarness")
            .field("spec", &self.spec.component_type)
            .field("initial", &self.initial)
            .finish()
    }
}

fn compare(step: usize, direct: &Mounted<'_>, resolved: &Mounted<'_>) -> SduiResult<Observation> {
    let expected = direct.observe();
    let actual = resolved.observe();
    match expected.difference(&actual) {
        Some(detail) => Err(SduiError::ParityMismatch { step, detail }),
        None => Ok(expected),
    }
}
