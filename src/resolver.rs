use crate::actions::{event_prop_name, is_action_key, ActionDispatcher, HandlerMap};
use crate::binding::BindingCache;
use crate::condition::{evaluate_when, ConditionCache};
use crate::document::{check_version, UISpecification, SUPPORTED_MAJOR};
use crate::error::{SduiError, SduiResult};
use crate::node::{Node, PropValue};
use crate::registry::ComponentRegistry;
use crate::sanitize::{is_reserved, sanitize, RawProps};
use crate::spec::{looks_like_spec, Children, ComponentSpec, SpecNode};
use crate::state::StateSnapshot;
use crate::theme::{derive_theme, ThemeOverride, ThemeTokens};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

pub const DEFAULT_MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResolverConfig {
    /// Nodes nested deeper than this are replaced by a fallback.
    pub max_depth: usize,
    /// Emit fallback nodes for failures; when false, failed nodes are dropped.
    pub render_fallbacks: bool,
    /// Major document version accepted by [`Resolver::resolve_document`].
    pub supported_major: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            render_fallbacks: true,
            supported_major: SUPPORTED_MAJOR,
        }
    }
}

impl ResolverConfig {
    pub fn from_json(json: &str) -> SduiResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_yaml(yaml: &str) -> SduiResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}

/// Everything a render pass reads: state, handlers and the theme in effect.
#[derive(Debug, Clone)]
pub struct RenderContext<'a> {
    pub state: &'a StateSnapshot,
    pub handlers: &'a HandlerMap,
    pub theme: Arc<ThemeTokens>,
}

impl<'a> RenderContext<'a> {
    pub fn new(state: &'a StateSnapshot, handlers: &'a HandlerMap) -> Self {
        Self {
            state,
            handlers,
            theme: Arc::new(ThemeTokens::default()),
        }
    }

    pub fn with_theme(mut self, theme: ThemeTokens) -> Self {
        self.theme = Arc::new(theme);
        self
    }

    fn scoped(&self, patch: &ThemeOverride) -> Self {
        Self {
            state: self.state,
            handlers: self.handlers,
            theme: Arc::new(derive_theme(&self.theme, Some(patch))),
        }
    }
}

/// A node-local problem recorded during resolution. The pass itself always
/// completes.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    UnknownComponentType { component: String, path: String },
    MalformedSpec { path: String, reason: String },
    UnresolvedAction { action: String, path: String },
    InvalidCondition { path: String, error: SduiError },
    ComponentFailed { component: String, path: String, error: SduiError },
    DepthExceeded { path: String, max_depth: usize },
}

impl Diagnostic {
    pub fn path(&self) -> &str {
        match self {
            Diagnostic::UnknownComponentType { path, .. }
            | Diagnostic::MalformedSpec { path, .. }
            | Diagnostic::UnresolvedAction { path, .. }
            | Diagnostic::InvalidCondition { path, .. }
            | Diagnostic::ComponentFailed { path, .. }
            | Diagnostic::DepthExceeded { path, .. } => path,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UnknownComponentType { component, path } => {
                write!(f, "{path}: unknown component type '{component}'")
            }
            Diagnostic::MalformedSpec { path, reason } => write!(f, "{path}: malformed spec: {reason}"),
            Diagnostic::UnresolvedAction { action, path } => {
                write!(f, "{path}: no handler for action '{action}'")
            }
            Diagnostic::InvalidCondition { path, error } => write!(f, "{path}: {error}"),
            Diagnostic::ComponentFailed { component, path, error } => {
                write!(f, "{path}: component '{component}' failed: {error}")
            }
            Diagnostic::DepthExceeded { path, max_depth } => {
                write!(f, "{path}: nesting deeper than {max_depth}")
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    pub root: Option<Node>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Resolution {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn unknown_types(&self) -> Vec<&str> {
        self.diagnostics
            .iter()
            .filter_map(|d| match d {
                Diagnostic::UnknownComponentType { component, .. } => Some(component.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Turns component specs into render trees.
///
/// A resolver is immutable once built apart from its parse caches, so one
/// instance can serve many concurrent passes.
#[derive(Debug)]
pub struct Resolver {
    registry: Arc<ComponentRegistry>,
    config: ResolverConfig,
    bindings: BindingCache,
    conditions: ConditionCache,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new(ComponentRegistry::with_builtins())
    }
}

impl Resolver {
    pub fn new(registry: ComponentRegistry) -> Self {
        Self::with_config(registry, ResolverConfig::default())
    }

    pub fn with_config(registry: ComponentRegistry, config: ResolverConfig) -> Self {
        Self::shared(Arc::new(registry), config)
    }

    pub fn shared(registry: Arc<ComponentRegistry>, config: ResolverConfig) -> Self {
        Self {
            registry,
            config,
            bindings: BindingCache::new(),
            conditions: ConditionCache::new(),
        }
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve `spec` into a node, or `None` when its guard is false.
    pub fn resolve(&self, spec: &ComponentSpec, ctx: &RenderContext<'_>) -> Option<Node> {
        self.resolve_with_diagnostics(spec, ctx).root
    }

    pub fn resolve_with_diagnostics(&self, spec: &ComponentSpec, ctx: &RenderContext<'_>) -> Resolution {
        let mut pass = Pass {
            resolver: self,
            actions: ActionDispatcher::new(ctx.handlers),
            reported_types: HashSet::new(),
            diagnostics: Vec::new(),
        };
        let root = pass.resolve_component(spec, ctx, "root", 0, None);
        debug!(
            component = %spec.component_type,
            diagnostics = pass.diagnostics.len(),
            "resolution finished"
        );
        Resolution {
            root,
            diagnostics: pass.diagnostics,
        }
    }

    /// Check the document version, derive the root theme, and resolve its root.
    pub fn resolve_document(
        &self,
        doc: &UISpecification,
        state: &StateSnapshot,
        handlers: &HandlerMap,
    ) -> SduiResult<Resolution> {
        check_version(&doc.version, self.config.supported_major)?;
        let theme = derive_theme(&ThemeTokens::default(), doc.theme.as_ref());
        let ctx = RenderContext::new(state, handlers).with_theme(theme);
        Ok(self.resolve_with_diagnostics(&doc.root, &ctx))
    }
}

struct Pass<'r, 'h> {
    resolver: &'r Resolver,
    actions: ActionDispatcher<'h>,
    reported_types: HashSet<String>,
    diagnostics: Vec<Diagnostic>,
}

impl Pass<'_, '_> {
    fn resolve_component(
        &mut self,
        spec: &ComponentSpec,
        ctx: &RenderContext<'_>,
        path: &str,
        depth: usize,
        default_key: Option<String>,
    ) -> Option<Node> {
        // 1. guard
        match evaluate_when(
            spec.when.as_ref(),
            ctx.state,
            &self.resolver.bindings,
            &self.resolver.conditions,
        ) {
            Ok(true) => {}
            Ok(false) => return None,
            Err(error) => {
                warn!(path, error = %error, "guard failed to parse; node not rendered");
                self.diagnostics.push(Diagnostic::InvalidCondition {
                    path: path.to_string(),
                    error,
                });
                return None;
            }
        }

        let max_depth = self.resolver.config.max_depth;
        if depth > max_depth {
            warn!(path, max_depth, "maximum nesting depth exceeded");
            self.diagnostics.push(Diagnostic::DepthExceeded {
                path: path.to_string(),
                max_depth,
            });
            let reason = SduiError::MaxNestingDepthExceeded { max_depth }.to_string();
            return self.fallback(&spec.component_type, reason, default_key);
        }

        if spec.component_type.trim().is_empty() {
            return self.malformed(path, "'type' must be a non-empty string", default_key);
        }

        let scoped;
        let ctx = match &spec.theme {
            Some(patch) => {
                scoped = ctx.scoped(patch);
                &scoped
            }
            None => ctx,
        };
        let key = spec.explicit_key().or(default_key);

        // 2-3. props and actions
        let mut raw: RawProps<PropValue> = RawProps::new();
        if let Some(id) = &spec.id {
            raw.insert("id", PropValue::from(id.as_str()));
        }
        for (name, value) in spec.raw_props() {
            if name == "key" {
                continue;
            }
            if is_action_key(&name) {
                self.bind_action(&mut raw, &name, &value, path);
                continue;
            }
            if is_reserved(&name) {
                raw.insert(name, PropValue::Value(value));
                continue;
            }
            if let Some(resolved) = self.resolve_prop(&name, &value, ctx, path, depth) {
                raw.insert(name, resolved);
            }
        }

        // 4. sanitize
        let props = sanitize(raw, &spec.component_type);

        // 5. children
        let children = self.resolve_children(spec, ctx, path, depth);

        // 6. registry
        let factory = match self.resolver.registry.lookup(&spec.component_type) {
            Ok(factory) => Arc::clone(factory),
            Err(_) => {
                if self.reported_types.insert(spec.component_type.clone()) {
                    warn!(component = %spec.component_type, path, "unknown component type");
                    self.diagnostics.push(Diagnostic::UnknownComponentType {
                        component: spec.component_type.clone(),
                        path: path.to_string(),
                    });
                }
                return self.fallback(&spec.component_type, "unknown component type".to_string(), key);
            }
        };

        // 7. instantiate
        match factory(props, children, ctx.theme.as_ref()) {
            Ok(node) => Some(node.with_default_key(key)),
            Err(error) => {
                warn!(component = %spec.component_type, path, error = %error, "component failed to build");
                let reason = error.to_string();
                self.diagnostics.push(Diagnostic::ComponentFailed {
                    component: spec.component_type.clone(),
                    path: path.to_string(),
                    error,
                });
                self.fallback(&spec.component_type, reason, key)
            }
        }
    }

    fn bind_action(&mut self, raw: &mut RawProps<PropValue>, name: &str, value: &Value, path: &str) {
        match (event_prop_name(name), value.as_str()) {
            (Some(event), Some(action)) if !action.trim().is_empty() => {
                if self.actions.is_first_miss(action) {
                    self.diagnostics.push(Diagnostic::UnresolvedAction {
                        action: action.to_string(),
                        path: format!("{path}.{name}"),
                    });
                }
                raw.insert(event, PropValue::Callback(self.actions.resolve(action)));
            }
            _ => {
                warn!(path, prop = name, "action reference must be a non-empty string");
                self.diagnostics.push(Diagnostic::MalformedSpec {
                    path: format!("{path}.{name}"),
                    reason: "action reference must be a non-empty string".to_string(),
                });
            }
        }
    }

    fn resolve_prop(
        &mut self,
        name: &str,
        value: &Value,
        ctx: &RenderContext<'_>,
        path: &str,
        depth: usize,
    ) -> Option<PropValue> {
        match value {
            Value::Object(_) if looks_like_spec(value) => {
                let prop_path = format!("{path}.{name}");
                self.resolve_value_node(value, ctx, &prop_path, depth + 1, None)
                    .map(|node| PropValue::Node(Box::new(node)))
            }
            Value::Array(items) if !items.is_empty() && items.iter().all(looks_like_spec) => {
                let nodes = items
                    .iter()
                    .enumerate()
                    .filter_map(|(index, item)| {
                        let item_path = format!("{path}.{name}[{index}]");
                        self.resolve_value_node(item, ctx, &item_path, depth + 1, Some(format!("{name}-{index}")))
                    })
                    .collect();
                Some(PropValue::Nodes(nodes))
            }
            other => self.resolve_plain(other, ctx).map(PropValue::Value),
        }
    }

    fn resolve_value_node(
        &mut self,
        value: &Value,
        ctx: &RenderContext<'_>,
        path: &str,
        depth: usize,
        default_key: Option<String>,
    ) -> Option<Node> {
        match ComponentSpec::from_value(value.clone()) {
            Ok(spec) => self.resolve_component(&spec, ctx, path, depth, default_key),
            Err(SduiError::MalformedSpec { reason, .. }) => self.malformed(path, &reason, default_key),
            Err(other) => self.malformed(path, &other.to_string(), default_key),
        }
    }

    /// Bindings and theme references inside plain prop values. `None` when a
    /// single binding or theme reference does not resolve.
    fn resolve_plain(&self, value: &Value, ctx: &RenderContext<'_>) -> Option<Value> {
        match value {
            Value::String(s) if ThemeTokens::is_theme_reference(s) => {
                let resolved = ctx.theme.resolve(s);
                if resolved.is_none() {
                    debug!(reference = %s, "unknown theme reference");
                }
                resolved.map(Value::String)
            }
            Value::String(s) => self.resolver.bindings.template(s).resolve(ctx.state),
            Value::Array(items) => Some(Value::Array(
                items
                    .iter()
                    .map(|item| self.resolve_plain(item, ctx).unwrap_or(Value::Null))
                    .collect(),
            )),
            Value::Object(map) => Some(Value::Object(
                map.iter()
                    .filter_map(|(k, v)| self.resolve_plain(v, ctx).map(|r| (k.clone(), r)))
                    .collect(),
            )),
            other => Some(other.clone()),
        }
    }

    fn resolve_children(
        &mut self,
        spec: &ComponentSpec,
        ctx: &RenderContext<'_>,
        path: &str,
        depth: usize,
    ) -> Vec<Node> {
        let child_key = |index: usize| Some(format!("{}-child-{}", spec.component_type, index));
        match &spec.children {
            None => Vec::new(),
            Some(Children::Text(text)) => self.resolve_text(text, ctx).into_iter().collect(),
            Some(Children::One(node)) => {
                let child_path = format!("{path}.children");
                self.resolve_node(node, ctx, &child_path, depth + 1, child_key(0))
                    .into_iter()
                    .collect()
            }
            Some(Children::Many(nodes)) => nodes
                .iter()
                .enumerate()
                .filter_map(|(index, node)| {
                    let child_path = format!("{path}.children[{index}]");
                    self.resolve_node(node, ctx, &child_path, depth + 1, child_key(index))
                })
                .collect(),
        }
    }

    fn resolve_node(
        &mut self,
        node: &SpecNode,
        ctx: &RenderContext<'_>,
        path: &str,
        depth: usize,
        default_key: Option<String>,
    ) -> Option<Node> {
        match node {
            SpecNode::Component(spec) => self.resolve_component(spec, ctx, path, depth, default_key),
            SpecNode::Text(text) => self.resolve_text(text, ctx),
            SpecNode::Malformed(Value::Null) | SpecNode::Malformed(Value::Bool(_)) => None,
            SpecNode::Malformed(number @ Value::Number(_)) => Some(Node::Literal(number.clone())),
            SpecNode::Malformed(value) => self.resolve_value_node(value, ctx, path, depth, default_key),
        }
    }

    fn resolve_text(&self, text: &str, ctx: &RenderContext<'_>) -> Option<Node> {
        match self.resolve_plain(&Value::String(text.to_string()), ctx) {
            None | Some(Value::Null) => None,
            Some(value) => Some(Node::Literal(value)),
        }
    }

    fn malformed(&mut self, path: &str, reason: &str, key: Option<String>) -> Option<Node> {
        warn!(path, reason, "malformed component spec");
        self.diagnostics.push(Diagnostic::MalformedSpec {
            path: path.to_string(),
            reason: reason.to_string(),
        });
        self.fallback("unknown", format!("malformed spec: {reason}"), key)
    }

    fn fallback(&self, component_type: &str, reason: String, key: Option<String>) -> Option<Node> {
        if !self.resolver.config.render_fallbacks {
            return None;
        }
        Some(Node::fallback(component_type, reason).with_default_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Element;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn spec(value: Value) -> ComponentSpec {
        ComponentSpec::from_value(value).unwrap()
    }

    fn resolve(value: Value, state: Value) -> Resolution {
        let state = StateSnapshot::from_value(state);
        let handlers = HandlerMap::new();
        let ctx = RenderContext::new(&state, &handlers);
        Resolver::default().resolve_with_diagnostics(&spec(value), &ctx)
    }

    fn root_element(resolution: &Resolution) -> &Element {
        resolution.root.as_ref().and_then(Node::as_element).expect("root element")
    }

    #[test]
    fn test_false_guard_yields_nothing() {
        let resolution = resolve(json!({ "type": "Text", "when": "count > 5", "children": "x" }), json!({ "count": 1 }));
        assert_eq!(resolution.root, None);
        assert!(resolution.is_clean());
    }

    #[test]
    fn test_malformed_guard_is_reported() {
        let resolution = resolve(json!({ "type": "Text", "when": "count >" }), json!({}));
        assert_eq!(resolution.root, None);
        assert!(matches!(resolution.diagnostics[0], Diagnostic::InvalidCondition { .. }));
    }

    #[test]
    fn test_props_bind_and_missing_bindings_are_omitted() {
        let resolution = resolve(
            json!({
                "type": "Input",
                "inputType": "email",
                "placeholder": "{{state.hint}}",
                "value": "{{state.missing}}",
                "maxLength": 20
            }),
            json!({ "hint": "you@example.com" }),
        );
        let input = root_element(&resolution);
        assert_eq!(input.prop_str("type"), Some("email"));
        assert_eq!(input.prop_str("placeholder"), Some("you@example.com"));
        assert_eq!(input.prop_value("maxLength"), Some(&json!(20)));
        assert!(input.prop("value").is_none());
        assert!(input.prop("inputType").is_none());
    }

    #[test]
    fn test_theme_reference_and_node_override() {
        let resolution = resolve(
            json!({
                "type": "Box",
                "theme": { "dark": { "primary": "#ff0000" } },
                "style": { "color": "$theme.colors.primary" },
                "children": [{ "type": "Text", "color": "$theme.colors.primary" }]
            }),
            json!({}),
        );
        let root = root_element(&resolution);
        assert_eq!(root.prop_value("style"), Some(&json!({ "color": "#ff0000" })));
        let text = root.children[0].as_element().unwrap();
        assert_eq!(text.prop_str("color"), Some("#ff0000"));
        assert!(root.prop("theme").is_none());
    }

    #[test]
    fn test_nested_spec_in_prop_becomes_node() {
        let resolution = resolve(
            json!({
                "type": "Button",
                "icon": { "type": "Icon", "name": "plus" },
                "children": "Add"
            }),
            json!({}),
        );
        let button = root_element(&resolution);
        assert_eq!(button.children.len(), 2);
        assert_eq!(button.children[0].as_element().map(|e| e.kind.as_str()), Some("Icon"));
    }

    #[test]
    fn test_child_keys() {
        let resolution = resolve(
            json!({
                "type": "Stack",
                "children": [
                    { "type": "Text", "children": "a" },
                    { "type": "Text", "id": "second", "children": "b" },
                    { "type": "Text", "key": "third", "id": "ignored", "children": "c" }
                ]
            }),
            json!({}),
        );
        let keys: Vec<Option<&str>> = root_element(&resolution).children.iter().map(Node::key).collect();
        assert_eq!(keys, vec![Some("Stack-child-0"), Some("second"), Some("third")]);
    }

    #[test]
    fn test_unknown_type_reported_once_per_type() {
        let resolution = resolve(
            json!({
                "type": "Box",
                "children": [{ "type": "Marquee" }, { "type": "Marquee" }]
            }),
            json!({}),
        );
        let root = root_element(&resolution);
        assert!(root.children.iter().all(Node::is_fallback));
        assert_eq!(resolution.unknown_types(), vec!["Marquee"]);
    }

    #[test]
    fn test_factory_error_is_contained() {
        let resolution = resolve(
            json!({
                "type": "Box",
                "children": [{ "type": "Heading", "level": 12 }, { "type": "Text", "children": "ok" }]
            }),
            json!({}),
        );
        let root = root_element(&resolution);
        assert!(root.children[0].is_fallback());
        assert_eq!(root.children[1].text_content(), "ok");
        assert!(matches!(resolution.diagnostics[0], Diagnostic::ComponentFailed { .. }));
    }

    #[test]
    fn test_depth_limit() {
        let mut nested = json!({ "type": "Text", "children": "deep" });
        for _ in 0..5 {
            nested = json!({ "type": "Box", "children": [nested] });
        }
        let state = StateSnapshot::new();
        let handlers = HandlerMap::new();
        let ctx = RenderContext::new(&state, &handlers);
        let config = ResolverConfig {
            max_depth: 3,
            ..ResolverConfig::default()
        };
        let resolver = Resolver::with_config(ComponentRegistry::with_builtins(), config);
        let resolution = resolver.resolve_with_diagnostics(&spec(nested), &ctx);

        assert!(resolution.root.is_some());
        assert!(matches!(
            resolution.diagnostics.as_slice(),
            [Diagnostic::DepthExceeded { max_depth: 3, .. }]
        ));
    }

    #[test]
    fn test_guard_is_checked_before_depth() {
        let mut nested = json!({ "type": "Text", "when": false, "children": "hidden" });
        for _ in 0..5 {
            nested = json!({ "type": "Box", "children": [nested] });
        }
        let state = StateSnapshot::new();
        let handlers = HandlerMap::new();
        let ctx = RenderContext::new(&state, &handlers);
        let config = ResolverConfig {
            max_depth: 4,
            ..ResolverConfig::default()
        };
        let resolver = Resolver::with_config(ComponentRegistry::with_builtins(), config);
        let resolution = resolver.resolve_with_diagnostics(&spec(nested), &ctx);

        // The guarded Text sits at depth 5, past the limit.
        assert!(resolution.is_clean());
        assert!(resolution.root.unwrap().fallbacks().is_empty());
    }

    #[test]
    fn test_fallbacks_can_be_disabled() {
        let state = StateSnapshot::new();
        let handlers = HandlerMap::new();
        let ctx = RenderContext::new(&state, &handlers);
        let config = ResolverConfig {
            render_fallbacks: false,
            ..ResolverConfig::default()
        };
        let resolver = Resolver::with_config(ComponentRegistry::with_builtins(), config);
        let tree = resolver
            .resolve(&spec(json!({ "type": "Box", "children": [{ "type": "Marquee" }] })), &ctx)
            .unwrap();
        assert!(tree.as_element().unwrap().children.is_empty());
    }

    #[test]
    fn test_config_from_json_uses_defaults() {
        let config = ResolverConfig::from_json(r#"{ "maxDepth": 8 }"#).unwrap();
        assert_eq!(config.max_depth, 8);
        assert!(config.render_fallbacks);
        assert_eq!(config.supported_major, SUPPORTED_MAJOR);
    }
}
