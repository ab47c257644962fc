//! # SDUI Engine
//!
//! Resolves server-driven UI specifications (JSON or YAML component trees)
//! into render trees of host elements.
//!
//! ## Features
//! - Open component registry with a sealed set of built-in components
//! - `{{state.path}}` bindings that keep native types for whole-value placeholders
//! - `when` guards: literal flags, bindings or small condition expressions
//! - `on<Event>Action` references bound against a caller-supplied handler map
//! - Theme tokens cascading through the tree, with per-node overrides
//! - Node-local failure: unknown or malformed nodes become fallback markers
//! - Static validation, safe HTML output and a dual-mode parity harness
//!
//! ## Example
//! ```ignore
//! use sdui_engine::{parse_specification, HandlerMap, Resolver};
//!
//! let doc = parse_specification(r#"{
//!   "version": "1.0.0",
//!   "state": { "initial": { "count": 3 } },
//!   "root": { "type": "Text", "children": "Count: {{state.count}}" }
//! }"#).expect("valid document");
//!
//! let state = doc.initial_state();
//! let handlers = HandlerMap::new();
//! let resolution = Resolver::default()
//!     .resolve_document(&doc, &state, &handlers)
//!     .expect("supported version");
//! assert_eq!(resolution.root.unwrap().text_content(), "Count: 3");
//! ```

pub mod actions;
pub mod binding;
pub mod components;
pub mod condition;
pub mod document;
pub mod error;
pub mod harness;
pub mod html;
pub mod node;
pub mod registry;
pub mod resolver;
pub mod sanitize;
pub mod spec;
pub mod state;
pub mod theme;
pub mod validator;

// --- Core types ---
pub use actions::{resolve_action, ActionDispatcher, Callback, Handler, HandlerMap};
pub use binding::{resolve_value, BindingCache, BindingPath, Template};
pub use condition::{evaluate_when, is_truthy, Condition};
pub use document::{
    parse_component, parse_document, parse_document_yaml, parse_specification,
    parse_specification_yaml, Metadata, SpecDocument, UISpecification, SUPPORTED_MAJOR,
};
pub use error::{SduiError, SduiResult};
pub use node::{Element, Fallback, Node, PropValue};
pub use registry::{ComponentKind, ComponentRegistry, Factory};
pub use resolver::{Diagnostic, RenderContext, Resolution, Resolver, ResolverConfig};
pub use sanitize::{sanitize, CleanProps, RawProps, ENGINE_RESERVED_KEYS};
pub use spec::{collect_action_names, Children, ComponentSpec, SpecNode, When};
pub use state::{StateSnapshot, StateStore};
pub use theme::{derive_theme, ColorMode, ThemeOverride, ThemeTokens};

// --- Render and test surfaces ---
pub use harness::{DualModeHarness, Observation, Step};
pub use html::{render_html, render_page};
pub use validator::{validate_component, validate_specification};

/// Resolve a bare component tree given as JSON against `state`, with the
/// built-in registry and no handlers.
pub fn resolve_json(json: &str, state: &StateSnapshot) -> SduiResult<Resolution> {
    let spec = parse_component(json)?;
    let handlers = HandlerMap::new();
    let ctx = RenderContext::new(state, &handlers);
    Ok(Resolver::default().resolve_with_diagnostics(&spec, &ctx))
}

/// Parse, validate, resolve and render a full JSON document to an HTML page,
/// seeding state from the document itself.
///
/// Unknown component types are not a validation error here; they render as
/// fallback markers like any other node-local failure.
pub fn render_to_html(json: &str) -> SduiResult<String> {
    let doc = parse_specification(json)?;
    let resolver = Resolver::default();
    validate_specification(&doc, None)?;
    let state = doc.initial_state();
    let handlers = HandlerMap::new().with_placeholders(collect_action_names(&doc.root));
    let resolution = resolver.resolve_document(&doc, &state, &handlers)?;
    Ok(render_page(&doc, &resolution))
}
