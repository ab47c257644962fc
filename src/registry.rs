use crate::components;
use crate::error::{SduiError, SduiResult};
use crate::node::{Node, PropValue};
use crate::sanitize::CleanProps;
use crate::theme::ThemeTokens;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Builds a node from sanitized props, resolved children and the subtree theme.
pub type Factory =
    Arc<dyn Fn(CleanProps<PropValue>, Vec<Node>, &ThemeTokens) -> SduiResult<Node> + Send + Sync>;

/// Components that ship with the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Box,
    Container,
    Flex,
    Grid,
    Stack,
    Text,
    Heading,
    Button,
    Input,
    Textarea,
    Label,
    Link,
    Card,
    Badge,
    Image,
    Icon,
    Separator,
    Dialog,
    DialogTrigger,
    DialogContent,
    DialogHeader,
    DialogFooter,
    DialogTitle,
    DialogDescription,
    DialogClose,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 25] = [
        ComponentKind::Box,
        ComponentKind::Container,
        ComponentKind::Flex,
        ComponentKind::Grid,
        ComponentKind::Stack,
        ComponentKind::Text,
        ComponentKind::Heading,
        ComponentKind::Button,
        ComponentKind::Input,
        ComponentKind::Textarea,
        ComponentKind::Label,
        ComponentKind::Link,
        ComponentKind::Card,
        ComponentKind::Badge,
        ComponentKind::Image,
        ComponentKind::Icon,
        ComponentKind::Separator,
        ComponentKind::Dialog,
        ComponentKind::DialogTrigger,
        ComponentKind::DialogContent,
        ComponentKind::DialogHeader,
        ComponentKind::DialogFooter,
        ComponentKind::DialogTitle,
        ComponentKind::DialogDescription,
        ComponentKind::DialogClose,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Box => "Box",
            ComponentKind::Container => "Container",
            ComponentKind::Flex => "Flex",
            ComponentKind::Grid => "Grid",
            ComponentKind::Stack => "Stack",
            ComponentKind::Text => "Text",
            ComponentKind::Heading => "Heading",
            ComponentKind::Button => "Button",
            ComponentKind::Input => "Input",
            ComponentKind::Textarea => "Textarea",
            ComponentKind::Label => "Label",
            ComponentKind::Link => "Link",
            ComponentKind::Card => "Card",
            ComponentKind::Badge => "Badge",
            ComponentKind::Image => "Image",
            ComponentKind::Icon => "Icon",
            ComponentKind::Separator => "Separator",
            ComponentKind::Dialog => "Dialog",
            ComponentKind::DialogTrigger => "DialogTrigger",
            ComponentKind::DialogContent => "DialogContent",
            ComponentKind::DialogHeader => "DialogHeader",
            ComponentKind::DialogFooter => "DialogFooter",
            ComponentKind::DialogTitle => "DialogTitle",
            ComponentKind::DialogDescription => "DialogDescription",
            ComponentKind::DialogClose => "DialogClose",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.as_str() == name)
    }

    /// Default host tag; some components pick another from their props.
    pub fn host_tag(&self) -> &'static str {
        match self {
            ComponentKind::Text | ComponentKind::DialogDescription => "p",
            ComponentKind::Heading | ComponentKind::DialogTitle => "h2",
            ComponentKind::Button | ComponentKind::DialogClose => "button",
            ComponentKind::Input => "input",
            ComponentKind::Textarea => "textarea",
            ComponentKind::Label => "label",
            ComponentKind::Link => "a",
            ComponentKind::Badge | ComponentKind::Icon => "span",
            ComponentKind::Image => "img",
            ComponentKind::Separator => "hr",
            _ => "div",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps component type names to factories. Populated at startup and read-only
/// during resolution.
#[derive(Clone, Default)]
pub struct ComponentRegistry {
    factories: HashMap<String, Factory>,
}

impl ComponentRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in component.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for kind in ComponentKind::ALL {
            registry.register(kind.as_str(), move |props, children, theme| {
                components::create(kind, props, children, theme)
            });
        }
        registry
    }

    /// Register or replace the factory for `type_name`, returning the previous one.
    pub fn register<F>(&mut self, type_name: impl Into<String>, factory: F) -> Option<Factory>
    where
        F: Fn(CleanProps<PropValue>, Vec<Node>, &ThemeTokens) -> SduiResult<Node> + Send + Sync + 'static,
    {
        let type_name = type_name.into();
        let previous = self.factories.insert(type_name.clone(), Arc::new(factory));
        if previous.is_some() {
            warn!(component = %type_name, "replaced component factory");
        }
        previous
    }

    pub fn lookup(&self, type_name: &str) -> SduiResult<&Factory> {
        self.factories
            .get(type_name)
            .ok_or_else(|| SduiError::UnknownComponentType {
                component: type_name.to_string(),
            })
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("types", &self.type_names())
            .finish()
    }
}
