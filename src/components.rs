//! Built-in component factories.
//!
//! The resolver reaches these through the registry; code that builds a tree
//! by hand calls [`build`] or [`create`] directly. Both paths therefore run the
//! same construction logic.

use crate::actions::Callback;
use crate::condition::is_truthy;
use crate::error::{SduiError, SduiResult};
use crate::node::{Element, Node, PropValue};
use crate::registry::ComponentKind;
use crate::sanitize::{sanitize, CleanProps, RawProps};
use crate::theme::ThemeTokens;
use serde_json::{Map, Value};

/// Tags a `Box` may render as through its `element` prop.
pub const BOX_ELEMENTS: &[&str] = &[
    "div", "section", "article", "aside", "header", "footer", "main", "nav", "form", "span", "ul",
    "ol", "li",
];

/// Sanitize `raw` for `type_name` and construct the built-in component.
pub fn build(
    type_name: &str,
    raw: RawProps<PropValue>,
    children: Vec<Node>,
    theme: &ThemeTokens,
) -> SduiResult<Node> {
    let kind = ComponentKind::from_name(type_name).ok_or_else(|| SduiError::UnknownComponentType {
        component: type_name.to_string(),
    })?;
    create(kind, sanitize(raw, type_name), children, theme)
}

pub fn create(
    kind: ComponentKind,
    mut props: CleanProps<PropValue>,
    children: Vec<Node>,
    theme: &ThemeTokens,
) -> SduiResult<Node> {
    let mut tag = kind.host_tag().to_string();

    match kind {
        ComponentKind::Box => {
            if let Some(requested) = props.remove("element") {
                tag = box_element(&requested)?;
            }
        }
        ComponentKind::Flex | ComponentKind::Stack => {
            let default_direction = if kind == ComponentKind::Stack { "column" } else { "row" };
            let direction = take_string(&mut props, "direction").unwrap_or_else(|| default_direction.to_string());
            let mut style = vec![
                ("display", Value::from("flex")),
                ("flexDirection", Value::from(direction)),
            ];
            if let Some(gap) = props.remove("gap").and_then(|p| p.as_value().cloned()) {
                style.push(("gap", css_length(gap)));
            }
            if let Some(align) = take_string(&mut props, "align") {
                style.push(("alignItems", Value::from(align)));
            }
            if let Some(justify) = take_string(&mut props, "justify") {
                style.push(("justifyContent", Value::from(justify)));
            }
            merge_style(&mut props, style);
        }
        ComponentKind::Grid => {
            let mut style = vec![("display", Value::from("grid"))];
            if let Some(columns) = props.remove("columns").and_then(|p| p.as_value().and_then(Value::as_u64)) {
                style.push((
                    "gridTemplateColumns",
                    Value::from(format!("repeat({}, minmax(0, 1fr))", columns)),
                ));
            }
            if let Some(gap) = props.remove("gap").and_then(|p| p.as_value().cloned()) {
                style.push(("gap", css_length(gap)));
            }
            merge_style(&mut props, style);
        }
        ComponentKind::Heading => {
            let level = match props.remove("level") {
                None => 2,
                Some(value) => heading_level(&value)?,
            };
            tag = format!("h{}", level);
        }
        ComponentKind::Button => {
            if !props.contains_key("type") {
                props.insert("type", PropValue::from("button"));
            }
            merge_style(&mut props, vec![("borderRadius", Value::from(theme.radius.clone()))]);
        }
        ComponentKind::Input => {
            if !props.contains_key("type") {
                props.insert("type", PropValue::from("text"));
            }
        }
        ComponentKind::Image => require_string(&props, kind, "src")?,
        ComponentKind::Link => require_string(&props, kind, "href")?,
        ComponentKind::Icon => {
            if let Some(name) = take_string(&mut props, "name") {
                props.insert("data-icon", PropValue::from(name));
            }
            props.insert("aria-hidden", PropValue::from("true"));
        }
        ComponentKind::Card => {
            let palette = theme.palette();
            merge_style(
                &mut props,
                vec![
                    ("background", Value::from(palette.background.clone())),
                    ("color", Value::from(palette.foreground.clone())),
                    ("borderColor", Value::from(palette.border.clone())),
                    ("borderWidth", Value::from(theme.border_width.clone())),
                    ("borderRadius", Value::from(theme.radius.clone())),
                    ("boxShadow", Value::from(theme.shadow.sm.clone())),
                ],
            );
        }
        ComponentKind::Dialog => return Ok(dialog(props, children)),
        ComponentKind::DialogContent => {
            let palette = theme.palette();
            props.insert("role", PropValue::from("dialog"));
            props.insert("aria-modal", PropValue::from("true"));
            merge_style(
                &mut props,
                vec![
                    ("background", Value::from(palette.background.clone())),
                    ("borderColor", Value::from(palette.border.clone())),
                    ("borderRadius", Value::from(theme.radius.clone())),
                    ("boxShadow", Value::from(theme.shadow.lg.clone())),
                ],
            );
        }
        ComponentKind::DialogTrigger => {
            props.remove("asChild");
        }
        _ => {}
    }

    Ok(element(kind, tag, props, children))
}

fn element(kind: ComponentKind, tag: String, mut props: CleanProps<PropValue>, mut children: Vec<Node>) -> Node {
    if matches!(props.get("icon"), Some(PropValue::Node(_))) {
        if let Some(PropValue::Node(icon)) = props.remove("icon") {
            children.insert(0, *icon);
        }
    }
    Node::Element(Element::new(kind.as_str(), tag, props, children))
}

fn box_element(requested: &PropValue) -> SduiResult<String> {
    match requested.as_str() {
        Some(tag) if BOX_ELEMENTS.contains(&tag) => Ok(tag.to_string()),
        other => Err(SduiError::InvalidProperty {
            component: "Box".to_string(),
            property: "element".to_string(),
            reason: format!("unsupported element {:?}, expected one of {}", other, BOX_ELEMENTS.join(", ")),
        }),
    }
}

fn heading_level(value: &PropValue) -> SduiResult<u64> {
    let level = match value.as_value() {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    match level {
        Some(level) if (1..=6).contains(&level) => Ok(level),
        _ => Err(SduiError::InvalidProperty {
            component: "Heading".to_string(),
            property: "level".to_string(),
            reason: "must be an integer from 1 to 6".to_string(),
        }),
    }
}

fn require_string(props: &CleanProps<PropValue>, kind: ComponentKind, property: &str) -> SduiResult<()> {
    match props.get(property).and_then(PropValue::as_str) {
        Some(value) if !value.trim().is_empty() => Ok(()),
        _ => Err(SduiError::InvalidProperty {
            component: kind.to_string(),
            property: property.to_string(),
            reason: "required string is missing".to_string(),
        }),
    }
}

fn take_string(props: &mut CleanProps<PropValue>, key: &str) -> Option<String> {
    match props.remove(key)? {
        PropValue::Value(Value::String(s)) => Some(s),
        PropValue::Value(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn css_length(value: Value) -> Value {
    match value {
        Value::Number(n) => Value::from(format!("{}px", n)),
        other => other,
    }
}

/// Fill `defaults` into the `style` prop without overriding author values.
fn merge_style(props: &mut CleanProps<PropValue>, defaults: Vec<(&str, Value)>) {
    let mut style = match props.remove("style") {
        Some(PropValue::Value(Value::Object(map))) => map,
        _ => Map::new(),
    };
    for (key, value) in defaults {
        style.entry(key.to_string()).or_insert(value);
    }
    props.insert("style", PropValue::Value(Value::Object(style)));
}

/// Controlled dialog: `open` (else `defaultOpen`) decides whether content is
/// present, and every open/close affordance reports through `onOpenChange`.
fn dialog(mut props: CleanProps<PropValue>, children: Vec<Node>) -> Node {
    let open_prop = props.remove("open");
    let default_open = props.remove("defaultOpen");
    let open = open_prop
        .or(default_open)
        .map(|p| is_truthy(p.as_value()))
        .unwrap_or(false);

    let on_open_change = match props.remove("onOpenChange") {
        Some(PropValue::Callback(callback)) => callback,
        _ => Callback::noop("onOpenChange"),
    };

    props.insert("data-state", PropValue::from(if open { "open" } else { "closed" }));
    let children = children
        .into_iter()
        .filter_map(|child| wire_dialog(child, open, &on_open_change))
        .collect();

    element(ComponentKind::Dialog, "div".to_string(), props, children)
}

fn wire_dialog(node: Node, open: bool, on_open_change: &Callback) -> Option<Node> {
    let mut el = match node {
        Node::Element(el) => el,
        other => return Some(other),
    };

    match ComponentKind::from_name(&el.kind) {
        // A nested dialog already wired its own subtree.
        Some(ComponentKind::Dialog) => {}
        Some(ComponentKind::DialogContent) => {
            if !open {
                return None;
            }
            el.children = wire_children(el.children, open, on_open_change);
            el.children.push(close_button(on_open_change));
        }
        Some(ComponentKind::DialogTrigger) => {
            let open_dialog = on_open_change.clone().with_args(vec![Value::Bool(true)]);
            match el.children.iter_mut().find_map(|child| match child {
                Node::Element(inner) if inner.tag == "button" => Some(inner),
                _ => None,
            }) {
                Some(button) => attach_click(button, open_dialog),
                None => {
                    el.tag = "button".to_string();
                    attach_click(&mut el, open_dialog);
                }
            }
        }
        Some(ComponentKind::DialogClose) => {
            attach_click(&mut el, on_open_change.clone().with_args(vec![Value::Bool(false)]));
        }
        _ => {
            el.children = wire_children(el.children, open, on_open_change);
        }
    }

    Some(Node::Element(el))
}

fn wire_children(children: Vec<Node>, open: bool, on_open_change: &Callback) -> Vec<Node> {
    children
        .into_iter()
        .filter_map(|child| wire_dialog(child, open, on_open_change))
        .collect()
}

fn attach_click(el: &mut Element, callback: Callback) {
    let combined = match el.props.remove("onClick") {
        Some(PropValue::Callback(existing)) => existing.then(callback),
        _ => callback,
    };
    el.props.insert("onClick", PropValue::Callback(combined));
}

fn close_button(on_open_change: &Callback) -> Node {
    let props = sanitize(
        RawProps::new()
            .with("type", "button")
            .with("aria-label", "Close")
            .with("data-dialog-close", true)
            .with("onClick", on_open_change.clone().with_args(vec![Value::Bool(false)])),
        "DialogClose",
    );
    Node::Element(Element::new(
        ComponentKind::DialogClose.as_str(),
        "button",
        props,
        vec![Node::text("×")],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn theme() -> ThemeTokens {
        ThemeTokens::default()
    }

    fn raw() -> RawProps<PropValue> {
        RawProps::new()
    }

    fn el(node: &Node) -> &Element {
        node.as_element().expect("element")
    }

    #[test]
    fn test_box_element_sets_tag() {
        let node = build("Box", raw().with("element", "form"), vec![], &theme()).unwrap();
        assert_eq!(el(&node).tag, "form");
        assert!(el(&node).prop("element").is_none());

        let err = build("Box", raw().with("element", "script"), vec![], &theme()).unwrap_err();
        assert!(matches!(err, SduiError::InvalidProperty { .. }));
    }

    #[test]
    fn test_heading_level() {
        let node = build("Heading", raw().with("level", 1i64), vec![Node::text("Title")], &theme()).unwrap();
        assert_eq!(el(&node).tag, "h1");
        assert!(build("Heading", raw().with("level", 9i64), vec![], &theme()).is_err());
        assert_eq!(el(&build("Heading", raw(), vec![], &theme()).unwrap()).tag, "h2");
    }

    #[test]
    fn test_image_requires_src() {
        assert!(build("Image", raw().with("alt", "logo"), vec![], &theme()).is_err());
        assert!(build("Image", raw().with("src", "/logo.png"), vec![], &theme()).is_ok());
    }

    #[test]
    fn test_button_uses_theme_radius_unless_overridden() {
        let node = build("Button", raw(), vec![Node::text("Go")], &theme()).unwrap();
        assert_eq!(el(&node).prop_value("style"), Some(&json!({ "borderRadius": "0.5rem" })));
        assert_eq!(el(&node).prop_str("type"), Some("button"));

        let styled = build(
            "Button",
            raw().with("style", json!({ "borderRadius": "0" })),
            vec![],
            &theme(),
        )
        .unwrap();
        assert_eq!(el(&styled).prop_value("style"), Some(&json!({ "borderRadius": "0" })));
    }

    #[test]
    fn test_stack_layout_style() {
        let node = build("Stack", raw().with("gap", 8i64), vec![], &theme()).unwrap();
        assert_eq!(
            el(&node).prop_value("style"),
            Some(&json!({ "display": "flex", "flexDirection": "column", "gap": "8px" }))
        );
    }

    #[test]
    fn test_unknown_type_is_an_error() {
        assert!(matches!(
            build("Marquee", raw(), vec![], &theme()),
            Err(SduiError::UnknownComponentType { .. })
        ));
    }

    fn sample_dialog(open: bool, on_change: Callback) -> Node {
        let theme = theme();
        let trigger_button = build("Button", raw(), vec![Node::text("Open")], &theme).unwrap();
        let trigger = build("DialogTrigger", raw().with("asChild", true), vec![trigger_button], &theme).unwrap();
        let content = build("DialogContent", raw(), vec![Node::text("Body")], &theme).unwrap();
        build(
            "Dialog",
            raw().with("open", open).with("onOpenChange", on_change),
            vec![trigger, content],
            &theme,
        )
        .unwrap()
    }

    #[test]
    fn test_closed_dialog_omits_content() {
        let dialog = sample_dialog(false, Callback::noop("change"));
        assert!(dialog.find_kind("DialogContent").is_none());
        assert_eq!(dialog.text_content(), "Open");
        assert_eq!(el(&dialog).prop_str("data-state"), Some("closed"));
    }

    #[test]
    fn test_dialog_wires_trigger_and_close() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        let on_change = Callback::direct(move |args| sink.lock().unwrap().push(args.to_vec()));

        let dialog = sample_dialog(true, on_change);
        let trigger = dialog.find_kind("Button").unwrap();
        trigger.callback("onClick").unwrap().invoke(&[]);

        let close = dialog.find_kind("DialogClose").unwrap();
        assert_eq!(close.prop_str("aria-label"), Some("Close"));
        close.callback("onClick").unwrap().invoke(&[]);

        assert_eq!(*calls.lock().unwrap(), vec![vec![json!(true)], vec![json!(false)]]);
    }
}
