//! Renders resolved trees to safe HTML.
//! No script, no inline event handlers; bound actions surface as `data-action`
//! attributes for a host runtime to pick up.

use crate::actions::Callback;
use crate::binding::display_value;
use crate::document::UISpecification;
use crate::node::{Element, Fallback, Node, PropValue};
use crate::resolver::Resolution;
use crate::theme::{derive_theme, kebab_case, ThemeTokens};
use regex::Regex;
use serde_json::{Map, Value};
use std::fmt::{self, Write};
use std::sync::OnceLock;

const VOID_TAGS: &[&str] = &[
    "area", "br", "col", "embed", "hr", "img", "input", "meta", "source", "wbr",
];

/// Tags a factory may not emit; they render as `div`.
const BLOCKED_TAGS: &[&str] = &[
    "script", "style", "iframe", "object", "embed", "link", "meta", "base", "frame", "frameset",
];

const URL_ATTRIBUTES: &[&str] = &["href", "src", "action", "formaction"];

fn attribute_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_:][A-Za-z0-9_:.\-]*$").expect("valid attribute name regex"))
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z][a-z0-9\-]*$").expect("valid tag regex"))
}

pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Render a node and its subtree.
pub fn render_html(node: &Node) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = node_to_html(node, &mut out);
    out
}

/// Full HTML page for a resolved document: metadata in the head, the theme as
/// CSS custom properties, and the tree (if any) in the body.
pub fn render_page(doc: &UISpecification, resolution: &Resolution) -> String {
    let theme = derive_theme(&ThemeTokens::default(), doc.theme.as_ref());
    let body = resolution.root.as_ref().map(render_html).unwrap_or_default();
    let title = doc.title().unwrap_or("Page");

    let mut head_extra = String::new();
    if let Some(description) = doc.metadata.as_ref().and_then(|m| m.description.as_deref()) {
        let _ = write!(
            head_extra,
            "\n<meta name=\"description\" content=\"{}\">",
            escape_html(description)
        );
    }
    if let Some(author) = doc.metadata.as_ref().and_then(|m| m.author.as_deref()) {
        let _ = write!(head_extra, "\n<meta name=\"author\" content=\"{}\">", escape_html(author));
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{}</title>{}
<style>:root{{{}}}</style>
</head>
<body data-theme="{}">
{}
</body>
</html>
"#,
        escape_html(title),
        head_extra,
        theme.css_variables(),
        theme.mode.as_str(),
        body
    )
}

fn node_to_html(node: &Node, out: &mut String) -> fmt::Result {
    match node {
        Node::Literal(value) => write!(out, "{}", escape_html(&display_value(value))),
        Node::Fallback(fallback) => fallback_to_html(fallback, out),
        Node::Element(element) => element_to_html(element, out),
    }
}

fn fallback_to_html(fallback: &Fallback, out: &mut String) -> fmt::Result {
    write!(
        out,
        "<div data-sdui-error=\"{}\" role=\"alert\" title=\"{}\">{} could not be rendered</div>",
        escape_html(&fallback.component_type),
        escape_html(&fallback.reason),
        escape_html(&fallback.component_type)
    )
}

fn element_to_html(element: &Element, out: &mut String) -> fmt::Result {
    let tag = safe_tag(&element.tag);
    write!(out, "<{}", tag)?;
    if element.tag != tag {
        write!(out, " data-sdui-tag=\"{}\"", escape_html(&element.tag))?;
    }
    for (name, value) in &element.props {
        write_attribute(name, value, out)?;
    }

    if VOID_TAGS.contains(&tag) {
        return write!(out, ">");
    }
    write!(out, ">")?;
    for child in &element.children {
        node_to_html(child, out)?;
    }
    write!(out, "</{}>", tag)
}

fn safe_tag(tag: &str) -> &str {
    if tag_regex().is_match(tag) && !BLOCKED_TAGS.contains(&tag) {
        tag
    } else {
        "div"
    }
}

fn write_attribute(name: &str, value: &PropValue, out: &mut String) -> fmt::Result {
    match value {
        PropValue::Callback(callback) => write_action(name, callback, out),
        // Subtrees passed as props are rendered by their component, not here.
        PropValue::Node(_) | PropValue::Nodes(_) => Ok(()),
        PropValue::Value(value) => {
            if !attribute_name_regex().is_match(name) || name.to_ascii_lowercase().starts_with("on") {
                return Ok(());
            }
            match value {
                Value::Null | Value::Bool(false) => Ok(()),
                Value::Bool(true) => write!(out, " {}", name),
                Value::Object(map) if name == "style" => {
                    write!(out, " style=\"{}\"", escape_html(&style_to_css(map)))
                }
                Value::Object(_) => Ok(()),
                Value::Array(items) => {
                    let joined: Vec<String> = items
                        .iter()
                        .filter(|item| !item.is_object() && !item.is_array())
                        .map(display_value)
                        .collect();
                    write!(out, " {}=\"{}\"", name, escape_html(&joined.join(" ")))
                }
                scalar => {
                    let text = display_value(scalar);
                    if URL_ATTRIBUTES.contains(&name) && is_script_url(&text) {
                        return Ok(());
                    }
                    write!(out, " {}=\"{}\"", name, escape_html(&text))
                }
            }
        }
    }
}

/// `onClick` bound to `save` becomes `data-action="save"`; other events get
/// `data-action-<event>`.
fn write_action(name: &str, callback: &Callback, out: &mut String) -> fmt::Result {
    if callback.is_noop() {
        return Ok(());
    }
    let Some(action) = callback.action() else {
        return Ok(());
    };
    let event = name.strip_prefix("on").unwrap_or(name);
    if event == "Click" {
        write!(out, " data-action=\"{}\"", escape_html(action))
    } else {
        let suffix = kebab_case(event);
        write!(
            out,
            " data-action{}=\"{}\"",
            suffix.to_ascii_lowercase(),
            escape_html(action)
        )
    }
}

fn style_to_css(style: &Map<String, Value>) -> String {
    let mut css = String::new();
    for (key, value) in style {
        let value = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => continue,
        };
        if value.contains(';') || value.to_ascii_lowercase().contains("url(javascript") {
            continue;
        }
        let _ = write!(css, "{}:{};", kebab_case(key), value);
    }
    css
}

fn is_script_url(url: &str) -> bool {
    let compact: String = url
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    compact.starts_with("javascript:") || compact.starts_with("vbscript:")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::HandlerMap;
    use crate::document::parse_specification;
    use crate::resolver::{RenderContext, Resolver};
    use crate::sanitize::{sanitize, RawProps};
    use crate::spec::ComponentSpec;
    use crate::state::StateSnapshot;
    use serde_json::json;

    fn render(spec: Value, handlers: &HandlerMap) -> String {
        let state = StateSnapshot::from_value(json!({ "name": "Ada <admin>" }));
        let ctx = RenderContext::new(&state, handlers);
        let node = Resolver::default()
            .resolve(&ComponentSpec::from_value(spec).unwrap(), &ctx)
            .unwrap();
        render_html(&node)
    }

    #[test]
    fn test_text_is_escaped() {
        let html = render(json!({ "type": "Text", "children": "Hi {{state.name}}" }), &HandlerMap::new());
        assert_eq!(html, "<p>Hi Ada &lt;admin&gt;</p>");
    }

    #[test]
    fn test_input_is_void_with_attributes() {
        let html = render(
            json!({ "type": "Input", "inputType": "email", "required": true, "disabled": false }),
            &HandlerMap::new(),
        );
        assert_eq!(html, "<input required type=\"email\">");
    }

    #[test]
    fn test_bound_action_becomes_data_attribute() {
        let handlers = HandlerMap::new().with("save", |_| {});
        let html = render(
            json!({ "type": "Button", "onClickAction": "save", "children": "Save" }),
            &handlers,
        );
        assert!(html.starts_with("<button data-action=\"save\""));
        assert!(!html.contains("onClick"));
        assert!(html.contains("border-radius:"));
    }

    #[test]
    fn test_unresolved_action_renders_without_attribute() {
        let html = render(
            json!({ "type": "Button", "onClickAction": "missing", "children": "Go" }),
            &HandlerMap::new(),
        );
        assert!(!html.contains("data-action"));
        assert!(html.ends_with(">Go</button>"));
    }

    #[test]
    fn test_fallback_marker() {
        let html = render(json!({ "type": "Box", "children": [{ "type": "Marquee" }] }), &HandlerMap::new());
        assert!(html.contains("data-sdui-error=\"Marquee\""));
        assert!(html.contains("role=\"alert\""));
    }

    #[test]
    fn test_unsafe_tags_and_urls() {
        let props = sanitize(
            RawProps::new()
                .with("href", "javascript:alert(1)")
                .with("onclick", "alert(1)")
                .with("data x=\"y\"", "z")
                .with("title", "ok"),
            "Custom",
        );
        let node = Node::Element(Element::new("Custom", "script", props, vec![Node::text("x")]));
        assert_eq!(
            render_html(&node),
            "<div data-sdui-tag=\"script\" title=\"ok\">x</div>"
        );
    }

    #[test]
    fn test_page_wrapper() {
        let doc = parse_specification(
            r##"{
                "version": "1.0.0",
                "metadata": { "title": "Menu & Prices", "description": "Today" },
                "theme": { "mode": "light" },
                "root": { "type": "Heading", "level": 1, "children": "Welcome" }
            }"##,
        )
        .unwrap();
        let state = doc.initial_state();
        let handlers = HandlerMap::new();
        let resolution = Resolver::default().resolve_document(&doc, &state, &handlers).unwrap();
        let page = render_page(&doc, &resolution);
        assert!(page.contains("<title>Menu &amp; Prices</title>"));
        assert!(page.contains("<meta name=\"description\" content=\"Today\">"));
        assert!(page.contains(":root{--sdui-background:"));
        assert!(page.contains("<body data-theme=\"light\">"));
        assert!(page.contains("<h1>Welcome</h1>"));
    }
}
