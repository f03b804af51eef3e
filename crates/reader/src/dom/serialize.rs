// ABOUTME: HTML serialization for the owned document tree.
// ABOUTME: Emits outer/inner HTML with attribute and text escaping and void-element handling.

use ego_tree::NodeRef;

use super::Node;

/// Elements whose text children are emitted without escaping.
const RAW_TEXT_TAGS: &[&str] = &[
    "script", "style", "xmp", "iframe", "noembed", "noframes", "plaintext", "noscript",
];

/// Serialize a node including its own tag.
pub fn outer_html(node: NodeRef<'_, Node>) -> String {
    let mut out = String::new();
    serialize_node(node, &mut out);
    out
}

/// Serialize the children of a node.
pub fn inner_html(node: NodeRef<'_, Node>) -> String {
    let mut out = String::new();
    for child in node.children() {
        serialize_node(child, &mut out);
    }
    out
}

fn serialize_node(node: NodeRef<'_, Node>, out: &mut String) {
    // Explicit stack of (node, closing) so deep trees do not recurse.
    let mut stack: Vec<(NodeRef<'_, Node>, bool)> = vec![(node, false)];
    while let Some((current, closing)) = stack.pop() {
        match current.value() {
            Node::Document => {
                for child in current.children().rev() {
                    stack.push((child, false));
                }
            }
            Node::Text(text) => {
                let raw = current
                    .parent()
                    .and_then(|p| p.value().as_element().map(|el| el.name.clone()))
                    .map_or(false, |name| RAW_TEXT_TAGS.contains(&name.as_str()));
                if raw {
                    out.push_str(text);
                } else {
                    out.push_str(&escape_text(text));
                }
            }
            Node::Element(el) => {
                if closing {
                    out.push_str("</");
                    out.push_str(&el.name);
                    out.push('>');
                    continue;
                }

                out.push('<');
                out.push_str(&el.name);
                for (name, value) in el.attrs() {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&escape_attr(value));
                    out.push('"');
                }
                out.push('>');

                if is_void_element(&el.name) {
                    continue;
                }

                stack.push((current, true));
                for child in current.children().rev() {
                    stack.push((child, false));
                }
            }
        }
    }
}

/// Escape attribute value
pub fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Check if tag is void element
pub fn is_void_element(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}
