//! Static HTML export.
//!
//! Decorators export as an empty container carrying their key and type; the
//! painted interior belongs to the external renderer and is not exported.

use std::fmt::Write as _;

use crate::node::{ElementKind, ElementNode, NodeData, NodeKey, TextFormatKind, TextNode};
use crate::state::EditorState;
use crate::style::to_css;

const INDENT_PX: u32 = 40;

pub fn export_markup(state: &EditorState) -> String {
    let mut out = String::new();
    for child in state.children(state.root()) {
        write_node(state, *child, &mut out);
    }
    out
}

fn write_node(state: &EditorState, key: NodeKey, out: &mut String) {
    let Some(node) = state.node(key) else {
        return;
    };
    match &node.data {
        NodeData::Element(el) => write_element(state, el, out),
        NodeData::Text(text) => write_text(text, out),
        NodeData::Decorator(_) => {
            let _ = write!(
                out,
                r#"<div data-node-key="{key}" data-node-type="{}"></div>"#,
                escape(node.type_name())
            );
        }
    }
}

fn element_tag(kind: ElementKind) -> &'static str {
    match kind {
        ElementKind::Root => "div",
        ElementKind::Paragraph => "p",
        ElementKind::Heading(tag) => tag.as_str(),
        ElementKind::Quote => "blockquote",
        ElementKind::List(list_type) => list_type.tag(),
        ElementKind::ListItem => "li",
    }
}

fn write_element(state: &EditorState, el: &ElementNode, out: &mut String) {
    let tag = element_tag(el.kind);
    let mut style = String::new();
    if let Some(align) = el.align {
        let _ = write!(style, "text-align: {};", align.as_str());
    }
    if el.indent > 0 {
        if !style.is_empty() {
            style.push(' ');
        }
        let padding = u64::from(el.indent) * u64::from(INDENT_PX);
        let _ = write!(style, "padding-inline-start: {padding}px;");
    }

    out.push('<');
    out.push_str(tag);
    if !style.is_empty() {
        let _ = write!(out, r#" style="{}""#, escape(&style));
    }
    out.push('>');

    if el.children.is_empty() && el.kind.is_text_block() {
        out.push_str("<br>");
    }
    for child in &el.children {
        write_node(state, *child, out);
    }

    let _ = write!(out, "</{tag}>");
}

fn format_tag(kind: TextFormatKind) -> &'static str {
    match kind {
        TextFormatKind::Bold => "strong",
        TextFormatKind::Italic => "em",
        TextFormatKind::Underline => "u",
        TextFormatKind::Strikethrough => "s",
        TextFormatKind::Code => "code",
        TextFormatKind::Subscript => "sub",
        TextFormatKind::Superscript => "sup",
    }
}

fn write_text(text: &TextNode, out: &mut String) {
    let tags: Vec<&'static str> = TextFormatKind::ALL
        .into_iter()
        .filter(|kind| text.format.has(*kind))
        .map(format_tag)
        .collect();

    if !text.style.is_empty() {
        let _ = write!(out, r#"<span style="{}">"#, escape(&to_css(&text.style)));
    }
    for tag in &tags {
        let _ = write!(out, "<{tag}>");
    }
    out.push_str(&escape(&text.text));
    for tag in tags.iter().rev() {
        let _ = write!(out, "</{tag}>");
    }
    if !text.style.is_empty() {
        out.push_str("</span>");
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
