//! Inline style records and the text-format engine.
//!
//! Styles are stored per text node as a property map and serialized as a
//! CSS declaration list (`"color: red; font-size: 12px"`).

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::node::{Node, NodeKey, TextFormat, TextFormatKind};
use crate::selection::{Point, RangeSelection, Selection, is_backward, selected_leaves};
use crate::state::EditorState;

pub type StyleRecord = BTreeMap<String, String>;

/// Partial style update. `None` removes the property.
pub type StylePatch = BTreeMap<String, Option<String>>;

/// Splits a declaration list on `;` outside quotes and parentheses, so
/// `font-family: "A;B"` and `url(data:...;base64,...)` stay whole. The
/// flag is false when a quote or parenthesis is left open.
fn split_declarations(css: &str) -> (Vec<&str>, bool) {
    let mut out = Vec::new();
    let mut quote: Option<char> = None;
    let mut depth = 0usize;
    let mut escaped = false;
    let mut start = 0;
    for (ix, ch) in css.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, ch) {
            (_, '\\') => escaped = true,
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                out.push(&css[start..ix]);
                start = ix + 1;
            }
            _ => {}
        }
    }
    out.push(&css[start..]);
    (out, quote.is_none() && depth == 0 && !escaped)
}

/// True when `value` survives a write through [`to_css`] and a read back
/// through [`parse_css`] unchanged.
pub fn is_storable_value(value: &str) -> bool {
    let value = value.trim();
    let (parts, closed) = split_declarations(value);
    !value.is_empty() && closed && parts == [value]
}

pub fn parse_css(css: &str) -> StyleRecord {
    split_declarations(css)
        .0
        .into_iter()
        .filter_map(|decl| {
            let (name, value) = decl.split_once(':')?;
            let (name, value) = (name.trim(), value.trim());
            (!name.is_empty() && !value.is_empty()).then(|| (name.to_string(), value.to_string()))
        })
        .collect()
}

pub fn to_css(style: &StyleRecord) -> String {
    style
        .iter()
        .map(|(name, value)| format!("{name}: {value}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Values that would not survive serialization are skipped.
fn apply_patch(style: &mut StyleRecord, patch: &StylePatch) {
    for (name, value) in patch {
        match value {
            Some(value) if !is_storable_value(value) || name.contains([':', ';']) => {
                warn!(property = %name, value = %value, "unstorable style value; skipped");
            }
            Some(value) => {
                style.insert(name.clone(), value.trim().to_string());
            }
            None => {
                style.remove(name);
            }
        }
    }
}

/// Splits text nodes at the range edges so every selected character lives
/// in a node that is selected whole. Returns those nodes in document order
/// and re-anchors the selection on them.
fn isolate_selected_text(state: &mut EditorState) -> Vec<NodeKey> {
    let Some(range) = state.range_selection().cloned() else {
        return Vec::new();
    };
    let backward = is_backward(state, &range);
    let segments: Vec<_> = selected_leaves(state, &range)
        .into_iter()
        .filter(|leaf| leaf.is_text)
        .collect();

    let mut isolated = Vec::with_capacity(segments.len());
    for seg in segments {
        let len = state
            .node(seg.key)
            .and_then(Node::as_text)
            .map_or(0, |t| t.text.len());
        if seg.end < len {
            state.split_text(seg.key, seg.end);
        }
        let key = if seg.start > 0 {
            match state.split_text(seg.key, seg.start) {
                Some(right) => right,
                None => continue,
            }
        } else {
            seg.key
        };
        isolated.push(key);
    }

    if let (Some(first), Some(last)) = (isolated.first(), isolated.last()) {
        let last_len = state
            .node(*last)
            .and_then(Node::as_text)
            .map_or(0, |t| t.text.len());
        let start = Point::text(*first, 0);
        let end = Point::text(*last, last_len);
        let (anchor, focus) = if backward { (end, start) } else { (start, end) };
        state.set_selection(Some(Selection::Range(RangeSelection {
            anchor,
            focus,
            ..range
        })));
    }
    isolated
}

/// Caret format: the pending one, else the anchor text node's.
fn caret_format(state: &EditorState, range: &RangeSelection) -> TextFormat {
    range.format.unwrap_or_else(|| {
        state
            .node(range.anchor.key)
            .and_then(Node::as_text)
            .map(|t| t.format)
            .unwrap_or_default()
    })
}

/// Applies `patch` to every selected character.
///
/// Re-checks the selection: with no range selection this is a silent
/// no-op. A collapsed caret records the patch as the pending style.
pub fn patch_style(state: &mut EditorState, patch: &StylePatch) {
    let Some(range) = state.range_selection().cloned() else {
        debug!("style patch without a range selection; skipped");
        return;
    };
    if range.is_collapsed() {
        let mut pending = range.clone();
        apply_patch(&mut pending.style, patch);
        state.set_selection(Some(Selection::Range(pending)));
        return;
    }

    for key in isolate_selected_text(state) {
        let Some(current) = state.node(key).and_then(Node::as_text) else {
            continue;
        };
        let mut next = current.style.clone();
        apply_patch(&mut next, patch);
        if next != current.style {
            if let Some(text) = state.text_mut(key) {
                text.style = next;
            }
        }
    }
}

/// Effective value of one inline style property at the selection: the
/// first selected text that defines it, the pending caret style, or the
/// caret's text node. `fallback` otherwise, including for node selections.
pub fn read_style(state: &EditorState, property: &str, fallback: &str) -> String {
    let Some(range) = state.range_selection() else {
        return fallback.to_string();
    };

    if range.is_collapsed() {
        if let Some(value) = range.style.get(property) {
            return value.clone();
        }
        return state
            .node(range.anchor.key)
            .and_then(Node::as_text)
            .and_then(|t| t.style.get(property).cloned())
            .unwrap_or_else(|| fallback.to_string());
    }

    selected_leaves(state, range)
        .into_iter()
        .filter_map(|leaf| state.node(leaf.key).and_then(Node::as_text))
        .find_map(|t| t.style.get(property).cloned())
        .unwrap_or_else(|| fallback.to_string())
}

/// Formats active across the selection: a flag is set when every selected
/// text node carries it. A caret reports its pending or inherited format.
pub fn active_formats(state: &EditorState) -> TextFormat {
    let Some(range) = state.range_selection() else {
        return TextFormat::default();
    };
    if range.is_collapsed() {
        return caret_format(state, range);
    }

    let formats: Vec<TextFormat> = selected_leaves(state, range)
        .into_iter()
        .filter_map(|leaf| state.node(leaf.key).and_then(Node::as_text))
        .map(|t| t.format)
        .collect();
    if formats.is_empty() {
        return TextFormat::default();
    }

    let mut active = TextFormat::default();
    for kind in TextFormatKind::ALL {
        if formats.iter().all(|f| f.has(kind)) {
            active.set(kind, true);
        }
    }
    active
}

/// Turns `kind` off if every selected text node has it, on otherwise.
/// At a caret the pending format is toggled instead.
pub fn toggle_format(state: &mut EditorState, kind: TextFormatKind) -> bool {
    let Some(range) = state.range_selection().cloned() else {
        return false;
    };
    if range.is_collapsed() {
        let mut format = caret_format(state, &range);
        format.toggle(kind);
        state.set_selection(Some(Selection::Range(RangeSelection {
            format: Some(format),
            ..range
        })));
        return true;
    }

    let keys = isolate_selected_text(state);
    if keys.is_empty() {
        return false;
    }
    let all_have = keys.iter().all(|k| {
        state
            .node(*k)
            .and_then(Node::as_text)
            .is_some_and(|t| t.format.has(kind))
    });
    for key in keys {
        if let Some(text) = state.text_mut(key) {
            text.format.set(kind, !all_have);
        }
    }
    true
}

/// Strips formats and inline styles from selected text and alignment from
/// selected decorators.
pub fn clear_format(state: &mut EditorState) -> bool {
    match state.selection().cloned() {
        Some(Selection::Range(range)) if range.is_collapsed() => {
            state.set_selection(Some(Selection::Range(RangeSelection {
                format: Some(TextFormat::default()),
                style: StyleRecord::new(),
                ..range
            })));
            true
        }
        Some(Selection::Range(range)) => {
            let decorators: Vec<NodeKey> = selected_leaves(state, &range)
                .into_iter()
                .filter(|leaf| !leaf.is_text)
                .map(|leaf| leaf.key)
                .collect();
            for key in isolate_selected_text(state) {
                if let Some(text) = state.text_mut(key) {
                    text.format = TextFormat::default();
                    text.style.clear();
                }
            }
            clear_decorator_align(state, &decorators);
            true
        }
        Some(Selection::Node(nodes)) => {
            clear_decorator_align(state, nodes.keys());
            true
        }
        None => false,
    }
}

fn clear_decorator_align(state: &mut EditorState, keys: &[NodeKey]) {
    for key in keys {
        let aligned = state
            .node(*key)
            .and_then(Node::as_decorator)
            .is_some_and(|d| d.align.is_some());
        if aligned {
            if let Some(d) = state.decorator_mut(*key) {
                d.align = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn css_round_trip_is_normalized() {
        let style = parse_css(" font-size:12px ;color: red;; bogus ");
        assert_eq!(style.get("color").map(String::as_str), Some("red"));
        assert_eq!(style.get("font-size").map(String::as_str), Some("12px"));
        assert_eq!(style.len(), 2);
        assert_eq!(to_css(&style), "color: red; font-size: 12px");
    }

    #[test]
    fn patch_none_removes_property() {
        let mut style = parse_css("color: red; font-size: 12px");
        let mut patch = StylePatch::new();
        patch.insert("color".into(), None);
        patch.insert("font-family".into(), Some("Arial".into()));
        apply_patch(&mut style, &patch);
        assert_eq!(to_css(&style), "font-family: Arial; font-size: 12px");
    }

    #[test]
    fn quoted_and_url_values_keep_their_semicolons() {
        let css = r#"background: url(data:image/png;base64,AQID); font-family: "A;B", serif"#;
        let style = parse_css(css);
        assert_eq!(
            style.get("background").map(String::as_str),
            Some("url(data:image/png;base64,AQID)")
        );
        assert_eq!(style.get("font-family").map(String::as_str), Some(r#""A;B", serif"#));
        assert_eq!(parse_css(&to_css(&style)), style);
    }

    #[test]
    fn unstorable_values_are_skipped() {
        assert!(is_storable_value(r#""a;b""#));
        assert!(!is_storable_value("red; font-size: 90px"));
        assert!(!is_storable_value("  "));
        assert!(!is_storable_value(r#""open"#));
        assert!(!is_storable_value("url(a"));

        let mut style = parse_css("color: red");
        let mut patch = StylePatch::new();
        patch.insert("color".into(), Some("blue; font-size: 90px".into()));
        patch.insert("font-size".into(), Some("12px".into()));
        apply_patch(&mut style, &patch);
        assert_eq!(to_css(&style), "color: red; font-size: 12px");
    }
}
