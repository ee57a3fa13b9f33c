#![allow(dead_code)]

use docedit_core::{
    DocumentValue, Editor, EditorConfig, EditorState, Node, NodeKey, display_type,
};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Editor with the built-in plugins over a root holding `children`.
pub fn editor_with(children: Value) -> Editor {
    editor_with_config(children, EditorConfig::default())
}

pub fn editor_with_config(children: Value, config: EditorConfig) -> Editor {
    init_tracing();
    let value = DocumentValue::from_document(json!({
        "root": { "type": "root", "version": 1, "children": children }
    }));
    Editor::from_value(&value, config).unwrap()
}

pub fn text(text: &str) -> Value {
    json!({ "type": "text", "version": 1, "text": text, "format": 0, "style": "" })
}

pub fn paragraph(text_value: &str) -> Value {
    json!({ "type": "paragraph", "version": 1, "children": [text(text_value)] })
}

pub fn heading(tag: &str, text_value: &str) -> Value {
    json!({ "type": "heading", "version": 1, "tag": tag, "children": [text(text_value)] })
}

pub fn list(list_type: &str, items: &[&str]) -> Value {
    let items: Vec<Value> = items
        .iter()
        .map(|item| json!({ "type": "listitem", "version": 1, "children": [text(item)] }))
        .collect();
    json!({ "type": "list", "version": 1, "listType": list_type, "children": items })
}

pub fn image(src: &str) -> Value {
    json!({ "type": "image-node", "version": 1, "props": { "src": src } })
}

pub fn divider() -> Value {
    json!({ "type": "divider-node", "version": 1, "props": {} })
}

/// The text node whose content is exactly `content`.
pub fn text_key(state: &EditorState, content: &str) -> NodeKey {
    state
        .descendants(state.root())
        .into_iter()
        .find(|key| {
            state
                .node(*key)
                .and_then(Node::as_text)
                .is_some_and(|t| t.text == content)
        })
        .unwrap_or_else(|| panic!("no text node {content:?}"))
}

pub fn keys_of_type(state: &EditorState, type_name: &str) -> Vec<NodeKey> {
    state
        .descendants(state.root())
        .into_iter()
        .filter(|key| state.node(*key).is_some_and(|n| n.type_name() == type_name))
        .collect()
}

/// Display types of the root's children.
pub fn block_types(state: &EditorState) -> Vec<&'static str> {
    state
        .children(state.root())
        .iter()
        .map(|key| display_type(state, *key).unwrap())
        .collect()
}

/// Text content of each of the root's children.
pub fn block_texts(state: &EditorState) -> Vec<String> {
    state
        .children(state.root())
        .iter()
        .map(|key| state.text_content(*key))
        .collect()
}
