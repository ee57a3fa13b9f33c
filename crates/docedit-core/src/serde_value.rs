use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::node::{ElementKind, ElementNode, NodeData, NodeKey};
use crate::state::EditorState;
use crate::style::to_css;

const DEFAULT_SCHEMA: &str = "docedit";
const DEFAULT_VERSION: u32 = 1;

/// Version of every element and text record written by this crate.
pub const NODE_VERSION: u64 = 1;

fn default_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}

fn default_version() -> u32 {
    DEFAULT_VERSION
}

/// Persisted document envelope. `document` is `{"root": <root record>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentValue {
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_version")]
    pub version: u32,
    pub document: Value,
}

impl DocumentValue {
    pub fn from_document(document: Value) -> Self {
        Self {
            schema: default_schema(),
            version: default_version(),
            document,
        }
    }

    pub fn into_document(self) -> Value {
        self.document
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

pub fn export_document(state: &EditorState) -> Value {
    let mut document = Map::new();
    document.insert("root".into(), export_node(state, state.root()));
    Value::Object(document)
}

/// Serializes `key` and its subtree. A key missing from the arena exports
/// as `null`.
pub fn export_node(state: &EditorState, key: NodeKey) -> Value {
    let Some(node) = state.node(key) else {
        return Value::Null;
    };
    match &node.data {
        NodeData::Element(el) => export_element(state, el),
        NodeData::Text(text) => serde_json::json!({
            "type": node.type_name(),
            "version": NODE_VERSION,
            "text": text.text,
            "format": text.format.to_bits(),
            "style": to_css(&text.style),
        }),
        NodeData::Decorator(decorator) => decorator.export_json(),
    }
}

fn export_element(state: &EditorState, el: &ElementNode) -> Value {
    let mut out = Map::new();
    out.insert("type".into(), Value::from(el.kind.type_name()));
    out.insert("version".into(), Value::from(NODE_VERSION));
    out.insert(
        "format".into(),
        Value::from(el.align.map_or("", |align| align.as_str())),
    );
    out.insert("indent".into(), Value::from(el.indent));
    match el.kind {
        ElementKind::Heading(tag) => {
            out.insert("tag".into(), Value::from(tag.as_str()));
        }
        ElementKind::List(list_type) => {
            out.insert("listType".into(), Value::from(list_type.as_str()));
            out.insert("tag".into(), Value::from(list_type.tag()));
        }
        ElementKind::Root | ElementKind::Paragraph | ElementKind::Quote | ElementKind::ListItem => {}
    }
    out.insert(
        "children".into(),
        Value::Array(el.children.iter().map(|child| export_node(state, *child)).collect()),
    );
    Value::Object(out)
}
