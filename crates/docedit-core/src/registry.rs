//! Node-type registry: maps the `type` tag of a serialized record to the
//! importer that rebuilds its payload.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::decorator::{DIVIDER_NODE_TYPE, DecoratorNode, IMAGE_NODE_TYPE};
use crate::error::{DeserializationError, RegistryError};
use crate::node::{
    ElementAlign, ElementKind, ElementNode, HEADING_TYPE, HeadingTag, LIST_ITEM_TYPE, LIST_TYPE,
    ListType, NodeData, NodeKey, PARAGRAPH_TYPE, QUOTE_TYPE, ROOT_TYPE, TEXT_TYPE, TextFormat,
    TextNode,
};
use crate::state::EditorState;
use crate::style::parse_css;

/// Rebuilds a node payload from its record. Children are imported by the
/// registry, not the importer.
pub type NodeImporter = fn(&Map<String, Value>) -> Result<NodeData, DeserializationError>;

#[derive(Default)]
pub struct NodeRegistry {
    importers: HashMap<String, NodeImporter>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every node type this crate defines.
    pub fn builtin() -> Self {
        let mut importers: HashMap<String, NodeImporter> = HashMap::new();
        importers.insert(PARAGRAPH_TYPE.into(), import_paragraph);
        importers.insert(HEADING_TYPE.into(), import_heading);
        importers.insert(QUOTE_TYPE.into(), import_quote);
        importers.insert(LIST_TYPE.into(), import_list);
        importers.insert(LIST_ITEM_TYPE.into(), import_list_item);
        importers.insert(TEXT_TYPE.into(), import_text);
        importers.insert(IMAGE_NODE_TYPE.into(), import_decorator);
        importers.insert(DIVIDER_NODE_TYPE.into(), import_decorator);
        Self { importers }
    }

    pub fn register(
        &mut self,
        type_name: impl Into<String>,
        importer: NodeImporter,
    ) -> Result<(), RegistryError> {
        let type_name = type_name.into();
        if self.importers.contains_key(&type_name) {
            return Err(RegistryError::DuplicateNodeType(type_name));
        }
        self.importers.insert(type_name, importer);
        Ok(())
    }

    pub fn is_known_type(&self, type_name: &str) -> bool {
        self.importers.contains_key(type_name)
    }

    /// Imports a `{"root": {...}}` document into a fresh state with no
    /// selection.
    pub fn import_document(&self, document: &Value) -> Result<EditorState, DeserializationError> {
        let root = document
            .get("root")
            .ok_or_else(|| DeserializationError::missing("document", "root"))?;
        let record = as_record(ROOT_TYPE, root)?;
        match record.get("type").and_then(Value::as_str) {
            Some(ROOT_TYPE) => {}
            Some(other) => {
                return Err(DeserializationError::invalid(
                    ROOT_TYPE,
                    "type",
                    format!("expected `root`, found `{other}`"),
                ));
            }
            None => return Err(DeserializationError::missing(ROOT_TYPE, "type")),
        }

        let mut state = EditorState::empty();
        let root_key = state.root();
        for child in children_of(ROOT_TYPE, record)? {
            let key = self.import_node(&mut state, child)?;
            state.append_child(root_key, key);
        }
        Ok(state)
    }

    /// Imports one record and its subtree as a detached node of `state`.
    pub fn import_node(
        &self,
        state: &mut EditorState,
        value: &Value,
    ) -> Result<NodeKey, DeserializationError> {
        let record = as_record("node", value)?;
        let type_name = record
            .get("type")
            .ok_or_else(|| DeserializationError::missing("node", "type"))?
            .as_str()
            .ok_or_else(|| DeserializationError::invalid("node", "type", "expected a string"))?;
        let importer = self
            .importers
            .get(type_name)
            .ok_or_else(|| DeserializationError::UnknownType(type_name.to_string()))?;

        let data = importer(record)?;
        let is_element = matches!(data, NodeData::Element(_));
        let key = state.create_node(data);
        if is_element {
            for child in children_of(type_name, record)? {
                let child = self.import_node(state, child)?;
                state.append_child(key, child);
            }
        }
        Ok(key)
    }
}

fn as_record<'a>(node_type: &str, value: &'a Value) -> Result<&'a Map<String, Value>, DeserializationError> {
    value
        .as_object()
        .ok_or_else(|| DeserializationError::invalid(node_type, "type", "record is not an object"))
}

fn children_of<'a>(
    node_type: &str,
    record: &'a Map<String, Value>,
) -> Result<&'a [Value], DeserializationError> {
    match record.get("children") {
        Some(Value::Array(children)) => Ok(children),
        Some(_) => Err(DeserializationError::invalid(node_type, "children", "expected an array")),
        None => Err(DeserializationError::missing(node_type, "children")),
    }
}

fn element(record: &Map<String, Value>, kind: ElementKind) -> Result<NodeData, DeserializationError> {
    let type_name = kind.type_name();
    let align = match record.get("format") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => ElementAlign::parse(s)
            .map_err(|reason| DeserializationError::invalid(type_name, "format", reason))?,
        Some(Value::Number(n)) if n.as_u64() == Some(0) => None,
        Some(_) => {
            return Err(DeserializationError::invalid(
                type_name,
                "format",
                "expected an alignment string",
            ));
        }
    };
    let indent = match record.get("indent") {
        None | Some(Value::Null) => 0,
        Some(value) => value
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| {
                DeserializationError::invalid(type_name, "indent", "expected an unsigned integer")
            })?,
    };
    Ok(NodeData::Element(ElementNode {
        kind,
        children: Vec::new(),
        align,
        indent,
    }))
}

fn import_paragraph(record: &Map<String, Value>) -> Result<NodeData, DeserializationError> {
    element(record, ElementKind::Paragraph)
}

fn import_quote(record: &Map<String, Value>) -> Result<NodeData, DeserializationError> {
    element(record, ElementKind::Quote)
}

fn import_list_item(record: &Map<String, Value>) -> Result<NodeData, DeserializationError> {
    element(record, ElementKind::ListItem)
}

fn import_heading(record: &Map<String, Value>) -> Result<NodeData, DeserializationError> {
    let tag = record
        .get("tag")
        .ok_or_else(|| DeserializationError::missing(HEADING_TYPE, "tag"))?;
    let tag = tag
        .as_str()
        .and_then(HeadingTag::parse)
        .ok_or_else(|| DeserializationError::invalid(HEADING_TYPE, "tag", format!("expected h1..h6, found {tag}")))?;
    element(record, ElementKind::Heading(tag))
}

fn import_list(record: &Map<String, Value>) -> Result<NodeData, DeserializationError> {
    let list_type = record
        .get("listType")
        .ok_or_else(|| DeserializationError::missing(LIST_TYPE, "listType"))?;
    let list_type = list_type
        .as_str()
        .and_then(ListType::parse)
        .ok_or_else(|| {
            DeserializationError::invalid(
                LIST_TYPE,
                "listType",
                format!("expected bullet or number, found {list_type}"),
            )
        })?;
    element(record, ElementKind::List(list_type))
}

fn import_text(record: &Map<String, Value>) -> Result<NodeData, DeserializationError> {
    let text = record
        .get("text")
        .ok_or_else(|| DeserializationError::missing(TEXT_TYPE, "text"))?
        .as_str()
        .ok_or_else(|| DeserializationError::invalid(TEXT_TYPE, "text", "expected a string"))?;
    let format = match record.get("format") {
        None | Some(Value::Null) => TextFormat::default(),
        Some(value) => value
            .as_u64()
            .and_then(|bits| u32::try_from(bits).ok())
            .map(TextFormat::from_bits)
            .ok_or_else(|| DeserializationError::invalid(TEXT_TYPE, "format", "expected a bitmask"))?,
    };
    let style = match record.get("style") {
        None | Some(Value::Null) => Default::default(),
        Some(Value::String(css)) => parse_css(css),
        Some(_) => {
            return Err(DeserializationError::invalid(
                TEXT_TYPE,
                "style",
                "expected a CSS declaration string",
            ));
        }
    };
    Ok(NodeData::Text(TextNode {
        text: text.to_string(),
        format,
        style,
    }))
}

fn import_decorator(record: &Map<String, Value>) -> Result<NodeData, DeserializationError> {
    DecoratorNode::import_json(&Value::Object(record.clone())).map(NodeData::Decorator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = NodeRegistry::builtin();
        assert_eq!(
            registry.register(PARAGRAPH_TYPE, import_paragraph),
            Err(RegistryError::DuplicateNodeType(PARAGRAPH_TYPE.to_string()))
        );
        assert!(!registry.is_known_type("horizontalrule"));
        assert!(registry.register("horizontalrule", import_paragraph).is_ok());
        assert!(registry.is_known_type("horizontalrule"));
    }

    #[test]
    fn registered_importer_builds_nodes() {
        let mut registry = NodeRegistry::builtin();
        registry.register("note", import_quote).unwrap();

        let mut state = EditorState::empty();
        let record = serde_json::json!({
            "type": "note",
            "version": 1,
            "indent": 1,
            "children": [{ "type": "text", "version": 1, "text": "n" }]
        });
        let key = registry.import_node(&mut state, &record).unwrap();
        let el = state.node(key).and_then(|n| n.as_element()).unwrap();
        assert_eq!(el.kind, ElementKind::Quote);
        assert_eq!(el.indent, 1);
        assert_eq!(state.text_content(key), "n");
    }
}
