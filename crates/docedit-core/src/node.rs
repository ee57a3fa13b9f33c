use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::decorator::{Decorator, DecoratorNode};
use crate::style::StyleRecord;

pub const ROOT_TYPE: &str = "root";
pub const PARAGRAPH_TYPE: &str = "paragraph";
pub const HEADING_TYPE: &str = "heading";
pub const QUOTE_TYPE: &str = "quote";
pub const LIST_TYPE: &str = "list";
pub const LIST_ITEM_TYPE: &str = "listitem";
pub const TEXT_TYPE: &str = "text";

static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

/// Process-unique node identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeKey(u64);

impl NodeKey {
    pub(crate) fn next() -> Self {
        Self(NEXT_KEY.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NodeKey {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeadingTag {
    H1,
    H2,
    H3,
    H4,
    H5,
    H6,
}

impl HeadingTag {
    pub fn as_str(self) -> &'static str {
        match self {
            HeadingTag::H1 => "h1",
            HeadingTag::H2 => "h2",
            HeadingTag::H3 => "h3",
            HeadingTag::H4 => "h4",
            HeadingTag::H5 => "h5",
            HeadingTag::H6 => "h6",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "h1" => Some(HeadingTag::H1),
            "h2" => Some(HeadingTag::H2),
            "h3" => Some(HeadingTag::H3),
            "h4" => Some(HeadingTag::H4),
            "h5" => Some(HeadingTag::H5),
            "h6" => Some(HeadingTag::H6),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListType {
    Bullet,
    Number,
}

impl ListType {
    /// Serialized `listType` value.
    pub fn as_str(self) -> &'static str {
        match self {
            ListType::Bullet => "bullet",
            ListType::Number => "number",
        }
    }

    /// Markup tag, also used as the block display type of list items.
    pub fn tag(self) -> &'static str {
        match self {
            ListType::Bullet => "ul",
            ListType::Number => "ol",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "bullet" | "ul" => Some(ListType::Bullet),
            "number" | "ol" => Some(ListType::Number),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementAlign {
    Left,
    Center,
    Right,
    Justify,
    Start,
    End,
}

impl ElementAlign {
    pub fn as_str(self) -> &'static str {
        match self {
            ElementAlign::Left => "left",
            ElementAlign::Center => "center",
            ElementAlign::Right => "right",
            ElementAlign::Justify => "justify",
            ElementAlign::Start => "start",
            ElementAlign::End => "end",
        }
    }

    /// `Ok(None)` for the empty string, which clears alignment.
    pub fn parse(value: &str) -> Result<Option<Self>, String> {
        match value {
            "" => Ok(None),
            "left" => Ok(Some(ElementAlign::Left)),
            "center" => Ok(Some(ElementAlign::Center)),
            "right" => Ok(Some(ElementAlign::Right)),
            "justify" => Ok(Some(ElementAlign::Justify)),
            "start" => Ok(Some(ElementAlign::Start)),
            "end" => Ok(Some(ElementAlign::End)),
            other => Err(format!("unknown alignment `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextFormatKind {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Code,
    Subscript,
    Superscript,
}

impl TextFormatKind {
    pub const ALL: [TextFormatKind; 7] = [
        TextFormatKind::Bold,
        TextFormatKind::Italic,
        TextFormatKind::Underline,
        TextFormatKind::Strikethrough,
        TextFormatKind::Code,
        TextFormatKind::Subscript,
        TextFormatKind::Superscript,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TextFormatKind::Bold => "bold",
            TextFormatKind::Italic => "italic",
            TextFormatKind::Underline => "underline",
            TextFormatKind::Strikethrough => "strikethrough",
            TextFormatKind::Code => "code",
            TextFormatKind::Subscript => "subscript",
            TextFormatKind::Superscript => "superscript",
        }
    }

    fn bit(self) -> u32 {
        match self {
            TextFormatKind::Bold => 1,
            TextFormatKind::Italic => 1 << 1,
            TextFormatKind::Strikethrough => 1 << 2,
            TextFormatKind::Underline => 1 << 3,
            TextFormatKind::Code => 1 << 4,
            TextFormatKind::Subscript => 1 << 5,
            TextFormatKind::Superscript => 1 << 6,
        }
    }
}

impl FromStr for TextFormatKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TextFormatKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown text format `{s}`"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TextFormat {
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub underline: bool,
    #[serde(default)]
    pub strikethrough: bool,
    #[serde(default)]
    pub code: bool,
    #[serde(default)]
    pub subscript: bool,
    #[serde(default)]
    pub superscript: bool,
}

impl TextFormat {
    pub fn has(&self, kind: TextFormatKind) -> bool {
        match kind {
            TextFormatKind::Bold => self.bold,
            TextFormatKind::Italic => self.italic,
            TextFormatKind::Underline => self.underline,
            TextFormatKind::Strikethrough => self.strikethrough,
            TextFormatKind::Code => self.code,
            TextFormatKind::Subscript => self.subscript,
            TextFormatKind::Superscript => self.superscript,
        }
    }

    /// Subscript and superscript exclude each other.
    pub fn set(&mut self, kind: TextFormatKind, on: bool) {
        match kind {
            TextFormatKind::Bold => self.bold = on,
            TextFormatKind::Italic => self.italic = on,
            TextFormatKind::Underline => self.underline = on,
            TextFormatKind::Strikethrough => self.strikethrough = on,
            TextFormatKind::Code => self.code = on,
            TextFormatKind::Subscript => {
                self.subscript = on;
                if on {
                    self.superscript = false;
                }
            }
            TextFormatKind::Superscript => {
                self.superscript = on;
                if on {
                    self.subscript = false;
                }
            }
        }
    }

    pub fn toggle(&mut self, kind: TextFormatKind) {
        let on = !self.has(kind);
        self.set(kind, on);
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn to_bits(self) -> u32 {
        TextFormatKind::ALL
            .into_iter()
            .filter(|kind| self.has(*kind))
            .fold(0, |bits, kind| bits | kind.bit())
    }

    pub fn from_bits(bits: u32) -> Self {
        let mut format = Self::default();
        for kind in TextFormatKind::ALL {
            if bits & kind.bit() != 0 {
                format.set(kind, true);
            }
        }
        format
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Root,
    Paragraph,
    Heading(HeadingTag),
    Quote,
    List(ListType),
    ListItem,
}

impl ElementKind {
    pub fn type_name(self) -> &'static str {
        match self {
            ElementKind::Root => ROOT_TYPE,
            ElementKind::Paragraph => PARAGRAPH_TYPE,
            ElementKind::Heading(_) => HEADING_TYPE,
            ElementKind::Quote => QUOTE_TYPE,
            ElementKind::List(_) => LIST_TYPE,
            ElementKind::ListItem => LIST_ITEM_TYPE,
        }
    }

    /// Blocks whose children are inline content (text leaves).
    pub fn is_text_block(self) -> bool {
        matches!(
            self,
            ElementKind::Paragraph
                | ElementKind::Heading(_)
                | ElementKind::Quote
                | ElementKind::ListItem
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementNode {
    pub kind: ElementKind,
    pub children: Vec<NodeKey>,
    pub align: Option<ElementAlign>,
    pub indent: u32,
}

impl ElementNode {
    pub fn new(kind: ElementKind) -> Self {
        Self {
            kind,
            children: Vec::new(),
            align: None,
            indent: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextNode {
    pub text: String,
    pub format: TextFormat,
    pub style: StyleRecord,
}

impl TextNode {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Same format and style; such neighbours merge on commit.
    pub fn is_mergeable_with(&self, other: &TextNode) -> bool {
        self.format == other.format && self.style == other.style
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Element(ElementNode),
    Text(TextNode),
    Decorator(DecoratorNode),
}

impl NodeData {
    pub fn element(kind: ElementKind) -> Self {
        NodeData::Element(ElementNode::new(kind))
    }

    pub fn text(text: impl Into<String>) -> Self {
        NodeData::Text(TextNode::new(text))
    }

    pub fn decorator(decorator: Decorator) -> Self {
        NodeData::Decorator(DecoratorNode::new(decorator))
    }
}

/// One arena entry. Children are owned through the element's child list;
/// sibling navigation is derived from it.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub(crate) key: NodeKey,
    pub(crate) parent: Option<NodeKey>,
    pub data: NodeData,
}

impl Node {
    pub(crate) fn new(data: NodeData) -> Self {
        Self {
            key: NodeKey::next(),
            parent: None,
            data,
        }
    }

    pub fn key(&self) -> NodeKey {
        self.key
    }

    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    pub fn type_name(&self) -> &'static str {
        match &self.data {
            NodeData::Element(el) => el.kind.type_name(),
            NodeData::Text(_) => TEXT_TYPE,
            NodeData::Decorator(d) => d.decorator.type_name(),
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self.data, NodeData::Text(_))
    }

    pub fn is_decorator(&self) -> bool {
        matches!(self.data, NodeData::Decorator(_))
    }

    pub fn as_element(&self) -> Option<&ElementNode> {
        match &self.data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&TextNode> {
        match &self.data {
            NodeData::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_decorator(&self) -> Option<&DecoratorNode> {
        match &self.data {
            NodeData::Decorator(d) => Some(d),
            _ => None,
        }
    }

    pub fn children(&self) -> &[NodeKey] {
        match &self.data {
            NodeData::Element(el) => &el.children,
            NodeData::Text(_) | NodeData::Decorator(_) => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_bits_match_serialized_layout() {
        let mut format = TextFormat::default();
        format.set(TextFormatKind::Bold, true);
        format.set(TextFormatKind::Underline, true);
        assert_eq!(format.to_bits(), 9);
        assert_eq!(TextFormat::from_bits(9), format);
    }

    #[test]
    fn subscript_clears_superscript() {
        let mut format = TextFormat::default();
        format.toggle(TextFormatKind::Superscript);
        format.toggle(TextFormatKind::Subscript);
        assert!(format.subscript);
        assert!(!format.superscript);
    }
}
