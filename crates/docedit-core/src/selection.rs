use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;

use crate::node::{ElementKind, NodeData, NodeKey, TextFormat};
use crate::state::EditorState;
use crate::style::StyleRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointKind {
    /// `offset` is a byte offset into a text node.
    Text,
    /// `offset` is a child index of an element.
    Element,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub key: NodeKey,
    pub offset: usize,
    pub kind: PointKind,
}

impl Point {
    pub fn text(key: NodeKey, offset: usize) -> Self {
        Self {
            key,
            offset,
            kind: PointKind::Text,
        }
    }

    pub fn element(key: NodeKey, offset: usize) -> Self {
        Self {
            key,
            offset,
            kind: PointKind::Element,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RangeSelection {
    pub anchor: Point,
    pub focus: Point,
    /// Format applied to text typed at a collapsed caret. `None` inherits
    /// the anchor text node's format.
    pub format: Option<TextFormat>,
    /// Style applied to text typed at a collapsed caret, layered over the
    /// anchor text node's style.
    pub style: StyleRecord,
}

impl RangeSelection {
    pub fn new(anchor: Point, focus: Point) -> Self {
        Self {
            anchor,
            focus,
            format: None,
            style: StyleRecord::new(),
        }
    }

    pub fn caret(point: Point) -> Self {
        Self::new(point, point)
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeSelection {
    keys: Vec<NodeKey>,
}

impl NodeSelection {
    pub fn new(keys: impl IntoIterator<Item = NodeKey>) -> Self {
        let mut selection = Self::default();
        for key in keys {
            selection.add(key);
        }
        selection
    }

    pub fn add(&mut self, key: NodeKey) {
        if !self.keys.contains(&key) {
            self.keys.push(key);
        }
    }

    pub fn remove(&mut self, key: NodeKey) {
        self.keys.retain(|k| *k != key);
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.keys.contains(&key)
    }

    pub fn keys(&self) -> &[NodeKey] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Range(RangeSelection),
    Node(NodeSelection),
}

impl Selection {
    pub fn caret(point: Point) -> Self {
        Selection::Range(RangeSelection::caret(point))
    }

    pub fn range(anchor: Point, focus: Point) -> Self {
        Selection::Range(RangeSelection::new(anchor, focus))
    }

    pub fn node(key: NodeKey) -> Self {
        Selection::Node(NodeSelection::new([key]))
    }

    pub fn is_range(&self) -> bool {
        matches!(self, Selection::Range(_))
    }

    pub fn is_node(&self) -> bool {
        matches!(self, Selection::Node(_))
    }

    pub fn as_range(&self) -> Option<&RangeSelection> {
        match self {
            Selection::Range(range) => Some(range),
            Selection::Node(_) => None,
        }
    }

    pub fn as_node(&self) -> Option<&NodeSelection> {
        match self {
            Selection::Node(nodes) => Some(nodes),
            Selection::Range(_) => None,
        }
    }
}

/// "The block currently relevant to the user".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockDescriptor {
    pub key: NodeKey,
    #[serde(rename = "type")]
    pub block_type: &'static str,
}

/// Display type of a structural node: heading tag for headings, list tag
/// for lists and list items, the raw type tag otherwise.
pub fn display_type(state: &EditorState, key: NodeKey) -> Option<&'static str> {
    let node = state.node(key)?;
    let display = match &node.data {
        NodeData::Element(el) => match el.kind {
            ElementKind::Heading(tag) => tag.as_str(),
            ElementKind::List(list_type) => list_type.tag(),
            ElementKind::ListItem => node
                .parent()
                .and_then(|parent| state.node(parent))
                .and_then(|parent| match parent.as_element().map(|el| el.kind) {
                    Some(ElementKind::List(list_type)) => Some(list_type.tag()),
                    _ => None,
                })
                .unwrap_or(node.type_name()),
            _ => node.type_name(),
        },
        NodeData::Text(_) | NodeData::Decorator(_) => node.type_name(),
    };
    Some(display)
}

/// Nearest non-text ancestor (or self) of the range selection's anchor.
///
/// Pure read over the snapshot; `None` for node selections, no selection,
/// or a stale anchor key.
pub fn resolve_current_block(state: &EditorState) -> Option<BlockDescriptor> {
    let range = state.selection()?.as_range()?;
    let anchor = state.node(range.anchor.key)?;

    let block = if !anchor.is_text() {
        anchor.key()
    } else {
        state
            .ancestors(anchor.key())
            .find(|key| state.node(*key).is_some_and(|n| !n.is_text()))
            .unwrap_or(anchor.key())
    };

    Some(BlockDescriptor {
        key: block,
        block_type: display_type(state, block)?,
    })
}

/// Portion of one leaf covered by a range. Decorators are leaves of length
/// one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectedLeaf {
    pub key: NodeKey,
    pub start: usize,
    pub end: usize,
    pub is_text: bool,
}

struct LeafIndex {
    leaves: Vec<(NodeKey, usize, bool)>,
    /// Leaves before entering / after leaving each node's subtree.
    spans: HashMap<NodeKey, (usize, usize)>,
}

impl LeafIndex {
    fn build(state: &EditorState) -> Self {
        fn walk(state: &EditorState, key: NodeKey, index: &mut LeafIndex) {
            let before = index.leaves.len();
            if let Some(node) = state.node(key) {
                match &node.data {
                    NodeData::Text(t) => index.leaves.push((key, t.text.len(), true)),
                    NodeData::Decorator(_) => index.leaves.push((key, 1, false)),
                    NodeData::Element(el) => {
                        for child in &el.children {
                            walk(state, *child, index);
                        }
                    }
                }
            }
            index.spans.insert(key, (before, index.leaves.len()));
        }

        let mut index = LeafIndex {
            leaves: Vec::new(),
            spans: HashMap::new(),
        };
        walk(state, state.root(), &mut index);
        index
    }

    /// `(leaf index, offset within leaf)`; a leaf index equal to the leaf
    /// count means "after the last leaf".
    fn position(&self, state: &EditorState, point: &Point) -> Option<(usize, usize)> {
        let &(before, after) = self.spans.get(&point.key)?;
        let node = state.node(point.key)?;
        let position = match &node.data {
            NodeData::Text(t) => (before, clamp_to_char_boundary(&t.text, point.offset)),
            NodeData::Decorator(_) => (before, point.offset.min(1)),
            NodeData::Element(el) => match el.children.get(point.offset) {
                Some(child) => (self.spans.get(child)?.0, 0),
                None => (after, 0),
            },
        };
        Some(self.canonical(position))
    }

    fn canonical(&self, (ix, offset): (usize, usize)) -> (usize, usize) {
        match self.leaves.get(ix) {
            Some(&(_, len, _)) if offset >= len => (ix + 1, 0),
            _ => (ix, offset),
        }
    }
}

/// Orders two points in document order. `None` if either is stale.
pub fn compare_points(state: &EditorState, a: &Point, b: &Point) -> Option<Ordering> {
    let index = LeafIndex::build(state);
    Some(index.position(state, a)?.cmp(&index.position(state, b)?))
}

/// True when the focus precedes the anchor.
pub fn is_backward(state: &EditorState, range: &RangeSelection) -> bool {
    compare_points(state, &range.anchor, &range.focus) == Some(Ordering::Greater)
}

/// Leaves covered by a non-collapsed range, in document order. Empty for a
/// collapsed or stale range.
pub fn selected_leaves(state: &EditorState, range: &RangeSelection) -> Vec<SelectedLeaf> {
    let index = LeafIndex::build(state);
    let (Some(a), Some(b)) = (
        index.position(state, &range.anchor),
        index.position(state, &range.focus),
    ) else {
        return Vec::new();
    };
    let (start, end) = if a <= b { (a, b) } else { (b, a) };

    let mut out = Vec::new();
    for ix in start.0..end.0.saturating_add(1).min(index.leaves.len()) {
        let (key, len, is_text) = index.leaves[ix];
        let s = if ix == start.0 { start.1 } else { 0 };
        let e = if ix == end.0 { end.1 } else { len };
        if s < e {
            out.push(SelectedLeaf {
                key,
                start: s,
                end: e,
                is_text,
            });
        }
    }
    out
}

/// Blocks the selection touches, in document order: the nearest block of
/// every selected leaf, or of the anchor for a collapsed caret. Node
/// selections touch their selected nodes' blocks.
pub fn touched_blocks(state: &EditorState) -> Vec<NodeKey> {
    let mut out: Vec<NodeKey> = Vec::new();
    let mut push = |key: Option<NodeKey>| {
        if let Some(key) = key {
            if !out.contains(&key) {
                out.push(key);
            }
        }
    };

    match state.selection() {
        Some(Selection::Range(range)) => {
            let leaves = selected_leaves(state, range);
            if leaves.is_empty() {
                push(anchor_block(state, &range.anchor));
            }
            for leaf in leaves {
                push(state.nearest_block(leaf.key));
            }
        }
        Some(Selection::Node(nodes)) => {
            for key in nodes.keys() {
                push(state.nearest_block(*key));
            }
        }
        None => {}
    }
    out
}

fn anchor_block(state: &EditorState, point: &Point) -> Option<NodeKey> {
    if let Some(block) = state.nearest_block(point.key) {
        return Some(block);
    }
    // Caret on the root itself: the child at the caret, or the last one.
    let children = state.children(point.key);
    children
        .get(point.offset)
        .or_else(|| children.last())
        .and_then(|child| state.nearest_block(*child))
}

pub(crate) fn clamp_to_char_boundary(s: &str, mut ix: usize) -> usize {
    ix = ix.min(s.len());
    while ix > 0 && !s.is_char_boundary(ix) {
        ix -= 1;
    }
    ix
}
