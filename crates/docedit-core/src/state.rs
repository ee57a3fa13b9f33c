use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::debug;

use crate::decorator::DecoratorNode;
use crate::node::{ElementKind, ElementNode, Node, NodeData, NodeKey, TextNode};
use crate::selection::{Point, PointKind, RangeSelection, Selection, clamp_to_char_boundary};

/// One immutable-once-committed version of the document: the node arena
/// plus the selection.
///
/// Nodes are shared between versions through `Arc`; mutating a node in a
/// draft copies only that node.
#[derive(Debug, Clone)]
pub struct EditorState {
    nodes: HashMap<NodeKey, Arc<Node>>,
    root: NodeKey,
    selection: Option<Selection>,
    dirty: BTreeSet<NodeKey>,
    selection_dirty: bool,
}

impl Default for EditorState {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorState {
    /// A root holding one empty paragraph, caret inside it.
    pub fn new() -> Self {
        let mut state = Self::empty();
        let paragraph = state.create_node(NodeData::element(ElementKind::Paragraph));
        state.append_child(state.root, paragraph);
        state.selection = Some(Selection::caret(Point::element(paragraph, 0)));
        state.clear_dirty();
        state
    }

    /// A bare root with no children and no selection.
    pub fn empty() -> Self {
        let root = Node::new(NodeData::element(ElementKind::Root));
        let key = root.key;
        let mut nodes = HashMap::new();
        nodes.insert(key, Arc::new(root));
        Self {
            nodes,
            root: key,
            selection: None,
            dirty: BTreeSet::new(),
            selection_dirty: false,
        }
    }

    pub fn root(&self) -> NodeKey {
        self.root
    }

    pub fn node(&self, key: NodeKey) -> Option<&Node> {
        self.nodes.get(&key).map(Arc::as_ref)
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.nodes.contains_key(&key)
    }

    /// Number of nodes in the arena, detached ones included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children(self.root).is_empty()
    }

    /// True when both versions hold the same `Arc` for `key`.
    pub fn shares_node(&self, other: &EditorState, key: NodeKey) -> bool {
        match (self.nodes.get(&key), other.nodes.get(&key)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn range_selection(&self) -> Option<&RangeSelection> {
        self.selection.as_ref().and_then(Selection::as_range)
    }

    pub fn children(&self, key: NodeKey) -> &[NodeKey] {
        self.node(key).map(Node::children).unwrap_or(&[])
    }

    pub fn parent(&self, key: NodeKey) -> Option<NodeKey> {
        self.node(key)?.parent
    }

    pub fn index_in_parent(&self, key: NodeKey) -> Option<usize> {
        let parent = self.parent(key)?;
        self.children(parent).iter().position(|k| *k == key)
    }

    pub fn prev_sibling(&self, key: NodeKey) -> Option<NodeKey> {
        let parent = self.parent(key)?;
        let ix = self.index_in_parent(key)?;
        ix.checked_sub(1)
            .and_then(|prev| self.children(parent).get(prev).copied())
    }

    pub fn next_sibling(&self, key: NodeKey) -> Option<NodeKey> {
        let parent = self.parent(key)?;
        let ix = self.index_in_parent(key)?;
        self.children(parent).get(ix + 1).copied()
    }

    /// Ancestors of `key`, nearest first, excluding `key` itself.
    pub fn ancestors(&self, key: NodeKey) -> impl Iterator<Item = NodeKey> + '_ {
        std::iter::successors(self.parent(key), move |k| self.parent(*k))
    }

    /// Reachable from the root.
    pub fn is_attached(&self, key: NodeKey) -> bool {
        key == self.root || self.ancestors(key).any(|k| k == self.root)
    }

    /// The ancestor-or-self that is a direct child of the root.
    pub fn top_level(&self, key: NodeKey) -> Option<NodeKey> {
        if key == self.root {
            return None;
        }
        std::iter::once(key)
            .chain(self.ancestors(key))
            .find(|k| self.parent(*k) == Some(self.root))
    }

    /// The ancestor-or-self that is a decorator or an inline-content
    /// element. List items count; the list around them does not.
    pub fn nearest_block(&self, key: NodeKey) -> Option<NodeKey> {
        std::iter::once(key)
            .chain(self.ancestors(key))
            .find(|k| match self.node(*k).map(|n| &n.data) {
                Some(NodeData::Decorator(_)) => true,
                Some(NodeData::Element(el)) => el.kind.is_text_block(),
                _ => false,
            })
    }

    /// `key` and everything below it, preorder.
    pub fn descendants(&self, key: NodeKey) -> Vec<NodeKey> {
        let mut out = Vec::new();
        let mut stack = vec![key];
        while let Some(key) = stack.pop() {
            if !self.contains(key) {
                continue;
            }
            out.push(key);
            stack.extend(self.children(key).iter().rev().copied());
        }
        out
    }

    pub fn first_text_descendant(&self, key: NodeKey) -> Option<NodeKey> {
        self.descendants(key)
            .into_iter()
            .find(|k| self.node(*k).is_some_and(Node::is_text))
    }

    pub fn last_text_descendant(&self, key: NodeKey) -> Option<NodeKey> {
        self.descendants(key)
            .into_iter()
            .rev()
            .find(|k| self.node(*k).is_some_and(Node::is_text))
    }

    pub fn text_content(&self, key: NodeKey) -> String {
        self.descendants(key)
            .into_iter()
            .filter_map(|k| self.node(k).and_then(Node::as_text))
            .map(|t| t.text.as_str())
            .collect()
    }

    /// Keys touched since the draft was opened.
    pub fn dirty_nodes(&self) -> &BTreeSet<NodeKey> {
        &self.dirty
    }

    pub(crate) fn is_dirty(&self) -> bool {
        !self.dirty.is_empty() || self.selection_dirty
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty.clear();
        self.selection_dirty = false;
    }

    pub fn set_selection(&mut self, selection: Option<Selection>) {
        if self.selection != selection {
            self.selection = selection;
            self.selection_dirty = true;
        }
    }

    /// Adds a detached node to the arena.
    pub fn create_node(&mut self, data: NodeData) -> NodeKey {
        let node = Node::new(data);
        let key = node.key;
        self.nodes.insert(key, Arc::new(node));
        self.dirty.insert(key);
        key
    }

    pub fn node_mut(&mut self, key: NodeKey) -> Option<&mut Node> {
        let node = self.nodes.get_mut(&key)?;
        self.dirty.insert(key);
        Some(Arc::make_mut(node))
    }

    pub fn element_mut(&mut self, key: NodeKey) -> Option<&mut ElementNode> {
        if !self.node(key).is_some_and(|n| n.as_element().is_some()) {
            return None;
        }
        match &mut self.node_mut(key)?.data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn text_mut(&mut self, key: NodeKey) -> Option<&mut TextNode> {
        if !self.node(key).is_some_and(Node::is_text) {
            return None;
        }
        match &mut self.node_mut(key)?.data {
            NodeData::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn decorator_mut(&mut self, key: NodeKey) -> Option<&mut DecoratorNode> {
        if !self.node(key).is_some_and(Node::is_decorator) {
            return None;
        }
        match &mut self.node_mut(key)?.data {
            NodeData::Decorator(d) => Some(d),
            _ => None,
        }
    }

    pub fn append_child(&mut self, parent: NodeKey, child: NodeKey) -> bool {
        let len = self.children(parent).len();
        self.insert_child(parent, len, child)
    }

    /// Moves `child` (detaching it first if needed) to `index` under
    /// `parent`. Refuses non-element parents and cycles.
    pub fn insert_child(&mut self, parent: NodeKey, index: usize, child: NodeKey) -> bool {
        if child == self.root || !self.contains(child) {
            return false;
        }
        if !self.node(parent).is_some_and(|n| n.as_element().is_some()) {
            return false;
        }
        if parent == child || self.ancestors(parent).any(|k| k == child) {
            debug!(%parent, %child, "refusing to insert a node under its own subtree");
            return false;
        }

        let mut index = index;
        if self.parent(child) == Some(parent) {
            if let Some(old) = self.index_in_parent(child) {
                if old < index {
                    index -= 1;
                }
            }
        }
        self.detach(child);

        let Some(el) = self.element_mut(parent) else {
            return false;
        };
        let index = index.min(el.children.len());
        el.children.insert(index, child);
        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
        }
        true
    }

    pub fn insert_after(&mut self, sibling: NodeKey, node: NodeKey) -> bool {
        if sibling == node {
            return false;
        }
        let Some(parent) = self.parent(sibling) else {
            return false;
        };
        self.detach(node);
        let Some(ix) = self.index_in_parent(sibling) else {
            return false;
        };
        self.insert_child(parent, ix + 1, node)
    }

    pub fn insert_before(&mut self, sibling: NodeKey, node: NodeKey) -> bool {
        if sibling == node {
            return false;
        }
        let Some(parent) = self.parent(sibling) else {
            return false;
        };
        self.detach(node);
        let Some(ix) = self.index_in_parent(sibling) else {
            return false;
        };
        self.insert_child(parent, ix, node)
    }

    /// Unlinks `key` from its parent. The subtree stays in the arena.
    pub fn detach(&mut self, key: NodeKey) -> bool {
        let Some(parent) = self.parent(key) else {
            return false;
        };
        if let Some(el) = self.element_mut(parent) {
            el.children.retain(|k| *k != key);
        }
        if let Some(node) = self.node_mut(key) {
            node.parent = None;
        }
        true
    }

    /// Detaches `key` and drops its whole subtree from the arena.
    pub fn remove(&mut self, key: NodeKey) -> bool {
        if key == self.root || !self.contains(key) {
            return false;
        }
        self.detach(key);
        for k in self.descendants(key) {
            self.nodes.remove(&k);
            self.dirty.insert(k);
        }
        true
    }

    /// Splits a text node at `offset`. The left part keeps the key; the
    /// right part is a new sibling with the same format and style. `None`
    /// when `offset` is at either edge.
    pub fn split_text(&mut self, key: NodeKey, offset: usize) -> Option<NodeKey> {
        let text = self.node(key)?.as_text()?;
        let offset = clamp_to_char_boundary(&text.text, offset);
        if offset == 0 || offset >= text.text.len() {
            return None;
        }
        let mut right = text.clone();
        right.text = text.text[offset..].to_string();

        self.text_mut(key)?.text.truncate(offset);
        let right_key = self.create_node(NodeData::Text(right));
        self.insert_after(key, right_key);
        self.transform_selection_split_text(key, offset, right_key);
        Some(right_key)
    }

    /// Appends `right`'s text to `left` and removes `right`, remapping
    /// selection points.
    pub(crate) fn merge_text(&mut self, left: NodeKey, right: NodeKey) -> bool {
        let Some(right_text) = self.node(right).and_then(Node::as_text).map(|t| t.text.clone())
        else {
            return false;
        };
        let Some(left_node) = self.text_mut(left) else {
            return false;
        };
        let left_len = left_node.text.len();
        left_node.text.push_str(&right_text);
        self.transform_selection_merge_text(left, left_len, right);
        self.remove(right)
    }

    /// Replaces an element with a fresh node of `kind` at the same
    /// position. Children, alignment and indent move over; the old key is
    /// dropped.
    pub fn replace_element(&mut self, key: NodeKey, kind: ElementKind) -> Option<NodeKey> {
        let old = self.node(key)?.as_element()?.clone();
        self.parent(key)?;

        let new_key = self.create_node(NodeData::Element(ElementNode {
            kind,
            children: Vec::new(),
            align: old.align,
            indent: old.indent,
        }));
        self.insert_before(key, new_key);
        for child in old.children {
            self.append_child(new_key, child);
        }
        self.transform_selection_replace(key, new_key);
        self.remove(key);
        Some(new_key)
    }

    /// Detached copy of a decorator node under a new key.
    pub fn duplicate_decorator(&mut self, key: NodeKey) -> Option<NodeKey> {
        let data = self.node(key)?.as_decorator()?.clone();
        Some(self.create_node(NodeData::Decorator(data)))
    }

    fn transform_selection_split_text(&mut self, key: NodeKey, offset: usize, right: NodeKey) {
        let Some(Selection::Range(mut range)) = self.selection.clone() else {
            return;
        };
        for point in [&mut range.anchor, &mut range.focus] {
            if point.key == key && point.kind == PointKind::Text && point.offset > offset {
                *point = Point::text(right, point.offset - offset);
            }
        }
        self.set_selection(Some(Selection::Range(range)));
    }

    fn transform_selection_merge_text(&mut self, left: NodeKey, left_len: usize, right: NodeKey) {
        let Some(Selection::Range(mut range)) = self.selection.clone() else {
            return;
        };
        for point in [&mut range.anchor, &mut range.focus] {
            if point.key == right {
                *point = Point::text(left, left_len + point.offset);
            }
        }
        self.set_selection(Some(Selection::Range(range)));
    }

    fn transform_selection_replace(&mut self, old: NodeKey, new: NodeKey) {
        match self.selection.clone() {
            Some(Selection::Range(mut range)) => {
                for point in [&mut range.anchor, &mut range.focus] {
                    if point.key == old {
                        point.key = new;
                    }
                }
                self.set_selection(Some(Selection::Range(range)));
            }
            Some(Selection::Node(mut nodes)) if nodes.contains(old) => {
                nodes.remove(old);
                nodes.add(new);
                self.set_selection(Some(Selection::Node(nodes)));
            }
            _ => {}
        }
    }

    /// Drops selection references to nodes that no longer exist. A range
    /// with a stale point is cleared; node selections lose stale keys.
    pub(crate) fn normalize_selection(&mut self) {
        match self.selection.clone() {
            Some(Selection::Range(range)) => {
                let live = |p: &Point| self.node(p.key).is_some() && self.is_attached(p.key);
                if !live(&range.anchor) || !live(&range.focus) {
                    debug!("range selection points at a removed node; clearing");
                    self.set_selection(None);
                }
            }
            Some(Selection::Node(mut nodes)) => {
                let stale: Vec<NodeKey> = nodes
                    .keys()
                    .iter()
                    .copied()
                    .filter(|k| !self.contains(*k) || !self.is_attached(*k))
                    .collect();
                if stale.is_empty() {
                    return;
                }
                for key in stale {
                    nodes.remove(key);
                }
                if nodes.is_empty() {
                    self.set_selection(None);
                } else {
                    self.set_selection(Some(Selection::Node(nodes)));
                }
            }
            None => {}
        }
    }

    /// Commit-time tree normalization:
    /// - a root with no children gets an empty paragraph
    /// - adjacent text siblings with equal format and style merge
    /// - empty text nodes with a text sibling and no selection point on
    ///   them are removed
    /// - lists without items are removed
    /// - detached subtrees are dropped from the arena
    pub(crate) fn normalize(&mut self) {
        self.drop_detached();

        let elements: Vec<NodeKey> = self
            .descendants(self.root)
            .into_iter()
            .filter(|k| self.node(*k).is_some_and(|n| n.as_element().is_some()))
            .collect();
        for key in elements {
            self.normalize_text_children(key);
        }

        let empty_lists: Vec<NodeKey> = self
            .descendants(self.root)
            .into_iter()
            .filter(|k| {
                self.node(*k).is_some_and(|n| {
                    matches!(n.as_element(), Some(el) if matches!(el.kind, ElementKind::List(_)) && el.children.is_empty())
                })
            })
            .collect();
        for key in empty_lists {
            self.remove(key);
        }

        if self.children(self.root).is_empty() {
            let paragraph = self.create_node(NodeData::element(ElementKind::Paragraph));
            self.append_child(self.root, paragraph);
        }

        self.normalize_selection();
    }

    fn normalize_text_children(&mut self, parent: NodeKey) {
        let mut ix = 0;
        while ix + 1 < self.children(parent).len() {
            let children = self.children(parent);
            let (left, right) = (children[ix], children[ix + 1]);
            let mergeable = match (
                self.node(left).and_then(Node::as_text),
                self.node(right).and_then(Node::as_text),
            ) {
                (Some(a), Some(b)) => a.is_mergeable_with(b),
                _ => false,
            };
            if mergeable {
                self.merge_text(left, right);
            } else {
                ix += 1;
            }
        }

        let referenced = self.selection_keys();
        let children = self.children(parent).to_vec();
        let text_children = children
            .iter()
            .filter(|k| self.node(**k).is_some_and(Node::is_text))
            .count();
        if text_children < 2 {
            return;
        }
        let mut remaining = text_children;
        for key in children {
            if remaining < 2 {
                break;
            }
            let empty = self
                .node(key)
                .and_then(Node::as_text)
                .is_some_and(|t| t.text.is_empty());
            if empty && !referenced.contains(&key) {
                self.remove(key);
                remaining -= 1;
            }
        }
    }

    fn selection_keys(&self) -> Vec<NodeKey> {
        match &self.selection {
            Some(Selection::Range(range)) => vec![range.anchor.key, range.focus.key],
            Some(Selection::Node(nodes)) => nodes.keys().to_vec(),
            None => Vec::new(),
        }
    }

    fn drop_detached(&mut self) {
        let attached: BTreeSet<NodeKey> = self.descendants(self.root).into_iter().collect();
        if attached.len() == self.nodes.len() {
            return;
        }
        let detached: Vec<NodeKey> = self
            .nodes
            .keys()
            .copied()
            .filter(|k| !attached.contains(k))
            .collect();
        debug!(count = detached.len(), "dropping detached nodes");
        for key in detached {
            self.nodes.remove(&key);
            self.dirty.insert(key);
        }
    }
}
