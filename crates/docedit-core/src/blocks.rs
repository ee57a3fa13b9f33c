//! Block-level edits behind the structural commands.

use std::cmp::Ordering;

use tracing::debug;

use crate::decorator::Decorator;
use crate::node::{ElementAlign, ElementKind, ElementNode, HeadingTag, ListType, Node, NodeData, NodeKey};
use crate::selection::{Point, PointKind, Selection, compare_points, touched_blocks};
use crate::state::EditorState;

/// Target of `set-block-type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTarget {
    Paragraph,
    Heading(HeadingTag),
    Quote,
    List(ListType),
}

impl BlockTarget {
    /// Accepts `paragraph`, `h1`..`h6`, `quote`, `ul`, `ol` (and the list
    /// type names `bullet`/`number`).
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "paragraph" => Some(BlockTarget::Paragraph),
            "quote" => Some(BlockTarget::Quote),
            other => HeadingTag::parse(other)
                .map(BlockTarget::Heading)
                .or_else(|| ListType::parse(other).map(BlockTarget::List)),
        }
    }

    fn element_kind(self) -> ElementKind {
        match self {
            BlockTarget::Paragraph => ElementKind::Paragraph,
            BlockTarget::Heading(tag) => ElementKind::Heading(tag),
            BlockTarget::Quote => ElementKind::Quote,
            BlockTarget::List(list_type) => ElementKind::List(list_type),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndentDirection {
    Increase,
    Decrease,
}

fn element_kind(state: &EditorState, key: NodeKey) -> Option<ElementKind> {
    state.node(key)?.as_element().map(|el| el.kind)
}

fn list_type_of(state: &EditorState, key: NodeKey) -> Option<ListType> {
    match element_kind(state, key)? {
        ElementKind::List(list_type) => Some(list_type),
        _ => None,
    }
}

/// The list a list item sits in, with its type.
fn parent_list(state: &EditorState, item: NodeKey) -> Option<(NodeKey, ListType)> {
    if element_kind(state, item)? != ElementKind::ListItem {
        return None;
    }
    let list = state.parent(item)?;
    Some((list, list_type_of(state, list)?))
}

/// Caret at the start of `block`: first text descendant, else an element
/// point inside it.
pub(crate) fn start_point(state: &EditorState, block: NodeKey) -> Point {
    match state.first_text_descendant(block) {
        Some(text) => Point::text(text, 0),
        None => Point::element(block, 0),
    }
}

/// Caret at the end of `block`.
pub(crate) fn end_point(state: &EditorState, block: NodeKey) -> Point {
    match state.last_text_descendant(block) {
        Some(text) => {
            let len = state
                .node(text)
                .and_then(Node::as_text)
                .map_or(0, |t| t.text.len());
            Point::text(text, len)
        }
        None => Point::element(block, state.children(block).len()),
    }
}

/// Selection after moving onto `key`: caret at its end for elements and
/// text, node selection for decorators.
fn selection_at_end_of(state: &EditorState, key: NodeKey) -> Option<Selection> {
    let node = state.node(key)?;
    Some(match &node.data {
        NodeData::Decorator(_) => Selection::node(key),
        NodeData::Text(t) => Selection::caret(Point::text(key, t.text.len())),
        NodeData::Element(_) => Selection::caret(end_point(state, key)),
    })
}

fn select_start_of(state: &mut EditorState, block: NodeKey) {
    let point = start_point(state, block);
    state.set_selection(Some(Selection::caret(point)));
}

/// Inserts a block decorator next to the nearest top-level block of the
/// selection and returns its key.
pub fn insert_block_decorator(state: &mut EditorState, decorator: Decorator) -> NodeKey {
    let key = state.create_node(NodeData::decorator(decorator));
    match state.selection().cloned() {
        Some(Selection::Range(range)) => insert_at_point(state, key, range.focus),
        Some(Selection::Node(nodes)) => {
            let after = nodes.keys().last().and_then(|k| state.top_level(*k));
            insert_after_block(state, key, after);
        }
        None => insert_after_block(state, key, None),
    }
    debug!(%key, "inserted decorator");
    key
}

fn insert_after_block(state: &mut EditorState, key: NodeKey, block: Option<NodeKey>) {
    match block {
        Some(block) => state.insert_after(block, key),
        None => state.append_child(state.root(), key),
    };
    let paragraph = state.create_node(NodeData::element(ElementKind::Paragraph));
    state.insert_after(key, paragraph);
    state.set_selection(Some(Selection::caret(Point::element(paragraph, 0))));
}

fn insert_at_point(state: &mut EditorState, key: NodeKey, focus: Point) {
    let root = state.root();
    let Some(block) = state.top_level(focus.key) else {
        // Caret on the root: insert at the child index.
        let before = state.children(root).get(focus.offset).copied();
        match before {
            Some(before) => state.insert_before(before, key),
            None => state.append_child(root, key),
        };
        ensure_block_after(state, key);
        return;
    };

    let at_start = compare_points(state, &focus, &Point::element(block, 0)) != Some(Ordering::Greater);
    let at_end = compare_points(
        state,
        &focus,
        &Point::element(block, state.children(block).len()),
    ) != Some(Ordering::Less);

    if at_start && !at_end {
        state.insert_before(block, key);
        select_start_of(state, block);
        return;
    }
    if at_end {
        state.insert_after(block, key);
        ensure_block_after(state, key);
        return;
    }

    match split_block(state, block, focus) {
        Some(right) => {
            state.insert_after(block, key);
            select_start_of(state, right);
        }
        None => {
            state.insert_after(block, key);
            ensure_block_after(state, key);
        }
    }
}

/// Selects the start of the block after `key`, creating an empty paragraph
/// when there is no editable block there.
fn ensure_block_after(state: &mut EditorState, key: NodeKey) {
    let next = state
        .next_sibling(key)
        .filter(|next| state.node(*next).is_some_and(|n| n.as_element().is_some()));
    let next = match next {
        Some(next) => next,
        None => {
            let paragraph = state.create_node(NodeData::element(ElementKind::Paragraph));
            state.insert_after(key, paragraph);
            paragraph
        }
    };
    select_start_of(state, next);
}

/// Splits a paragraph, heading or quote at `point`; the right half becomes
/// a new sibling of the same kind. Returns the right half.
fn split_block(state: &mut EditorState, block: NodeKey, point: Point) -> Option<NodeKey> {
    let el = state.node(block)?.as_element()?.clone();
    if !matches!(
        el.kind,
        ElementKind::Paragraph | ElementKind::Heading(_) | ElementKind::Quote
    ) {
        return None;
    }

    let split_ix = match point.kind {
        PointKind::Text if state.parent(point.key) == Some(block) => {
            let ix = state.index_in_parent(point.key)?;
            let len = state.node(point.key)?.as_text()?.text.len();
            if point.offset == 0 {
                ix
            } else if point.offset >= len {
                ix + 1
            } else {
                state.split_text(point.key, point.offset)?;
                ix + 1
            }
        }
        PointKind::Element if point.key == block => point.offset,
        _ => return None,
    };

    let right = state.create_node(NodeData::Element(ElementNode {
        kind: el.kind,
        children: Vec::new(),
        align: el.align,
        indent: el.indent,
    }));
    state.insert_after(block, right);
    let moved: Vec<NodeKey> = state.children(block).iter().skip(split_ix).copied().collect();
    for child in moved {
        state.append_child(right, child);
    }
    Some(right)
}

/// Element blocks the selection touches, decorators skipped.
fn touched_elements(state: &EditorState) -> Vec<NodeKey> {
    touched_blocks(state)
        .into_iter()
        .filter(|k| element_kind(state, *k).is_some())
        .collect()
}

pub fn set_block_type(state: &mut EditorState, target: BlockTarget) -> bool {
    let blocks = touched_elements(state);
    if blocks.is_empty() {
        return false;
    }
    match target {
        BlockTarget::List(list_type) => toggle_list(state, &blocks, list_type),
        other => {
            let kind = other.element_kind();
            for block in blocks {
                let block = if parent_list(state, block).is_some() {
                    match lift_list_item(state, block) {
                        Some(lifted) => lifted,
                        None => continue,
                    }
                } else {
                    block
                };
                if element_kind(state, block) != Some(kind) {
                    state.replace_element(block, kind);
                }
            }
        }
    }
    true
}

fn toggle_list(state: &mut EditorState, blocks: &[NodeKey], list_type: ListType) {
    let all_in_same_type = blocks
        .iter()
        .all(|b| parent_list(state, *b).is_some_and(|(_, t)| t == list_type));
    if all_in_same_type {
        for block in blocks {
            if let Some(lifted) = lift_list_item(state, *block) {
                state.replace_element(lifted, ElementKind::Paragraph);
            }
        }
        return;
    }

    let mut switched: Vec<NodeKey> = Vec::new();
    let mut run: Vec<NodeKey> = Vec::new();
    for block in blocks {
        match parent_list(state, *block) {
            Some((_, t)) if t == list_type => flush_run(state, &mut run, list_type),
            Some((list, _)) => {
                flush_run(state, &mut run, list_type);
                if !switched.contains(&list) {
                    switched.push(list);
                }
            }
            None => {
                let adjacent = run.last().is_none_or(|last| state.next_sibling(*last) == Some(*block));
                if !adjacent {
                    flush_run(state, &mut run, list_type);
                }
                run.push(*block);
            }
        }
    }
    flush_run(state, &mut run, list_type);

    for list in switched {
        state.replace_element(list, ElementKind::List(list_type));
    }
}

/// Wraps a run of adjacent sibling blocks into a list, joining a list of
/// the same type directly before or after the run.
fn flush_run(state: &mut EditorState, run: &mut Vec<NodeKey>, list_type: ListType) {
    let Some(&first) = run.first() else {
        return;
    };
    let Some(&last) = run.last() else {
        return;
    };

    let list = match state
        .prev_sibling(first)
        .filter(|prev| list_type_of(state, *prev) == Some(list_type))
    {
        Some(prev) => prev,
        None => {
            let list = state.create_node(NodeData::element(ElementKind::List(list_type)));
            state.insert_before(first, list);
            list
        }
    };
    let following = state
        .next_sibling(last)
        .filter(|next| list_type_of(state, *next) == Some(list_type));

    for block in run.drain(..) {
        if let Some(item) = state.replace_element(block, ElementKind::ListItem) {
            state.append_child(list, item);
        }
    }

    if let Some(following) = following {
        let items: Vec<NodeKey> = state.children(following).to_vec();
        for item in items {
            state.append_child(list, item);
        }
        state.remove(following);
    }
}

/// Moves a list item out of its list to sit right after it. Items after it
/// move into a new list of the same type; a list left empty is removed.
/// Returns the item, still a list item, now outside any list.
fn lift_list_item(state: &mut EditorState, item: NodeKey) -> Option<NodeKey> {
    let (list, list_type) = parent_list(state, item)?;
    let ix = state.index_in_parent(item)?;
    let after: Vec<NodeKey> = state.children(list).iter().skip(ix + 1).copied().collect();

    state.insert_after(list, item);
    if !after.is_empty() {
        let tail = state.create_node(NodeData::element(ElementKind::List(list_type)));
        state.insert_after(item, tail);
        for key in after {
            state.append_child(tail, key);
        }
    }
    if state.children(list).is_empty() {
        state.remove(list);
    }
    Some(item)
}

/// Sets (or clears with `None`) the alignment of every touched block,
/// decorators included.
pub fn format_element(state: &mut EditorState, align: Option<ElementAlign>) -> bool {
    let blocks = touched_blocks(state);
    for block in &blocks {
        let current = match state.node(*block).map(|n| &n.data) {
            Some(NodeData::Element(el)) => el.align,
            Some(NodeData::Decorator(d)) => d.align,
            _ => continue,
        };
        if current == align {
            continue;
        }
        if let Some(el) = state.element_mut(*block) {
            el.align = align;
        } else if let Some(d) = state.decorator_mut(*block) {
            d.align = align;
        }
    }
    !blocks.is_empty()
}

/// Moves every touched element block one indent level, bounded by zero and
/// `max`. Blocks already at the bound are left alone; an imported block
/// indented past `max` is never pulled back by an increase.
pub fn adjust_indent(state: &mut EditorState, direction: IndentDirection, max: u32) -> bool {
    let blocks = touched_elements(state);
    for block in &blocks {
        let Some(current) = state.node(*block).and_then(Node::as_element).map(|el| el.indent) else {
            continue;
        };
        let next = match direction {
            IndentDirection::Increase if current >= max => continue,
            IndentDirection::Increase => current.saturating_add(1),
            IndentDirection::Decrease => current.saturating_sub(1),
        };
        if next == current {
            continue;
        }
        if let Some(el) = state.element_mut(*block) {
            el.indent = next;
        }
    }
    !blocks.is_empty()
}

/// Removes node-selected decorators. The selection moves to the previous
/// sibling of the first removed node, or is cleared when there is none.
/// `false` when the selection holds no decorator.
pub fn remove_selected_decorators(state: &mut EditorState) -> bool {
    let Some(Selection::Node(nodes)) = state.selection().cloned() else {
        return false;
    };
    let doomed: Vec<NodeKey> = nodes
        .keys()
        .iter()
        .copied()
        .filter(|k| state.node(*k).is_some_and(Node::is_decorator))
        .collect();
    let Some(&first) = doomed.first() else {
        return false;
    };

    let previous = std::iter::successors(state.prev_sibling(first), |k| state.prev_sibling(*k))
        .find(|k| !doomed.contains(k));
    let selection = previous.and_then(|prev| selection_at_end_of(state, prev));
    state.set_selection(selection);

    for key in doomed {
        state.remove(key);
    }
    true
}

/// Node-selects a clicked decorator; `extend` adds it to an existing node
/// selection.
pub fn select_decorator(state: &mut EditorState, key: NodeKey, extend: bool) -> bool {
    if !state.node(key).is_some_and(Node::is_decorator) || !state.is_attached(key) {
        return false;
    }
    let selection = match state.selection().cloned() {
        Some(Selection::Node(mut nodes)) if extend => {
            nodes.add(key);
            Selection::Node(nodes)
        }
        _ => Selection::node(key),
    };
    state.set_selection(Some(selection));
    true
}
