mod common;

use common::{block_texts, block_types, editor_with, editor_with_config, image, list, paragraph, text_key};
use docedit_core::{Editor, EditorConfig, Node, NodeKey, Point, Selection};
use serde_json::json;

fn select_across(editor: &mut Editor, from: &str, to: &str) {
    let state = editor.state();
    let start = text_key(&state, from);
    let end = text_key(&state, to);
    editor.set_selection(Some(Selection::range(
        Point::text(start, 0),
        Point::text(end, to.len()),
    )));
}

fn indent_of(editor: &Editor, key: NodeKey) -> u32 {
    editor
        .state()
        .node(key)
        .and_then(Node::as_element)
        .map(|el| el.indent)
        .unwrap()
}

#[test]
fn paragraph_becomes_heading_and_back() {
    let mut editor = editor_with(json!([paragraph("title"), paragraph("body")]));
    let title = text_key(&editor.state(), "title");
    editor.set_selection(Some(Selection::caret(Point::text(title, 2))));

    assert!(editor.dispatch("set-block-type", Some(json!("h2"))));
    assert_eq!(block_types(&editor.state()), vec!["h2", "paragraph"]);
    assert_eq!(editor.current_block_descriptor().unwrap().block_type, "h2");

    assert!(editor.dispatch("set-block-type", Some(json!("quote"))));
    assert_eq!(block_types(&editor.state()), vec!["quote", "paragraph"]);

    assert!(editor.dispatch("set-block-type", Some(json!("paragraph"))));
    assert_eq!(block_types(&editor.state()), vec!["paragraph", "paragraph"]);
    assert_eq!(block_texts(&editor.state()), vec!["title", "body"]);
}

#[test]
fn unknown_block_type_is_unhandled() {
    let mut editor = editor_with(json!([paragraph("a")]));
    let a = text_key(&editor.state(), "a");
    editor.set_selection(Some(Selection::caret(Point::text(a, 0))));
    assert!(!editor.dispatch("set-block-type", Some(json!("h7"))));
    assert!(!editor.dispatch("set-block-type", None));
    assert_eq!(block_types(&editor.state()), vec!["paragraph"]);
}

#[test]
fn toggling_a_list_twice_restores_paragraphs() {
    let mut editor = editor_with(json!([paragraph("a"), paragraph("b")]));
    select_across(&mut editor, "a", "b");

    assert!(editor.dispatch("set-block-type", Some(json!("ul"))));
    let state = editor.state();
    assert_eq!(block_types(&state), vec!["ul"]);
    let list = state.children(state.root())[0];
    assert_eq!(state.children(list).len(), 2);
    assert_eq!(block_texts(&state), vec!["ab"]);

    assert!(editor.dispatch("set-block-type", Some(json!("ul"))));
    let state = editor.state();
    assert_eq!(block_types(&state), vec!["paragraph", "paragraph"]);
    assert_eq!(block_texts(&state), vec!["a", "b"]);
}

#[test]
fn other_list_type_switches_the_list() {
    let mut editor = editor_with(json!([list("bullet", &["one", "two"])]));
    let one = text_key(&editor.state(), "one");
    editor.set_selection(Some(Selection::caret(Point::text(one, 1))));

    assert!(editor.dispatch("set-block-type", Some(json!("ol"))));
    let state = editor.state();
    assert_eq!(block_types(&state), vec!["ol"]);
    let list = state.children(state.root())[0];
    assert_eq!(state.children(list).len(), 2);
    assert_eq!(editor.current_block_descriptor().unwrap().block_type, "ol");
}

#[test]
fn paragraph_next_to_a_list_joins_it() {
    let mut editor = editor_with(json!([list("bullet", &["one"]), paragraph("two")]));
    let two = text_key(&editor.state(), "two");
    editor.set_selection(Some(Selection::caret(Point::text(two, 0))));

    assert!(editor.dispatch("set-block-type", Some(json!("bullet"))));
    let state = editor.state();
    assert_eq!(block_types(&state), vec!["ul"]);
    let list = state.children(state.root())[0];
    assert_eq!(state.children(list).len(), 2);
}

#[test]
fn heading_from_middle_item_splits_the_list() {
    let mut editor = editor_with(json!([list("number", &["one", "two", "three"])]));
    let two = text_key(&editor.state(), "two");
    editor.set_selection(Some(Selection::caret(Point::text(two, 0))));

    assert!(editor.dispatch("set-block-type", Some(json!("h1"))));
    let state = editor.state();
    assert_eq!(block_types(&state), vec!["ol", "h1", "ol"]);
    assert_eq!(block_texts(&state), vec!["one", "two", "three"]);
}

#[test]
fn indent_is_bounded() {
    let mut editor = editor_with(json!([paragraph("a")]));
    let a = text_key(&editor.state(), "a");
    let p = editor.state().parent(a).unwrap();
    editor.set_selection(Some(Selection::caret(Point::text(a, 0))));

    assert!(editor.dispatch("outdent", None));
    assert_eq!(indent_of(&editor, p), 0);

    for _ in 0..10 {
        assert!(editor.dispatch("indent", None));
    }
    assert_eq!(indent_of(&editor, p), 8);

    assert!(editor.dispatch("outdent", None));
    assert_eq!(indent_of(&editor, p), 7);
}

#[test]
fn indent_limit_comes_from_config() {
    let config = EditorConfig::from_json_str(r#"{ "max_indent": 2 }"#).unwrap();
    let mut editor = editor_with_config(json!([paragraph("a")]), config);
    let a = text_key(&editor.state(), "a");
    let p = editor.state().parent(a).unwrap();
    editor.set_selection(Some(Selection::caret(Point::text(a, 0))));

    for _ in 0..5 {
        editor.dispatch("indent", None);
    }
    assert_eq!(indent_of(&editor, p), 2);
    assert!(editor.export_markup().contains("padding-inline-start: 80px"));
}

#[test]
fn indent_keeps_imported_depth_past_the_limit() {
    let mut editor = editor_with(json!([
        { "type": "paragraph", "version": 1, "indent": 12, "children": [common::text("deep")] }
    ]));
    let deep = text_key(&editor.state(), "deep");
    let p = editor.state().parent(deep).unwrap();
    editor.set_selection(Some(Selection::caret(Point::text(deep, 0))));

    assert!(editor.dispatch("indent", None));
    assert_eq!(indent_of(&editor, p), 12);

    assert!(editor.dispatch("outdent", None));
    assert_eq!(indent_of(&editor, p), 11);
}

#[test]
fn alignment_applies_to_blocks_and_decorators() {
    let mut editor = editor_with(json!([paragraph("a"), image("x.png")]));
    let state = editor.state();
    let img = state.children(state.root())[1];

    editor.set_selection(Some(Selection::node(img)));
    assert!(editor.dispatch("format-element", Some(json!("center"))));
    let exported = editor.export_json().into_document();
    assert_eq!(exported["root"]["children"][1]["format"], json!("center"));

    let a = text_key(&editor.state(), "a");
    editor.set_selection(Some(Selection::caret(Point::text(a, 1))));
    assert!(editor.dispatch("format-element", Some(json!("right"))));
    assert!(!editor.dispatch("format-element", Some(json!("sideways"))));

    let exported = editor.export_json().into_document();
    assert_eq!(exported["root"]["children"][0]["format"], json!("right"));
    assert_eq!(exported["root"]["children"][1]["format"], json!("center"));

    assert!(editor.dispatch("format-element", Some(json!(""))));
    let exported = editor.export_json().into_document();
    assert_eq!(exported["root"]["children"][0]["format"], json!(""));
}
