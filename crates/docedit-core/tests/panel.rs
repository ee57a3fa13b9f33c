mod common;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use common::{editor_with, editor_with_config, heading, image, paragraph, text_key};
use docedit_core::{Editor, EditorConfig, PanelSync, Point, Selection};
use serde_json::json;

#[test]
fn attach_derives_without_publishing() {
    let mut editor = Editor::with_default_plugins();
    let sync = PanelSync::attach(&mut editor);

    assert_eq!(sync.publications(), 0);
    let latest = sync.latest().unwrap();
    assert_eq!(latest.block_type, Some("paragraph"));
    assert!(latest.is_empty_block);
    assert_eq!(latest.style("color"), Some("#000"));
    assert_eq!(latest.style("font-size"), Some("15px"));
}

#[test]
fn publishes_every_committed_update() {
    let mut editor = editor_with(json!([heading("h3", "title"), paragraph("body")]));
    let sync = PanelSync::attach(&mut editor);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&seen);
    let _sub = sync.subscribe(move |derived| log.borrow_mut().push(derived.block_type));

    let title = text_key(&editor.state(), "title");
    editor.set_selection(Some(Selection::caret(Point::text(title, 1))));
    let body = text_key(&editor.state(), "body");
    editor.set_selection(Some(Selection::caret(Point::text(body, 1))));
    // Same selection again: nothing committed, nothing published.
    editor.set_selection(Some(Selection::caret(Point::text(body, 1))));

    assert_eq!(*seen.borrow(), vec![Some("h3"), Some("paragraph")]);
    assert_eq!(sync.publications(), 2);
    assert!(!sync.latest().unwrap().is_empty_block);
}

#[test]
fn newer_state_supersedes_publication_in_flight() {
    let mut editor = editor_with(json!([heading("h1", "title"), paragraph("body")]));
    let title = text_key(&editor.state(), "title");
    editor.set_selection(Some(Selection::caret(Point::text(title, 0))));
    let heading_state = editor.state();

    let sync = PanelSync::attach(&mut editor);
    let first_seen = Rc::new(RefCell::new(Vec::new()));
    let second_seen = Rc::new(RefCell::new(Vec::new()));

    let notifier = sync.notifier();
    let log = Rc::clone(&first_seen);
    let _first = sync.subscribe(move |derived| {
        log.borrow_mut().push(derived.block_type);
        if log.borrow().len() == 1 {
            assert!(notifier.notify(heading_state.clone()));
        }
    });
    let log = Rc::clone(&second_seen);
    let _second = sync.subscribe(move |derived| log.borrow_mut().push(derived.block_type));

    let body = text_key(&editor.state(), "body");
    editor.set_selection(Some(Selection::caret(Point::text(body, 2))));

    assert_eq!(*first_seen.borrow(), vec![Some("paragraph"), Some("h1")]);
    assert_eq!(*second_seen.borrow(), vec![Some("h1")]);
    assert_eq!(sync.publications(), 1);
    assert_eq!(sync.latest().unwrap().block_type, Some("h1"));
}

#[test]
fn unsubscribe_and_detach_stop_delivery() {
    let mut editor = editor_with(json!([paragraph("a"), paragraph("b")]));
    let sync = PanelSync::attach(&mut editor);
    let calls = Rc::new(Cell::new(0));

    let counter = Rc::clone(&calls);
    let handle = sync.subscribe(move |_| counter.set(counter.get() + 1));
    let counter = Rc::clone(&calls);
    let _other = sync.subscribe(move |_| counter.set(counter.get() + 10));

    let a = text_key(&editor.state(), "a");
    editor.set_selection(Some(Selection::caret(Point::text(a, 0))));
    assert_eq!(calls.get(), 11);

    assert!(sync.unsubscribe(handle));
    editor.set_selection(Some(Selection::caret(Point::text(a, 1))));
    assert_eq!(calls.get(), 21);

    let notifier = sync.notifier();
    sync.detach(&mut editor);
    let b = text_key(&editor.state(), "b");
    editor.set_selection(Some(Selection::caret(Point::text(b, 0))));
    assert_eq!(calls.get(), 21);
    assert!(!notifier.notify(editor.state()));
}

#[test]
fn node_selection_exposes_decorator_props() {
    let mut editor = editor_with(json!([paragraph("a"), image("x.png")]));
    let sync = PanelSync::attach(&mut editor);
    let img = editor.state().children(editor.state().root())[1];

    editor.set_selection(Some(Selection::node(img)));
    let latest = sync.latest().unwrap();
    assert_eq!(latest.descriptor, None);
    let selected = latest.selected_node.unwrap();
    assert_eq!(selected.key, img);
    assert_eq!(selected.block_type, "image-node");
    assert_eq!(latest.selected_props.as_ref().unwrap()["src"], json!("x.png"));

    editor.set_node_props(img, &json!({ "width": 320 }));
    let latest = sync.latest().unwrap();
    assert_eq!(latest.selected_props.as_ref().unwrap()["width"], json!(320));
    assert_eq!(latest.selected_props.as_ref().unwrap()["src"], json!("x.png"));
}

#[test]
fn tracked_styles_come_from_config() {
    let config = EditorConfig::from_json_str(
        r#"{ "panel": { "tracked_styles": [{ "property": "font-weight", "fallback": "400" }] } }"#,
    )
    .unwrap();
    let mut editor = editor_with_config(json!([paragraph("a")]), config);
    let sync = PanelSync::attach(&mut editor);

    let latest = sync.latest().unwrap();
    assert_eq!(latest.style("font-weight"), Some("400"));
    assert_eq!(latest.style("color"), None);
}
