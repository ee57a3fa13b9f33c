mod common;

use std::cell::Cell;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use common::{block_types, editor_with, paragraph, text_key};
use docedit_core::{
    CommandPriority, CommandSpec, DecoratorPlugin, Editor, EditorConfig, EditorState, Point,
    Selection,
};
use serde_json::json;

fn recorder(
    log: &Arc<Mutex<Vec<&'static str>>>,
    name: &'static str,
    handled: bool,
    priority: CommandPriority,
) -> CommandSpec {
    let log = Arc::clone(log);
    CommandSpec::new("custom", name, move |_, _| {
        log.lock().unwrap().push(name);
        handled
    })
    .priority(priority)
}

#[test]
fn dispatch_runs_highest_priority_first_and_stops_when_handled() {
    let mut editor = Editor::with_default_plugins();
    let log = Arc::new(Mutex::new(Vec::new()));

    let _low = editor.register_command(recorder(&log, "low", false, CommandPriority::Low));
    let _critical =
        editor.register_command(recorder(&log, "critical", false, CommandPriority::Critical));
    let _normal_a = editor.register_command(recorder(&log, "normal-a", false, CommandPriority::Normal));
    let normal_b = editor.register_command(recorder(&log, "normal-b", true, CommandPriority::Normal));
    let _fallback =
        editor.register_command(recorder(&log, "fallback", true, CommandPriority::Fallback));

    assert!(editor.dispatch("custom", None));
    assert_eq!(*log.lock().unwrap(), vec!["critical", "normal-a", "normal-b"]);

    log.lock().unwrap().clear();
    assert!(editor.unregister_command(normal_b));
    assert!(editor.dispatch("custom", None));
    assert_eq!(
        *log.lock().unwrap(),
        vec!["critical", "normal-a", "low", "fallback"]
    );
}

#[test]
fn unknown_command_is_unhandled_and_commits_nothing() {
    let mut editor = Editor::with_default_plugins();
    let before = editor.state();
    assert!(!editor.dispatch("no-such-command", None));
    assert!(Arc::ptr_eq(&before, &editor.state()));
}

#[test]
fn higher_priority_handler_overrides_builtin() {
    let mut editor = editor_with(json!([paragraph("hello")]));
    let hello = text_key(&editor.state(), "hello");
    editor.set_selection(Some(Selection::range(
        Point::text(hello, 0),
        Point::text(hello, 5),
    )));

    let swallow = editor.register_command(
        CommandSpec::new("format-text", "Swallow", |_, _| true).priority(CommandPriority::High),
    );
    assert!(editor.dispatch("format-text", Some(json!("bold"))));
    assert!(!editor.active_formats().bold);

    assert!(editor.unregister_command(swallow));
    assert!(editor.dispatch("format-text", Some(json!("bold"))));
    assert!(editor.active_formats().bold);
}

#[test]
fn nested_dispatch_shares_one_update() {
    let mut editor = editor_with(json!([paragraph("title")]));
    let title = text_key(&editor.state(), "title");
    editor.set_selection(Some(Selection::caret(Point::text(title, 1))));

    let _outer = editor.register_command(CommandSpec::new("make-title", "Make title", |cx, _| {
        cx.dispatch("set-block-type", Some(&json!("h1")))
            && cx.dispatch("format-element", Some(&json!("center")))
    }));

    let notifications = Rc::new(Cell::new(0));
    let counter = Rc::clone(&notifications);
    let _listener = editor.register_update_listener(move |_| counter.set(counter.get() + 1));

    assert!(editor.dispatch("make-title", None));
    assert_eq!(notifications.get(), 1);

    let state = editor.state();
    assert_eq!(block_types(&state), vec!["h1"]);
    let h1 = state.children(state.root())[0];
    let align = state.node(h1).unwrap().as_element().unwrap().align;
    assert_eq!(align.map(|a| a.as_str()), Some("center"));
}

#[test]
fn plugin_handle_unregisters_the_whole_batch() {
    let mut editor = Editor::new(EditorState::new(), EditorConfig::default());
    assert!(!editor.dispatch("insert-divider", None));

    let handle = editor.register_plugin(&DecoratorPlugin);
    assert_eq!(handle.id(), "decorator");
    assert!(editor.commands().has_command("insert-image"));
    assert!(editor.dispatch("insert-divider", None));

    editor.unregister_plugin(handle);
    assert!(!editor.commands().has_command("insert-image"));
    assert!(!editor.commands().has_command("key-backspace"));
    assert!(!editor.dispatch("insert-divider", None));
}

#[test]
fn builtin_commands_are_listed_with_labels() {
    let editor = Editor::with_default_plugins();
    let names: Vec<&str> = editor
        .commands()
        .specs()
        .into_iter()
        .map(|spec| spec.name.as_str())
        .collect();
    for expected in [
        "clear-format",
        "click",
        "format-element",
        "format-text",
        "indent",
        "insert-divider",
        "insert-image",
        "key-backspace",
        "key-delete",
        "outdent",
        "set-block-type",
    ] {
        assert!(names.contains(&expected), "missing {expected}");
    }
    assert_eq!(
        editor.builtin_plugin_ids(),
        vec!["decorator", "block-format", "text-format"]
    );
}
