mod common;

use std::collections::BTreeMap;
use std::io::Write as _;

use common::{divider, editor_with, image, paragraph};
use docedit_core::{
    BorderStyle, Decorator, DecoratorKind, DecoratorNode, DecoratorView, DividerProps, ImageProps,
    Length, NodeKey, read_image_data_url,
};
use proptest::prelude::*;
use serde_json::{Value, json};

#[test]
fn factory_defaults() {
    let image = DecoratorKind::Image.create(None).unwrap();
    assert_eq!(image.props_json(), json!({ "width": "100%", "height": 200 }));

    let divider = DecoratorKind::Divider.create(None).unwrap();
    assert_eq!(divider.props_json(), json!({}));
    assert_eq!(divider.container().class_name, "lexical-divider");
}

#[test]
fn set_props_merges_and_validates() {
    let mut decorator = Decorator::image(None);
    decorator.set_props(&json!({ "src": "a.png", "caption": "hi" })).unwrap();
    assert_eq!(
        decorator.props_json(),
        json!({ "src": "a.png", "width": "100%", "height": 200, "caption": "hi" })
    );

    let err = decorator.set_props(&json!({ "height": [1] })).unwrap_err();
    assert_eq!(err.field(), Some("props.height"));
    assert_eq!(
        decorator.props_json()["height"],
        json!(200),
        "a rejected patch leaves the record alone"
    );

    decorator.set_props(&json!({ "caption": null, "width": 640 })).unwrap();
    assert_eq!(
        decorator.props_json(),
        json!({ "src": "a.png", "width": 640, "height": 200 })
    );

    let mut divider = Decorator::divider(None);
    let err = divider.set_props(&json!({ "borderStyle": "wavy" })).unwrap_err();
    assert_eq!(err.field(), Some("props.borderStyle"));
    assert!(divider.set_props(&json!("solid")).is_err());
}

#[test]
fn render_models() {
    let image = Decorator::image(Some(ImageProps {
        src: Some(String::new()),
        ..ImageProps::factory_default()
    }));
    match image.view() {
        DecoratorView::Image(view) => {
            assert_eq!(view.src, None);
            assert_eq!(view.width.to_css(), "100%");
            assert_eq!(view.height.to_css(), "200px");
        }
        other => panic!("expected an image view, got {other:?}"),
    }

    let double = Decorator::divider(Some(DividerProps {
        border_style: Some(BorderStyle::Double),
        ..DividerProps::default()
    }));
    match double.view() {
        DecoratorView::Divider(view) => {
            assert_eq!(view.border_top_width, 6);
            assert_eq!(view.border_style, BorderStyle::Double);
            assert_eq!(view.border_color, "#333333");
        }
        other => panic!("expected a divider view, got {other:?}"),
    }
}

#[test]
fn editor_renders_decorators_in_document_order() {
    let editor = editor_with(json!([image("a.png"), paragraph("x"), divider()]));
    let rendered = editor.decorations(&|key: NodeKey, view: &DecoratorView| match view {
        DecoratorView::Image(image) => format!("{key}:img:{}", image.src.as_deref().unwrap_or("")),
        DecoratorView::Divider(divider) => format!("{key}:hr:{}", divider.border_top_width),
    });

    let state = editor.state();
    let children = state.children(state.root());
    assert_eq!(
        rendered,
        vec![
            (children[0], format!("{}:img:a.png", children[0])),
            (children[2], format!("{}:hr:2", children[2])),
        ]
    );
}

#[test]
fn import_without_props_uses_defaults() {
    let node = DecoratorNode::import_json(&json!({ "type": "image-node", "version": 1 })).unwrap();
    assert_eq!(node.decorator, Decorator::image(None));
    assert_eq!(node.align, None);

    let err = DecoratorNode::import_json(&json!({ "type": "image-node" })).unwrap_err();
    assert_eq!(err.field(), Some("version"));
}

#[test]
fn image_file_becomes_data_url() -> anyhow::Result<()> {
    let path = std::env::temp_dir().join(format!("docedit-image-{}.png", std::process::id()));
    let mut file = std::fs::File::create(&path)?;
    file.write_all(&[1, 2, 3])?;
    drop(file);

    let url = read_image_data_url(&path)?;
    std::fs::remove_file(&path)?;
    assert_eq!(url, "data:image/png;base64,AQID");

    assert!(read_image_data_url(&path).is_err());
    Ok(())
}

#[test]
fn duplicate_is_a_detached_copy() {
    let mut state = docedit_core::EditorState::new();
    let key = docedit_core::insert_block_decorator(
        &mut state,
        Decorator::image(Some(ImageProps {
            src: Some("a.png".into()),
            ..ImageProps::factory_default()
        })),
    );
    let copy = state.duplicate_decorator(key).unwrap();
    assert_ne!(copy, key);
    assert_eq!(state.parent(copy), None);
    assert_eq!(
        state.node(copy).unwrap().as_decorator(),
        state.node(key).unwrap().as_decorator()
    );
    assert!(DecoratorKind::Image.is_instance(state.node(copy).unwrap()));
    assert!(!DecoratorKind::Divider.is_instance(state.node(copy).unwrap()));
}

/// Unknown keys start with `x` so they never shadow a typed field.
fn extra_props() -> impl Strategy<Value = BTreeMap<String, Value>> {
    prop::collection::btree_map("x[a-z]{1,6}", any::<i32>().prop_map(Value::from), 0..4)
}

fn length() -> impl Strategy<Value = Length> {
    prop_oneof![
        (0u64..4000).prop_map(Length::px),
        "[0-9]{1,3}(%|px|em)".prop_map(Length::css),
    ]
}

proptest! {
    #[test]
    fn image_node_survives_export_and_import(
        src in prop::option::of("[a-z]{1,10}\\.png"),
        width in prop::option::of(length()),
        height in prop::option::of(length()),
        extra in extra_props(),
        centered in any::<bool>(),
    ) {
        let props = ImageProps {
            src,
            width,
            height,
            extra,
        };
        let node = DecoratorNode {
            decorator: Decorator::Image(props),
            align: centered.then_some(docedit_core::ElementAlign::Center),
        };
        let imported = DecoratorNode::import_json(&node.export_json()).unwrap();
        prop_assert_eq!(imported, node);
    }

    #[test]
    fn divider_node_survives_export_and_import(
        size in prop::option::of(prop_oneof![
            Just(docedit_core::DividerSize::Small),
            Just(docedit_core::DividerSize::Normal),
            Just(docedit_core::DividerSize::Large),
        ]),
        border_style in prop::option::of(prop_oneof![
            Just(BorderStyle::Solid),
            Just(BorderStyle::Dashed),
            Just(BorderStyle::Double),
        ]),
        border_color in prop::option::of("#[0-9a-f]{6}"),
        extra in extra_props(),
    ) {
        let node = DecoratorNode::new(Decorator::Divider(DividerProps {
            size,
            border_style,
            border_color,
            extra,
        }));
        let imported = DecoratorNode::import_json(&node.export_json()).unwrap();
        prop_assert_eq!(imported, node);
    }
}
