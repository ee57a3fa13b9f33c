//! Decorator nodes: structural, non-editable nodes whose interior is painted
//! by an externally supplied renderer.
//!
//! The two kinds form a closed sum type. Their property records keep unknown
//! keys verbatim, so `import_json(export_json(node))` is lossless for any
//! record the UI writes.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DeserializationError;
use crate::node::{ElementAlign, Node, NodeKey};

pub const IMAGE_NODE_TYPE: &str = "image-node";
pub const DIVIDER_NODE_TYPE: &str = "divider-node";
pub const DECORATOR_VERSION: u64 = 1;

/// A CSS length as written by the settings panel: either a bare number of
/// pixels or a CSS string such as `"100%"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Length {
    Number(serde_json::Number),
    Css(String),
}

impl Length {
    pub fn px(value: u64) -> Self {
        Length::Number(value.into())
    }

    pub fn css(value: impl Into<String>) -> Self {
        Length::Css(value.into())
    }

    pub fn to_css(&self) -> String {
        match self {
            Length::Number(n) => format!("{n}px"),
            Length::Css(s) => s.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ImageProps {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<Length>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<Length>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ImageProps {
    /// Props a freshly created image starts with.
    pub fn factory_default() -> Self {
        Self {
            src: None,
            width: Some(Length::css("100%")),
            height: Some(Length::px(200)),
            extra: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DividerSize {
    Small,
    Normal,
    Large,
}

impl DividerSize {
    pub fn px(self) -> u32 {
        match self {
            DividerSize::Small => 1,
            DividerSize::Normal => 2,
            DividerSize::Large => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BorderStyle {
    Solid,
    Dashed,
    Double,
}

impl BorderStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            BorderStyle::Solid => "solid",
            BorderStyle::Dashed => "dashed",
            BorderStyle::Double => "double",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DividerProps {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<DividerSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_style: Option<BorderStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_color: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

pub const DEFAULT_DIVIDER_COLOR: &str = "#333333";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoratorKind {
    Image,
    Divider,
}

impl DecoratorKind {
    pub fn type_name(self) -> &'static str {
        match self {
            DecoratorKind::Image => IMAGE_NODE_TYPE,
            DecoratorKind::Divider => DIVIDER_NODE_TYPE,
        }
    }

    pub fn from_type_name(type_name: &str) -> Option<Self> {
        match type_name {
            IMAGE_NODE_TYPE => Some(DecoratorKind::Image),
            DIVIDER_NODE_TYPE => Some(DecoratorKind::Divider),
            _ => None,
        }
    }

    pub fn is_instance(self, node: &Node) -> bool {
        node.as_decorator()
            .is_some_and(|d| d.decorator.kind() == self)
    }

    /// Factory: the kind's default props, overlaid with `props` when given.
    pub fn create(self, props: Option<&Value>) -> Result<Decorator, DeserializationError> {
        let mut decorator = match self {
            DecoratorKind::Image => Decorator::Image(ImageProps::factory_default()),
            DecoratorKind::Divider => Decorator::Divider(DividerProps::default()),
        };
        if let Some(props) = props {
            decorator.set_props(props)?;
        }
        Ok(decorator)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decorator {
    Image(ImageProps),
    Divider(DividerProps),
}

impl Decorator {
    pub fn image(props: Option<ImageProps>) -> Self {
        Decorator::Image(props.unwrap_or_else(ImageProps::factory_default))
    }

    pub fn divider(props: Option<DividerProps>) -> Self {
        Decorator::Divider(props.unwrap_or_default())
    }

    pub fn kind(&self) -> DecoratorKind {
        match self {
            Decorator::Image(_) => DecoratorKind::Image,
            Decorator::Divider(_) => DecoratorKind::Divider,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.kind().type_name()
    }

    pub fn props_json(&self) -> Value {
        let value = match self {
            Decorator::Image(props) => serde_json::to_value(props),
            Decorator::Divider(props) => serde_json::to_value(props),
        };
        value.unwrap_or_else(|_| Value::Object(Map::new()))
    }

    /// Shallow-merges `partial` into the property record. `null` values
    /// remove a property. The record is left untouched on error.
    pub fn set_props(&mut self, partial: &Value) -> Result<(), DeserializationError> {
        let type_name = self.type_name();
        let Value::Object(partial) = partial else {
            return Err(DeserializationError::invalid(
                type_name,
                "props",
                "expected an object",
            ));
        };

        let Value::Object(mut merged) = self.props_json() else {
            return Err(DeserializationError::invalid(
                type_name,
                "props",
                "record is not an object",
            ));
        };
        for (key, value) in partial {
            if value.is_null() {
                merged.remove(key);
            } else {
                merged.insert(key.clone(), value.clone());
            }
        }

        *self = Self::from_props(self.kind(), &merged)?;
        Ok(())
    }

    fn from_props(kind: DecoratorKind, props: &Map<String, Value>) -> Result<Self, DeserializationError> {
        let type_name = kind.type_name();
        match kind {
            DecoratorKind::Image => {
                check_field::<String>(type_name, props, "src", "props.src")?;
                check_field::<Length>(type_name, props, "width", "props.width")?;
                check_field::<Length>(type_name, props, "height", "props.height")?;
                parse_props(type_name, props).map(Decorator::Image)
            }
            DecoratorKind::Divider => {
                check_field::<DividerSize>(type_name, props, "size", "props.size")?;
                check_field::<BorderStyle>(type_name, props, "borderStyle", "props.borderStyle")?;
                check_field::<String>(type_name, props, "borderColor", "props.borderColor")?;
                parse_props(type_name, props).map(Decorator::Divider)
            }
        }
    }

    pub fn container(&self) -> ContainerElement {
        match self {
            Decorator::Image(_) => ContainerElement {
                tag: "div",
                class_name: "lexical-block-image",
            },
            Decorator::Divider(_) => ContainerElement {
                tag: "div",
                class_name: "lexical-divider",
            },
        }
    }

    /// The container never needs diffing; the delegated render owns the
    /// interior.
    pub fn needs_container_update(&self, _previous: &Decorator) -> bool {
        false
    }

    pub fn view(&self) -> DecoratorView {
        match self {
            Decorator::Image(props) => DecoratorView::Image(ImageView {
                src: props.src.clone().filter(|s| !s.is_empty()),
                width: props.width.clone().unwrap_or_else(|| Length::css("100%")),
                height: props.height.clone().unwrap_or_else(|| Length::px(200)),
            }),
            Decorator::Divider(props) => {
                let border_style = props.border_style.unwrap_or(BorderStyle::Solid);
                let size = props.size.unwrap_or(DividerSize::Normal);
                let multiplier = if border_style == BorderStyle::Double { 3 } else { 1 };
                DecoratorView::Divider(DividerView {
                    border_top_width: size.px() * multiplier,
                    border_style,
                    border_color: props
                        .border_color
                        .clone()
                        .unwrap_or_else(|| DEFAULT_DIVIDER_COLOR.to_string()),
                })
            }
        }
    }
}

fn check_field<T: DeserializeOwned>(
    type_name: &str,
    props: &Map<String, Value>,
    key: &str,
    field: &'static str,
) -> Result<(), DeserializationError> {
    match props.get(key) {
        None => Ok(()),
        Some(value) => serde_json::from_value::<T>(value.clone())
            .map(|_| ())
            .map_err(|err| DeserializationError::invalid(type_name, field, err.to_string())),
    }
}

fn parse_props<T: DeserializeOwned>(
    type_name: &str,
    props: &Map<String, Value>,
) -> Result<T, DeserializationError> {
    serde_json::from_value(Value::Object(props.clone()))
        .map_err(|err| DeserializationError::invalid(type_name, "props", err.to_string()))
}

/// Decorator payload as stored in the arena: the variant plus the block
/// alignment every decorator block carries.
#[derive(Debug, Clone, PartialEq)]
pub struct DecoratorNode {
    pub decorator: Decorator,
    pub align: Option<ElementAlign>,
}

impl DecoratorNode {
    pub fn new(decorator: Decorator) -> Self {
        Self {
            decorator,
            align: None,
        }
    }

    pub fn export_json(&self) -> Value {
        let mut out = Map::new();
        out.insert("type".into(), Value::from(self.decorator.type_name()));
        out.insert("version".into(), Value::from(DECORATOR_VERSION));
        out.insert("props".into(), self.decorator.props_json());
        if let Some(align) = self.align {
            out.insert("format".into(), Value::from(align.as_str()));
        }
        Value::Object(out)
    }

    /// Inverse of [`DecoratorNode::export_json`]. A record without `props`
    /// gets the factory defaults.
    pub fn import_json(value: &Value) -> Result<Self, DeserializationError> {
        let Value::Object(record) = value else {
            return Err(DeserializationError::invalid(
                "decorator",
                "type",
                "record is not an object",
            ));
        };
        let type_name = record
            .get("type")
            .ok_or_else(|| DeserializationError::missing("decorator", "type"))?
            .as_str()
            .ok_or_else(|| DeserializationError::invalid("decorator", "type", "expected a string"))?;
        let kind = DecoratorKind::from_type_name(type_name)
            .ok_or_else(|| DeserializationError::UnknownType(type_name.to_string()))?;

        match record.get("version") {
            None => return Err(DeserializationError::missing(type_name, "version")),
            Some(v) if v.as_u64().is_none() => {
                return Err(DeserializationError::invalid(
                    type_name,
                    "version",
                    "expected an unsigned integer",
                ));
            }
            Some(_) => {}
        }

        let decorator = match record.get("props") {
            None | Some(Value::Null) => kind.create(None)?,
            Some(Value::Object(props)) => Decorator::from_props(kind, props)?,
            Some(_) => {
                return Err(DeserializationError::invalid(
                    type_name,
                    "props",
                    "expected an object",
                ));
            }
        };

        let align = match record.get("format") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => ElementAlign::parse(s)
                .map_err(|reason| DeserializationError::invalid(type_name, "format", reason))?,
            Some(_) => {
                return Err(DeserializationError::invalid(
                    type_name,
                    "format",
                    "expected a string",
                ));
            }
        };

        Ok(Self { decorator, align })
    }
}

/// Container element the tree runtime creates around a decorator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerElement {
    pub tag: &'static str,
    pub class_name: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecoratorView {
    Image(ImageView),
    Divider(DividerView),
}

/// Render model for an image. `src == None` renders the "no image"
/// placeholder.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageView {
    pub src: Option<String>,
    pub width: Length,
    pub height: Length,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DividerView {
    pub border_top_width: u32,
    pub border_style: BorderStyle,
    pub border_color: String,
}

/// Externally supplied painter for decorator interiors.
pub trait DecoratorRenderer {
    type Output;

    fn render(&self, key: NodeKey, view: &DecoratorView) -> Self::Output;
}

impl<F, T> DecoratorRenderer for F
where
    F: Fn(NodeKey, &DecoratorView) -> T,
{
    type Output = T;

    fn render(&self, key: NodeKey, view: &DecoratorView) -> T {
        self(key, view)
    }
}

/// Reads an image file into a `data:` URL.
///
/// This is the I/O half of an image upload and runs outside any update;
/// the result is applied afterwards with `Editor::set_node_props`.
pub fn read_image_data_url(path: &Path) -> io::Result<String> {
    let bytes = std::fs::read(path)?;
    let mime = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .map(|ext| match ext.as_str() {
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "webp" => "image/webp",
            "svg" => "image/svg+xml",
            "bmp" => "image/bmp",
            _ => "application/octet-stream",
        })
        .unwrap_or("application/octet-stream");
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    Ok(format!("data:{mime};base64,{encoded}"))
}
