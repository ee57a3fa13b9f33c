use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::blocks::{self, BlockTarget, IndentDirection};
use crate::core::UpdateContext;
use crate::decorator::{Decorator, DecoratorKind};
use crate::node::{ElementAlign, NodeKey, TextFormatKind};
use crate::style;

pub const INSERT_IMAGE_COMMAND: &str = "insert-image";
pub const INSERT_DIVIDER_COMMAND: &str = "insert-divider";
pub const FORMAT_TEXT_COMMAND: &str = "format-text";
pub const FORMAT_ELEMENT_COMMAND: &str = "format-element";
pub const SET_BLOCK_TYPE_COMMAND: &str = "set-block-type";
pub const CLEAR_FORMAT_COMMAND: &str = "clear-format";
pub const INDENT_COMMAND: &str = "indent";
pub const OUTDENT_COMMAND: &str = "outdent";
pub const KEY_BACKSPACE_COMMAND: &str = "key-backspace";
pub const KEY_DELETE_COMMAND: &str = "key-delete";
pub const CLICK_COMMAND: &str = "click";

/// Dispatch tiers, lowest first. Higher tiers run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandPriority {
    Fallback,
    #[default]
    Editor,
    Low,
    Normal,
    High,
    Critical,
}

/// Returns `true` when the command is handled, which stops propagation.
pub type CommandHandler = Arc<dyn Fn(&mut UpdateContext<'_>, Option<&Value>) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct CommandSpec {
    pub name: String,
    pub label: String,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub args_example: Option<Value>,
    pub priority: CommandPriority,
    pub handler: CommandHandler,
}

impl CommandSpec {
    pub fn new(
        name: impl Into<String>,
        label: impl Into<String>,
        handler: impl Fn(&mut UpdateContext<'_>, Option<&Value>) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            description: None,
            keywords: Vec::new(),
            args_example: None,
            priority: CommandPriority::Editor,
            handler: Arc::new(handler),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn args_example(mut self, args_example: Value) -> Self {
        self.args_example = Some(args_example);
        self
    }

    pub fn priority(mut self, priority: CommandPriority) -> Self {
        self.priority = priority;
        self
    }
}

impl std::fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSpec")
            .field("name", &self.name)
            .field("label", &self.label)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Proof of one handler registration. Pass it back to
/// `Editor::unregister_command` to remove exactly that handler.
#[must_use = "dropping the registration leaves the handler registered for the editor's lifetime"]
#[derive(Debug, PartialEq, Eq)]
pub struct CommandRegistration {
    name: String,
    id: u64,
}

impl CommandRegistration {
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Default)]
pub struct CommandBus {
    commands: HashMap<String, Vec<(u64, CommandSpec)>>,
    next_id: u64,
}

impl CommandBus {
    pub fn register(&mut self, spec: CommandSpec) -> CommandRegistration {
        let id = self.next_id;
        self.next_id += 1;
        let name = spec.name.clone();
        debug!(command = %name, priority = ?spec.priority, "registered command handler");
        self.commands.entry(name.clone()).or_default().push((id, spec));
        CommandRegistration { name, id }
    }

    pub fn unregister(&mut self, registration: CommandRegistration) -> bool {
        let Some(entries) = self.commands.get_mut(&registration.name) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(id, _)| *id != registration.id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            self.commands.remove(&registration.name);
        }
        removed
    }

    /// Handlers for `name` in dispatch order: highest tier first, then
    /// registration order.
    pub fn handlers(&self, name: &str) -> Vec<CommandHandler> {
        let Some(entries) = self.commands.get(name) else {
            return Vec::new();
        };
        let mut ordered: Vec<&(u64, CommandSpec)> = entries.iter().collect();
        ordered.sort_by(|(a_id, a), (b_id, b)| b.priority.cmp(&a.priority).then(a_id.cmp(b_id)));
        ordered
            .into_iter()
            .map(|(_, spec)| Arc::clone(&spec.handler))
            .collect()
    }

    pub fn has_command(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// Every registered spec, sorted by name then dispatch order.
    pub fn specs(&self) -> Vec<&CommandSpec> {
        let mut specs: Vec<(&u64, &CommandSpec)> = self
            .commands
            .values()
            .flat_map(|entries| entries.iter().map(|(id, spec)| (id, spec)))
            .collect();
        specs.sort_by(|(a_id, a), (b_id, b)| {
            a.name
                .cmp(&b.name)
                .then(b.priority.cmp(&a.priority))
                .then(a_id.cmp(b_id))
        });
        specs.into_iter().map(|(_, spec)| spec).collect()
    }
}

pub trait EditorPlugin: Send + Sync {
    fn id(&self) -> &'static str;
    fn commands(&self) -> Vec<CommandSpec> {
        Vec::new()
    }
}

/// Registrations made on behalf of one plugin.
#[must_use = "dropping the handle leaves the plugin registered for the editor's lifetime"]
#[derive(Debug)]
pub struct PluginHandle {
    id: &'static str,
    registrations: Vec<CommandRegistration>,
}

impl PluginHandle {
    pub(crate) fn new(id: &'static str, registrations: Vec<CommandRegistration>) -> Self {
        Self { id, registrations }
    }

    pub fn id(&self) -> &'static str {
        self.id
    }

    pub(crate) fn into_registrations(self) -> Vec<CommandRegistration> {
        self.registrations
    }
}

pub(crate) fn builtin_plugins() -> Vec<Box<dyn EditorPlugin>> {
    vec![
        Box::new(DecoratorPlugin),
        Box::new(BlockFormatPlugin),
        Box::new(TextFormatPlugin),
    ]
}

fn insert_decorator(cx: &mut UpdateContext<'_>, kind: DecoratorKind, payload: Option<&Value>) -> bool {
    let decorator = match kind.create(payload.filter(|p| !p.is_null())) {
        Ok(decorator) => decorator,
        Err(err) => {
            warn!(%err, "invalid initial props; inserting with defaults");
            match kind {
                DecoratorKind::Image => Decorator::image(None),
                DecoratorKind::Divider => Decorator::divider(None),
            }
        }
    };
    blocks::insert_block_decorator(cx, decorator);
    true
}

#[derive(Debug, Deserialize)]
struct ClickPayload {
    key: NodeKey,
    #[serde(default)]
    shift: bool,
}

/// Image and divider insertion plus the decorator keyboard and mouse
/// behaviour.
pub struct DecoratorPlugin;

impl EditorPlugin for DecoratorPlugin {
    fn id(&self) -> &'static str {
        "decorator"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new(INSERT_IMAGE_COMMAND, "Insert image", |cx, payload| {
                insert_decorator(cx, DecoratorKind::Image, payload)
            })
            .description("Insert an image block next to the current block.")
            .keywords(["image", "picture", "insert"])
            .args_example(serde_json::json!({ "src": "https://example.com/a.png" })),
            CommandSpec::new(INSERT_DIVIDER_COMMAND, "Insert divider", |cx, payload| {
                insert_decorator(cx, DecoratorKind::Divider, payload)
            })
            .description("Insert a horizontal divider next to the current block.")
            .keywords(["divider", "hr", "rule", "insert"])
            .args_example(serde_json::json!({ "borderStyle": "dashed" })),
            CommandSpec::new(KEY_BACKSPACE_COMMAND, "Delete selected block", |cx, _| {
                blocks::remove_selected_decorators(cx)
            })
            .priority(CommandPriority::Low),
            CommandSpec::new(KEY_DELETE_COMMAND, "Delete selected block", |cx, _| {
                blocks::remove_selected_decorators(cx)
            })
            .priority(CommandPriority::Low),
            CommandSpec::new(CLICK_COMMAND, "Select block", |cx, payload| {
                let Some(click) = payload
                    .cloned()
                    .and_then(|p| serde_json::from_value::<ClickPayload>(p).ok())
                else {
                    return false;
                };
                blocks::select_decorator(cx, click.key, click.shift)
            })
            .priority(CommandPriority::Low)
            .args_example(serde_json::json!({ "key": 7, "shift": false })),
        ]
    }
}

/// Block type, alignment and indentation.
pub struct BlockFormatPlugin;

impl EditorPlugin for BlockFormatPlugin {
    fn id(&self) -> &'static str {
        "block-format"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new(SET_BLOCK_TYPE_COMMAND, "Set block type", |cx, payload| {
                let Some(target) = payload.and_then(Value::as_str).and_then(BlockTarget::parse)
                else {
                    debug!(?payload, "set-block-type without a known block type");
                    return false;
                };
                blocks::set_block_type(cx, target)
            })
            .description("Turn the selected blocks into paragraphs, headings, quotes or lists.")
            .keywords(["heading", "paragraph", "quote", "list", "bullet", "numbered"])
            .args_example(Value::from("h2")),
            CommandSpec::new(FORMAT_ELEMENT_COMMAND, "Set block alignment", |cx, payload| {
                let Some(value) = payload.and_then(Value::as_str) else {
                    return false;
                };
                match ElementAlign::parse(value) {
                    Ok(align) => blocks::format_element(cx, align),
                    Err(reason) => {
                        debug!(%reason, "format-element ignored");
                        false
                    }
                }
            })
            .description("Set text alignment for the selected block(s).")
            .keywords(["align", "alignment", "left", "center", "right", "justify"])
            .args_example(Value::from("center")),
            CommandSpec::new(INDENT_COMMAND, "Increase indent", |cx, _| {
                let max = cx.config().max_indent;
                blocks::adjust_indent(cx, IndentDirection::Increase, max)
            })
            .description("Increase indent level for the selected block(s).")
            .keywords(["indent", "tab", "increase"]),
            CommandSpec::new(OUTDENT_COMMAND, "Decrease indent", |cx, _| {
                let max = cx.config().max_indent;
                blocks::adjust_indent(cx, IndentDirection::Decrease, max)
            })
            .description("Decrease indent level for the selected block(s).")
            .keywords(["indent", "outdent", "decrease"]),
        ]
    }
}

/// Inline formats and clearing.
pub struct TextFormatPlugin;

impl EditorPlugin for TextFormatPlugin {
    fn id(&self) -> &'static str {
        "text-format"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new(FORMAT_TEXT_COMMAND, "Toggle text format", |cx, payload| {
                let Some(kind) = payload
                    .and_then(Value::as_str)
                    .and_then(|s| s.parse::<TextFormatKind>().ok())
                else {
                    return false;
                };
                style::toggle_format(cx, kind)
            })
            .description("Toggle bold, italic, underline, strikethrough, code, subscript or superscript.")
            .keywords(["bold", "italic", "underline", "strikethrough", "code", "format"])
            .args_example(Value::from("bold")),
            CommandSpec::new(CLEAR_FORMAT_COMMAND, "Clear formatting", |cx, _| {
                style::clear_format(cx)
            })
            .description("Remove inline formats and styles from the selection.")
            .keywords(["clear", "format", "reset"]),
        ]
    }
}
