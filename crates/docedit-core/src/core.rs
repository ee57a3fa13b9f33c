use std::collections::BTreeSet;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::decorator::{DecoratorRenderer, DecoratorView};
use crate::error::DeserializationError;
use crate::markup;
use crate::node::{Node, NodeKey, TextFormat};
use crate::panel::PanelConfig;
use crate::plugin::{
    CommandBus, CommandRegistration, CommandSpec, EditorPlugin, PluginHandle, builtin_plugins,
};
use crate::registry::NodeRegistry;
use crate::selection::{BlockDescriptor, Selection, resolve_current_block};
use crate::serde_value::{DocumentValue, export_document};
use crate::state::EditorState;
use crate::style::{self, StylePatch};

pub const DEFAULT_NAMESPACE: &str = "docedit";
pub const DEFAULT_MAX_INDENT: u32 = 8;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub namespace: String,
    pub max_indent: u32,
    pub panel: PanelConfig,
}

impl EditorConfig {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Self>(json).map(Self::with_defaults)
    }

    pub(crate) fn with_defaults(mut self) -> Self {
        if self.namespace.is_empty() {
            self.namespace = DEFAULT_NAMESPACE.to_string();
        }
        if self.max_indent == 0 {
            self.max_indent = DEFAULT_MAX_INDENT;
        }
        self.panel = self.panel.with_defaults();
        self
    }
}

/// Delivered to update listeners once per committed update.
#[derive(Debug, Clone)]
pub struct UpdateEvent {
    pub state: Arc<EditorState>,
    pub prev_state: Arc<EditorState>,
    pub dirty_nodes: BTreeSet<NodeKey>,
}

pub type UpdateListener = Box<dyn FnMut(&UpdateEvent)>;

#[must_use = "dropping the handle leaves the listener registered for the editor's lifetime"]
#[derive(Debug, PartialEq, Eq)]
pub struct ListenerHandle(u64);

/// Mutable view of the draft state inside [`Editor::update`].
///
/// Dereferences to the draft [`EditorState`]; commands dispatched through
/// it run inside the same update.
pub struct UpdateContext<'a> {
    state: &'a mut EditorState,
    commands: &'a CommandBus,
    config: &'a EditorConfig,
}

impl UpdateContext<'_> {
    pub fn config(&self) -> &EditorConfig {
        self.config
    }

    pub fn state(&self) -> &EditorState {
        self.state
    }

    /// Runs the handlers registered for `name`, highest priority first,
    /// until one reports the command handled.
    pub fn dispatch(&mut self, name: &str, payload: Option<&Value>) -> bool {
        let commands = self.commands;
        for handler in commands.handlers(name) {
            if handler(self, payload) {
                debug!(command = name, handled = true, "dispatched");
                return true;
            }
        }
        debug!(command = name, handled = false, "dispatched");
        false
    }
}

impl Deref for UpdateContext<'_> {
    type Target = EditorState;

    fn deref(&self) -> &EditorState {
        self.state
    }
}

impl DerefMut for UpdateContext<'_> {
    fn deref_mut(&mut self) -> &mut EditorState {
        self.state
    }
}

pub struct Editor {
    state: Arc<EditorState>,
    config: EditorConfig,
    commands: CommandBus,
    listeners: Vec<(u64, UpdateListener)>,
    next_listener_id: u64,
    builtin: Vec<PluginHandle>,
}

impl Editor {
    /// Editor over `state` with no commands registered.
    pub fn new(state: EditorState, config: EditorConfig) -> Self {
        let mut state = state;
        state.normalize();
        state.clear_dirty();
        Self {
            state: Arc::new(state),
            config: config.with_defaults(),
            commands: CommandBus::default(),
            listeners: Vec::new(),
            next_listener_id: 0,
            builtin: Vec::new(),
        }
    }

    /// One empty paragraph, every built-in command registered.
    pub fn with_default_plugins() -> Self {
        Self::with_state(EditorState::new(), EditorConfig::default())
    }

    pub fn with_config(config: EditorConfig) -> Self {
        Self::with_state(EditorState::new(), config)
    }

    pub fn with_state(state: EditorState, config: EditorConfig) -> Self {
        let mut editor = Self::new(state, config);
        for plugin in builtin_plugins() {
            let handle = editor.register_plugin(plugin.as_ref());
            editor.builtin.push(handle);
        }
        editor
    }

    /// Builds an editor from a serialized document using the built-in node
    /// registry.
    pub fn from_json(json: &str, config: EditorConfig) -> Result<Self, DeserializationError> {
        let value: DocumentValue = serde_json::from_str(json)?;
        Self::from_value(&value, config)
    }

    pub fn from_value(value: &DocumentValue, config: EditorConfig) -> Result<Self, DeserializationError> {
        Self::from_value_with(&NodeRegistry::builtin(), value, config)
    }

    /// Like [`Editor::from_value`], resolving `type` tags through `registry`
    /// so extra node types can be imported.
    pub fn from_value_with(
        registry: &NodeRegistry,
        value: &DocumentValue,
        config: EditorConfig,
    ) -> Result<Self, DeserializationError> {
        let state = registry
            .import_document(&value.document)
            .inspect_err(|err| warn!(%err, "document import failed"))?;
        Ok(Self::with_state(state, config))
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// The latest committed snapshot.
    pub fn state(&self) -> Arc<EditorState> {
        Arc::clone(&self.state)
    }

    pub fn read<R>(&self, f: impl FnOnce(&EditorState) -> R) -> R {
        f(&self.state)
    }

    /// The only mutation entry point. Runs `f` against a draft copy of the
    /// committed state, normalizes, commits and notifies listeners once.
    /// An update that touches nothing commits nothing.
    pub fn update<R>(&mut self, f: impl FnOnce(&mut UpdateContext<'_>) -> R) -> R {
        let mut draft = EditorState::clone(&self.state);
        draft.clear_dirty();
        let result = {
            let mut cx = UpdateContext {
                state: &mut draft,
                commands: &self.commands,
                config: &self.config,
            };
            f(&mut cx)
        };
        self.commit(draft);
        result
    }

    fn commit(&mut self, mut draft: EditorState) {
        if !draft.is_dirty() {
            return;
        }
        draft.normalize();
        let dirty_nodes = draft.dirty_nodes().clone();
        draft.clear_dirty();

        let prev_state = std::mem::replace(&mut self.state, Arc::new(draft));
        debug!(dirty = dirty_nodes.len(), "committed update");

        let event = UpdateEvent {
            state: Arc::clone(&self.state),
            prev_state,
            dirty_nodes,
        };
        for (_, listener) in &mut self.listeners {
            listener(&event);
        }
    }

    pub fn set_selection(&mut self, selection: Option<Selection>) {
        self.update(|cx| cx.set_selection(selection));
    }

    /// Dispatches `name` inside a fresh update.
    pub fn dispatch(&mut self, name: &str, payload: Option<Value>) -> bool {
        self.update(|cx| cx.dispatch(name, payload.as_ref()))
    }

    pub fn register_command(&mut self, spec: CommandSpec) -> CommandRegistration {
        self.commands.register(spec)
    }

    pub fn unregister_command(&mut self, registration: CommandRegistration) -> bool {
        self.commands.unregister(registration)
    }

    pub fn register_plugin(&mut self, plugin: &dyn EditorPlugin) -> PluginHandle {
        let registrations = plugin
            .commands()
            .into_iter()
            .map(|spec| self.commands.register(spec))
            .collect();
        debug!(plugin = plugin.id(), "registered plugin");
        PluginHandle::new(plugin.id(), registrations)
    }

    pub fn unregister_plugin(&mut self, handle: PluginHandle) {
        for registration in handle.into_registrations() {
            self.commands.unregister(registration);
        }
    }

    pub fn commands(&self) -> &CommandBus {
        &self.commands
    }

    /// Ids of the plugins registered at construction.
    pub fn builtin_plugin_ids(&self) -> Vec<&'static str> {
        self.builtin.iter().map(PluginHandle::id).collect()
    }

    pub fn register_update_listener(
        &mut self,
        listener: impl FnMut(&UpdateEvent) + 'static,
    ) -> ListenerHandle {
        let id = self.next_listener_id;
        self.next_listener_id += 1;
        self.listeners.push((id, Box::new(listener)));
        ListenerHandle(id)
    }

    pub fn unregister_update_listener(&mut self, handle: ListenerHandle) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(id, _)| *id != handle.0);
        self.listeners.len() != before
    }

    pub fn current_block_descriptor(&self) -> Option<BlockDescriptor> {
        resolve_current_block(&self.state)
    }

    /// Shallow-merges `partial` into a decorator's props. Keys no longer in
    /// the tree and rejected patches are logged no-ops.
    pub fn set_node_props(&mut self, key: NodeKey, partial: &Value) {
        self.update(|cx| {
            let Some(current) = cx
                .node(key)
                .filter(|_| cx.is_attached(key))
                .and_then(Node::as_decorator)
            else {
                debug!(%key, "set_node_props on a node that is gone; ignored");
                return;
            };

            let mut decorator = current.decorator.clone();
            if let Err(err) = decorator.set_props(partial) {
                warn!(%key, %err, "rejected property patch");
                return;
            }
            if decorator == current.decorator {
                return;
            }
            if let Some(node) = cx.decorator_mut(key) {
                node.decorator = decorator;
            }
        });
    }

    pub fn patch_style(&mut self, patch: &StylePatch) {
        self.update(|cx| style::patch_style(cx, patch));
    }

    pub fn effective_style(&self, property: &str, fallback: &str) -> String {
        style::read_style(&self.state, property, fallback)
    }

    pub fn active_formats(&self) -> TextFormat {
        style::active_formats(&self.state)
    }

    /// Renders every attached decorator through `renderer`, in document
    /// order, keyed by node key.
    pub fn decorations<R: DecoratorRenderer>(&self, renderer: &R) -> Vec<(NodeKey, R::Output)> {
        let state = &self.state;
        state
            .descendants(state.root())
            .into_iter()
            .filter_map(|key| {
                let node = state.node(key)?.as_decorator()?;
                let view: DecoratorView = node.decorator.view();
                Some((key, renderer.render(key, &view)))
            })
            .collect()
    }

    pub fn export_json(&self) -> DocumentValue {
        DocumentValue::from_document(export_document(&self.state))
    }

    pub fn export_markup(&self) -> String {
        markup::export_markup(&self.state)
    }
}
