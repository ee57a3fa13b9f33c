//! Settings-panel synchronization.
//!
//! [`PanelSync`] listens for committed updates, derives the state a panel
//! renders from the new snapshot and publishes it to its subscribers. A
//! notification that arrives while a publication is still running
//! supersedes it: the stale publication stops and only the newest state is
//! published next.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::core::{Editor, ListenerHandle, UpdateEvent};
use crate::node::{ElementKind, Node, TextFormat};
use crate::selection::{BlockDescriptor, display_type, resolve_current_block};
use crate::state::EditorState;
use crate::style::{active_formats, read_style};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedStyle {
    pub property: String,
    pub fallback: String,
}

impl TrackedStyle {
    pub fn new(property: impl Into<String>, fallback: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            fallback: fallback.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    pub tracked_styles: Vec<TrackedStyle>,
}

impl PanelConfig {
    pub(crate) fn with_defaults(mut self) -> Self {
        if self.tracked_styles.is_empty() {
            self.tracked_styles = vec![
                TrackedStyle::new("color", "#000"),
                TrackedStyle::new("background-color", "#fff"),
                TrackedStyle::new("font-family", "Arial"),
                TrackedStyle::new("font-size", "15px"),
            ];
        }
        self
    }
}

/// What a settings panel renders, derived from one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedState {
    pub descriptor: Option<BlockDescriptor>,
    pub block_type: Option<&'static str>,
    pub styles: BTreeMap<String, String>,
    pub formats: TextFormat,
    /// The node-selected decorator, when the selection is a node selection.
    pub selected_node: Option<BlockDescriptor>,
    pub selected_props: Option<Value>,
    /// The current paragraph or heading holds no text.
    pub is_empty_block: bool,
}

impl DerivedState {
    pub fn compute(state: &EditorState, config: &PanelConfig) -> Self {
        let descriptor = resolve_current_block(state);
        let block_type = descriptor.map(|d| d.block_type);
        let styles = config
            .tracked_styles
            .iter()
            .map(|tracked| {
                (
                    tracked.property.clone(),
                    read_style(state, &tracked.property, &tracked.fallback),
                )
            })
            .collect();
        let formats = active_formats(state);

        let selected = state
            .selection()
            .and_then(|s| s.as_node())
            .and_then(|nodes| nodes.keys().first().copied())
            .and_then(|key| state.node(key))
            .filter(|node| node.is_decorator());
        let selected_node = selected.and_then(|node| {
            Some(BlockDescriptor {
                key: node.key(),
                block_type: display_type(state, node.key())?,
            })
        });
        let selected_props = selected
            .and_then(Node::as_decorator)
            .map(|d| d.decorator.props_json());

        let is_empty_block = descriptor.is_some_and(|d| {
            state.node(d.key).is_some_and(|node| {
                matches!(
                    node.as_element().map(|el| el.kind),
                    Some(ElementKind::Paragraph | ElementKind::Heading(_))
                ) && state.text_content(d.key).is_empty()
            })
        });

        Self {
            descriptor,
            block_type,
            styles,
            formats,
            selected_node,
            selected_props,
            is_empty_block,
        }
    }

    pub fn style(&self, property: &str) -> Option<&str> {
        self.styles.get(property).map(String::as_str)
    }
}

type Subscriber = Rc<RefCell<dyn FnMut(&DerivedState)>>;

#[must_use = "dropping the handle leaves the subscriber attached"]
#[derive(Debug, PartialEq, Eq)]
pub struct SubscriptionHandle(u64);

struct Shared {
    config: PanelConfig,
    generation: Cell<u64>,
    publishing: Cell<bool>,
    publications: Cell<u64>,
    pending: RefCell<Option<Arc<EditorState>>>,
    latest: RefCell<Option<Rc<DerivedState>>>,
    subscribers: RefCell<Vec<(u64, Subscriber)>>,
    next_subscriber: Cell<u64>,
}

impl Shared {
    fn notify(&self, state: Arc<EditorState>) {
        self.generation.set(self.generation.get() + 1);
        self.pending.replace(Some(state));
        if self.publishing.replace(true) {
            debug!("panel publication superseded");
            return;
        }

        while let Some(state) = self.pending.take() {
            let generation = self.generation.get();
            let derived = Rc::new(DerivedState::compute(&state, &self.config));
            self.latest.replace(Some(Rc::clone(&derived)));

            let subscribers: Vec<Subscriber> = self
                .subscribers
                .borrow()
                .iter()
                .map(|(_, subscriber)| Rc::clone(subscriber))
                .collect();
            for subscriber in subscribers {
                if self.generation.get() != generation {
                    break;
                }
                (&mut *subscriber.borrow_mut())(&derived);
            }
            if self.generation.get() == generation {
                self.publications.set(self.publications.get() + 1);
            }
        }
        self.publishing.set(false);
    }
}

pub struct PanelSync {
    shared: Rc<Shared>,
    listener: ListenerHandle,
}

impl PanelSync {
    /// Registers with `editor` and derives the initial state from its
    /// current snapshot. Nothing is published until the next update.
    pub fn attach(editor: &mut Editor) -> Self {
        let config = editor.config().panel.clone();
        let initial = DerivedState::compute(&editor.state(), &config);
        let shared = Rc::new(Shared {
            config,
            generation: Cell::new(0),
            publishing: Cell::new(false),
            publications: Cell::new(0),
            pending: RefCell::new(None),
            latest: RefCell::new(Some(Rc::new(initial))),
            subscribers: RefCell::new(Vec::new()),
            next_subscriber: Cell::new(0),
        });

        let listener_shared = Rc::clone(&shared);
        let listener = editor.register_update_listener(move |event: &UpdateEvent| {
            listener_shared.notify(Arc::clone(&event.state));
        });
        Self { shared, listener }
    }

    pub fn detach(self, editor: &mut Editor) {
        editor.unregister_update_listener(self.listener);
    }

    pub fn subscribe(&self, subscriber: impl FnMut(&DerivedState) + 'static) -> SubscriptionHandle {
        let id = self.shared.next_subscriber.get();
        self.shared.next_subscriber.set(id + 1);
        let subscriber: Subscriber = Rc::new(RefCell::new(subscriber));
        self.shared.subscribers.borrow_mut().push((id, subscriber));
        SubscriptionHandle(id)
    }

    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let mut subscribers = self.shared.subscribers.borrow_mut();
        let before = subscribers.len();
        subscribers.retain(|(id, _)| *id != handle.0);
        subscribers.len() != before
    }

    /// Feeds a snapshot in directly. Called by the editor listener; safe to
    /// call from inside a subscriber, where it supersedes the publication
    /// in flight.
    pub fn notify(&self, state: Arc<EditorState>) {
        self.shared.notify(state);
    }

    /// A weak handle for feeding snapshots from code the sync outlives,
    /// such as its own subscribers.
    pub fn notifier(&self) -> PanelNotifier {
        PanelNotifier {
            shared: Rc::downgrade(&self.shared),
        }
    }

    pub fn latest(&self) -> Option<Rc<DerivedState>> {
        self.shared.latest.borrow().clone()
    }

    /// Publications that reached every subscriber.
    pub fn publications(&self) -> u64 {
        self.shared.publications.get()
    }
}

#[derive(Clone)]
pub struct PanelNotifier {
    shared: Weak<Shared>,
}

impl PanelNotifier {
    /// `false` once the sync is gone.
    pub fn notify(&self, state: Arc<EditorState>) -> bool {
        match self.shared.upgrade() {
            Some(shared) => {
                shared.notify(state);
                true
            }
            None => false,
        }
    }
}
