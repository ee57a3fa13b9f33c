mod blocks;
mod core;
mod decorator;
mod error;
mod markup;
mod node;
mod panel;
mod plugin;
mod registry;
mod selection;
mod serde_value;
mod state;
mod style;

pub use crate::blocks::*;
pub use crate::core::*;
pub use crate::decorator::*;
pub use crate::error::*;
pub use crate::markup::*;
pub use crate::node::*;
pub use crate::panel::*;
pub use crate::plugin::*;
pub use crate::registry::*;
pub use crate::selection::*;
pub use crate::serde_value::*;
pub use crate::state::*;
pub use crate::style::*;
