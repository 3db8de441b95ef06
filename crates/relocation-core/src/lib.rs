pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use catalog::{ServiceDefinition, SERVICES};
pub use config::RelocationConfig;
pub use error::{RelocationError, Result};
pub use events::{EventBus, HighlightAction, TimelineEvent};
pub use types::*;
