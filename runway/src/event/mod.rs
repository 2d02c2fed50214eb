//! Migration lifecycle events.
//!
//! The [EventManager] delivers a [MigrationEvent] to the handlers registered
//! for its [EventKind] before and after every migration run.

#[allow(clippy::module_inception)]
mod event;
mod manager;

pub use event::*;
pub use manager::*;
