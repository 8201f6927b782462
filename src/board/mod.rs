//! Event-sourced board domain: event definitions, the pure replay fold, and
//! the workspace/project aggregates that validate commands against replayed
//! state before appending new events.

pub mod error;
pub mod events;
pub mod project;
pub mod reducer;
pub mod workspace;

pub use error::BoardError;
pub use project::ProjectAggregate;
pub use workspace::WorkspaceAggregate;
