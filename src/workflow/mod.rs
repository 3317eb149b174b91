/*!
 * Translation workflow: the request aggregate, its audit events and the
 * state machine that governs status changes.
 */

pub mod events;
pub mod models;
pub mod state_machine;

// Re-export main types
pub use events::{Actor, ActorRole, EventType, WorkflowEvent};
pub use models::{
    CommentKind, NewRequestParams, Page, Priority, RequestFilter, RequestMetadata, RequestStatus,
    TranslationRequest,
};
pub use state_machine::Transition;
