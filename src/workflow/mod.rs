//! Maker -> Checker -> Reporter workflow
//!
//! `profiles` owns the persisted profile operations, `session` the transient
//! per-user state and `coordinator` the transitions between them.

pub mod coordinator;
pub mod profiles;
pub mod session;

pub use coordinator::WorkflowCoordinator;
pub use profiles::ProfileService;
pub use session::{SessionError, SessionStore, WorkflowSession, WorkflowStage};
