//! Error type for editor operations.

use pictoria_core::{DecodeError, EncodeError, PipelineError, Stage};
use thiserror::Error;

use crate::session::SessionState;
use crate::store::StoreError;

/// Errors surfaced by the editing session and its collaborators.
#[derive(Debug, Error)]
pub enum EditorError {
    /// A pipeline stage failed during preview or save.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// The final render could not be encoded.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// The persistent store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The source image could not be acquired.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The command is not allowed in the current state.
    #[error("Cannot {command} while {state}")]
    InvalidTransition {
        state: SessionState,
        command: &'static str,
    },

    /// A value was sent for a stage other than the open one.
    #[error("Stage mismatch: {open} is open, got a value for {requested}")]
    StageMismatch { open: Stage, requested: Stage },

    /// The session was saved or discarded.
    #[error("Session is closed ({0})")]
    SessionClosed(SessionState),

    /// The save worker stopped before replying.
    #[error("Save worker has shut down")]
    WorkerShutdown,

    /// A background render or save task panicked or was aborted.
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result alias for editor operations.
pub type Result<T> = std::result::Result<T, EditorError>;
