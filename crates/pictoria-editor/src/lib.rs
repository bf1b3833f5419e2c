//! Pictoria Editor - Editing sessions over the core pipeline
//!
//! This crate drives one image through staged editing: a
//! [`session::EditSession`] state machine tracks which stage is open and
//! what has been committed, a [`preview::PreviewRenderer`] produces
//! latest-wins previews, and a [`worker::SaveWorker`] serializes export
//! renders into a [`store::PersistentStore`].
//!
//! [`orchestrator::PipelineOrchestrator`] ties these together behind an
//! async API.

pub mod config;
pub mod error;
pub mod gallery;
pub mod logging;
pub mod orchestrator;
pub mod preview;
pub mod session;
pub mod source;
pub mod store;
pub mod worker;

pub use config::{CancelPolicy, ConfigError, EditorConfig};
pub use error::{EditorError, Result};
pub use gallery::{load_projects, Project};
pub use logging::{init_subscriber, LogFormat};
pub use orchestrator::PipelineOrchestrator;
pub use preview::{PreviewFrame, PreviewRenderer};
pub use session::{EditCommand, EditSession, SessionEvent, SessionState, StageValue};
pub use source::{BufferSource, BytesSource, ImageSource, PathSource};
pub use store::{FileStore, MemoryStore, PersistentStore, StoreError};
pub use worker::{SaveReceipt, SaveWorker};
