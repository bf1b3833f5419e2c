//! The async face of an editing session.
//!
//! [`PipelineOrchestrator`] owns an [`EditSession`] behind a tokio mutex, so
//! commands from any task are applied one at a time. Renders never run while
//! the session is locked: the orchestrator snapshots what it needs, releases
//! the lock and then renders.

use std::sync::Arc;

use pictoria_core::pipeline::RenderOptions;
use pictoria_core::{EditParameters, Orientation, PixelBuffer, Stage};
use tokio::sync::Mutex;
use tracing::Instrument;

use crate::config::EditorConfig;
use crate::error::{EditorError, Result};
use crate::preview::{PreviewFrame, PreviewRenderer};
use crate::session::{EditCommand, EditSession, SessionState, StageValue};
use crate::source::ImageSource;
use crate::worker::{SaveJob, SaveReceipt, SaveWorker};

/// Drives one [`EditSession`]: previews, commits and saves.
pub struct PipelineOrchestrator {
    session: Arc<Mutex<EditSession>>,
    preview: Arc<PreviewRenderer>,
    worker: SaveWorker,
    config: Arc<EditorConfig>,
    orientation: Orientation,
}

impl PipelineOrchestrator {
    /// Start a session on an already decoded buffer.
    pub fn new(source: PixelBuffer, worker: SaveWorker, config: EditorConfig) -> Self {
        Self {
            session: Arc::new(Mutex::new(EditSession::new(source, &config))),
            preview: Arc::new(PreviewRenderer::new()),
            worker,
            config: Arc::new(config),
            orientation: Orientation::Normal,
        }
    }

    /// Acquire `source` off the async runtime and start a session on it.
    ///
    /// # Errors
    ///
    /// Returns `EditorError::Decode` if the source cannot be decoded.
    pub async fn open<S: ImageSource>(
        source: S,
        worker: SaveWorker,
        config: EditorConfig,
    ) -> Result<Self> {
        let image = tokio::task::spawn_blocking(move || source.acquire()).await??;
        tracing::info!(
            width = image.buffer.width,
            height = image.buffer.height,
            orientation = ?image.orientation,
            "session opened"
        );
        let mut orchestrator = Self::new(image.buffer, worker, config);
        orchestrator.orientation = image.orientation;
        Ok(orchestrator)
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// EXIF orientation the source was decoded with.
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub async fn state(&self) -> SessionState {
        self.session.lock().await.state()
    }

    /// Parameters the next save will use.
    pub async fn committed(&self) -> EditParameters {
        *self.session.lock().await.committed()
    }

    /// Open `stage` for editing.
    ///
    /// # Errors
    ///
    /// Fails unless the session is idle or committed.
    pub async fn open_stage(&self, stage: Stage) -> Result<()> {
        self.apply(EditCommand::OpenStage(stage)).await
    }

    /// Change the open stage's pending value and render a preview.
    ///
    /// The render runs on the blocking pool, off the caller's executor
    /// thread. Returns `None` when a newer preview for the same stage
    /// started before this one finished.
    ///
    /// # Errors
    ///
    /// Fails if no stage is open, `value` belongs to another stage, or the
    /// render fails. The pending value is kept even if the render fails.
    pub async fn preview_change(&self, value: StageValue) -> Result<Option<PreviewFrame>> {
        let stage = value.stage();
        // Tickets are issued under the lock so generations follow command order
        let (ticket, params, source, options) = {
            let mut session = self.session.lock().await;
            session.apply(EditCommand::PreviewChange(value))?;
            let source = session
                .source()
                .cloned()
                .ok_or(EditorError::SessionClosed(session.state()))?;
            (
                self.preview.begin(stage),
                session.preview_parameters(),
                source,
                self.preview_options(session.available_width()),
            )
        };

        let span = tracing::debug_span!("preview", %stage, generation = ticket.generation);
        self.preview
            .render_blocking(ticket, source, params, options)
            .instrument(span)
            .await
    }

    /// Fold the open stage's pending value into the committed parameters.
    ///
    /// # Errors
    ///
    /// Fails unless a stage is being previewed.
    pub async fn commit_stage(&self) -> Result<()> {
        self.apply(EditCommand::CommitStage).await
    }

    /// Close the open stage without committing.
    ///
    /// # Errors
    ///
    /// Fails unless a stage is open.
    pub async fn cancel_stage(&self) -> Result<()> {
        self.apply(EditCommand::CancelStage).await
    }

    /// Render, encode and persist the committed parameters.
    ///
    /// The save is queued behind any save already in flight. Once queued it
    /// runs to completion and updates the session even if this future is
    /// dropped. On success the session is `Saved`; on failure it is left
    /// `Committed` so the save can be retried.
    ///
    /// # Errors
    ///
    /// Fails if the session isn't idle or committed, or with the pipeline,
    /// encode or store error that stopped the save.
    pub async fn save(&self) -> Result<SaveReceipt> {
        let snapshot = self.session.lock().await.begin_save()?;

        let job = SaveJob::export(
            snapshot,
            self.config.default_canvas,
            self.config.export_filter,
            self.config.export_format,
        );
        let reply = match self.worker.submit(job) {
            Ok(reply) => reply,
            Err(e) => {
                self.session.lock().await.apply(EditCommand::SaveFailed)?;
                return Err(e);
            }
        };

        let session = Arc::clone(&self.session);
        let completion = tokio::spawn(async move {
            let result = reply.await.unwrap_or(Err(EditorError::WorkerShutdown));
            let command = if result.is_ok() {
                EditCommand::SaveSucceeded
            } else {
                EditCommand::SaveFailed
            };
            session.lock().await.apply(command)?;
            result
        });

        completion.await?
    }

    /// Restore every parameter set to its default.
    ///
    /// # Errors
    ///
    /// Fails on a saved or discarded session.
    pub async fn reset(&self) -> Result<()> {
        self.apply(EditCommand::Reset).await?;
        self.preview.clear_cache();
        Ok(())
    }

    /// Close the session without saving and release the source buffer.
    ///
    /// # Errors
    ///
    /// Fails on a session that is already saved or discarded.
    pub async fn discard(&self) -> Result<()> {
        self.apply(EditCommand::Discard).await?;
        self.preview.clear_cache();
        Ok(())
    }

    /// Report the viewport width. Returns the new available canvas width.
    ///
    /// # Errors
    ///
    /// Fails on a saved or discarded session.
    pub async fn set_viewport_width(&self, width: u32) -> Result<u32> {
        let mut session = self.session.lock().await;
        session.apply(EditCommand::SetViewportWidth(width))?;
        Ok(session.available_width())
    }

    async fn apply(&self, command: EditCommand) -> Result<()> {
        self.session.lock().await.apply(command).map(|_| ())
    }

    fn preview_options(&self, available_width: u32) -> RenderOptions {
        RenderOptions::preview(
            available_width,
            self.config.default_canvas,
            self.config.preview_filter,
        )
    }
}
