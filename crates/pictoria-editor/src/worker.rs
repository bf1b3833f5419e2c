//! The single save worker.
//!
//! Saves are rendered, encoded and appended to the store one at a time, in
//! submission order. A save that has been submitted always runs to
//! completion, even if the submitter stops waiting for the reply.

use std::sync::Arc;

use pictoria_core::encode::{encode, EncodeFormat};
use pictoria_core::pipeline::{render, RenderOptions};
use pictoria_core::{compute_rotated_bounds, CanvasSize, EditParameters, InterpolationFilter};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{EditorError, Result};
use crate::session::SaveSnapshot;
use crate::store::PersistentStore;

/// One queued save.
#[derive(Debug, Clone)]
pub struct SaveJob {
    pub snapshot: SaveSnapshot,
    pub options: RenderOptions,
    pub format: EncodeFormat,
}

impl SaveJob {
    /// Build the export job for `snapshot`.
    ///
    /// The aspect preset is sized from the geometry output width, and the
    /// corner radius is scaled from the preview canvas to the export canvas.
    pub fn export(
        snapshot: SaveSnapshot,
        default_canvas: CanvasSize,
        filter: InterpolationFilter,
        format: EncodeFormat,
    ) -> Self {
        let corner_scale = export_corner_scale(
            &snapshot.params,
            (snapshot.source.width, snapshot.source.height),
            snapshot.preview_width,
            default_canvas,
        );
        Self {
            options: RenderOptions::export(default_canvas, filter, corner_scale),
            snapshot,
            format,
        }
    }
}

/// Ratio of the exported canvas width to the previewed canvas width.
pub fn export_corner_scale(
    params: &EditParameters,
    source_dimensions: (u32, u32),
    preview_width: u32,
    default_canvas: CanvasSize,
) -> f32 {
    let (width, height) = source_dimensions;
    let (geometry_width, _) =
        compute_rotated_bounds(width, height, params.transform.rotation_degrees());
    let exported = params.aspect.size_with_default(geometry_width, default_canvas);
    let previewed = params.aspect.size_with_default(preview_width, default_canvas);
    if previewed.width == 0 {
        1.0
    } else {
        exported.width as f32 / previewed.width as f32
    }
}

/// What a completed save produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReceipt {
    pub width: u32,
    pub height: u32,
    /// Size of the encoded entry in bytes.
    pub encoded_len: usize,
}

struct SaveRequest {
    job: SaveJob,
    reply: oneshot::Sender<Result<SaveReceipt>>,
}

/// Handle to the save worker task. Cheap to clone.
#[derive(Clone)]
pub struct SaveWorker {
    tx: mpsc::UnboundedSender<SaveRequest>,
}

impl SaveWorker {
    /// Spawn the worker on the current tokio runtime.
    ///
    /// The worker exits once every handle has been dropped and the queue is
    /// drained.
    pub fn spawn(store: Arc<dyn PersistentStore>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<SaveRequest>();

        let handle = tokio::spawn(async move {
            while let Some(SaveRequest { job, reply }) = rx.recv().await {
                let store = Arc::clone(&store);
                let result = tokio::task::spawn_blocking(move || process(&job, store.as_ref()))
                    .await
                    .map_err(EditorError::from)
                    .and_then(|r| r);

                if let Err(e) = &result {
                    tracing::warn!(error = %e, "save failed");
                }
                // The submitter may have stopped waiting; the save still happened
                let _ = reply.send(result);
            }
            tracing::debug!("save worker stopped");
        });

        (Self { tx }, handle)
    }

    /// Queue a save behind any already submitted.
    ///
    /// # Errors
    ///
    /// Returns `EditorError::WorkerShutdown` if the worker has stopped.
    pub fn submit(&self, job: SaveJob) -> Result<oneshot::Receiver<Result<SaveReceipt>>> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SaveRequest { job, reply })
            .map_err(|_| EditorError::WorkerShutdown)?;
        Ok(rx)
    }
}

/// Render, encode and persist one job.
fn process(job: &SaveJob, store: &dyn PersistentStore) -> Result<SaveReceipt> {
    let span = tracing::info_span!("save", format = job.format.extension());
    let _enter = span.enter();

    let output = render(&job.snapshot.source, &job.snapshot.params, &job.options)?;
    let bytes = encode(&output, job.format)?;
    let receipt = SaveReceipt {
        width: output.width,
        height: output.height,
        encoded_len: bytes.len(),
    };
    store.append_encoded(bytes)?;

    tracing::info!(
        width = receipt.width,
        height = receipt.height,
        bytes = receipt.encoded_len,
        "render saved"
    );
    Ok(receipt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoreError};
    use pictoria_core::{AspectPreset, CornerRadius, PixelBuffer, TransformParameters, DEFAULT_CANVAS};

    fn snapshot(params: EditParameters) -> SaveSnapshot {
        SaveSnapshot {
            source: Arc::new(PixelBuffer::filled(40, 20, [10, 200, 30, 255])),
            params,
            preview_width: 358,
        }
    }

    fn job(params: EditParameters) -> SaveJob {
        SaveJob::export(
            snapshot(params),
            DEFAULT_CANVAS,
            InterpolationFilter::Bilinear,
            EncodeFormat::Png,
        )
    }

    struct FailingStore;

    impl PersistentStore for FailingStore {
        fn append_encoded(&self, _bytes: Vec<u8>) -> std::result::Result<(), StoreError> {
            Err(StoreError::Io(std::io::Error::other("disk full")))
        }

        fn load_all_encoded(&self) -> std::result::Result<Vec<Vec<u8>>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_export_corner_scale() {
        let params = EditParameters {
            aspect: AspectPreset::OneToOne,
            ..Default::default()
        };
        // 1000 wide export vs 250 wide preview
        assert_eq!(export_corner_scale(&params, (1000, 500), 250, DEFAULT_CANVAS), 4.0);

        // Rotation swaps the width used for framing
        let rotated = EditParameters {
            transform: TransformParameters::new(90.0, false, false),
            ..params
        };
        assert_eq!(export_corner_scale(&rotated, (1000, 500), 250, DEFAULT_CANVAS), 2.0);

        // The free preset uses the same canvas in both
        let free = EditParameters::default();
        assert_eq!(export_corner_scale(&free, (1000, 500), 250, DEFAULT_CANVAS), 1.0);

        assert_eq!(export_corner_scale(&params, (1000, 500), 0, DEFAULT_CANVAS), 1.0);
    }

    #[tokio::test]
    async fn test_jobs_run_in_order() {
        let store = Arc::new(MemoryStore::new());
        let (worker, handle) = SaveWorker::spawn(store.clone());

        let square = EditParameters {
            aspect: AspectPreset::OneToOne,
            corner: CornerRadius::new(5.0, 100.0),
            ..Default::default()
        };
        let first = worker.submit(job(square)).unwrap();
        let second = worker.submit(job(EditParameters::default())).unwrap();

        let a = first.await.unwrap().unwrap();
        let b = second.await.unwrap().unwrap();
        assert_eq!((a.width, a.height), (40, 40));
        assert_eq!((b.width, b.height), (358, 412));

        let entries = store.load_all_encoded().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].len(), a.encoded_len);
        assert_eq!(entries[1].len(), b.encoded_len);

        drop(worker);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_dropped_reply_still_saves() {
        let store = Arc::new(MemoryStore::new());
        let (worker, handle) = SaveWorker::spawn(store.clone());

        drop(worker.submit(job(EditParameters::default())).unwrap());
        drop(worker);
        handle.await.unwrap();

        assert_eq!(store.load_all_encoded().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_store_failure_is_reported() {
        let (worker, _handle) = SaveWorker::spawn(Arc::new(FailingStore));
        let result = worker.submit(job(EditParameters::default())).unwrap().await.unwrap();
        assert!(matches!(result, Err(EditorError::Store(StoreError::Io(_)))));
    }

    #[tokio::test]
    async fn test_submit_after_shutdown() {
        let (worker, handle) = SaveWorker::spawn(Arc::new(MemoryStore::new()));
        handle.abort();
        let _ = handle.await;
        assert!(matches!(
            worker.submit(job(EditParameters::default())),
            Err(EditorError::WorkerShutdown)
        ));
    }
}
