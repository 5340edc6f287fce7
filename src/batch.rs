//! Concurrent processing of many posting images.
//!
//! Postings are independent, so each image runs on its own blocking worker
//! (`tokio::task::spawn_blocking`; OCR is a blocking process call) with at
//! most [`PipelineConfig::concurrency`](crate::PipelineConfig) images in
//! flight. The only shared state is the pipeline itself, which is immutable.
//!
//! * [`process_batch`] waits for every image and returns items in input order.
//! * [`process_stream`] yields items as they complete. Dropping the stream
//!   stops it from starting any further images; an image already inside the
//!   OCR engine runs until it finishes or hits the OCR timeout.
//! * [`process_batch_sync`] is a blocking wrapper for non-async callers.

use crate::error::PipelineError;
use crate::output::{BatchItem, BatchOutput, BatchStats};
use crate::process::JobPipeline;
use crate::progress::{NoopProgressCallback, ProgressCallback};
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tokio_stream::Stream;
use tracing::{info, warn};

/// A boxed stream of per-image results, in completion order.
pub type ItemStream = Pin<Box<dyn Stream<Item = BatchItem> + Send>>;

/// One image to process.
#[derive(Debug, Clone)]
pub struct BatchInput {
    /// Label reported back in results and progress events.
    pub source: String,
    pub bytes: Vec<u8>,
}

impl BatchInput {
    pub fn new(source: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            source: source.into(),
            bytes,
        }
    }

    /// Read an image file; the source label is the path as given.
    pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        Ok(Self::new(path.display().to_string(), std::fs::read(path)?))
    }
}

/// Process images concurrently, yielding each result as soon as it is ready.
///
/// Items arrive in completion order; use [`BatchItem::index`] to restore
/// input order.
pub fn process_stream(
    pipeline: Arc<JobPipeline>,
    inputs: Vec<BatchInput>,
    progress: Option<ProgressCallback>,
) -> ItemStream {
    let concurrency = pipeline.config().concurrency;
    let progress = progress.unwrap_or_else(|| Arc::new(NoopProgressCallback));

    let s = stream::iter(inputs.into_iter().enumerate().map(move |(index, input)| {
        run_one(Arc::clone(&pipeline), index, input, Arc::clone(&progress))
    }))
    .buffer_unordered(concurrency);

    Box::pin(s)
}

/// Process images concurrently and return every result in input order.
///
/// Never fails as a whole: each image's failure is recorded in its
/// [`BatchItem`] and counted in [`BatchStats`].
pub async fn process_batch(
    pipeline: Arc<JobPipeline>,
    inputs: Vec<BatchInput>,
    progress: Option<ProgressCallback>,
) -> BatchOutput {
    let total_start = Instant::now();
    let total = inputs.len();
    info!(
        "Starting batch: {} images, concurrency {}",
        total,
        pipeline.config().concurrency
    );
    if let Some(ref cb) = progress {
        cb.on_batch_start(total);
    }

    let mut items: Vec<BatchItem> = process_stream(pipeline, inputs, progress.clone())
        .collect()
        .await;
    items.sort_by_key(|item| item.index);

    let stats = BatchStats::from_items(&items, total_start.elapsed().as_millis() as u64);
    info!(
        "Batch complete: {}/{} images succeeded, {}ms total",
        stats.succeeded, stats.total_images, stats.total_duration_ms
    );
    if let Some(ref cb) = progress {
        cb.on_batch_complete(total, stats.succeeded);
    }

    BatchOutput { items, stats }
}

/// Synchronous wrapper around [`process_batch`].
///
/// Creates a temporary tokio runtime internally, so it must not be called
/// from inside an async context.
pub fn process_batch_sync(
    pipeline: Arc<JobPipeline>,
    inputs: Vec<BatchInput>,
    progress: Option<ProgressCallback>,
) -> Result<BatchOutput, PipelineError> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| PipelineError::Internal(format!("Failed to create tokio runtime: {e}")))?;
    Ok(runtime.block_on(process_batch(pipeline, inputs, progress)))
}

async fn run_one(
    pipeline: Arc<JobPipeline>,
    index: usize,
    input: BatchInput,
    progress: ProgressCallback,
) -> BatchItem {
    let BatchInput { source, bytes } = input;
    progress.on_image_start(index, &source);
    let start = Instant::now();

    let result = match tokio::task::spawn_blocking(move || pipeline.process(&bytes)).await {
        Ok(result) => result,
        Err(e) => Err(PipelineError::Internal(format!("worker failed: {e}"))),
    };

    match &result {
        Ok(record) => progress.on_image_complete(index, &source, record),
        Err(e) => {
            warn!("{source}: {e}");
            progress.on_image_error(index, &source, e);
        }
    }

    BatchItem {
        index,
        source,
        result,
        duration_ms: start.elapsed().as_millis() as u64,
    }
}
