//! Progress-callback trait for per-image batch events.
//!
//! Pass an [`Arc<dyn BatchProgressCallback>`] to
//! [`crate::batch::process_batch`] or [`crate::batch::process_stream`] to
//! receive events as each posting image moves through the pipeline.
//!
//! Callers can forward events to a channel, a database row or a terminal
//! progress bar without the library knowing how the host application
//! communicates. The trait is `Send + Sync` because images are processed on
//! several blocking worker threads at once.
//!
//! # Example
//!
//! ```rust
//! use posting_ocr::{BatchProgressCallback, JobRecord};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct SkillCounter {
//!     skills: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for SkillCounter {
//!     fn on_image_complete(&self, _index: usize, _source: &str, record: &JobRecord) {
//!         self.skills.fetch_add(record.skills.len(), Ordering::SeqCst);
//!     }
//! }
//! ```

use crate::error::PipelineError;
use crate::output::JobRecord;
use std::sync::Arc;

/// Called by the batch driver as it processes each image.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
///
/// # Thread safety
///
/// `on_image_start`, `on_image_complete` and `on_image_error` may be called
/// concurrently from different worker tasks. Protect shared mutable state
/// with `Mutex` or atomics.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before any image is processed.
    fn on_batch_start(&self, total_images: usize) {
        let _ = total_images;
    }

    /// Called just before an image is handed to a worker.
    ///
    /// # Arguments
    /// * `index`  — 0-indexed position in the input list
    /// * `source` — caller-supplied label (usually the file name)
    fn on_image_start(&self, index: usize, source: &str) {
        let _ = (index, source);
    }

    /// Called when an image produced a record.
    fn on_image_complete(&self, index: usize, source: &str, record: &JobRecord) {
        let _ = (index, source, record);
    }

    /// Called when an image failed.
    fn on_image_error(&self, index: usize, source: &str, error: &PipelineError) {
        let _ = (index, source, error);
    }

    /// Called once after every image has been attempted.
    ///
    /// # Arguments
    /// * `total_images`  — number of inputs
    /// * `success_count` — inputs that produced a record
    fn on_batch_complete(&self, total_images: usize, success_count: usize) {
        let _ = (total_images, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias for the shared callback handle.
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::preprocess::PreprocessProfile;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        completed_total: AtomicUsize,
    }

    impl BatchProgressCallback for TrackingCallback {
        fn on_image_start(&self, _index: usize, _source: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_image_complete(&self, _index: usize, _source: &str, _record: &JobRecord) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_image_error(&self, _index: usize, _source: &str, _error: &PipelineError) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_batch_complete(&self, _total_images: usize, success_count: usize) {
            self.completed_total.store(success_count, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(2);
        cb.on_image_start(0, "a.png");
        cb.on_image_error(
            1,
            "b.png",
            &PipelineError::EmptyText {
                attempts: vec![PreprocessProfile::Enhanced],
            },
        );
        cb.on_batch_complete(2, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        let record = JobRecord::default();

        tracker.on_image_start(0, "a.png");
        tracker.on_image_complete(0, "a.png", &record);
        tracker.on_image_start(1, "b.png");
        tracker.on_image_error(
            1,
            "b.png",
            &PipelineError::Ocr {
                profile: PreprocessProfile::Enhanced,
                detail: "crash".into(),
            },
        );
        tracker.on_batch_complete(2, 1);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.completed_total.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_batch_start(10);
        cb.on_image_start(0, "x.png");
    }
}
