//! Progress-callback trait for per-file and per-batch conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the orchestrator moves files through their lifecycle.
//!
//! # Example
//!
//! ```rust
//! use edgequake_docmatrix::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//! use uuid::Uuid;
//!
//! struct BatchCounter {
//!     batches: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for BatchCounter {
//!     fn on_batch_complete(&self, _batch_id: Uuid, files: usize) {
//!         self.batches.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{files} files converted");
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(Arc::new(BatchCounter { batches: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;
use uuid::Uuid;

/// Called by the orchestrator as files progress.
///
/// Files of a batch run concurrently, so methods may be called from several
/// tasks at once. All methods have default no-op implementations.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once when a batch is accepted.
    fn on_batch_start(&self, batch_id: Uuid, files: usize) {
        let _ = (batch_id, files);
    }

    /// Called when a file enters `processing`.
    fn on_file_start(&self, file_id: Uuid, name: &str) {
        let _ = (file_id, name);
    }

    /// Called whenever a file's progress increases.
    fn on_file_progress(&self, file_id: Uuid, percent: u8) {
        let _ = (file_id, percent);
    }

    /// Called when a file reaches `success`.
    ///
    /// * `bytes`: payload size of the produced result
    fn on_file_complete(&self, file_id: Uuid, name: &str, bytes: usize) {
        let _ = (file_id, name, bytes);
    }

    /// Called when a file reaches `error`, including validation failures.
    fn on_file_error(&self, file_id: Uuid, name: &str, error: &str) {
        let _ = (file_id, name, error);
    }

    /// Called exactly once per batch, and only when every file succeeded.
    fn on_batch_complete(&self, batch_id: Uuid, files: usize) {
        let _ = (batch_id, files);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
