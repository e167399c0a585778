//! Progress-callback trait for per-file batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] through
//! [`crate::config::BatchConfig::progress`] to receive events as the batch
//! driver walks the tender tree.
//!
//! The trait is `Send + Sync`: with `concurrency > 1` several documents are in
//! flight at once and the file-level methods may be called from different
//! tasks. Implementations must protect shared mutable state accordingly.
//!
//! # Example
//!
//! ```rust
//! use tender2md::{BatchConfig, BatchProgressCallback};
//! use std::path::Path;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_file_complete(&self, index: usize, total: usize, source: &Path, markdown_len: usize) {
//!         self.done.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("[{}/{}] {} ({} bytes)", index, total, source.display(), markdown_len);
//!     }
//! }
//!
//! let config = BatchConfig {
//!     progress: Some(Arc::new(CountingCallback { done: AtomicUsize::new(0) })),
//!     ..BatchConfig::default()
//! };
//! assert!(config.progress.is_some());
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by the batch driver as it processes each document.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `index` is 1-based over the documents of the batch.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once after discovery, before any document is converted.
    fn on_batch_start(&self, total_files: usize) {
        let _ = total_files;
    }

    fn on_file_start(&self, index: usize, total: usize, source: &Path) {
        let _ = (index, total, source);
    }

    /// Called when a document produced Markdown.
    fn on_file_complete(&self, index: usize, total: usize, source: &Path, markdown_len: usize) {
        let _ = (index, total, source, markdown_len);
    }

    /// Called when a document was deliberately not converted (size gate).
    fn on_file_skipped(&self, index: usize, total: usize, source: &Path, reason: &str) {
        let _ = (index, total, source, reason);
    }

    /// Called when a document failed; the batch continues.
    fn on_file_error(&self, index: usize, total: usize, source: &Path, error: &str) {
        let _ = (index, total, source, error);
    }

    /// Called once after every document has been attempted.
    fn on_batch_complete(&self, converted: usize, skipped: usize, failed: usize) {
        let _ = (converted, skipped, failed);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::BatchConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        skips: AtomicUsize,
        errors: AtomicUsize,
    }

    impl BatchProgressCallback for TrackingCallback {
        fn on_file_start(&self, _index: usize, _total: usize, _source: &Path) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_file_complete(&self, _i: usize, _t: usize, _s: &Path, _len: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_file_skipped(&self, _i: usize, _t: usize, _s: &Path, _reason: &str) {
            self.skips.fetch_add(1, Ordering::SeqCst);
        }

        fn on_file_error(&self, _i: usize, _t: usize, _s: &Path, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(3);
        cb.on_file_start(1, 3, Path::new("a.pdf"));
        cb.on_file_complete(1, 3, Path::new("a.pdf"), 10);
        cb.on_file_skipped(2, 3, Path::new("b.xlsx"), "too large");
        cb.on_file_error(3, 3, Path::new("c.docx"), "boom");
        cb.on_batch_complete(1, 1, 1);
    }

    #[test]
    fn tracking_callback_through_arc_dyn() {
        let tracker = Arc::new(TrackingCallback::default());
        let cb: ProgressCallback = tracker.clone();
        cb.on_file_start(1, 2, Path::new("a.pdf"));
        cb.on_file_complete(1, 2, Path::new("a.pdf"), 5);
        cb.on_file_start(2, 2, Path::new("b.pdf"));
        cb.on_file_error(2, 2, Path::new("b.pdf"), "engine failed");
        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.skips.load(Ordering::SeqCst), 0);
    }
}
