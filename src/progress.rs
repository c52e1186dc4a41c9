//! Progress-callback trait for tool-run events.
//!
//! Inject an [`Arc<dyn ProcessingProgressCallback>`] via
//! [`crate::config::ProcessingConfigBuilder::progress_callback`] to receive
//! events as a tool loads its inputs and writes its outputs. The CLI turns
//! these into an `indicatif` progress bar; the server ignores them.
//!
//! # Example
//!
//! ```rust
//! use pagesmith::{ProcessingProgressCallback, ProcessingConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     outputs: AtomicUsize,
//! }
//!
//! impl ProcessingProgressCallback for CountingCallback {
//!     fn on_output_ready(&self, index: usize, total: usize, name: &str, bytes: usize) {
//!         self.outputs.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{name} ({index}/{total}, {bytes} bytes)");
//!     }
//! }
//!
//! let config = ProcessingConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { outputs: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as a tool run progresses.
///
/// Implementations must be `Send + Sync`: events for the serialization phase
/// are fired from a blocking worker thread. All methods default to no-ops.
pub trait ProcessingProgressCallback: Send + Sync {
    /// Called once before the first input is parsed.
    ///
    /// # Arguments
    /// * `total_files` — number of inputs that will be loaded
    fn on_load_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called after each input is parsed.
    ///
    /// # Arguments
    /// * `index`      — 1-indexed position among the inputs
    /// * `name`       — input file name
    /// * `page_count` — pages in the parsed document (0 for images)
    fn on_document_loaded(&self, index: usize, name: &str, page_count: usize) {
        let _ = (index, name, page_count);
    }

    /// Called when the tool's operation starts.
    ///
    /// # Arguments
    /// * `tool`          — tool slug
    /// * `total_outputs` — outputs the run will produce
    fn on_process_start(&self, tool: &str, total_outputs: usize) {
        let _ = (tool, total_outputs);
    }

    /// Called when one output document is fully serialized.
    fn on_output_ready(&self, index: usize, total: usize, name: &str, bytes: usize) {
        let _ = (index, total, name, bytes);
    }

    /// Called when the run fails. No further events follow.
    fn on_process_error(&self, tool: &str, error: &str) {
        let _ = (tool, error);
    }

    /// Called once after every output is ready.
    fn on_process_complete(&self, tool: &str, total_outputs: usize) {
        let _ = (tool, total_outputs);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ProcessingProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ProcessingConfig`].
pub type ProgressCallback = Arc<dyn ProcessingProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn push(&self, s: String) {
            self.events.lock().unwrap().push(s);
        }
    }

    impl ProcessingProgressCallback for Recorder {
        fn on_load_start(&self, total_files: usize) {
            self.push(format!("load:{total_files}"));
        }
        fn on_document_loaded(&self, index: usize, _name: &str, page_count: usize) {
            self.push(format!("doc:{index}:{page_count}"));
        }
        fn on_output_ready(&self, index: usize, total: usize, _name: &str, _bytes: usize) {
            self.push(format!("out:{index}/{total}"));
        }
        fn on_process_complete(&self, tool: &str, total_outputs: usize) {
            self.push(format!("done:{tool}:{total_outputs}"));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_load_start(2);
        cb.on_document_loaded(1, "a.pdf", 3);
        cb.on_process_start("merge", 1);
        cb.on_output_ready(1, 1, "merged-document.pdf", 1024);
        cb.on_process_error("merge", "boom");
        cb.on_process_complete("merge", 1);
    }

    #[test]
    fn overridden_methods_receive_events_in_order() {
        let rec = Recorder::default();
        rec.on_load_start(2);
        rec.on_document_loaded(1, "a.pdf", 2);
        rec.on_document_loaded(2, "b.pdf", 3);
        rec.on_process_start("merge", 1); // default no-op
        rec.on_output_ready(1, 1, "merged-document.pdf", 10);
        rec.on_process_complete("merge", 1);

        let events = rec.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec!["load:2", "doc:1:2", "doc:2:3", "out:1/1", "done:merge:1"]
        );
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_load_start(1);
        cb.on_output_ready(1, 1, "x.pdf", 1);
    }
}
