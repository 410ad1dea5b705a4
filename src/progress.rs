//! Progress-callback trait for estimation events.
//!
//! Inject an [`Arc<dyn AnalysisProgressCallback>`] via
//! [`crate::config::EstimatorConfigBuilder::progress_callback`] to follow a
//! run as it uploads, waits for the remote service and generates. The CLI
//! uses this to drive its spinner; the web front-end leaves it unset.
//!
//! # Example
//!
//! ```rust
//! use blueprint_estimator::{AnalysisProgressCallback, EstimatorConfig, FileState};
//! use std::sync::{Arc, atomic::{AtomicU32, Ordering}};
//!
//! struct PollCounter {
//!     polls: AtomicU32,
//! }
//!
//! impl AnalysisProgressCallback for PollCounter {
//!     fn on_poll(&self, attempt: u32, state: FileState) {
//!         self.polls.store(attempt, Ordering::SeqCst);
//!         eprintln!("status check {attempt}: {state}");
//!     }
//! }
//!
//! let config = EstimatorConfig::builder()
//!     .progress_callback(Arc::new(PollCounter { polls: AtomicU32::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::remote::FileState;
use std::sync::Arc;

/// Called by the pipeline at each stage of an estimation run.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait AnalysisProgressCallback: Send + Sync {
    /// Called before the staged file is sent.
    ///
    /// # Arguments
    /// * `file_name` — original name of the uploaded drawing
    /// * `bytes`     — size of the staged copy
    fn on_upload_start(&self, file_name: &str, bytes: u64) {
        let _ = (file_name, bytes);
    }

    /// Called once the remote service has accepted the file.
    fn on_upload_complete(&self, remote_name: &str, state: FileState) {
        let _ = (remote_name, state);
    }

    /// Called after every status check.
    ///
    /// # Arguments
    /// * `attempt` — 1-indexed status check number
    /// * `state`   — state reported by that check
    fn on_poll(&self, attempt: u32, state: FileState) {
        let _ = (attempt, state);
    }

    /// Called just before the generation request is sent.
    fn on_generation_start(&self, model: &str) {
        let _ = model;
    }

    /// Called when the model's reply has arrived.
    ///
    /// * `text_len` — byte length of the raw reply
    fn on_generation_complete(&self, text_len: usize) {
        let _ = text_len;
    }

    /// Called when the run stops with an error.
    fn on_error(&self, error: &str) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AnalysisProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::EstimatorConfig`].
pub type ProgressCallback = Arc<dyn AnalysisProgressCallback>;
