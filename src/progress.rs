//! Progress notifications for the two-step per-file contract.
//!
//! Every file that reaches the classifier produces exactly two
//! [`ProgressUpdate`]s: step 1 right before the model is asked, step 2 right
//! after the rename decision. Inject an [`Arc<dyn ProgressNotifier>`] into
//! [`crate::renamer::Renamer`] to forward them to a desktop toast, a terminal
//! progress bar, or a log. Delivery is fire-and-forget; nothing the notifier
//! does can influence the pipeline.
//!
//! # Example
//!
//! ```rust
//! use paper_renamer::{ProgressNotifier, ProgressUpdate};
//!
//! struct Printer;
//!
//! impl ProgressNotifier for Printer {
//!     fn on_progress(&self, update: &ProgressUpdate) {
//!         eprintln!("{}: {} ({})", update.title, update.status, update.step_label);
//!     }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Status shown while the model is being asked.
pub const STATUS_ANALYZING: &str = "Analyzing PDF File...";
/// Status shown after a successful rename.
pub const STATUS_RENAMED: &str = "Renaming file...";
/// Status shown when the target name is taken.
pub const STATUS_DUPLICATE: &str = "Duplicate name";
/// Status shown when the document is not a paper.
pub const STATUS_NOT_A_PAPER: &str = "Not a paper";
/// Status shown when the model found a paper but no usable title.
pub const STATUS_MISSING_TITLE: &str = "Missing title";
/// Status shown when a stage failed after step 1.
pub const STATUS_FAILED: &str = "Failed";

/// Number of steps in the per-file progress contract.
pub const TOTAL_STEPS: u32 = 2;

/// One progress notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// File name the update refers to (the new name after a rename).
    pub title: String,
    /// Human-readable status; never contains error detail.
    pub status: String,
    /// Completed fraction in `0.0..=1.0`.
    pub value: f32,
    /// e.g. `"Step 1 / 2"`.
    pub step_label: String,
}

impl ProgressUpdate {
    fn step(step: u32, title: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            status: status.into(),
            value: step as f32 / TOTAL_STEPS as f32,
            step_label: format!("Step {step} / {TOTAL_STEPS}"),
        }
    }

    /// Step 1: classification is about to start.
    pub fn analyzing(file_name: impl Into<String>) -> Self {
        Self::step(1, file_name, STATUS_ANALYZING)
    }

    /// Step 2: the rename decision is final.
    pub fn finished(title: impl Into<String>, status: impl Into<String>) -> Self {
        Self::step(TOTAL_STEPS, title, status)
    }
}

/// Receives progress events from the watcher.
///
/// All methods have default no-op implementations so implementors only
/// override what they care about. The trait is `Send + Sync` because the
/// notifier is shared with the watch session.
pub trait ProgressNotifier: Send + Sync {
    /// Called once when the watch starts.
    ///
    /// # Arguments
    /// * `folder`: the watched directory
    /// * `existing_files`: number of entries already present in it
    fn on_watch_start(&self, folder: &Path, existing_files: usize) {
        let _ = (folder, existing_files);
    }

    /// Called twice per classified file.
    fn on_progress(&self, update: &ProgressUpdate) {
        let _ = update;
    }
}

/// A no-op notifier for callers that don't need progress events.
pub struct NoopNotifier;

impl ProgressNotifier for NoopNotifier {}

/// Forwards every event to the `tracing` log at INFO level.
pub struct LogNotifier;

impl ProgressNotifier for LogNotifier {
    fn on_watch_start(&self, folder: &Path, existing_files: usize) {
        info!(
            "Paper renamer is running: watching {} ({} existing entries)",
            folder.display(),
            existing_files
        );
    }

    fn on_progress(&self, update: &ProgressUpdate) {
        info!(
            "[{}] {}: {}",
            update.step_label, update.title, update.status
        );
    }
}

/// Convenience alias for the type stored in [`crate::renamer::Renamer`].
pub type SharedNotifier = Arc<dyn ProgressNotifier>;
