//! # paper-renamer
//!
//! Watch a download folder and give academic papers readable names.
//!
//! Browsers save papers under opaque names such as `science.aav9105.pdf` or
//! `2403.01234v2.pdf`. This crate watches the folder, renders the first page
//! of each new PDF, asks a Vision Language Model whether the document is a
//! paper and what it is called, and renames it:
//!
//! ```text
//! science.aav9105.pdf ─▶ Observation of Gravitational Waves(science.aav9105).pdf
//! ```
//!
//! The original stem is kept in parentheses, so the rename can always be
//! traced back and two papers with the same title never collide.
//!
//! ## Pipeline Overview
//!
//! ```text
//! notify event
//!  │
//!  ├─ 1. Normalise  .pdf created, or .pdf.crdownload → .pdf
//!  ├─ 2. Ready      poll until the size stops changing
//!  ├─ 3. Render     page one via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 4. Classify   PNG → VLM → {is_paper, title, author}
//!  └─ 5. Rename     {title}({stem}).pdf, never overwriting
//! ```
//!
//! Each file reports two progress steps through a [`ProgressNotifier`]:
//! "Analyzing PDF File..." when classification starts, then the final
//! status once the rename decision is made.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use paper_renamer::{watch, LogNotifier, Renamer, RenamerConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RenamerConfig::from_yaml_file("config.yaml")?;
//!     let mut renamer = Renamer::from_config(config)?.with_notifier(Arc::new(LogNotifier));
//!     let shutdown = async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     };
//!     let summary = watch(&mut renamer, shutdown).await?;
//!     eprintln!("renamed {} papers", summary.renamed);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `paper-renamer` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod renamer;
pub mod watch;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{RenamerConfig, RenamerConfigBuilder, API_KEY_ENV};
pub use error::{ClassifyError, RasterError, ReadinessError, RenameError, RenamerError};
pub use pipeline::classify::{ClassificationResult, Classifier, OpenAiClassifier};
pub use pipeline::encode::PageImage;
pub use pipeline::llm::ProviderClassifier;
pub use pipeline::normalize::{PendingFile, WatchEvent, WatchEventKind};
pub use pipeline::render::{FirstPageRenderer, PdfiumRenderer};
pub use progress::{LogNotifier, NoopNotifier, ProgressNotifier, ProgressUpdate, SharedNotifier};
pub use renamer::{resolve_classifier, FileOutcome, Renamer, SkipReason, Stage, WatchSummary};
pub use watch::{count_existing_entries, watch, EventTranslator, WatchSession};
