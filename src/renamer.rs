//! The orchestrator: drive one file from watch event to final outcome.
//!
//! ```text
//! Received ─▶ Normalized ─▶ Rasterized ─▶ Classified ─┬▶ Renamed
//!                                                      ├▶ Skipped(NotAPaper)
//!                                                      ├▶ Skipped(Duplicate)
//!                                                      ├▶ Skipped(MissingTitle)
//!                                                      └▶ Failed(stage, reason)
//! ```
//!
//! [`Renamer`] owns the set of paths it has already renamed. Events are
//! handled one at a time through `&mut self`, so the set needs no lock and a
//! second notification for a file that was just renamed is a no-op.
//!
//! Every stage error is logged with the path, the stage, and the cause, then
//! folded into a [`FileOutcome`]. Nothing a single file does can end the
//! watch loop.

use crate::config::RenamerConfig;
use crate::error::{ClassifyError, RasterError, ReadinessError, RenameError, RenamerError};
use crate::pipeline::classify::{ClassificationResult, Classifier, OpenAiClassifier};
use crate::pipeline::encode::PageImage;
use crate::pipeline::llm::ProviderClassifier;
use crate::pipeline::normalize::{normalize, PendingFile, WatchEvent};
use crate::pipeline::ready::wait_until_ready;
use crate::pipeline::rename::{self, plan_rename};
use crate::pipeline::render::{FirstPageRenderer, PdfiumRenderer};
use crate::progress::{
    NoopNotifier, ProgressUpdate, SharedNotifier, STATUS_DUPLICATE, STATUS_FAILED,
    STATUS_MISSING_TITLE, STATUS_NOT_A_PAPER, STATUS_RENAMED,
};
use futures::FutureExt;
use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info, warn};

/// Pipeline stage at which a file failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Readiness,
    Read,
    Rasterize,
    Classify,
    Rename,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Readiness => "readiness",
            Stage::Read => "read",
            Stage::Rasterize => "rasterize",
            Stage::Classify => "classify",
            Stage::Rename => "rename",
        };
        f.write_str(name)
    }
}

/// Why a classified file was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotAPaper,
    Duplicate,
    MissingTitle,
}

/// Terminal state of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Renamed { from: PathBuf, to: PathBuf },
    Skipped(SkipReason),
    Failed { stage: Stage, reason: String },
}

impl fmt::Display for FileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileOutcome::Renamed { to, .. } => write!(f, "renamed to {}", to.display()),
            FileOutcome::Skipped(reason) => write!(f, "skipped ({:?})", reason),
            FileOutcome::Failed { stage, reason } => write!(f, "failed at {stage}: {reason}"),
        }
    }
}

/// Counters reported when the watch loop ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchSummary {
    pub events: usize,
    pub renamed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl WatchSummary {
    fn record(&mut self, outcome: &FileOutcome) {
        match outcome {
            FileOutcome::Renamed { .. } => self.renamed += 1,
            FileOutcome::Skipped(_) => self.skipped += 1,
            FileOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

/// Pick the classifier backend named by `config.provider`.
///
/// `openai` uses the direct structured-output client; every other name is
/// handed to the edgequake-llm provider factory.
pub fn resolve_classifier(config: &RenamerConfig) -> Result<Arc<dyn Classifier>, RenamerError> {
    if config.provider.eq_ignore_ascii_case("openai") {
        Ok(Arc::new(OpenAiClassifier::from_config(config)?))
    } else {
        Ok(Arc::new(ProviderClassifier::from_config(config)?))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Classifies and renames PDFs, one event at a time.
pub struct Renamer {
    config: RenamerConfig,
    renderer: Arc<dyn FirstPageRenderer>,
    classifier: Arc<dyn Classifier>,
    notifier: SharedNotifier,
    /// Paths this process has renamed files *to*.
    processed: HashSet<PathBuf>,
}

impl Renamer {
    /// Assemble a renamer from explicit collaborators.
    pub fn new(
        config: RenamerConfig,
        renderer: Arc<dyn FirstPageRenderer>,
        classifier: Arc<dyn Classifier>,
    ) -> Self {
        Self {
            config,
            renderer,
            classifier,
            notifier: Arc::new(NoopNotifier),
            processed: HashSet::new(),
        }
    }

    /// Bind pdfium and create the configured classifier.
    pub fn from_config(config: RenamerConfig) -> Result<Self, RenamerError> {
        let renderer = PdfiumRenderer::new(
            config.pdfium_lib_path.as_deref(),
            config.max_rendered_pixels,
        )?;
        let classifier = resolve_classifier(&config)?;
        Ok(Self::new(config, Arc::new(renderer), classifier))
    }

    pub fn with_notifier(mut self, notifier: SharedNotifier) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn config(&self) -> &RenamerConfig {
        &self.config
    }

    pub fn notifier(&self) -> &SharedNotifier {
        &self.notifier
    }

    /// Whether `path` is a file this process renamed.
    pub fn is_processed(&self, path: &Path) -> bool {
        self.processed.contains(path)
    }

    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    /// Drain `events` one at a time until `shutdown` resolves or the queue
    /// closes. The file in flight when shutdown is requested is finished
    /// first.
    pub async fn run<F>(&mut self, mut events: UnboundedReceiver<WatchEvent>, shutdown: F) -> WatchSummary
    where
        F: Future<Output = ()>,
    {
        let mut summary = WatchSummary::default();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                next = events.recv() => match next {
                    Some(event) => {
                        summary.events += 1;
                        if let Some(outcome) = self.handle_event(&event).await {
                            summary.record(&outcome);
                        }
                    }
                    None => {
                        info!("Event queue closed");
                        break;
                    }
                },
            }
        }

        info!(
            "Watch ended: {} events, {} renamed, {} skipped, {} failed",
            summary.events, summary.renamed, summary.skipped, summary.failed
        );
        summary
    }

    /// Normalise one watch event and, if it names a PDF, process it.
    ///
    /// Returns `None` when the event was filtered out, the file vanished, or
    /// the path was already processed.
    pub async fn handle_event(&mut self, event: &WatchEvent) -> Option<FileOutcome> {
        match normalize(event) {
            Some(file) => {
                debug!("Accepted event {:?}", event.kind);
                self.process(file).await
            }
            None => {
                debug!("Ignored event {:?}", event);
                None
            }
        }
    }

    /// Run the full pipeline for one accepted file.
    pub async fn process(&mut self, file: PendingFile) -> Option<FileOutcome> {
        if self.processed.contains(&file.path) {
            info!("Already processed: {}", file.path.display());
            return None;
        }

        match wait_until_ready(
            &file.path,
            self.config.ready_poll_interval(),
            self.config.ready_max_attempts,
        )
        .await
        {
            Ok(len) => debug!("{} ready ({} bytes)", file.path.display(), len),
            Err(ReadinessError::Vanished { path }) => {
                debug!("{} vanished before processing; dropped", path.display());
                return None;
            }
            Err(e) => return Some(self.fail(&file, Stage::Readiness, &e, false)),
        }

        let start = Instant::now();
        let outcome = self.run_pipeline(&file).await;
        info!(
            "{}: {} ({}ms)",
            file.file_name(),
            outcome,
            start.elapsed().as_millis()
        );
        Some(outcome)
    }

    async fn run_pipeline(&mut self, file: &PendingFile) -> FileOutcome {
        // ── Step 1: Read ─────────────────────────────────────────────────
        let bytes = match tokio::fs::read(&file.path).await {
            Ok(b) => b,
            Err(e) => return self.fail(file, Stage::Read, &e, false),
        };

        // ── Step 2: Rasterise ────────────────────────────────────────────
        let image = match self.rasterize(bytes).await {
            Ok(img) => img,
            Err(e) => return self.fail(file, Stage::Rasterize, &e, false),
        };

        // ── Step 3: Classify ─────────────────────────────────────────────
        let file_name = file.file_name();
        self.notifier.on_progress(&ProgressUpdate::analyzing(&file_name));

        let result = match self.classify(&image).await {
            Ok(r) => r,
            Err(ClassifyError::ParseFailed { detail }) => {
                warn!(
                    "{}: unparseable classification, treating as not a paper: {}",
                    file.path.display(),
                    detail
                );
                ClassificationResult::not_a_paper()
            }
            Err(e) => return self.fail(file, Stage::Classify, &e, true),
        };
        info!(
            "{}: is_paper={} title={:?} author={:?}",
            file_name, result.is_paper, result.title, result.author
        );

        // ── Step 4: Rename ───────────────────────────────────────────────
        if !result.is_paper {
            self.finish(&file_name, STATUS_NOT_A_PAPER);
            return FileOutcome::Skipped(SkipReason::NotAPaper);
        }

        let Some(plan) = plan_rename(file, &result, self.config.max_title_chars) else {
            warn!("{}: classified as a paper but no usable title", file.path.display());
            self.finish(&file_name, STATUS_MISSING_TITLE);
            return FileOutcome::Skipped(SkipReason::MissingTitle);
        };

        match rename::apply(&plan) {
            Ok(()) => {
                self.processed.insert(plan.new_path.clone());
                self.finish(&plan.new_file_name(), STATUS_RENAMED);
                FileOutcome::Renamed {
                    from: plan.old_path,
                    to: plan.new_path,
                }
            }
            Err(RenameError::Duplicate { path }) => {
                info!("Duplicate name: {} already exists", path.display());
                self.finish(&file_name, STATUS_DUPLICATE);
                FileOutcome::Skipped(SkipReason::Duplicate)
            }
            Err(e) => self.fail(file, Stage::Rename, &e, true),
        }
    }

    /// Render page one on the blocking pool.
    async fn rasterize(&self, bytes: Vec<u8>) -> Result<PageImage, RasterError> {
        let renderer = Arc::clone(&self.renderer);
        tokio::task::spawn_blocking(move || renderer.render_first_page(&bytes))
            .await
            .map_err(|e| RasterError::DecodeFailed {
                detail: format!("render task panicked: {e}"),
            })?
    }

    /// One classification attempt, bounded by `api_timeout_secs`.
    async fn classify(&self, image: &PageImage) -> Result<ClassificationResult, ClassifyError> {
        let timeout = self.config.api_timeout();
        let call = AssertUnwindSafe(self.classifier.classify(image, &self.config.prompt))
            .catch_unwind();
        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => Err(ClassifyError::RequestFailed {
                detail: format!("classifier panicked: {}", panic_message(panic.as_ref())),
            }),
            Err(_) => Err(ClassifyError::RequestFailed {
                detail: format!("timed out after {}s", timeout.as_secs()),
            }),
        }
    }

    /// Emit progress step 2.
    fn finish(&self, title: &str, status: &str) {
        self.notifier
            .on_progress(&ProgressUpdate::finished(title, status));
    }

    /// Log a stage failure and turn it into an outcome. If step 1 was
    /// already shown, close the progress with a generic status.
    fn fail(
        &self,
        file: &PendingFile,
        stage: Stage,
        cause: &dyn fmt::Display,
        step_one_sent: bool,
    ) -> FileOutcome {
        error!(
            "{}: {} stage failed: {}",
            file.path.display(),
            stage,
            cause
        );
        if step_one_sent {
            self.finish(&file.file_name(), STATUS_FAILED);
        }
        FileOutcome::Failed {
            stage,
            reason: cause.to_string(),
        }
    }
}
