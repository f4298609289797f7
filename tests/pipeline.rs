//! Integration tests for the watch → classify → rename pipeline.
//!
//! pdfium and the model are replaced by scripted fakes, so these run
//! offline. Each test gets its own temporary watch folder.

use futures::future::BoxFuture;
use paper_renamer::progress::{
    STATUS_ANALYZING, STATUS_DUPLICATE, STATUS_FAILED, STATUS_NOT_A_PAPER, STATUS_RENAMED,
};
use paper_renamer::{
    ClassificationResult, Classifier, ClassifyError, FileOutcome, FirstPageRenderer, PageImage,
    ProgressNotifier, ProgressUpdate, RasterError, Renamer, RenamerConfig, SkipReason, Stage,
    WatchEvent,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::mpsc;

// ── Test doubles ─────────────────────────────────────────────────────────────

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("paper_renamer=debug")
        .with_test_writer()
        .try_init();
}

struct FakeRenderer {
    fail: bool,
}

impl FirstPageRenderer for FakeRenderer {
    fn render_first_page(&self, pdf: &[u8]) -> Result<PageImage, RasterError> {
        if self.fail || !pdf.starts_with(b"%PDF") {
            return Err(RasterError::DecodeFailed {
                detail: "not a PDF".into(),
            });
        }
        Ok(PageImage::from_png(vec![0x89, b'P', b'N', b'G']))
    }
}

#[derive(Clone)]
enum Script {
    Answer(ClassificationResult),
    Unparseable,
    Unreachable,
    Hang,
}

struct ScriptedClassifier {
    script: Script,
    calls: AtomicUsize,
}

impl ScriptedClassifier {
    fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Classifier for ScriptedClassifier {
    fn classify<'a>(
        &'a self,
        _image: &'a PageImage,
        _prompt: &'a str,
    ) -> BoxFuture<'a, Result<ClassificationResult, ClassifyError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let script = self.script.clone();
        Box::pin(async move {
            match script {
                Script::Answer(r) => Ok(r),
                Script::Unparseable => Err(ClassifyError::ParseFailed {
                    detail: "expected value at line 1 column 1".into(),
                }),
                Script::Unreachable => Err(ClassifyError::RequestFailed {
                    detail: "connection refused".into(),
                }),
                Script::Hang => std::future::pending().await,
            }
        })
    }
}

#[derive(Default)]
struct RecordingNotifier {
    updates: Mutex<Vec<ProgressUpdate>>,
}

impl RecordingNotifier {
    fn statuses(&self) -> Vec<(String, String)> {
        self.updates
            .lock()
            .unwrap()
            .iter()
            .map(|u| (u.title.clone(), u.status.clone()))
            .collect()
    }
}

impl ProgressNotifier for RecordingNotifier {
    fn on_progress(&self, update: &ProgressUpdate) {
        self.updates.lock().unwrap().push(update.clone());
    }
}

struct Harness {
    dir: TempDir,
    renamer: Renamer,
    classifier: Arc<ScriptedClassifier>,
    notifier: Arc<RecordingNotifier>,
}

fn harness(script: Script) -> Harness {
    harness_with(script, false)
}

fn harness_with(script: Script, render_fails: bool) -> Harness {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let config = RenamerConfig::builder()
        .watch_folder(dir.path())
        .api_timeout_secs(1)
        .ready_poll_interval_ms(10)
        .ready_max_attempts(5)
        .build()
        .unwrap();
    let classifier = ScriptedClassifier::new(script);
    let notifier = Arc::new(RecordingNotifier::default());
    let renamer = Renamer::new(
        config,
        Arc::new(FakeRenderer { fail: render_fails }),
        classifier.clone(),
    )
    .with_notifier(notifier.clone());
    Harness {
        dir,
        renamer,
        classifier,
        notifier,
    }
}

fn paper(title: &str, author: &str) -> Script {
    Script::Answer(ClassificationResult {
        is_paper: true,
        title: title.into(),
        author: author.into(),
    })
}

fn write_pdf(dir: &Path, name: &str) {
    std::fs::write(dir.join(name), b"%PDF-1.7\n%fake body\n").unwrap();
}

fn names(dir: &Path) -> Vec<String> {
    let mut v: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    v.sort();
    v
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn datasheet_is_left_alone() {
    let mut h = harness(Script::Answer(ClassificationResult {
        is_paper: false,
        title: "Thorlabs Product Catalog".into(),
        author: String::new(),
    }));
    write_pdf(h.dir.path(), "thorlabs.pdf");

    let outcome = h
        .renamer
        .handle_event(&WatchEvent::created(h.dir.path().join("thorlabs.pdf")))
        .await;

    assert_eq!(outcome, Some(FileOutcome::Skipped(SkipReason::NotAPaper)));
    assert_eq!(names(h.dir.path()), vec!["thorlabs.pdf"]);
    assert_eq!(
        h.notifier.statuses(),
        vec![
            ("thorlabs.pdf".to_string(), STATUS_ANALYZING.to_string()),
            ("thorlabs.pdf".to_string(), STATUS_NOT_A_PAPER.to_string()),
        ]
    );
}

#[tokio::test]
async fn finished_download_is_renamed_once() {
    let mut h = harness(paper("Observation of Gravitational Waves", "B. P. Abbott et al."));
    let dir = h.dir.path().to_path_buf();
    write_pdf(&dir, "science.aav9105.pdf");

    let event = WatchEvent::moved(
        dir.join("science.aav9105.pdf.crdownload"),
        dir.join("science.aav9105.pdf"),
    );
    let outcome = h.renamer.handle_event(&event).await;

    let expected = dir.join("Observation of Gravitational Waves(science.aav9105).pdf");
    assert_eq!(
        outcome,
        Some(FileOutcome::Renamed {
            from: dir.join("science.aav9105.pdf"),
            to: expected.clone(),
        })
    );
    assert_eq!(
        names(&dir),
        vec!["Observation of Gravitational Waves(science.aav9105).pdf"]
    );

    // The rename itself triggers a notification for the new name.
    let echo = WatchEvent::moved(dir.join("science.aav9105.pdf"), &expected);
    assert_eq!(h.renamer.handle_event(&echo).await, None);
    assert_eq!(
        h.renamer
            .handle_event(&WatchEvent::created(&expected))
            .await,
        None
    );
    assert_eq!(h.classifier.calls(), 1);

    let statuses = h.notifier.statuses();
    assert_eq!(statuses.len(), 2);
    assert_eq!(statuses[0].1, STATUS_ANALYZING);
    assert_eq!(
        statuses[1],
        (
            "Observation of Gravitational Waves(science.aav9105).pdf".to_string(),
            STATUS_RENAMED.to_string()
        )
    );
}

#[tokio::test]
async fn existing_target_is_a_duplicate() {
    let mut h = harness(paper("Attention Is All You Need", "Vaswani et al."));
    let dir = h.dir.path().to_path_buf();
    write_pdf(&dir, "1706.03762.pdf");
    std::fs::write(dir.join("Attention Is All You Need(1706.03762).pdf"), b"older").unwrap();

    let outcome = h
        .renamer
        .handle_event(&WatchEvent::created(dir.join("1706.03762.pdf")))
        .await;

    assert_eq!(outcome, Some(FileOutcome::Skipped(SkipReason::Duplicate)));
    assert_eq!(
        std::fs::read(dir.join("Attention Is All You Need(1706.03762).pdf")).unwrap(),
        b"older"
    );
    assert!(dir.join("1706.03762.pdf").exists());
    assert_eq!(h.notifier.statuses()[1].1, STATUS_DUPLICATE);
}

#[tokio::test]
async fn unparseable_answer_means_not_a_paper() {
    let mut h = harness(Script::Unparseable);
    write_pdf(h.dir.path(), "mystery.pdf");

    let outcome = h
        .renamer
        .handle_event(&WatchEvent::created(h.dir.path().join("mystery.pdf")))
        .await;

    assert_eq!(outcome, Some(FileOutcome::Skipped(SkipReason::NotAPaper)));
    assert_eq!(names(h.dir.path()), vec!["mystery.pdf"]);
    assert_eq!(h.notifier.statuses()[1].1, STATUS_NOT_A_PAPER);
}

#[tokio::test]
async fn unreachable_model_fails_classify_stage() {
    let mut h = harness(Script::Unreachable);
    write_pdf(h.dir.path(), "a.pdf");

    let outcome = h
        .renamer
        .handle_event(&WatchEvent::created(h.dir.path().join("a.pdf")))
        .await;

    match outcome {
        Some(FileOutcome::Failed { stage, reason }) => {
            assert_eq!(stage, Stage::Classify);
            assert!(reason.contains("connection refused"), "reason: {reason}");
        }
        other => panic!("expected classify failure, got {other:?}"),
    }
    assert_eq!(names(h.dir.path()), vec!["a.pdf"]);
    // progress closes without leaking the error detail
    assert_eq!(h.notifier.statuses()[1], ("a.pdf".to_string(), STATUS_FAILED.to_string()));
}

#[tokio::test]
async fn slow_model_times_out() {
    let mut h = harness(Script::Hang);
    write_pdf(h.dir.path(), "slow.pdf");

    let outcome = h
        .renamer
        .handle_event(&WatchEvent::created(h.dir.path().join("slow.pdf")))
        .await;

    assert!(
        matches!(outcome, Some(FileOutcome::Failed { stage: Stage::Classify, .. })),
        "got {outcome:?}"
    );
}

#[tokio::test]
async fn undecodable_pdf_fails_before_progress() {
    let mut h = harness_with(paper("Title", "A"), true);
    write_pdf(h.dir.path(), "broken.pdf");

    let outcome = h
        .renamer
        .handle_event(&WatchEvent::created(h.dir.path().join("broken.pdf")))
        .await;

    assert!(
        matches!(outcome, Some(FileOutcome::Failed { stage: Stage::Rasterize, .. })),
        "got {outcome:?}"
    );
    assert_eq!(h.classifier.calls(), 0);
    assert!(h.notifier.statuses().is_empty());
}

#[tokio::test]
async fn noise_events_are_ignored() {
    let mut h = harness(paper("Title", "A"));
    let dir = h.dir.path().to_path_buf();
    std::fs::create_dir(dir.join("folder.pdf")).unwrap();
    std::fs::write(dir.join("notes.txt"), b"hello").unwrap();
    std::fs::write(dir.join("x.pdf.crdownload"), b"%PDF partial").unwrap();

    let events = [
        WatchEvent::created(dir.join("folder.pdf")).directory(),
        WatchEvent::created(dir.join("notes.txt")),
        WatchEvent::created(dir.join("x.pdf.crdownload")),
        WatchEvent::moved(dir.join("a.pdf"), dir.join("b.pdf")),
        WatchEvent::moved(dir.join("a.tmp"), dir.join("a.pdf")),
    ];
    for event in &events {
        assert_eq!(h.renamer.handle_event(event).await, None, "{event:?}");
    }
    assert_eq!(h.classifier.calls(), 0);
    assert!(h.notifier.statuses().is_empty());
}

#[tokio::test]
async fn run_loop_drains_queue_serially() {
    let mut h = harness(paper("Deep Residual Learning for Image Recognition", "He et al."));
    let dir = h.dir.path().to_path_buf();
    write_pdf(&dir, "1512.03385.pdf");
    std::fs::write(dir.join("notes.txt"), b"hello").unwrap();

    let (tx, rx) = mpsc::unbounded_channel();
    tx.send(WatchEvent::created(dir.join("notes.txt"))).unwrap();
    tx.send(WatchEvent::created(dir.join("1512.03385.pdf"))).unwrap();
    tx.send(WatchEvent::created(dir.join("ghost.pdf"))).unwrap();
    drop(tx);

    let summary = h.renamer.run(rx, std::future::pending::<()>()).await;

    assert_eq!(summary.events, 3);
    assert_eq!(summary.renamed, 1);
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.failed, 0);
    assert!(dir
        .join("Deep Residual Learning for Image Recognition(1512.03385).pdf")
        .exists());
}

#[tokio::test]
async fn shutdown_stops_the_loop() {
    let mut h = harness(paper("Title", "A"));
    let (_tx, rx) = mpsc::unbounded_channel::<WatchEvent>();
    let summary = h.renamer.run(rx, async {}).await;
    assert_eq!(summary.events, 0);
}
