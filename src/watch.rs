//! Folder watching: OS notifications in, [`WatchEvent`]s out.
//!
//! A single non-recursive `notify::RecommendedWatcher` observes the watch
//! folder. Its callback runs on notify's own thread and only translates and
//! enqueues; all processing happens on the consumer side of the unbounded
//! channel, one event at a time.
//!
//! ## Event mapping
//!
//! | notify kind | emitted |
//! |-------------|---------|
//! | `Create(Folder)` | directory `Created` (ignored downstream) |
//! | `Create(_)` | `Created` per path |
//! | `Modify(Name(Both))` with two paths | `Moved { source, dest }` |
//! | `Modify(Name(From))` then `Modify(Name(To))`, same tracker | one `Moved` |
//! | `Modify(Name(To))` with no `From` of the same tracker | `Created` |
//! | `Modify(Name(Any))` | `From` if the path is gone, `To` if it exists; adjacent halves pair |
//! | anything else | nothing |
//!
//! Linux reports a rename as `From`, `To` and then `Both`; the `Both` that
//! repeats an already-paired move is dropped.

use crate::error::RenamerError;
use crate::pipeline::normalize::{WatchEvent, WatchEventKind};
use crate::renamer::{Renamer, WatchSummary};
use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, info, warn};

/// The `From` half of a rename, waiting for its `To`.
#[derive(Debug)]
struct PendingFrom {
    path: PathBuf,
    /// Rename cookie shared by both halves (inotify); `None` if the backend
    /// reports none.
    tracker: Option<usize>,
}

/// Stateful translator from raw notify events to [`WatchEvent`]s.
///
/// Holds the `From` half of a rename until its `To` half arrives. Halves
/// reported as `From`/`To` are joined only when they carry the same rename
/// tracker. Halves reported as `Any` carry no tracker and are joined only
/// when they are adjacent.
#[derive(Debug, Default)]
pub struct EventTranslator {
    pending_from: Option<PendingFrom>,
    pending_any: Option<PathBuf>,
    last_paired: Option<(PathBuf, PathBuf)>,
}

impl EventTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn translate(&mut self, event: Event) -> Vec<WatchEvent> {
        let tracker = event.attrs.tracker();
        if !matches!(event.kind, EventKind::Modify(ModifyKind::Name(RenameMode::Any))) {
            self.pending_any = None;
        }

        match event.kind {
            EventKind::Create(kind) => {
                let folder = matches!(kind, CreateKind::Folder);
                event
                    .paths
                    .into_iter()
                    .map(|path| {
                        let is_directory = folder || path.is_dir();
                        WatchEvent {
                            kind: WatchEventKind::Created { path },
                            is_directory,
                        }
                    })
                    .collect()
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                let mut paths = event.paths.into_iter();
                let (Some(source), Some(dest)) = (paths.next(), paths.next()) else {
                    return Vec::new();
                };
                if self.last_paired.as_ref() == Some(&(source.clone(), dest.clone())) {
                    self.last_paired = None;
                    return Vec::new();
                }
                self.pending_from = None;
                vec![moved(source, dest)]
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                if let Some(stale) = self.pending_from.take() {
                    debug!("Rename source {} left the folder", stale.path.display());
                }
                self.pending_from = event
                    .paths
                    .into_iter()
                    .next()
                    .map(|path| PendingFrom { path, tracker });
                Vec::new()
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                let Some(dest) = event.paths.into_iter().next() else {
                    return Vec::new();
                };
                match self.pending_from.take() {
                    Some(from) if from.tracker.is_some() && from.tracker == tracker => {
                        self.last_paired = Some((from.path.clone(), dest.clone()));
                        vec![moved(from.path, dest)]
                    }
                    unmatched => {
                        // an unrelated `From` may still be waiting for its own `To`
                        self.pending_from = unmatched;
                        vec![created(dest)]
                    }
                }
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => {
                let mut out = Vec::new();
                for path in event.paths {
                    if path.exists() {
                        out.push(match self.pending_any.take() {
                            Some(source) => moved(source, path),
                            None => created(path),
                        });
                    } else {
                        self.pending_any = Some(path);
                    }
                }
                out
            }
            _ => Vec::new(),
        }
    }
}

fn created(path: PathBuf) -> WatchEvent {
    let is_directory = path.is_dir();
    WatchEvent {
        kind: WatchEventKind::Created { path },
        is_directory,
    }
}

fn moved(source: PathBuf, dest: PathBuf) -> WatchEvent {
    let is_directory = dest.is_dir();
    WatchEvent {
        kind: WatchEventKind::Moved { source, dest },
        is_directory,
    }
}

/// A live watch on one folder. Dropping it stops the OS subscription and
/// closes the event channel.
pub struct WatchSession {
    _watcher: RecommendedWatcher,
    folder: PathBuf,
}

impl WatchSession {
    /// Subscribe to `folder` and return the receiving end of the event queue.
    pub fn start(folder: &Path) -> Result<(Self, UnboundedReceiver<WatchEvent>), RenamerError> {
        if !folder.is_dir() {
            return Err(RenamerError::WatchFolderMissing {
                path: folder.to_path_buf(),
            });
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let mut translator = EventTranslator::new();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for ev in translator.translate(event) {
                    debug!("Queued {:?}", ev.kind);
                    if tx.send(ev).is_err() {
                        return;
                    }
                }
            }
            Err(e) => warn!("Watch error: {e}"),
        })
        .map_err(|e| RenamerError::WatchFailed {
            path: folder.to_path_buf(),
            detail: e.to_string(),
        })?;

        watcher
            .watch(folder, RecursiveMode::NonRecursive)
            .map_err(|e| RenamerError::WatchFailed {
                path: folder.to_path_buf(),
                detail: e.to_string(),
            })?;

        Ok((
            Self {
                _watcher: watcher,
                folder: folder.to_path_buf(),
            },
            rx,
        ))
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }
}

/// Number of entries directly inside `folder`, or 0 if it cannot be listed.
pub fn count_existing_entries(folder: &Path) -> usize {
    std::fs::read_dir(folder)
        .map(|entries| entries.filter_map(Result::ok).count())
        .unwrap_or(0)
}

/// Watch the configured folder and feed every event to `renamer` until
/// `shutdown` resolves. Files already in the folder are not processed.
pub async fn watch<F>(renamer: &mut Renamer, shutdown: F) -> Result<WatchSummary, RenamerError>
where
    F: Future<Output = ()>,
{
    let folder = renamer.config().watch_folder.clone();
    let (session, events) = WatchSession::start(&folder)?;

    let existing = count_existing_entries(&folder);
    info!(
        "Monitoring {} ({} existing entries left untouched)",
        folder.display(),
        existing
    );
    renamer.notifier().on_watch_start(&folder, existing);

    let summary = renamer.run(events, shutdown).await;
    drop(session);
    Ok(summary)
}
