//! Event normalisation: raw watch events → "a PDF is ready to read".
//!
//! Browsers write downloads to `name.pdf.crdownload` and rename the file to
//! `name.pdf` once the transfer finishes; other tools create `name.pdf`
//! directly. Both shapes collapse to one [`PendingFile`]. Everything else
//! (directories, other extensions, the `.crdownload` file being created) is
//! noise and is dropped here without touching the filesystem.

use std::path::{Path, PathBuf};

/// Suffix of an in-progress browser download.
pub const PARTIAL_DOWNLOAD_SUFFIX: &str = ".pdf.crdownload";
/// Suffix of a finished PDF.
pub const PDF_SUFFIX: &str = ".pdf";

/// What the watch collaborator reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEventKind {
    /// A rename inside the watched folder.
    Moved { source: PathBuf, dest: PathBuf },
    /// A new entry appeared.
    Created { path: PathBuf },
}

/// A filesystem notification in the shape the pipeline understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: WatchEventKind,
    pub is_directory: bool,
}

impl WatchEvent {
    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: WatchEventKind::Created { path: path.into() },
            is_directory: false,
        }
    }

    pub fn moved(source: impl Into<PathBuf>, dest: impl Into<PathBuf>) -> Self {
        Self {
            kind: WatchEventKind::Moved {
                source: source.into(),
                dest: dest.into(),
            },
            is_directory: false,
        }
    }

    pub fn directory(mut self) -> Self {
        self.is_directory = true;
        self
    }
}

/// A path accepted for processing, split once into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFile {
    pub path: PathBuf,
    pub directory: PathBuf,
    /// File name without the extension, e.g. `science.aav9105`.
    pub stem: String,
    /// Extension including the dot, e.g. `.pdf`.
    pub extension: String,
}

impl PendingFile {
    /// Split `path` into directory, stem and extension.
    ///
    /// Returns `None` for paths without a file name (`/`, `..`).
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let stem = path.file_stem()?.to_string_lossy().into_owned();
        let extension = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let directory = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Some(Self {
            path,
            directory,
            stem,
            extension,
        })
    }

    /// `stem + extension`, as shown to the user.
    pub fn file_name(&self) -> String {
        format!("{}{}", self.stem, self.extension)
    }
}

fn ends_with_ignore_case(path: &Path, suffix: &str) -> bool {
    path.to_string_lossy().to_lowercase().ends_with(suffix)
}

/// Filter a watch event down to the file the pipeline should process.
pub fn normalize(event: &WatchEvent) -> Option<PendingFile> {
    if event.is_directory {
        return None;
    }
    match &event.kind {
        WatchEventKind::Moved { source, dest } => {
            if ends_with_ignore_case(source, PARTIAL_DOWNLOAD_SUFFIX)
                && ends_with_ignore_case(dest, PDF_SUFFIX)
            {
                PendingFile::from_path(dest.clone())
            } else {
                None
            }
        }
        WatchEventKind::Created { path } => {
            if ends_with_ignore_case(path, PDF_SUFFIX) {
                PendingFile::from_path(path.clone())
            } else {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_events_are_rejected() {
        assert_eq!(normalize(&WatchEvent::created("/dl/folder.pdf").directory()), None);
        assert_eq!(
            normalize(&WatchEvent::moved("/dl/a.pdf.crdownload", "/dl/a.pdf").directory()),
            None
        );
    }

    #[test]
    fn finished_download_is_accepted() {
        let ev = WatchEvent::moved(
            "/dl/science.aav9105.pdf.crdownload",
            "/dl/science.aav9105.pdf",
        );
        let file = normalize(&ev).expect("accepted");
        assert_eq!(file.path, PathBuf::from("/dl/science.aav9105.pdf"));
        assert_eq!(file.directory, PathBuf::from("/dl"));
        assert_eq!(file.stem, "science.aav9105");
        assert_eq!(file.extension, ".pdf");
        assert_eq!(file.file_name(), "science.aav9105.pdf");
    }

    #[test]
    fn moved_suffix_checks_ignore_case() {
        let ev = WatchEvent::moved("/dl/A.PDF.CRDOWNLOAD", "/dl/A.PDF");
        let file = normalize(&ev).expect("accepted");
        assert_eq!(file.extension, ".PDF");
    }

    #[test]
    fn other_renames_are_rejected() {
        // plain rename of an existing pdf
        assert_eq!(normalize(&WatchEvent::moved("/dl/a.pdf", "/dl/b.pdf")), None);
        // partial download renamed to something that is not a pdf
        assert_eq!(
            normalize(&WatchEvent::moved("/dl/a.pdf.crdownload", "/dl/a.txt")),
            None
        );
        // a different browser's partial suffix
        assert_eq!(
            normalize(&WatchEvent::moved("/dl/a.pdf.part", "/dl/a.pdf")),
            None
        );
    }

    #[test]
    fn created_pdf_is_accepted() {
        let file = normalize(&WatchEvent::created("/dl/thorlabs.pdf")).expect("accepted");
        assert_eq!(file.stem, "thorlabs");
        assert_eq!(normalize(&WatchEvent::created("/dl/Report.Pdf")).unwrap().stem, "Report");
    }

    #[test]
    fn created_non_pdf_is_rejected() {
        assert_eq!(normalize(&WatchEvent::created("/dl/a.pdf.crdownload")), None);
        assert_eq!(normalize(&WatchEvent::created("/dl/notes.txt")), None);
        assert_eq!(normalize(&WatchEvent::created("/dl/pdf")), None);
    }
}
