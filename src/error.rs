//! Error types for the paper-renamer library.
//!
//! Two families of errors reflect two distinct failure modes:
//!
//! * [`RenamerError`]: **Fatal**: the watcher cannot start at all (bad
//!   config file, missing watch folder, pdfium not loadable, provider not
//!   configured). Returned from startup functions and surfaced by the binary.
//!
//! * Stage errors ([`ReadinessError`], [`RasterError`], [`ClassifyError`],
//!   [`RenameError`]): **Non-fatal**: one file failed at one pipeline stage.
//!   The orchestrator logs them and turns them into a
//!   [`crate::renamer::FileOutcome`]; the watch loop keeps serving events.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the paper-renamer library.
#[derive(Debug, Error)]
pub enum RenamerError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// The configuration file could not be read.
    #[error("Failed to read config file '{path}': {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML or has wrong field types.
    #[error("Failed to parse config file '{path}': {detail}")]
    ConfigParse { path: PathBuf, detail: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Watch errors ──────────────────────────────────────────────────────
    /// The configured watch folder does not exist or is not a directory.
    #[error("Watch folder '{path}' does not exist or is not a directory")]
    WatchFolderMissing { path: PathBuf },

    /// The filesystem watcher could not subscribe to the folder.
    #[error("Failed to watch '{path}': {detail}")]
    WatchFailed { path: PathBuf, detail: String },

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Install libpdfium for your platform, or set `pdfium_lib_path` in the\n\
config file to the directory containing it.\n"
    )]
    PdfiumBindingFailed(String),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// The file never settled into a readable state.
#[derive(Debug, Error)]
pub enum ReadinessError {
    /// The file disappeared between the notification and the probe.
    #[error("'{path}' vanished before it could be read")]
    Vanished { path: PathBuf },

    /// The file kept changing (or stayed empty) for every poll.
    #[error("'{path}' was not ready after {attempts} polls")]
    FileNotReady { path: PathBuf, attempts: u32 },

    /// Metadata lookup failed for another reason.
    #[error("Failed to stat '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Rasterisation of the first page failed.
#[derive(Debug, Error)]
pub enum RasterError {
    /// The bytes are not a PDF, are truncated, or have no pages.
    #[error("PDF decode failed: {detail}")]
    DecodeFailed { detail: String },

    /// The rendered page could not be PNG-encoded.
    #[error("PNG encoding failed: {0}")]
    EncodeFailed(#[from] image::ImageError),

    /// The scratch directory could not be created or written.
    #[error("Scratch directory error: {0}")]
    Workspace(#[source] std::io::Error),
}

/// The classification request failed.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// Network error, auth error, non-2xx status or timeout.
    #[error("Classification request failed: {detail}")]
    RequestFailed { detail: String },

    /// The model answered, but not with the expected JSON object.
    #[error("Classification response could not be parsed: {detail}")]
    ParseFailed { detail: String },
}

/// The rename could not be applied.
#[derive(Debug, Error)]
pub enum RenameError {
    /// A file already exists at the target path. Nothing was changed.
    #[error("Target '{path}' already exists")]
    Duplicate { path: PathBuf },

    /// The rename syscall failed (permissions, cross-device, ...).
    #[error("Failed to rename '{from}' to '{to}': {source}")]
    Io {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
