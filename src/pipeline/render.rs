//! PDF rasterisation: render the first page to a PNG via pdfium.
//!
//! ## Why a scratch directory?
//!
//! The watched file can be renamed or deleted by the user at any moment.
//! The orchestrator reads it into memory once; the renderer writes that
//! snapshot into a [`TempDir`] and lets pdfium open the copy. The directory is
//! removed when the `TempDir` drops, on success, on decode failure, and on
//! panic alike.
//!
//! ## Why cap pixels?
//!
//! The model only needs the title block. Capping the longest edge keeps the
//! request small and memory bounded even for poster-sized first pages.
//!
//! pdfium is CPU-bound and not async-safe, so [`FirstPageRenderer`] is a
//! blocking trait; the orchestrator calls it from `spawn_blocking`.

use crate::error::{RasterError, RenamerError};
use crate::pipeline::encode::{encode_page, PageImage};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// Magic bytes every PDF starts with.
const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// Renders page one of a PDF held in memory.
pub trait FirstPageRenderer: Send + Sync {
    /// Rasterise exactly the first page. Never retried.
    fn render_first_page(&self, pdf_bytes: &[u8]) -> Result<PageImage, RasterError>;
}

/// Platform file name of the pdfium shared library.
fn platform_library_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "pdfium.dll"
    } else if cfg!(target_os = "macos") {
        "libpdfium.dylib"
    } else {
        "libpdfium.so"
    }
}

/// [`FirstPageRenderer`] backed by pdfium-render.
#[derive(Debug, Clone)]
pub struct PdfiumRenderer {
    /// Explicit library file; `None` means the system search path.
    library: Option<PathBuf>,
    max_pixels: u32,
}

impl PdfiumRenderer {
    /// Locate pdfium and check that it can be bound.
    ///
    /// `lib_path` may point at the library file itself or at the directory
    /// containing it. Binding is attempted once here so a missing library is
    /// a startup error instead of a per-file failure.
    pub fn new(lib_path: Option<&Path>, max_pixels: u32) -> Result<Self, RenamerError> {
        let library = lib_path.map(|p| {
            if p.is_dir() {
                p.join(platform_library_name())
            } else {
                p.to_path_buf()
            }
        });
        let renderer = Self {
            library,
            max_pixels,
        };
        renderer
            .bind()
            .map_err(|e| RenamerError::PdfiumBindingFailed(format!("{:?}", e)))?;
        info!(
            "pdfium bound from {}",
            renderer
                .library
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "system library path".to_string())
        );
        Ok(renderer)
    }

    fn bind(&self) -> Result<Pdfium, PdfiumError> {
        let bindings = match &self.library {
            Some(path) => Pdfium::bind_to_library(path)?,
            None => Pdfium::bind_to_system_library()?,
        };
        Ok(Pdfium::new(bindings))
    }
}

impl FirstPageRenderer for PdfiumRenderer {
    fn render_first_page(&self, pdf_bytes: &[u8]) -> Result<PageImage, RasterError> {
        check_magic(pdf_bytes)?;

        let scratch = TempDir::new().map_err(RasterError::Workspace)?;
        let staged = scratch.path().join("source.pdf");
        std::fs::write(&staged, pdf_bytes).map_err(RasterError::Workspace)?;

        let pdfium = self.bind().map_err(|e| RasterError::DecodeFailed {
            detail: format!("pdfium unavailable: {:?}", e),
        })?;

        let document = pdfium
            .load_pdf_from_file(&staged, None)
            .map_err(|e| RasterError::DecodeFailed {
                detail: format!("{:?}", e),
            })?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        if total_pages == 0 {
            return Err(RasterError::DecodeFailed {
                detail: "document has no pages".into(),
            });
        }

        let render_config = PdfRenderConfig::new()
            .set_target_width(self.max_pixels as i32)
            .set_maximum_height(self.max_pixels as i32);

        let page = pages.get(0).map_err(|e| RasterError::DecodeFailed {
            detail: format!("{:?}", e),
        })?;
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| RasterError::DecodeFailed {
                detail: format!("{:?}", e),
            })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page 1 of {} → {}x{} px",
            total_pages,
            image.width(),
            image.height()
        );

        Ok(encode_page(&image)?)
    }
}

/// Reject bytes that cannot be a PDF before handing them to pdfium.
fn check_magic(bytes: &[u8]) -> Result<(), RasterError> {
    if bytes.len() < PDF_MAGIC.len() || &bytes[..PDF_MAGIC.len()] != PDF_MAGIC {
        let head: Vec<u8> = bytes.iter().take(4).copied().collect();
        return Err(RasterError::DecodeFailed {
            detail: format!("not a PDF, first bytes: {:?}", head),
        });
    }
    Ok(())
}
