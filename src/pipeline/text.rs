//! Text extraction: turn a PDF into plain text via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and must not be driven from async worker threads. Each document is
//! opened, read and closed inside one `spawn_blocking` call.
//!
//! ## Why a trait?
//!
//! The scaffolder and the analysis batch only need "path in, text out".
//! [`TextSource`] is that seam: production code uses [`PdfiumTextSource`],
//! tests plug in an in-memory source and never touch a native library.

use crate::error::PaperError;
use futures::future::BoxFuture;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming a directory that contains the pdfium shared
/// library.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Plain text of one document plus the metadata the scaffolder uses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentText {
    /// Page texts joined with `\n`, in page order.
    pub text: String,
    /// The `Title` entry of the PDF info dictionary, if non-empty.
    pub metadata_title: Option<String>,
}

/// Anything that can produce [`DocumentText`] for a file path.
pub trait TextSource: Send + Sync {
    fn read<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<DocumentText, PaperError>>;
}

/// [`TextSource`] backed by pdfium.
#[derive(Debug, Clone, Default)]
pub struct PdfiumTextSource {
    library_dir: Option<PathBuf>,
}

impl PdfiumTextSource {
    /// Bind pdfium from `$PDFIUM_LIB_PATH`, then the working directory, then
    /// the system library path.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind pdfium from `dir` before trying the default locations.
    pub fn with_library_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            library_dir: Some(dir.into()),
        }
    }
}

impl TextSource for PdfiumTextSource {
    fn read<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<DocumentText, PaperError>> {
        Box::pin(async move {
            super::input::check_pdf(path)?;
            let path = path.to_path_buf();
            let library_dir = self.library_dir.clone();
            tokio::task::spawn_blocking(move || read_blocking(&path, library_dir.as_deref()))
                .await
                .map_err(|e| PaperError::PdfRead {
                    detail: format!("text extraction task panicked: {e}"),
                })?
        })
    }
}

fn bind_pdfium(library_dir: Option<&Path>) -> Result<Pdfium, PaperError> {
    let env_dir = std::env::var_os(PDFIUM_LIB_PATH_ENV).map(PathBuf::from);
    let candidates = library_dir
        .map(Path::to_path_buf)
        .into_iter()
        .chain(env_dir)
        .chain(std::iter::once(PathBuf::from("./")));

    let mut last_error = None;
    for dir in candidates {
        match Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir)) {
            Ok(bindings) => return Ok(Pdfium::new(bindings)),
            Err(e) => last_error = Some(format!("{}: {e:?}", dir.display())),
        }
    }
    match Pdfium::bind_to_system_library() {
        Ok(bindings) => Ok(Pdfium::new(bindings)),
        Err(e) => Err(PaperError::PdfRead {
            detail: format!(
                "pdfium library not found (set {PDFIUM_LIB_PATH_ENV}); last tried {}; system: {e:?}",
                last_error.unwrap_or_default()
            ),
        }),
    }
}

fn read_blocking(path: &Path, library_dir: Option<&Path>) -> Result<DocumentText, PaperError> {
    let pdfium = bind_pdfium(library_dir)?;

    let document = pdfium.load_pdf_from_file(path, None).map_err(|e| {
        let err_str = format!("{e:?}");
        PaperError::PdfRead {
            detail: if err_str.to_lowercase().contains("password") {
                format!("password-protected: {}", path.display())
            } else {
                format!("corrupt PDF {}: {err_str}", path.display())
            },
        }
    })?;

    let metadata_title = document
        .metadata()
        .get(PdfDocumentMetadataTagType::Title)
        .map(|t| t.value().trim().to_string())
        .filter(|t| !t.is_empty());

    let mut pages_text = Vec::new();
    for (idx, page) in document.pages().iter().enumerate() {
        let text = page.text().map_err(|e| PaperError::PdfRead {
            detail: format!("page {} text: {e:?}", idx + 1),
        })?;
        pages_text.push(text.all());
    }
    debug!(
        "Extracted text from {} page(s) of {}",
        pages_text.len(),
        path.display()
    );

    Ok(DocumentText {
        text: pages_text.join("\n"),
        metadata_title,
    })
}
