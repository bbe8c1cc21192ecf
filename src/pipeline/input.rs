//! Input discovery: find the PDFs to work on and sanity-check them.
//!
//! ## Why check magic bytes ourselves?
//!
//! Papers directories collect odd files: HTML error pages saved as `.pdf`,
//! half-finished downloads, renamed Word documents. pdfium reports those as a
//! generic load failure. Reading the first four bytes first lets the summary
//! say "not a PDF" instead, and costs one small read.

use crate::error::{AnalyzerError, PaperError};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// All regular files in `dir` with a `.pdf` extension (any case), sorted by
/// file name.
pub fn list_pdfs(dir: &Path) -> Result<Vec<PathBuf>, AnalyzerError> {
    if !dir.is_dir() {
        return Err(AnalyzerError::PapersDirNotFound {
            path: dir.to_path_buf(),
        });
    }

    let entries = std::fs::read_dir(dir).map_err(|e| AnalyzerError::io(dir, e))?;
    let mut pdfs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| AnalyzerError::io(dir, e))?;
        let path = entry.path();
        if path.is_file() && has_pdf_extension(&path) {
            pdfs.push(path);
        }
    }
    pdfs.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    debug!("Found {} PDF file(s) in {}", pdfs.len(), dir.display());
    Ok(pdfs)
}

fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

/// File name as used for registry keys.
pub fn file_key(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// File name without its extension, used for output file names.
pub fn file_stem(key: &str) -> &str {
    Path::new(key)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(key)
}

/// Confirm `path` exists, is readable and starts with `%PDF`.
pub fn check_pdf(path: &Path) -> Result<(), PaperError> {
    let mut file = std::fs::File::open(path).map_err(|e| PaperError::PdfRead {
        detail: match e.kind() {
            std::io::ErrorKind::NotFound => format!("file not found: {}", path.display()),
            std::io::ErrorKind::PermissionDenied => {
                format!("permission denied: {}", path.display())
            }
            _ => format!("cannot open {}: {e}", path.display()),
        },
    })?;

    let mut magic = [0u8; 4];
    if file.read_exact(&mut magic).is_err() || &magic != b"%PDF" {
        return Err(PaperError::PdfRead {
            detail: format!(
                "not a PDF (first bytes {:?}): {}",
                String::from_utf8_lossy(&magic),
                path.display()
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_only_pdfs_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.pdf", "a.PDF", "notes.txt", "c.pdf.bak"] {
            std::fs::write(dir.path().join(name), b"%PDF-1.7").unwrap();
        }
        std::fs::create_dir(dir.path().join("sub.pdf")).unwrap();

        let names: Vec<String> = list_pdfs(dir.path())
            .unwrap()
            .iter()
            .map(|p| file_key(p))
            .collect();
        assert_eq!(names, vec!["a.PDF", "b.pdf"]);
    }

    #[test]
    fn missing_dir_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = list_pdfs(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, AnalyzerError::PapersDirNotFound { .. }));
    }

    #[test]
    fn magic_bytes_are_checked() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.pdf");
        let bad = dir.path().join("bad.pdf");
        std::fs::write(&good, b"%PDF-1.4\n...").unwrap();
        std::fs::write(&bad, b"<html>").unwrap();

        assert!(check_pdf(&good).is_ok());
        assert!(matches!(check_pdf(&bad), Err(PaperError::PdfRead { .. })));
        assert!(matches!(
            check_pdf(&dir.path().join("gone.pdf")),
            Err(PaperError::PdfRead { .. })
        ));
    }

    #[test]
    fn stem_drops_extension() {
        assert_eq!(file_stem("smith2020.pdf"), "smith2020");
        assert_eq!(file_stem("no_ext"), "no_ext");
    }
}
