//! Integration tests for registry scaffolding.

use futures::future::BoxFuture;
use paper_intro_analyzer::{
    scaffold, AnalyzerError, DocumentText, PaperError, Registry, TextSource, WorkspacePaths,
};
use std::path::Path;

/// Serves a title page for every file except those named `broken*`.
struct FakePdfs;

impl TextSource for FakePdfs {
    fn read<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<DocumentText, PaperError>> {
        Box::pin(async move {
            let name = path
                .file_stem()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if name.starts_with("broken") {
                return Err(PaperError::PdfRead {
                    detail: "not a PDF file".into(),
                });
            }
            Ok(DocumentText {
                text: format!("arXiv:2001.00001\nA Study Called {name}\nAuthor Name\n"),
                metadata_title: if name == "meta" {
                    Some("Title From Metadata".into())
                } else {
                    None
                },
            })
        })
    }
}

fn setup(files: &[&str]) -> (tempfile::TempDir, WorkspacePaths) {
    let dir = tempfile::tempdir().unwrap();
    let paths = WorkspacePaths::rooted_at(dir.path());
    std::fs::create_dir_all(&paths.papers_dir).unwrap();
    for f in files {
        std::fs::write(paths.papers_dir.join(f), b"%PDF-1.7\n").unwrap();
    }
    (dir, paths)
}

#[tokio::test]
async fn creates_blank_records_for_every_pdf() {
    let (_dir, paths) = setup(&["b.pdf", "a.PDF", "meta.pdf", "notes.txt"]);
    let report = scaffold(&paths, &FakePdfs).await.unwrap();

    assert_eq!(report.added, ["a.PDF", "b.pdf", "meta.pdf"]);
    assert!(report.already_present.is_empty());
    assert!(report.registry_written);

    let registry = Registry::load(&paths.registry_path).unwrap();
    assert_eq!(registry.len(), 3);
    let b = registry.get("b.pdf").unwrap().unwrap();
    assert_eq!(b.title, "A Study Called b");
    assert_eq!(b.paper_type, "");
    assert_eq!(b.start_of_intro, "");
    assert_eq!(b.end_of_intro, "");
    assert_eq!(registry.get("meta.pdf").unwrap().unwrap().title, "Title From Metadata");
    assert!(registry.get("notes.txt").is_none());

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&paths.registry_path).unwrap()).unwrap();
    assert_eq!(raw["b.pdf"]["type"], "");
}

#[tokio::test]
async fn rerun_adds_only_new_papers_and_keeps_annotations() {
    let (_dir, paths) = setup(&["a.pdf"]);
    scaffold(&paths, &FakePdfs).await.unwrap();

    // Annotate the existing record by hand, including a key the tool does
    // not know.
    let annotated = r#"{
  "a.pdf": {
    "title": "Edited Title",
    "type": "empirical",
    "start_of_intro": "1 Introduction",
    "end_of_intro": "2 Data",
    "notes": "good paper",
    "reviewer": "me"
  }
}"#;
    std::fs::write(&paths.registry_path, annotated).unwrap();

    // Idle re-run leaves the file byte-for-byte untouched.
    let idle = scaffold(&paths, &FakePdfs).await.unwrap();
    assert!(idle.added.is_empty());
    assert_eq!(idle.already_present, ["a.pdf"]);
    assert!(!idle.registry_written);
    assert_eq!(std::fs::read_to_string(&paths.registry_path).unwrap(), annotated);

    std::fs::write(paths.papers_dir.join("c.pdf"), b"%PDF-1.4\n").unwrap();
    let report = scaffold(&paths, &FakePdfs).await.unwrap();
    assert_eq!(report.added, ["c.pdf"]);
    assert!(report.registry_written);

    let registry = Registry::load(&paths.registry_path).unwrap();
    assert_eq!(registry.len(), 2);
    let a = registry.get("a.pdf").unwrap().unwrap();
    assert_eq!(a.title, "Edited Title");
    assert_eq!(a.start_of_intro, "1 Introduction");
    assert_eq!(a.notes, "good paper");
    assert_eq!(a.extra["reviewer"], "me");
}

#[tokio::test]
async fn rerun_with_new_pdf_keeps_existing_record_bytes() {
    let (_dir, paths) = setup(&["a.pdf"]);
    // Hand-edited: four-space indent, `type` first, an escaped character.
    let annotated = "{\n    \"a.pdf\": {\n        \"type\": \"theoretical\",\n        \"title\": \"\\u00c9conomie publique\",\n        \"start_of_intro\": \"1. Introduction\",\n        \"end_of_intro\": \"2. Model\"\n    }\n}\n";
    std::fs::write(&paths.registry_path, annotated).unwrap();
    std::fs::write(paths.papers_dir.join("b.pdf"), b"%PDF-1.4\n").unwrap();

    let report = scaffold(&paths, &FakePdfs).await.unwrap();
    assert_eq!(report.added, ["b.pdf"]);

    let text = std::fs::read_to_string(&paths.registry_path).unwrap();
    let old_record_start = annotated.find("\"a.pdf\"").unwrap();
    let old_record_end = annotated.rfind("    }").unwrap() + "    }".len();
    assert!(
        text.contains(&annotated[old_record_start..old_record_end]),
        "existing record text changed:\n{text}"
    );
    assert!(text.starts_with("{\n    \"a.pdf\""));

    let registry = Registry::load(&paths.registry_path).unwrap();
    assert_eq!(registry.len(), 2);
    assert_eq!(
        registry.get("a.pdf").unwrap().unwrap().title,
        "Économie publique"
    );
    assert_eq!(registry.get("b.pdf").unwrap().unwrap().title, "A Study Called b");
}

#[tokio::test]
async fn unreadable_pdfs_are_reported_and_left_out() {
    let (_dir, paths) = setup(&["broken.pdf", "ok.pdf"]);
    let report = scaffold(&paths, &FakePdfs).await.unwrap();

    assert_eq!(report.added, ["ok.pdf"]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, "broken.pdf");
    assert_eq!(report.failures[0].1.kind(), "PdfReadError");

    let registry = Registry::load(&paths.registry_path).unwrap();
    assert!(!registry.contains("broken.pdf"));
}

#[tokio::test]
async fn empty_directory_still_creates_registry() {
    let (_dir, paths) = setup(&[]);
    let report = scaffold(&paths, &FakePdfs).await.unwrap();
    assert!(report.added.is_empty());
    assert!(report.registry_written);
    assert!(Registry::load(&paths.registry_path).unwrap().is_empty());
}

#[tokio::test]
async fn missing_papers_dir_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let paths = WorkspacePaths::rooted_at(dir.path());
    let err = scaffold(&paths, &FakePdfs).await.unwrap_err();
    assert!(matches!(err, AnalyzerError::PapersDirNotFound { .. }));
    assert!(!paths.registry_path.exists());
}
