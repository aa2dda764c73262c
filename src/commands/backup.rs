use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::SqlitePool;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::commands::collection::list_collections;
use crate::commands::session::list_sessions;
use crate::error::Result;
use crate::models::{Annotation, AnnotationKind, Book, BOOK_COLUMNS};

const MARKDOWN_TITLE: &str = "# LuminaReader Annotations Export";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportKind {
    Json,
    Markdown,
}

impl ExportKind {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportKind::Json => "json",
            ExportKind::Markdown => "md",
        }
    }
}

/// `lumina-backup-2024-03-10.json`
pub fn export_file_name(kind: ExportKind, date: NaiveDate) -> String {
    format!("lumina-backup-{}.{}", date.format("%Y-%m-%d"), kind.extension())
}

async fn load_books(pool: &SqlitePool) -> Result<Vec<Book>> {
    let sql = format!("SELECT {} FROM books ORDER BY id", BOOK_COLUMNS);
    Ok(sqlx::query_as::<_, Book>(&sql).fetch_all(pool).await?)
}

async fn load_annotations(pool: &SqlitePool) -> Result<Vec<Annotation>> {
    let annotations = sqlx::query_as::<_, Annotation>(
        "SELECT id, book_id, kind, page, position, content, note, color, created_at
         FROM annotations ORDER BY created_at, id",
    )
    .fetch_all(pool)
    .await?;
    Ok(annotations)
}

/// Metadata backup. Book files and covers are left out.
pub async fn export_json(pool: &SqlitePool, now: DateTime<Utc>) -> Result<String> {
    let books = load_books(pool).await?;
    let annotations = load_annotations(pool).await?;
    let sessions = list_sessions(pool, None).await?;
    let collections = list_collections(pool).await?;

    let backup = json!({
        "books": books,
        "annotations": annotations,
        "sessions": sessions,
        "collections": collections,
        "exported_at": now.to_rfc3339(),
    });
    Ok(serde_json::to_string_pretty(&backup)?)
}

/// Annotations grouped by book. Books without annotations are left out.
pub async fn export_markdown(pool: &SqlitePool) -> Result<String> {
    let books = load_books(pool).await?;
    let annotations = load_annotations(pool).await?;
    Ok(render_markdown(&books, &annotations))
}

pub fn render_markdown(books: &[Book], annotations: &[Annotation]) -> String {
    let mut out = format!("{}\n\n", MARKDOWN_TITLE);

    for book in books {
        let mut book_annotations = annotations.iter().filter(|a| a.book_id == book.id).peekable();
        if book_annotations.peek().is_none() {
            continue;
        }

        let _ = write!(out, "## {} ({})\n\n", book.title, book.author);
        for ann in book_annotations {
            let _ = write!(out, "- **Page {}**: {}", ann.page, ann.content);
            if ann.kind == AnnotationKind::Note {
                let note = ann.note.as_deref().unwrap_or(&ann.content);
                let _ = write!(out, "\n  - *Note: {}*", note);
            }
            out.push('\n');
        }
        out.push_str("\n---\n\n");
    }

    out
}

pub async fn write_export(dir: &Path, file_name: &str, content: &str) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(file_name);
    tokio::fs::write(&path, content).await?;
    tracing::info!(path = %path.display(), bytes = content.len(), "wrote export");
    Ok(path)
}

/// Builds the export of `kind` and writes it under `dir` with the dated file name.
pub async fn export_library(
    pool: &SqlitePool,
    dir: &Path,
    kind: ExportKind,
    now: DateTime<Utc>,
) -> Result<PathBuf> {
    let content = match kind {
        ExportKind::Json => export_json(pool, now).await?,
        ExportKind::Markdown => export_markdown(pool).await?,
    };
    let file_name = export_file_name(kind, now.date_naive());
    write_export(dir, &file_name, &content).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::annotation::{add_highlight, add_note, NewNote};
    use crate::commands::collection::{add_book_to_collection, create_collection};
    use crate::commands::import::import_files;
    use crate::commands::session::{save_session, NewSession};
    use crate::db::connect_in_memory;
    use crate::test_support::{build_epub, build_pdf, png_bytes};
    use chrono::TimeZone;

    async fn seed(pool: &SqlitePool) -> (i64, i64) {
        let report = import_files(
            pool,
            vec![
                (
                    "a.epub".into(),
                    build_epub("Middlemarch", Some("George Eliot"), Some(&png_bytes(8, 8))),
                ),
                ("b.pdf".into(), build_pdf(2, Some("Unread"), None)),
            ],
        )
        .await
        .unwrap();
        (report.imported[0].id, report.imported[1].id)
    }

    #[test]
    fn test_file_names() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(export_file_name(ExportKind::Json, date), "lumina-backup-2024-03-09.json");
        assert_eq!(export_file_name(ExportKind::Markdown, date), "lumina-backup-2024-03-09.md");
    }

    #[tokio::test]
    async fn test_json_has_no_blobs() {
        let pool = connect_in_memory().await.unwrap();
        let (epub, _) = seed(&pool).await;
        add_highlight(&pool, epub, "epubcfi(/6/2)", "quote").await.unwrap();
        let shelf = create_collection(&pool, "Shelf").await.unwrap();
        add_book_to_collection(&pool, shelf.id, epub).await.unwrap();
        save_session(
            &pool,
            &NewSession { book_id: epub, start_time: 0, end_time: 60, duration: 60, pages_read: 1 },
        )
        .await
        .unwrap();

        let now = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        let json = export_json(&pool, now).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["books"].as_array().unwrap().len(), 2);
        assert_eq!(value["annotations"].as_array().unwrap().len(), 1);
        assert_eq!(value["sessions"].as_array().unwrap().len(), 1);
        assert_eq!(value["collections"][0]["book_ids"][0], epub);
        assert_eq!(value["exported_at"], "2024-03-09T12:00:00+00:00");
        assert!(value["books"][0].get("file_data").is_none());
        assert!(value["books"][0].get("cover_data").is_none());
        assert_eq!(value["books"][0]["has_cover"], true);
    }

    #[tokio::test]
    async fn test_markdown_layout() {
        let pool = connect_in_memory().await.unwrap();
        let (epub, _) = seed(&pool).await;
        add_highlight(&pool, epub, "epubcfi(/6/2)", "A quote").await.unwrap();
        add_note(
            &pool,
            NewNote {
                book_id: epub,
                page: 12,
                position: "12".into(),
                content: "Passage".into(),
                note: "My thought".into(),
            },
        )
        .await
        .unwrap();

        let md = export_markdown(&pool).await.unwrap();
        assert_eq!(
            md,
            "# LuminaReader Annotations Export\n\n\
             ## Middlemarch (George Eliot)\n\n\
             - **Page 0**: A quote\n\
             - **Page 12**: Passage\n  - *Note: My thought*\n\
             \n---\n\n"
        );
    }

    #[tokio::test]
    async fn test_export_library_writes_dated_file() {
        let pool = connect_in_memory().await.unwrap();
        seed(&pool).await;
        let dir = tempfile::tempdir().unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 8, 0, 0).unwrap();

        let path = export_library(&pool, dir.path(), ExportKind::Markdown, now).await.unwrap();
        assert_eq!(path, dir.path().join("lumina-backup-2024-01-02.md"));
        let written = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(written, "# LuminaReader Annotations Export\n\n");
    }
}
