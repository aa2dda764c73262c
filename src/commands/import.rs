use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::{Sqlite, SqlitePool};
use std::path::{Path, PathBuf};
use tokio::task::JoinSet;

use crate::commands::book::fetch_book;
use crate::commands::unix_now;
use crate::cover;
use crate::error::{Error, Result};
use crate::formats::{self, BookFormat, ExtractedMetadata};
use crate::models::Book;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportFailure {
    pub file: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportReport {
    pub imported: Vec<Book>,
    /// Names of files with an extension the reader cannot open
    pub skipped: Vec<String>,
    /// Names of files already in the library
    pub duplicates: Vec<String>,
    /// Files that could not be read or stored; the rest of the batch still goes in
    pub failed: Vec<ImportFailure>,
}

impl ImportReport {
    pub fn is_empty(&self) -> bool {
        self.imported.is_empty()
            && self.skipped.is_empty()
            && self.duplicates.is_empty()
            && self.failed.is_empty()
    }

    fn fail(&mut self, file: String, error: &Error) {
        tracing::warn!(file = %file, error = %error, "import failed");
        self.failed.push(ImportFailure { file, error: error.to_string() });
    }
}

/// The notice shown after an import that skipped files, if any were skipped.
pub fn skipped_message(report: &ImportReport) -> Option<String> {
    if report.skipped.is_empty() {
        return None;
    }
    Some(format!("Skipped unsupported files:\n{}", report.skipped.join("\n")))
}

/// Formats the importer accepts; CBR is recognised elsewhere but never imported.
pub fn importable_format(file_name: &str) -> Option<BookFormat> {
    BookFormat::from_path(file_name).filter(|f| f.is_importable())
}

fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

struct PreparedBook {
    metadata: ExtractedMetadata,
    cover: Option<Vec<u8>>,
}

fn prepare(file_name: &str, format: BookFormat, bytes: &[u8]) -> PreparedBook {
    let mut metadata = formats::extract_metadata(file_name, format, bytes);
    let cover = metadata.cover.take().map(|c| cover::make_thumbnail(&c));
    PreparedBook { metadata, cover }
}

enum Stored {
    Imported(Book),
    Duplicate,
}

async fn find_by_hash<'e, E>(executor: E, hash: &str) -> Result<Option<i64>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let existing = sqlx::query_scalar("SELECT id FROM books WHERE content_hash = ?")
        .bind(hash)
        .fetch_optional(executor)
        .await?;
    Ok(existing)
}

/// Extracts metadata first, then writes the book in its own short transaction.
async fn import_one(
    pool: &SqlitePool,
    name: String,
    format: BookFormat,
    bytes: Vec<u8>,
) -> Result<Stored> {
    let hash = content_hash(&bytes);
    if find_by_hash(pool, &hash).await?.is_some() {
        return Ok(Stored::Duplicate);
    }

    // Archive parsing and image work stay off the async workers
    let (prepared, name, bytes) = tokio::task::spawn_blocking(move || {
        let prepared = prepare(&name, format, &bytes);
        (prepared, name, bytes)
    })
    .await?;

    let mut tx = pool.begin().await?;
    if find_by_hash(&mut *tx, &hash).await?.is_some() {
        return Ok(Stored::Duplicate);
    }

    let result = sqlx::query(
        "INSERT INTO books (title, author, format, file_data, cover_data, file_size, content_hash,
             added_at, progress, current_page, total_pages, collections, metadata)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, 1, ?, '[]', '{}')",
    )
    .bind(&prepared.metadata.title)
    .bind(&prepared.metadata.author)
    .bind(format)
    .bind(&bytes)
    .bind(&prepared.cover)
    .bind(bytes.len() as i64)
    .bind(&hash)
    .bind(unix_now())
    .bind(prepared.metadata.total_pages as i64)
    .execute(&mut *tx)
    .await?;

    let book = fetch_book(&mut *tx, result.last_insert_rowid()).await?;
    tx.commit().await?;
    tracing::info!(book_id = book.id, file = %name, format = ?format, "imported book");
    Ok(Stored::Imported(book))
}

/// Stores each supported file as a new book. Unsupported names, files whose
/// content is already in the library and files that fail to store are reported
/// instead; every other file in the batch is still imported.
pub async fn import_files(
    pool: &SqlitePool,
    files: Vec<(String, Vec<u8>)>,
) -> Result<ImportReport> {
    let mut report = ImportReport::default();

    for (name, bytes) in files {
        let Some(format) = importable_format(&name) else {
            tracing::debug!(file = %name, "skipping unsupported file");
            report.skipped.push(name);
            continue;
        };

        match import_one(pool, name.clone(), format, bytes).await {
            Ok(Stored::Imported(book)) => report.imported.push(book),
            Ok(Stored::Duplicate) => {
                tracing::debug!(file = %name, "skipping duplicate");
                report.duplicates.push(name);
            }
            Err(e) => report.fail(name, &e),
        }
    }

    tracing::info!(
        imported = report.imported.len(),
        skipped = report.skipped.len(),
        duplicates = report.duplicates.len(),
        failed = report.failed.len(),
        "import finished"
    );
    Ok(report)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Reads picked or dropped files in parallel, then imports them in the order given.
/// Unsupported files are skipped without being read.
pub async fn import_paths(pool: &SqlitePool, paths: Vec<PathBuf>) -> Result<ImportReport> {
    let mut tasks = JoinSet::new();
    let mut skipped = Vec::new();

    for (idx, path) in paths.into_iter().enumerate() {
        let name = display_name(&path);
        if importable_format(&name).is_none() {
            skipped.push((idx, name));
            continue;
        }
        tasks.spawn(async move {
            match tokio::fs::read(&path).await {
                Ok(bytes) => Ok((idx, name, bytes)),
                Err(e) => {
                    let message = format!("Failed to read {}: {}", path.display(), e);
                    Err((idx, name, Error::Io(std::io::Error::new(e.kind(), message))))
                }
            }
        });
    }

    let mut files = Vec::new();
    let mut unreadable = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined? {
            Ok(file) => files.push(file),
            Err((idx, name, e)) => unreadable.push((idx, name, e)),
        }
    }
    files.sort_by_key(|(idx, _, _)| *idx);
    unreadable.sort_by_key(|(idx, _, _)| *idx);

    let files = files.into_iter().map(|(_, name, bytes)| (name, bytes)).collect();
    let mut report = import_files(pool, files).await?;
    report.skipped.extend(skipped.into_iter().map(|(_, name)| name));
    for (_, name, e) in unreadable {
        report.fail(name, &e);
    }
    Ok(report)
}
