//! Tauri commands. Each one takes the pool out of managed state and calls
//! the matching function in `commands`.

use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tauri::{AppHandle, Manager, State};
use tokio::sync::Mutex;

use crate::commands::annotation::{BookmarkToggle, NewNote};
use crate::commands::backup::ExportKind;
use crate::commands::book::{BookDetails, LibraryQuery, ProgressUpdate};
use crate::commands::import::ImportReport;
use crate::commands::session::{NewSession, SessionRegistry, Visibility};
use crate::commands::settings::ReaderSettings;
use crate::commands::{
    annotation, backup, book, collection, import, session, settings, stats, unix_now,
};
use crate::error::{Error, Result};
use crate::logging;
use crate::models::{Annotation, Book, Collection, ReadingInsights, ReadingSession};
use crate::reader::page_cache::{page_data_url, ComicPageCache};
use crate::reader::shortcuts::{shortcut_help as help_sections, ShortcutHelpSection};

pub type DbState<'a> = State<'a, Arc<Mutex<SqlitePool>>>;
pub type SessionState<'a> = State<'a, Arc<Mutex<SessionRegistry>>>;
pub type CacheState<'a> = State<'a, ComicPageCache>;

// SqlitePool is a handle; cloning it keeps the lock short during long imports.
async fn pool(db: &DbState<'_>) -> SqlitePool {
    db.lock().await.clone()
}

#[tauri::command]
pub async fn frontend_log(level: String, message: String, context: Option<String>) -> Result<()> {
    logging::frontend_log(&level, &message, context.as_deref());
    Ok(())
}

// ---- library ----

#[tauri::command]
pub async fn import_books(db: DbState<'_>, paths: Vec<String>) -> Result<ImportReport> {
    let pool = pool(&db).await;
    let paths = paths.into_iter().map(PathBuf::from).collect();
    let report = import::import_paths(&pool, paths).await?;
    if let Some(message) = import::skipped_message(&report) {
        tracing::warn!("{}", message);
    }
    for failure in &report.failed {
        tracing::warn!(file = %failure.file, error = %failure.error, "not imported");
    }
    Ok(report)
}

#[tauri::command]
pub async fn import_book_files(
    db: DbState<'_>,
    files: Vec<(String, Vec<u8>)>,
) -> Result<ImportReport> {
    let pool = pool(&db).await;
    import::import_files(&pool, files).await
}

#[tauri::command]
pub async fn list_books(db: DbState<'_>, query: Option<LibraryQuery>) -> Result<Vec<Book>> {
    let pool = db.lock().await;
    book::list_books(&*pool, &query.unwrap_or_default()).await
}

#[tauri::command]
pub async fn get_book(db: DbState<'_>, id: i64) -> Result<Book> {
    let pool = db.lock().await;
    book::get_book(&*pool, id).await
}

#[tauri::command]
pub async fn update_progress(
    db: DbState<'_>,
    sessions: SessionState<'_>,
    id: i64,
    update: ProgressUpdate,
) -> Result<Book> {
    sessions.lock().await.record_page(id, update.page);
    let pool = db.lock().await;
    book::update_progress(&*pool, id, update).await
}

#[tauri::command]
pub async fn update_book_details(db: DbState<'_>, id: i64, details: BookDetails) -> Result<Book> {
    let pool = db.lock().await;
    book::update_details(&*pool, id, details).await
}

#[tauri::command]
pub async fn set_favorite(db: DbState<'_>, id: i64, favorite: bool) -> Result<Book> {
    let pool = db.lock().await;
    book::set_favorite(&*pool, id, favorite).await
}

#[tauri::command]
pub async fn delete_book(db: DbState<'_>, cache: CacheState<'_>, id: i64) -> Result<()> {
    let pool = db.lock().await;
    book::delete_book(&*pool, id).await?;
    cache.release(id).await;
    Ok(())
}

/// Raw bytes, sent without JSON encoding.
#[tauri::command]
pub async fn get_book_file(db: DbState<'_>, id: i64) -> Result<tauri::ipc::Response> {
    let pool = pool(&db).await;
    let bytes = book::book_file(&pool, id).await?;
    Ok(tauri::ipc::Response::new(bytes))
}

#[tauri::command]
pub async fn get_book_cover(db: DbState<'_>, id: i64) -> Result<Option<String>> {
    let pool = db.lock().await;
    book::book_cover(&*pool, id).await
}

// ---- annotations ----

#[tauri::command]
pub async fn list_annotations(db: DbState<'_>, book_id: i64) -> Result<Vec<Annotation>> {
    let pool = db.lock().await;
    annotation::list_annotations(&*pool, book_id).await
}

#[tauri::command]
pub async fn toggle_bookmark(db: DbState<'_>, book_id: i64) -> Result<BookmarkToggle> {
    let pool = db.lock().await;
    annotation::toggle_bookmark(&*pool, book_id).await
}

#[tauri::command]
pub async fn add_highlight(
    db: DbState<'_>,
    book_id: i64,
    cfi_range: String,
    text: String,
) -> Result<Option<Annotation>> {
    let pool = db.lock().await;
    annotation::add_highlight(&*pool, book_id, &cfi_range, &text).await
}

#[tauri::command]
pub async fn add_note(db: DbState<'_>, note: NewNote) -> Result<Annotation> {
    let pool = db.lock().await;
    annotation::add_note(&*pool, note).await
}

#[tauri::command]
pub async fn delete_annotation(db: DbState<'_>, id: i64) -> Result<()> {
    let pool = db.lock().await;
    annotation::delete_annotation(&*pool, id).await
}

// ---- collections ----

#[tauri::command]
pub async fn list_collections(db: DbState<'_>) -> Result<Vec<Collection>> {
    let pool = db.lock().await;
    collection::list_collections(&*pool).await
}

#[tauri::command]
pub async fn get_collection(db: DbState<'_>, id: i64) -> Result<Collection> {
    let pool = db.lock().await;
    collection::get_collection(&*pool, id).await
}

#[tauri::command]
pub async fn create_collection(db: DbState<'_>, name: String) -> Result<Collection> {
    let pool = db.lock().await;
    collection::create_collection(&*pool, &name).await
}

#[tauri::command]
pub async fn rename_collection(db: DbState<'_>, id: i64, name: String) -> Result<Collection> {
    let pool = db.lock().await;
    collection::rename_collection(&*pool, id, &name).await
}

#[tauri::command]
pub async fn delete_collection(db: DbState<'_>, id: i64) -> Result<()> {
    let pool = db.lock().await;
    collection::delete_collection(&*pool, id).await
}

#[tauri::command]
pub async fn add_book_to_collection(
    db: DbState<'_>,
    collection_id: i64,
    book_id: i64,
) -> Result<Collection> {
    let pool = db.lock().await;
    collection::add_book_to_collection(&*pool, collection_id, book_id).await
}

#[tauri::command]
pub async fn remove_book_from_collection(
    db: DbState<'_>,
    collection_id: i64,
    book_id: i64,
) -> Result<Collection> {
    let pool = db.lock().await;
    collection::remove_book_from_collection(&*pool, collection_id, book_id).await
}

// ---- reading sessions ----

/// Stores a finished session. On failure the registry gets it back so the
/// next hide, close or shutdown tries again.
async fn store_session(
    pool: &SqlitePool,
    sessions: &Mutex<SessionRegistry>,
    finished: Option<NewSession>,
) -> Result<Option<ReadingSession>> {
    let Some(finished) = finished else {
        return Ok(None);
    };
    match session::save_session(pool, &finished).await {
        Ok(saved) => Ok(saved),
        Err(e) => {
            tracing::error!(
                book_id = finished.book_id,
                error = %e,
                "failed to store reading session"
            );
            sessions.lock().await.save_failed(&finished);
            Err(e)
        }
    }
}

#[tauri::command]
pub async fn begin_session(
    db: DbState<'_>,
    sessions: SessionState<'_>,
    book_id: i64,
    page: u32,
) -> Result<Option<ReadingSession>> {
    let previous = sessions.lock().await.begin(book_id, page, unix_now());
    let pool = pool(&db).await;
    store_session(&pool, &sessions, previous).await
}

#[tauri::command]
pub async fn session_visibility(
    db: DbState<'_>,
    sessions: SessionState<'_>,
    book_id: i64,
    visibility: Visibility,
) -> Result<Option<ReadingSession>> {
    let finished = sessions.lock().await.visibility(book_id, visibility, unix_now());
    let pool = pool(&db).await;
    store_session(&pool, &sessions, finished).await
}

#[tauri::command]
pub async fn end_session(
    db: DbState<'_>,
    sessions: SessionState<'_>,
    cache: CacheState<'_>,
    book_id: i64,
) -> Result<Option<ReadingSession>> {
    let finished = sessions.lock().await.end(book_id, unix_now());
    cache.release(book_id).await;
    let pool = pool(&db).await;
    store_session(&pool, &sessions, finished).await
}

#[tauri::command]
pub async fn list_sessions(db: DbState<'_>, book_id: Option<i64>) -> Result<Vec<ReadingSession>> {
    let pool = db.lock().await;
    session::list_sessions(&*pool, book_id).await
}

/// Stores whatever is still open, for shutdown.
pub(crate) async fn close_all_sessions(app: &AppHandle) {
    let (Some(db), Some(sessions)) = (
        app.try_state::<Arc<Mutex<SqlitePool>>>(),
        app.try_state::<Arc<Mutex<SessionRegistry>>>(),
    ) else {
        return;
    };
    let open = sessions.lock().await.end_all(unix_now());
    let pool = db.lock().await.clone();
    for finished in open {
        if let Err(e) = session::save_session(&pool, &finished).await {
            tracing::error!(
                book_id = finished.book_id,
                error = %e,
                "failed to store reading session"
            );
        }
    }
}

#[tauri::command]
pub async fn reading_insights(db: DbState<'_>) -> Result<ReadingInsights> {
    let pool = db.lock().await;
    stats::reading_insights(&*pool, chrono::Local::now().fixed_offset()).await
}

// ---- settings ----

#[tauri::command]
pub async fn get_settings(db: DbState<'_>) -> Result<ReaderSettings> {
    let pool = db.lock().await;
    settings::load_settings(&*pool).await
}

#[tauri::command]
pub async fn save_settings(db: DbState<'_>, settings: ReaderSettings) -> Result<ReaderSettings> {
    let pool = db.lock().await;
    settings::save_settings(&*pool, &settings).await
}

#[tauri::command]
pub async fn reset_settings(db: DbState<'_>) -> Result<ReaderSettings> {
    let pool = db.lock().await;
    settings::reset_settings(&*pool).await
}

// ---- export ----

/// Writes the export to `dir`, or the downloads folder, and returns its path.
#[tauri::command]
pub async fn export_library(
    app: AppHandle,
    db: DbState<'_>,
    kind: ExportKind,
    dir: Option<String>,
) -> Result<String> {
    let dir = match dir {
        Some(dir) => PathBuf::from(dir),
        None => app
            .path()
            .download_dir()
            .or_else(|_| app.path().app_data_dir())
            .map_err(|e| Error::Invalid(format!("No export directory: {}", e)))?,
    };
    let pool = pool(&db).await;
    let path = backup::export_library(&pool, &dir, kind, chrono::Utc::now()).await?;
    Ok(path.to_string_lossy().into_owned())
}

// ---- comic viewer ----

#[tauri::command]
pub async fn comic_page_names(
    db: DbState<'_>,
    cache: CacheState<'_>,
    book_id: i64,
) -> Result<Vec<String>> {
    let pool = pool(&db).await;
    cache.page_names(&pool, book_id).await
}

/// Zero-based page as a `data:` URL.
#[tauri::command]
pub async fn comic_page(
    db: DbState<'_>,
    cache: CacheState<'_>,
    book_id: i64,
    index: usize,
) -> Result<String> {
    let pool = pool(&db).await;
    let page = cache.page(&pool, book_id, index).await?;
    Ok(page_data_url(&page))
}

#[tauri::command]
pub async fn shortcut_help() -> Result<Vec<ShortcutHelpSection>> {
    Ok(help_sections())
}
