use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use crate::commands::collection::{load_collections, store_collection_members};
use crate::commands::unix_now;
use crate::cover;
use crate::error::{Error, Result};
use crate::formats::UNKNOWN_AUTHOR;
use crate::models::{Book, BookMetadata, BOOK_COLUMNS};

/// Books added within this many days show up under "Recently Added".
pub const RECENT_DAYS: i64 = 14;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatFilter {
    #[default]
    All,
    Epub,
    Pdf,
    /// CBZ and CBR
    Comic,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LibrarySection {
    #[default]
    Library,
    Reading,
    Favorites,
    Recent,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookSort {
    Title,
    Author,
    #[default]
    Added,
    LastRead,
}

/// What the library grid asks for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryQuery {
    pub format: FormatFilter,
    pub section: LibrarySection,
    pub collection: Option<i64>,
    pub sort: BookSort,
    pub search: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub page: u32,
    pub total_pages: Option<u32>,
    /// Percent
    pub progress: f64,
    /// EPUB CFI of the displayed location
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookDetails {
    pub title: String,
    pub author: String,
    pub collection_ids: Vec<i64>,
}

pub(crate) async fn fetch_book<'e, E>(executor: E, id: i64) -> Result<Book>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {} FROM books WHERE id = ?", BOOK_COLUMNS);
    sqlx::query_as::<_, Book>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(Error::book_not_found)
}

pub async fn get_book(pool: &SqlitePool, id: i64) -> Result<Book> {
    fetch_book(pool, id).await
}

pub async fn list_books(pool: &SqlitePool, query: &LibraryQuery) -> Result<Vec<Book>> {
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {} FROM books WHERE 1 = 1", BOOK_COLUMNS));

    match query.format {
        FormatFilter::All => {}
        FormatFilter::Epub => {
            qb.push(" AND format = 'epub'");
        }
        FormatFilter::Pdf => {
            qb.push(" AND format = 'pdf'");
        }
        FormatFilter::Comic => {
            qb.push(" AND format IN ('cbz', 'cbr')");
        }
    }

    match query.section {
        LibrarySection::Library => {}
        LibrarySection::Reading => {
            qb.push(" AND progress > 0 AND progress < 100");
        }
        LibrarySection::Favorites => {
            qb.push(" AND COALESCE(json_extract(metadata, '$.favorite'), 0) = 1");
        }
        LibrarySection::Recent => {
            qb.push(" AND added_at >= ")
                .push_bind(unix_now() - RECENT_DAYS * 24 * 60 * 60);
        }
    }

    if let Some(collection_id) = query.collection {
        qb.push(" AND EXISTS (SELECT 1 FROM json_each(books.collections) WHERE json_each.value = ")
            .push_bind(collection_id)
            .push(")");
    }

    let search = query.search.trim().to_lowercase();
    if !search.is_empty() {
        qb.push(" AND (instr(lower(title), ")
            .push_bind(search.clone())
            .push(") > 0 OR instr(lower(author), ")
            .push_bind(search)
            .push(") > 0)");
    }

    qb.push(match query.sort {
        BookSort::Title => " ORDER BY title COLLATE NOCASE ASC, id ASC",
        BookSort::Author => " ORDER BY author COLLATE NOCASE ASC, id ASC",
        BookSort::Added => " ORDER BY added_at DESC, id DESC",
        BookSort::LastRead => " ORDER BY last_read_at IS NULL, last_read_at DESC, id DESC",
    });

    let books = qb.build_query_as::<Book>().fetch_all(pool).await?;
    Ok(books)
}

async fn store_metadata(
    conn: &mut SqliteConnection,
    id: i64,
    metadata: &BookMetadata,
) -> Result<()> {
    sqlx::query("UPDATE books SET metadata = ? WHERE id = ?")
        .bind(Json(metadata))
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Stores the reader's position and stamps `last_read_at`.
pub async fn update_progress(pool: &SqlitePool, id: i64, update: ProgressUpdate) -> Result<Book> {
    let mut tx = pool.begin().await?;
    let book = fetch_book(&mut *tx, id).await?;

    let progress = if update.progress.is_finite() {
        update.progress.clamp(0.0, 100.0)
    } else {
        book.progress
    };

    sqlx::query(
        "UPDATE books
         SET current_page = ?, total_pages = COALESCE(?, total_pages), progress = ?,
             last_read_at = ?
         WHERE id = ?",
    )
    .bind(update.page.max(1) as i64)
    .bind(update.total_pages.map(|t| t as i64))
    .bind(progress)
    .bind(unix_now())
    .bind(id)
    .execute(&mut *tx)
    .await?;

    if let Some(cfi) = update.location.filter(|c| !c.is_empty()) {
        let mut metadata = book.metadata;
        metadata.cfi = Some(cfi);
        store_metadata(&mut tx, id, &metadata).await?;
    }

    let book = fetch_book(&mut *tx, id).await?;
    tx.commit().await?;
    Ok(book)
}

/// Edits title/author and the book's collections. Every collection's member
/// list is brought in line in the same transaction.
pub async fn update_details(pool: &SqlitePool, id: i64, details: BookDetails) -> Result<Book> {
    let title = details.title.trim();
    if title.is_empty() {
        return Err(Error::Invalid("Title cannot be empty".to_string()));
    }
    let author = match details.author.trim() {
        "" => UNKNOWN_AUTHOR,
        a => a,
    };

    let mut tx = pool.begin().await?;
    fetch_book(&mut *tx, id).await?;

    let collections = load_collections(&mut tx).await?;
    let mut selected: Vec<i64> = Vec::new();
    for cid in details.collection_ids {
        if collections.iter().any(|c| c.id == cid) && !selected.contains(&cid) {
            selected.push(cid);
        }
    }

    sqlx::query("UPDATE books SET title = ?, author = ?, collections = ? WHERE id = ?")
        .bind(title)
        .bind(author)
        .bind(Json(&selected))
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let now = unix_now();
    for collection in collections {
        let wanted = selected.contains(&collection.id);
        let present = collection.book_ids.contains(&id);
        if wanted == present {
            continue;
        }
        let mut members = collection.book_ids;
        if wanted {
            members.push(id);
        } else {
            members.retain(|b| *b != id);
        }
        store_collection_members(&mut tx, collection.id, &members, now).await?;
    }

    let book = fetch_book(&mut *tx, id).await?;
    tx.commit().await?;
    Ok(book)
}

pub async fn set_favorite(pool: &SqlitePool, id: i64, favorite: bool) -> Result<Book> {
    let mut tx = pool.begin().await?;
    let mut metadata = fetch_book(&mut *tx, id).await?.metadata;
    metadata.favorite = favorite;
    store_metadata(&mut tx, id, &metadata).await?;
    let book = fetch_book(&mut *tx, id).await?;
    tx.commit().await?;
    Ok(book)
}

/// Removes the book, its annotations and sessions, and its id from every collection.
pub async fn delete_book(pool: &SqlitePool, id: i64) -> Result<()> {
    let mut tx = pool.begin().await?;
    let book = fetch_book(&mut *tx, id).await?;

    let now = unix_now();
    for collection in load_collections(&mut tx).await? {
        if collection.book_ids.contains(&id) {
            let members: Vec<i64> = collection.book_ids.into_iter().filter(|b| *b != id).collect();
            store_collection_members(&mut tx, collection.id, &members, now).await?;
        }
    }

    sqlx::query("DELETE FROM books WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(book_id = id, title = %book.title, "deleted book");
    Ok(())
}

/// Raw file content for the viewer.
pub async fn book_file(pool: &SqlitePool, id: i64) -> Result<Vec<u8>> {
    sqlx::query_scalar::<_, Vec<u8>>("SELECT file_data FROM books WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(Error::book_not_found)
}

/// Cover as a `data:` URL, `None` when the book has no cover.
pub async fn book_cover(pool: &SqlitePool, id: i64) -> Result<Option<String>> {
    let cover: Option<Option<Vec<u8>>> =
        sqlx::query_scalar("SELECT cover_data FROM books WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;

    match cover {
        None => Err(Error::book_not_found()),
        Some(data) => Ok(data.filter(|d| !d.is_empty()).map(|d| cover::data_url(&d))),
    }
}
