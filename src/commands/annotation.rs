use serde::{Deserialize, Serialize};
use sqlx::{Sqlite, SqlitePool};

use crate::commands::book::fetch_book;
use crate::commands::unix_now;
use crate::error::{Error, Result};
use crate::formats::BookFormat;
use crate::models::{Annotation, AnnotationKind, Book};

pub const HIGHLIGHT_COLOR: &str = "rgba(255, 255, 0, 0.4)";
pub const BOOKMARK_COLOR: &str = "var(--accent)";

const ANNOTATION_COLUMNS: &str =
    "id, book_id, kind, page, position, content, note, color, created_at";

/// Where a bookmark sits: a CFI for reflowable EPUBs, a page number for everything else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum BookmarkAnchor {
    Location(String),
    Page(u32),
}

impl BookmarkAnchor {
    pub fn for_book(book: &Book) -> Self {
        match book.format {
            BookFormat::Epub => {
                BookmarkAnchor::Location(book.metadata.cfi.clone().unwrap_or_default())
            }
            _ => BookmarkAnchor::Page(book.current_page),
        }
    }

    pub fn matches(&self, annotation: &Annotation) -> bool {
        if annotation.kind != AnnotationKind::Bookmark {
            return false;
        }
        match self {
            BookmarkAnchor::Location(cfi) => annotation.position == *cfi,
            BookmarkAnchor::Page(page) => annotation.page == *page,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", content = "annotation", rename_all = "lowercase")]
pub enum BookmarkToggle {
    Added(Annotation),
    Removed(Annotation),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNote {
    pub book_id: i64,
    pub page: u32,
    pub position: String,
    /// The passage the note is attached to
    pub content: String,
    pub note: String,
}

async fn fetch_annotation<'e, E>(executor: E, id: i64) -> Result<Annotation>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {} FROM annotations WHERE id = ?", ANNOTATION_COLUMNS);
    sqlx::query_as::<_, Annotation>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| Error::NotFound("Annotation not found".to_string()))
}

pub async fn list_annotations(pool: &SqlitePool, book_id: i64) -> Result<Vec<Annotation>> {
    let sql = format!(
        "SELECT {} FROM annotations WHERE book_id = ? ORDER BY created_at, id",
        ANNOTATION_COLUMNS
    );
    let annotations = sqlx::query_as::<_, Annotation>(&sql)
        .bind(book_id)
        .fetch_all(pool)
        .await?;
    Ok(annotations)
}

fn newest_first(mut list: Vec<Annotation>) -> Vec<Annotation> {
    list.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    list
}

/// The bookmarks panel
pub fn bookmarks(list: &[Annotation]) -> Vec<Annotation> {
    newest_first(
        list.iter()
            .filter(|a| a.kind == AnnotationKind::Bookmark)
            .cloned()
            .collect(),
    )
}

/// The annotations panel
pub fn highlights_and_notes(list: &[Annotation]) -> Vec<Annotation> {
    newest_first(
        list.iter()
            .filter(|a| matches!(a.kind, AnnotationKind::Highlight | AnnotationKind::Note))
            .cloned()
            .collect(),
    )
}

pub fn is_bookmarked(list: &[Annotation], anchor: &BookmarkAnchor) -> bool {
    list.iter().any(|a| anchor.matches(a))
}

struct NewAnnotation<'a> {
    book_id: i64,
    kind: AnnotationKind,
    page: u32,
    position: &'a str,
    content: &'a str,
    note: Option<&'a str>,
    color: &'a str,
}

async fn insert_annotation(pool: &SqlitePool, new: NewAnnotation<'_>) -> Result<Annotation> {
    let result = sqlx::query(
        "INSERT INTO annotations
             (book_id, kind, page, position, content, note, color, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(new.book_id)
    .bind(new.kind)
    .bind(new.page as i64)
    .bind(new.position)
    .bind(new.content)
    .bind(new.note)
    .bind(new.color)
    .bind(unix_now())
    .execute(pool)
    .await?;

    fetch_annotation(pool, result.last_insert_rowid()).await
}

/// Removes the bookmark at the book's current position, or adds one if there is none.
pub async fn toggle_bookmark(pool: &SqlitePool, book_id: i64) -> Result<BookmarkToggle> {
    let book = fetch_book(pool, book_id).await?;
    let anchor = BookmarkAnchor::for_book(&book);
    let existing = list_annotations(pool, book_id)
        .await?
        .into_iter()
        .find(|a| anchor.matches(a));

    if let Some(bookmark) = existing {
        delete_annotation(pool, bookmark.id).await?;
        return Ok(BookmarkToggle::Removed(bookmark));
    }

    let (position, content) = match &anchor {
        BookmarkAnchor::Location(cfi) => {
            (cfi.clone(), format!("Bookmark at location {}", book.current_page))
        }
        BookmarkAnchor::Page(page) => (page.to_string(), format!("Bookmark at page {}", page)),
    };

    let bookmark = insert_annotation(
        pool,
        NewAnnotation {
            book_id,
            kind: AnnotationKind::Bookmark,
            page: book.current_page,
            position: &position,
            content: &content,
            note: None,
            color: BOOKMARK_COLOR,
        },
    )
    .await?;
    Ok(BookmarkToggle::Added(bookmark))
}

/// Stores a text selection. An empty selection stores nothing.
pub async fn add_highlight(
    pool: &SqlitePool,
    book_id: i64,
    cfi_range: &str,
    text: &str,
) -> Result<Option<Annotation>> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    fetch_book(pool, book_id).await?;

    let highlight = insert_annotation(
        pool,
        NewAnnotation {
            book_id,
            kind: AnnotationKind::Highlight,
            page: 0,
            position: cfi_range,
            content: text,
            note: None,
            color: HIGHLIGHT_COLOR,
        },
    )
    .await?;
    Ok(Some(highlight))
}

pub async fn add_note(pool: &SqlitePool, note: NewNote) -> Result<Annotation> {
    if note.note.trim().is_empty() {
        return Err(Error::Invalid("Note cannot be empty".to_string()));
    }
    fetch_book(pool, note.book_id).await?;

    insert_annotation(
        pool,
        NewAnnotation {
            book_id: note.book_id,
            kind: AnnotationKind::Note,
            page: note.page,
            position: &note.position,
            content: &note.content,
            note: Some(note.note.trim()),
            color: HIGHLIGHT_COLOR,
        },
    )
    .await
}

pub async fn delete_annotation(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM annotations WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
