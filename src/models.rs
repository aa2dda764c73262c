use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::formats::BookFormat;

/// Columns selected for a [`Book`]; the file and cover blobs are fetched separately.
pub const BOOK_COLUMNS: &str = "id, title, author, format, file_size, content_hash, added_at, \
     last_read_at, progress, current_page, total_pages, collections, metadata, \
     cover_data IS NOT NULL AS has_cover";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub format: BookFormat,
    pub file_size: i64,
    pub content_hash: Option<String>,
    pub added_at: i64, // Unix timestamp
    pub last_read_at: Option<i64>,
    /// Percent, 0..=100
    pub progress: f64,
    pub current_page: u32,
    pub total_pages: u32,
    #[sqlx(json)]
    pub collections: Vec<i64>,
    #[sqlx(json)]
    pub metadata: BookMetadata,
    pub has_cover: bool,
}

impl Book {
    pub fn is_in_progress(&self) -> bool {
        self.progress > 0.0 && self.progress < 100.0
    }
}

/// Free-form per-book data. Keys this crate does not know are kept as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookMetadata {
    /// Last EPUB location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cfi: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub favorite: bool,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum AnnotationKind {
    Highlight,
    Note,
    Bookmark,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Annotation {
    pub id: i64,
    pub book_id: i64,
    pub kind: AnnotationKind,
    pub page: u32,
    /// Page number as text, or an EPUB CFI
    pub position: String,
    pub content: String,
    pub note: Option<String>,
    pub color: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReadingSession {
    pub id: i64,
    pub book_id: i64,
    pub start_time: i64,
    pub end_time: i64,
    /// Seconds
    pub duration: i64,
    pub pages_read: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Collection {
    pub id: i64,
    pub name: String,
    pub description: String,
    #[sqlx(json)]
    pub book_ids: Vec<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReadingDayStat {
    pub date: String,
    pub duration_minutes: i64,
    pub pages: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReadingInsights {
    pub total_time_minutes: i64,
    pub total_pages: i64,
    pub streak_days: i64,
    pub in_progress_books: i64,
    pub today_minutes: i64,
    pub today_pages: i64,
    pub days: Vec<ReadingDayStat>,
}
