use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::HashMap;

use crate::error::Result;
use crate::models::ReadingSession;

/// Sessions shorter than this are noise and never stored.
pub const MIN_SESSION_SECS: i64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSession {
    pub book_id: i64,
    pub start_time: i64,
    pub end_time: i64,
    pub duration: i64,
    pub pages_read: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Hidden,
    Visible,
}

/// One open book's reading session.
///
/// A session starts when the reader opens, follows page turns, and is closed
/// when the reader goes away or the window is hidden. Showing the window again
/// starts a fresh session from the page the reader is on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTracker {
    book_id: i64,
    start_time: i64,
    start_page: u32,
    latest_page: u32,
    saved: bool,
}

impl SessionTracker {
    pub fn start(book_id: i64, page: u32, now: i64) -> Self {
        Self {
            book_id,
            start_time: now,
            start_page: page,
            latest_page: page,
            saved: false,
        }
    }

    pub fn book_id(&self) -> i64 {
        self.book_id
    }

    pub fn page_changed(&mut self, page: u32) {
        self.latest_page = page;
    }

    /// Closes the session. `None` if it was already closed or is too short to keep;
    /// a too-short session stays open and can still be finished later.
    pub fn finish(&mut self, now: i64) -> Option<NewSession> {
        if self.saved {
            return None;
        }
        let duration = now - self.start_time;
        if duration < MIN_SESSION_SECS {
            return None;
        }
        self.saved = true;

        Some(NewSession {
            book_id: self.book_id,
            start_time: self.start_time,
            end_time: now,
            duration,
            pages_read: (self.latest_page as i64 - self.start_page as i64).max(0),
        })
    }

    /// Reopens the tracker so the next `finish` can retry a session that failed to store.
    pub fn save_failed(&mut self) {
        self.saved = false;
    }

    pub fn resume(&mut self, now: i64) {
        self.start_time = now;
        self.start_page = self.latest_page;
        self.saved = false;
    }
}

/// Trackers for every open reader window, keyed by book.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    trackers: HashMap<i64, SessionTracker>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking `book_id`. A session already open for the book is closed first.
    pub fn begin(&mut self, book_id: i64, page: u32, now: i64) -> Option<NewSession> {
        let previous = self
            .trackers
            .insert(book_id, SessionTracker::start(book_id, page, now));
        previous.and_then(|mut tracker| tracker.finish(now))
    }

    pub fn record_page(&mut self, book_id: i64, page: u32) {
        if let Some(tracker) = self.trackers.get_mut(&book_id) {
            tracker.page_changed(page);
        }
    }

    pub fn visibility(
        &mut self,
        book_id: i64,
        visibility: Visibility,
        now: i64,
    ) -> Option<NewSession> {
        let tracker = self.trackers.get_mut(&book_id)?;
        match visibility {
            Visibility::Hidden => tracker.finish(now),
            Visibility::Visible => {
                tracker.resume(now);
                None
            }
        }
    }

    pub fn end(&mut self, book_id: i64, now: i64) -> Option<NewSession> {
        self.trackers.remove(&book_id)?.finish(now)
    }

    /// Puts back a session whose store failed, so the next hide or close stores it again.
    /// A tracker that `end` already removed is reinstated as an open session.
    pub fn save_failed(&mut self, session: &NewSession) {
        match self.trackers.get_mut(&session.book_id) {
            Some(tracker) if tracker.start_time == session.start_time => tracker.save_failed(),
            // the book was reopened since; keep the newer session
            Some(_) => {}
            None => {
                let tracker = SessionTracker {
                    book_id: session.book_id,
                    start_time: session.start_time,
                    start_page: 0,
                    latest_page: session.pages_read.clamp(0, u32::MAX as i64) as u32,
                    saved: false,
                };
                self.trackers.insert(session.book_id, tracker);
            }
        }
    }

    /// Closes everything, for shutdown.
    pub fn end_all(&mut self, now: i64) -> Vec<NewSession> {
        self.trackers
            .drain()
            .filter_map(|(_, mut tracker)| tracker.finish(now))
            .collect()
    }

    pub fn is_tracking(&self, book_id: i64) -> bool {
        self.trackers.contains_key(&book_id)
    }
}

/// Stores a finished session. Short sessions are dropped and yield `None`.
pub async fn save_session(
    pool: &SqlitePool,
    session: &NewSession,
) -> Result<Option<ReadingSession>> {
    if session.duration < MIN_SESSION_SECS {
        tracing::debug!(
            book_id = session.book_id,
            duration = session.duration,
            "dropping short session"
        );
        return Ok(None);
    }

    let result = sqlx::query(
        "INSERT INTO reading_sessions (book_id, start_time, end_time, duration, pages_read)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(session.book_id)
    .bind(session.start_time)
    .bind(session.end_time)
    .bind(session.duration)
    .bind(session.pages_read)
    .execute(pool)
    .await?;

    let saved = sqlx::query_as::<_, ReadingSession>(
        "SELECT id, book_id, start_time, end_time, duration, pages_read
         FROM reading_sessions WHERE id = ?",
    )
    .bind(result.last_insert_rowid())
    .fetch_one(pool)
    .await?;
    Ok(Some(saved))
}

pub async fn list_sessions(pool: &SqlitePool, book_id: Option<i64>) -> Result<Vec<ReadingSession>> {
    let sessions = sqlx::query_as::<_, ReadingSession>(
        "SELECT id, book_id, start_time, end_time, duration, pages_read FROM reading_sessions
         WHERE ? IS NULL OR book_id = ? ORDER BY start_time, id",
    )
    .bind(book_id)
    .bind(book_id)
    .fetch_all(pool)
    .await?;
    Ok(sessions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::import::import_files;
    use crate::db::connect_in_memory;
    use crate::test_support::build_pdf;

    #[test]
    fn test_short_session_is_not_finished() {
        let mut tracker = SessionTracker::start(1, 10, 1_000);
        tracker.page_changed(12);
        assert_eq!(tracker.finish(1_004), None);

        let session = tracker.finish(1_005).unwrap();
        assert_eq!(session.duration, 5);
        assert_eq!(session.pages_read, 2);
        assert_eq!(tracker.finish(1_100), None);
    }

    #[test]
    fn test_paging_backwards_reads_zero_pages() {
        let mut tracker = SessionTracker::start(1, 10, 0);
        tracker.page_changed(3);
        assert_eq!(tracker.finish(60).unwrap().pages_read, 0);
    }

    #[test]
    fn test_resume_starts_from_latest_page() {
        let mut tracker = SessionTracker::start(7, 1, 0);
        tracker.page_changed(5);
        assert_eq!(tracker.finish(30).unwrap().pages_read, 4);

        tracker.resume(100);
        tracker.page_changed(9);
        let second = tracker.finish(160).unwrap();
        assert_eq!(second.start_time, 100);
        assert_eq!(second.duration, 60);
        assert_eq!(second.pages_read, 4);
    }

    #[test]
    fn test_failed_save_can_retry() {
        let mut tracker = SessionTracker::start(7, 1, 0);
        assert!(tracker.finish(10).is_some());
        tracker.save_failed();
        assert!(tracker.finish(12).is_some());
    }

    #[test]
    fn test_registry_lifecycle() {
        let mut registry = SessionRegistry::new();
        assert_eq!(registry.begin(3, 1, 0), None);
        registry.record_page(3, 4);
        registry.record_page(99, 4);

        let hidden = registry.visibility(3, Visibility::Hidden, 20).unwrap();
        assert_eq!(hidden.pages_read, 3);
        assert_eq!(registry.visibility(3, Visibility::Hidden, 25), None);

        assert_eq!(registry.visibility(3, Visibility::Visible, 40), None);
        registry.record_page(3, 6);
        let ended = registry.end(3, 50).unwrap();
        assert_eq!((ended.start_time, ended.pages_read), (40, 2));
        assert!(!registry.is_tracking(3));
        assert_eq!(registry.end(3, 60), None);
    }

    #[test]
    fn test_reopening_a_book_closes_the_old_session() {
        let mut registry = SessionRegistry::new();
        registry.begin(3, 1, 0);
        let previous = registry.begin(3, 8, 30).unwrap();
        assert_eq!(previous.end_time, 30);
        registry.begin(4, 1, 30);
        assert_eq!(registry.end_all(90).len(), 2);
    }

    #[test]
    fn test_failed_store_is_retried_on_next_hide() {
        let mut registry = SessionRegistry::new();
        registry.begin(3, 1, 0);
        registry.record_page(3, 4);

        let first = registry.visibility(3, Visibility::Hidden, 30).unwrap();
        registry.save_failed(&first);

        let retry = registry.visibility(3, Visibility::Hidden, 40).unwrap();
        assert_eq!((retry.start_time, retry.pages_read), (0, 3));
        assert_eq!(retry.end_time, 40);
    }

    #[test]
    fn test_failed_store_on_end_is_kept_for_shutdown() {
        let mut registry = SessionRegistry::new();
        registry.begin(3, 2, 0);
        registry.record_page(3, 7);
        let ended = registry.end(3, 60).unwrap();
        assert!(!registry.is_tracking(3));

        registry.save_failed(&ended);
        assert!(registry.is_tracking(3));
        let again = registry.end(3, 70).unwrap();
        assert_eq!((again.start_time, again.pages_read, again.duration), (0, 5, 70));
    }

    #[test]
    fn test_failed_store_does_not_replace_a_newer_session() {
        let mut registry = SessionRegistry::new();
        registry.begin(3, 1, 0);
        let old = registry.begin(3, 5, 30).unwrap();
        registry.save_failed(&old);
        assert_eq!(registry.end(3, 90).unwrap().start_time, 30);
    }

    #[tokio::test]
    async fn test_short_sessions_are_not_persisted() {
        let pool = connect_in_memory().await.unwrap();
        let report = import_files(&pool, vec![("a.pdf".into(), build_pdf(5, None, None))])
            .await
            .unwrap();
        let book_id = report.imported[0].id;

        let short = NewSession { book_id, start_time: 0, end_time: 4, duration: 4, pages_read: 1 };
        assert!(save_session(&pool, &short).await.unwrap().is_none());

        let long = NewSession { book_id, start_time: 0, end_time: 90, duration: 90, pages_read: 3 };
        let saved = save_session(&pool, &long).await.unwrap().unwrap();
        assert_eq!(saved.pages_read, 3);

        let all = list_sessions(&pool, None).await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(list_sessions(&pool, Some(book_id + 1)).await.unwrap().is_empty());
    }
}
