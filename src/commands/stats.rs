use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone};
use sqlx::SqlitePool;
use std::collections::HashMap;

use crate::error::Result;
use crate::models::{Book, ReadingDayStat, ReadingInsights, ReadingSession, BOOK_COLUMNS};

/// Days shown in the dashboard strip
pub const INSIGHT_DAYS: i64 = 7;

#[derive(Debug, Default, Clone, Copy)]
struct DayTotal {
    seconds: i64,
    pages: i64,
}

fn minutes(seconds: i64) -> i64 {
    (seconds as f64 / 60.0).round() as i64
}

fn local_day(timestamp: i64, offset: &FixedOffset) -> Option<NaiveDate> {
    offset
        .timestamp_opt(timestamp, 0)
        .single()
        .map(|dt| dt.date_naive())
}

/// Dashboard numbers. Days are calendar days in `now`'s offset.
pub fn compute_insights(
    sessions: &[ReadingSession],
    books: &[Book],
    now: DateTime<FixedOffset>,
) -> ReadingInsights {
    let offset = now.offset();
    let today = now.date_naive();

    let total_seconds: i64 = sessions.iter().map(|s| s.duration).sum();
    let total_pages: i64 = sessions.iter().map(|s| s.pages_read).sum();
    let in_progress_books = books.iter().filter(|b| b.is_in_progress()).count() as i64;

    let mut by_day: HashMap<NaiveDate, DayTotal> = HashMap::new();
    for session in sessions {
        let Some(day) = local_day(session.start_time, offset) else {
            continue;
        };
        let entry = by_day.entry(day).or_default();
        entry.seconds += session.duration;
        entry.pages += session.pages_read;
    }

    let days = (0..INSIGHT_DAYS)
        .rev()
        .map(|back| {
            let date = today - Duration::days(back);
            let total = by_day.get(&date).copied().unwrap_or_default();
            ReadingDayStat {
                date: date.format("%Y-%m-%d").to_string(),
                duration_minutes: minutes(total.seconds),
                pages: total.pages,
            }
        })
        .collect();

    let mut streak_days = 0;
    let mut cursor = today;
    while by_day.contains_key(&cursor) {
        streak_days += 1;
        cursor -= Duration::days(1);
    }

    let today_total = by_day.get(&today).copied().unwrap_or_default();

    ReadingInsights {
        total_time_minutes: minutes(total_seconds),
        total_pages,
        streak_days,
        in_progress_books,
        today_minutes: minutes(today_total.seconds),
        today_pages: today_total.pages,
        days,
    }
}

pub async fn reading_insights(
    pool: &SqlitePool,
    now: DateTime<FixedOffset>,
) -> Result<ReadingInsights> {
    let sessions = sqlx::query_as::<_, ReadingSession>(
        "SELECT id, book_id, start_time, end_time, duration, pages_read FROM reading_sessions",
    )
    .fetch_all(pool)
    .await?;

    let sql = format!("SELECT {} FROM books", BOOK_COLUMNS);
    let books = sqlx::query_as::<_, Book>(&sql).fetch_all(pool).await?;

    Ok(compute_insights(&sessions, &books, now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::book::{update_progress, ProgressUpdate};
    use crate::commands::import::import_files;
    use crate::commands::session::{save_session, NewSession};
    use crate::db::connect_in_memory;
    use crate::test_support::build_pdf;

    fn at(date: &str, hour: u32) -> DateTime<FixedOffset> {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let day = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
        offset
            .from_local_datetime(&day.and_hms_opt(hour, 0, 0).unwrap())
            .unwrap()
    }

    fn session(id: i64, start: DateTime<FixedOffset>, duration: i64, pages: i64) -> ReadingSession {
        ReadingSession {
            id,
            book_id: 1,
            start_time: start.timestamp(),
            end_time: start.timestamp() + duration,
            duration,
            pages_read: pages,
        }
    }

    #[test]
    fn test_empty_library() {
        let insights = compute_insights(&[], &[], at("2024-03-10", 12));
        assert_eq!(insights.total_time_minutes, 0);
        assert_eq!(insights.streak_days, 0);
        assert_eq!(insights.days.len(), 7);
        assert_eq!(insights.days[0].date, "2024-03-04");
        assert_eq!(insights.days[6].date, "2024-03-10");
    }

    #[test]
    fn test_totals_streak_and_days() {
        let now = at("2024-03-10", 20);
        let sessions = vec![
            session(1, at("2024-03-10", 9), 600, 12),
            session(2, at("2024-03-10", 18), 90, 1),
            session(3, at("2024-03-09", 23), 1800, 20),
            session(4, at("2024-03-08", 7), 60, 0),
            // gap on the 7th
            session(5, at("2024-03-06", 7), 300, 5),
            session(6, at("2024-02-01", 7), 3600, 40),
        ];

        let insights = compute_insights(&sessions, &[], now);
        assert_eq!(insights.total_time_minutes, 108);
        assert_eq!(insights.total_pages, 78);
        assert_eq!(insights.streak_days, 3);
        assert_eq!(insights.today_minutes, 12);
        assert_eq!(insights.today_pages, 13);

        let minutes: Vec<i64> = insights.days.iter().map(|d| d.duration_minutes).collect();
        assert_eq!(minutes, vec![0, 0, 5, 0, 1, 30, 12]);
    }

    #[test]
    fn test_streak_needs_today() {
        let sessions = vec![session(1, at("2024-03-09", 9), 600, 1)];
        let insights = compute_insights(&sessions, &[], at("2024-03-10", 9));
        assert_eq!(insights.streak_days, 0);
        assert_eq!(insights.today_minutes, 0);
    }

    #[test]
    fn test_day_boundary_follows_offset() {
        // 23:30 local on the 9th is 21:30 UTC; it belongs to the 9th
        let late = at("2024-03-09", 23) + Duration::minutes(30);
        let insights = compute_insights(&[session(1, late, 120, 2)], &[], at("2024-03-10", 1));
        assert_eq!(insights.days[5].date, "2024-03-09");
        assert_eq!(insights.days[5].pages, 2);
        assert_eq!(insights.today_pages, 0);
    }

    #[tokio::test]
    async fn test_reading_insights_from_database() {
        let pool = connect_in_memory().await.unwrap();
        let report = import_files(
            &pool,
            vec![
                ("a.pdf".into(), build_pdf(10, Some("A"), None)),
                ("b.pdf".into(), build_pdf(10, Some("B"), None)),
            ],
        )
        .await
        .unwrap();
        let book_id = report.imported[0].id;
        update_progress(
            &pool,
            book_id,
            ProgressUpdate { page: 3, total_pages: None, progress: 30.0, location: None },
        )
        .await
        .unwrap();

        let now = at("2024-03-10", 12);
        let start = now.timestamp() - 3600;
        save_session(
            &pool,
            &NewSession {
                book_id,
                start_time: start,
                end_time: start + 240,
                duration: 240,
                pages_read: 2,
            },
        )
        .await
        .unwrap();

        let insights = reading_insights(&pool, now).await.unwrap();
        assert_eq!(insights.in_progress_books, 1);
        assert_eq!(insights.today_minutes, 4);
        assert_eq!(insights.streak_days, 1);
    }
}
