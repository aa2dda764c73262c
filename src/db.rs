use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

use crate::config::Config;
use crate::error::{Error, Result};

/// Schema migrations, applied in order. Index + 1 is the schema version.
const MIGRATIONS: &[&[&str]] = &[
    // v1: books, annotations, settings
    &[
        "CREATE TABLE IF NOT EXISTS books (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            author TEXT NOT NULL DEFAULT 'Unknown',
            format TEXT NOT NULL,
            file_data BLOB NOT NULL,
            cover_data BLOB,
            file_size INTEGER NOT NULL DEFAULT 0,
            content_hash TEXT,
            added_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
            last_read_at INTEGER,
            progress REAL NOT NULL DEFAULT 0,
            current_page INTEGER NOT NULL DEFAULT 1,
            total_pages INTEGER NOT NULL DEFAULT 0,
            collections TEXT NOT NULL DEFAULT '[]',
            metadata TEXT NOT NULL DEFAULT '{}'
        )",
        "CREATE INDEX IF NOT EXISTS idx_books_title ON books(title)",
        "CREATE INDEX IF NOT EXISTS idx_books_author ON books(author)",
        "CREATE INDEX IF NOT EXISTS idx_books_format ON books(format)",
        "CREATE INDEX IF NOT EXISTS idx_books_added_at ON books(added_at)",
        "CREATE INDEX IF NOT EXISTS idx_books_last_read_at ON books(last_read_at)",
        "CREATE INDEX IF NOT EXISTS idx_books_content_hash ON books(content_hash)",
        "CREATE TABLE IF NOT EXISTS annotations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            book_id INTEGER NOT NULL,
            kind TEXT NOT NULL,
            page INTEGER NOT NULL DEFAULT 0,
            position TEXT NOT NULL DEFAULT '',
            content TEXT NOT NULL DEFAULT '',
            note TEXT,
            color TEXT NOT NULL DEFAULT '',
            created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
            FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE CASCADE
        )",
        "CREATE INDEX IF NOT EXISTS idx_annotations_book_id ON annotations(book_id)",
        "CREATE INDEX IF NOT EXISTS idx_annotations_kind ON annotations(kind)",
        "CREATE TABLE IF NOT EXISTS settings (
            id TEXT PRIMARY KEY,
            data TEXT NOT NULL,
            updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        )",
    ],
    // v2: reading sessions, collections
    &[
        "CREATE TABLE IF NOT EXISTS reading_sessions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            book_id INTEGER NOT NULL,
            start_time INTEGER NOT NULL,
            end_time INTEGER NOT NULL,
            duration INTEGER NOT NULL,
            pages_read INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE CASCADE
        )",
        "CREATE INDEX IF NOT EXISTS idx_sessions_book_id ON reading_sessions(book_id)",
        "CREATE INDEX IF NOT EXISTS idx_sessions_start_time ON reading_sessions(start_time)",
        "CREATE TABLE IF NOT EXISTS collections (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            book_ids TEXT NOT NULL DEFAULT '[]',
            created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
            updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        )",
        "CREATE INDEX IF NOT EXISTS idx_collections_name ON collections(name)",
    ],
];

pub const SCHEMA_VERSION: i64 = MIGRATIONS.len() as i64;

/// Opens (creating if needed) the library database under `data_dir` and migrates it.
pub async fn connect(config: &Config, data_dir: &Path) -> Result<SqlitePool> {
    tokio::fs::create_dir_all(data_dir).await?;
    let database_url = config.database_url(data_dir);
    let opts = SqliteConnectOptions::from_str(&database_url)?
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;
    migrate(&pool).await?;
    tracing::info!(path = %config.database_path(data_dir).display(), "library database ready");
    Ok(pool)
}

/// Single-connection in-memory pool, so every query sees the same database.
pub async fn connect_in_memory() -> Result<SqlitePool> {
    let opts = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(opts)
        .await?;
    migrate(&pool).await?;
    Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
        .execute(pool)
        .await?;

    let current = schema_version(pool).await?;
    if current > SCHEMA_VERSION {
        return Err(Error::Migration(format!(
            "database schema v{} is newer than this build (v{})",
            current, SCHEMA_VERSION
        )));
    }

    for (idx, statements) in MIGRATIONS.iter().enumerate().skip(current as usize) {
        let version = idx as i64 + 1;
        let mut tx = pool.begin().await?;
        for statement in statements.iter() {
            sqlx::query(*statement).execute(&mut *tx).await?;
        }
        sqlx::query("DELETE FROM schema_version")
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(version)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        tracing::debug!(version, "applied schema migration");
    }

    Ok(())
}

pub async fn schema_version(pool: &SqlitePool) -> Result<i64> {
    let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
        .fetch_one(pool)
        .await?;
    Ok(version.unwrap_or(0))
}
