use sqlx::types::Json;
use sqlx::{SqliteConnection, SqlitePool};

use crate::commands::book::fetch_book;
use crate::commands::unix_now;
use crate::error::{Error, Result};
use crate::models::Collection;

const COLLECTION_COLUMNS: &str = "id, name, description, book_ids, created_at, updated_at";

fn collection_not_found() -> Error {
    Error::NotFound("Collection not found".to_string())
}

fn normalize_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Invalid("Collection name cannot be empty".to_string()));
    }
    Ok(name.to_string())
}

pub(crate) async fn load_collections(conn: &mut SqliteConnection) -> Result<Vec<Collection>> {
    let sql = format!("SELECT {} FROM collections ORDER BY id", COLLECTION_COLUMNS);
    let collections = sqlx::query_as::<_, Collection>(&sql)
        .fetch_all(&mut *conn)
        .await?;
    Ok(collections)
}

async fn fetch_collection(conn: &mut SqliteConnection, id: i64) -> Result<Collection> {
    let sql = format!("SELECT {} FROM collections WHERE id = ?", COLLECTION_COLUMNS);
    sqlx::query_as::<_, Collection>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(collection_not_found)
}

pub(crate) async fn store_collection_members(
    conn: &mut SqliteConnection,
    id: i64,
    book_ids: &[i64],
    now: i64,
) -> Result<()> {
    sqlx::query("UPDATE collections SET book_ids = ?, updated_at = ? WHERE id = ?")
        .bind(Json(book_ids))
        .bind(now)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn store_book_collections(
    conn: &mut SqliteConnection,
    book_id: i64,
    ids: &[i64],
) -> Result<()> {
    sqlx::query("UPDATE books SET collections = ? WHERE id = ?")
        .bind(Json(ids))
        .bind(book_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn list_collections(pool: &SqlitePool) -> Result<Vec<Collection>> {
    let mut conn = pool.acquire().await?;
    load_collections(&mut conn).await
}

pub async fn get_collection(pool: &SqlitePool, id: i64) -> Result<Collection> {
    let mut conn = pool.acquire().await?;
    fetch_collection(&mut conn, id).await
}

pub async fn create_collection(pool: &SqlitePool, name: &str) -> Result<Collection> {
    let name = normalize_name(name)?;
    let now = unix_now();

    let mut conn = pool.acquire().await?;
    let result = sqlx::query(
        "INSERT INTO collections (name, description, book_ids, created_at, updated_at)
         VALUES (?, '', '[]', ?, ?)",
    )
    .bind(&name)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    fetch_collection(&mut conn, result.last_insert_rowid()).await
}

pub async fn rename_collection(pool: &SqlitePool, id: i64, name: &str) -> Result<Collection> {
    let name = normalize_name(name)?;
    let mut conn = pool.acquire().await?;

    let result = sqlx::query("UPDATE collections SET name = ?, updated_at = ? WHERE id = ?")
        .bind(&name)
        .bind(unix_now())
        .bind(id)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(collection_not_found());
    }

    fetch_collection(&mut conn, id).await
}

/// Removes the collection and its id from every member book.
pub async fn delete_collection(pool: &SqlitePool, id: i64) -> Result<()> {
    let mut tx = pool.begin().await?;
    let collection = fetch_collection(&mut tx, id).await?;

    let members: Vec<(i64, Json<Vec<i64>>)> = sqlx::query_as(
        "SELECT id, collections FROM books
         WHERE EXISTS (SELECT 1 FROM json_each(books.collections) WHERE json_each.value = ?)",
    )
    .bind(id)
    .fetch_all(&mut *tx)
    .await?;

    for (book_id, Json(mut ids)) in members {
        ids.retain(|c| *c != id);
        store_book_collections(&mut tx, book_id, &ids).await?;
    }

    sqlx::query("DELETE FROM collections WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(collection_id = id, name = %collection.name, "deleted collection");
    Ok(())
}

/// Adds one book to one collection, updating both sides.
pub async fn add_book_to_collection(
    pool: &SqlitePool,
    collection_id: i64,
    book_id: i64,
) -> Result<Collection> {
    let mut tx = pool.begin().await?;
    let mut collection = fetch_collection(&mut tx, collection_id).await?;
    let mut book = fetch_book(&mut *tx, book_id).await?;

    if !book.collections.contains(&collection_id) {
        book.collections.push(collection_id);
        store_book_collections(&mut tx, book_id, &book.collections).await?;
    }
    if !collection.book_ids.contains(&book_id) {
        collection.book_ids.push(book_id);
        store_collection_members(&mut tx, collection_id, &collection.book_ids, unix_now()).await?;
    }

    let collection = fetch_collection(&mut tx, collection_id).await?;
    tx.commit().await?;
    Ok(collection)
}

pub async fn remove_book_from_collection(
    pool: &SqlitePool,
    collection_id: i64,
    book_id: i64,
) -> Result<Collection> {
    let mut tx = pool.begin().await?;
    let mut collection = fetch_collection(&mut tx, collection_id).await?;
    let mut book = fetch_book(&mut *tx, book_id).await?;

    if book.collections.contains(&collection_id) {
        book.collections.retain(|c| *c != collection_id);
        store_book_collections(&mut tx, book_id, &book.collections).await?;
    }
    if collection.book_ids.contains(&book_id) {
        collection.book_ids.retain(|b| *b != book_id);
        store_collection_members(&mut tx, collection_id, &collection.book_ids, unix_now()).await?;
    }

    let collection = fetch_collection(&mut tx, collection_id).await?;
    tx.commit().await?;
    Ok(collection)
}
