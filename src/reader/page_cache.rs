use base64::{engine::general_purpose::STANDARD, Engine as _};
use moka::future::Cache as MokaCache;
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::commands::book::book_file;
use crate::error::{Error, Result};
use crate::formats::comic::{ComicArchive, ComicPage};
use crate::formats::BookFormat;

type PageKey = (i64, usize);
type OpenArchive = Arc<Mutex<ComicArchive>>;

/// Decoded comic pages shared by every open viewer, bounded by total image bytes.
#[derive(Clone)]
pub struct ComicPageCache {
    cache: MokaCache<PageKey, Arc<ComicPage>>,
    // pages held per book, so a closed book can be dropped in one go
    keys: Arc<RwLock<HashMap<i64, HashSet<usize>>>>,
    // opened once per book and kept until the viewer closes
    archives: Arc<RwLock<HashMap<i64, OpenArchive>>>,
}

impl ComicPageCache {
    pub fn new(max_bytes: u64) -> Self {
        let cache = MokaCache::builder()
            .weigher(|_k: &PageKey, v: &Arc<ComicPage>| {
                u32::try_from(v.data.len()).unwrap_or(u32::MAX)
            })
            .max_capacity(max_bytes)
            .build();
        Self {
            cache,
            keys: Arc::new(RwLock::new(HashMap::new())),
            archives: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn get(&self, book_id: i64, index: usize) -> Option<Arc<ComicPage>> {
        self.cache.get(&(book_id, index)).await
    }

    pub async fn insert(&self, book_id: i64, page: ComicPage) -> Arc<ComicPage> {
        let index = page.index;
        let page = Arc::new(page);
        self.cache.insert((book_id, index), Arc::clone(&page)).await;
        self.keys.write().await.entry(book_id).or_default().insert(index);
        page
    }

    /// Zero-based page of a comic book, read from the open archive on a miss.
    pub async fn page(
        &self,
        pool: &SqlitePool,
        book_id: i64,
        index: usize,
    ) -> Result<Arc<ComicPage>> {
        if let Some(page) = self.get(book_id, index).await {
            return Ok(page);
        }

        let archive = self.archive(pool, book_id).await?;
        let page = tokio::task::spawn_blocking(move || archive.blocking_lock().read_page(index))
            .await??;
        tracing::debug!(book_id, index, bytes = page.data.len(), "cached comic page");

        Ok(self.insert(book_id, page).await)
    }

    /// Image entry names in reading order.
    pub async fn page_names(&self, pool: &SqlitePool, book_id: i64) -> Result<Vec<String>> {
        let archive = self.archive(pool, book_id).await?;
        let names = archive.lock().await.page_names().to_vec();
        Ok(names)
    }

    async fn archive(&self, pool: &SqlitePool, book_id: i64) -> Result<OpenArchive> {
        if let Some(archive) = self.archives.read().await.get(&book_id) {
            return Ok(Arc::clone(archive));
        }

        let bytes = comic_bytes(pool, book_id).await?;
        let opened = tokio::task::spawn_blocking(move || ComicArchive::open(bytes)).await??;
        tracing::debug!(book_id, pages = opened.page_count(), "opened comic archive");

        let mut archives = self.archives.write().await;
        // another viewer may have opened it while this one was parsing
        let archive = archives
            .entry(book_id)
            .or_insert_with(|| Arc::new(Mutex::new(opened)));
        Ok(Arc::clone(archive))
    }

    pub async fn archive_open(&self, book_id: i64) -> bool {
        self.archives.read().await.contains_key(&book_id)
    }

    /// Drops the open archive and every cached page of a book, when its viewer closes.
    pub async fn release(&self, book_id: i64) {
        self.archives.write().await.remove(&book_id);
        let Some(indexes) = self.keys.write().await.remove(&book_id) else {
            return;
        };
        for index in indexes {
            self.cache.invalidate(&(book_id, index)).await;
        }
    }

    pub async fn clear(&self) {
        self.cache.invalidate_all();
        self.keys.write().await.clear();
        self.archives.write().await.clear();
    }

    pub async fn contains(&self, book_id: i64, index: usize) -> bool {
        self.cache.contains_key(&(book_id, index))
    }
}

pub fn page_data_url(page: &ComicPage) -> String {
    format!("data:{};base64,{}", page.mime_type, STANDARD.encode(&page.data))
}

async fn comic_bytes(pool: &SqlitePool, book_id: i64) -> Result<Vec<u8>> {
    let format: BookFormat = sqlx::query_scalar("SELECT format FROM books WHERE id = ?")
        .bind(book_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(Error::book_not_found)?;

    match format {
        BookFormat::Cbz => book_file(pool, book_id).await,
        BookFormat::Cbr => Err(Error::Invalid("CBR archives cannot be opened".to_string())),
        _ => Err(Error::Invalid("Not a comic book".to_string())),
    }
}
