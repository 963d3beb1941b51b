//! SQLite-backed article store.
//!
//! Saved articles live in a single `article` table. The database is stored at
//! the platform data directory (`newsreader.db`) unless the configuration
//! overrides the path.
//!
//! Every successful write bumps a version counter on a `watch` channel. Each
//! observer re-reads the table when the counter moves, so a write is always
//! visible in the observer's next snapshot. Several writes in quick succession
//! may collapse into one snapshot.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use rusqlite::{Connection, params};
use thiserror::Error;
use tokio::sync::watch;

use crate::model::{Article, Source};
use crate::pipeline::{ErrorInfo, ErrorKind};
use crate::repository::ArticleStore;

/// Errors raised by the article store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Article has not been saved yet")]
    NotPersisted,

    #[error("Database connection is unusable after a panic")]
    Poisoned,

    #[error("Store task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StoreError> for ErrorInfo {
    fn from(e: StoreError) -> Self {
        ErrorInfo::new(ErrorKind::Store, e.to_string())
    }
}

/// Article store on a single SQLite connection
pub struct SqliteArticleStore {
    conn: Arc<Mutex<Connection>>,
    version: watch::Sender<u64>,
}

impl SqliteArticleStore {
    /// Default database location in the platform data directory
    pub fn default_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("com", "newsreader", "Newsreader")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;

        let data_dir = dirs.data_dir();
        std::fs::create_dir_all(data_dir)?;

        Ok(data_dir.join("newsreader.db"))
    }

    /// Open or create the database at `path`
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self::with_connection(conn)?;

        tracing::info!("Opened article store at {:?}", path);
        Ok(store)
    }

    /// Throwaway store, used by tests
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        init_schema(&conn)?;
        let (version, _) = watch::channel(0);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            version,
        })
    }

    /// Run `f` against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        run_blocking(Arc::clone(&self.conn), f).await
    }

    fn bump_version(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}

fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS article (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            author TEXT,
            title TEXT NOT NULL,
            description TEXT,
            content TEXT,
            published_at TEXT NOT NULL,
            source TEXT NOT NULL,
            url TEXT NOT NULL,
            url_to_image TEXT
        );
        ",
    )?;
    Ok(())
}

async fn run_blocking<T, F>(conn: Arc<Mutex<Connection>>, f: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let conn = conn.lock().map_err(|_| StoreError::Poisoned)?;
        f(&*conn)
    })
    .await?
}

fn select_all(conn: &Connection) -> Result<Vec<Article>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, author, title, description, content, published_at, source, url, url_to_image
         FROM article ORDER BY id DESC",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok(Article {
            id: row.get(0)?,
            author: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            content: row.get(4)?,
            published_at: row.get(5)?,
            source: Source::named(row.get::<_, String>(6)?),
            url: row.get(7)?,
            url_to_image: row.get(8)?,
        })
    })?;

    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

#[async_trait]
impl ArticleStore for SqliteArticleStore {
    fn observe_all(&self) -> BoxStream<'static, Result<Vec<Article>, StoreError>> {
        let conn = Arc::clone(&self.conn);
        let mut rx = self.version.subscribe();
        // First poll reads the table without waiting for a write
        rx.mark_changed();

        stream::unfold((conn, rx), |(conn, mut rx)| async move {
            if rx.changed().await.is_err() {
                // Store dropped
                return None;
            }
            let snapshot = run_blocking(Arc::clone(&conn), select_all).await;
            Some((snapshot, (conn, rx)))
        })
        .boxed()
    }

    async fn upsert(&self, article: &Article) -> Result<i64, StoreError> {
        let article = article.clone();
        let id = self
            .with_conn(move |conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO article
                     (id, author, title, description, content, published_at, source, url, url_to_image)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        article.id,
                        article.author,
                        article.title,
                        article.description,
                        article.content,
                        article.published_at,
                        article.source.name,
                        article.url,
                        article.url_to_image,
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;

        self.bump_version();
        Ok(id)
    }

    async fn remove(&self, article: &Article) -> Result<bool, StoreError> {
        let id = article.id.ok_or(StoreError::NotPersisted)?;
        let deleted = self
            .with_conn(move |conn| Ok(conn.execute("DELETE FROM article WHERE id = ?", params![id])?))
            .await?;

        if deleted == 0 {
            tracing::debug!("Remove: no article with id {}", id);
            return Ok(false);
        }
        self.bump_version();
        Ok(true)
    }
}
