//! Fakes shared by the unit tests

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::mpsc;

use crate::cache::ImageCache;
use crate::db::StoreError;
use crate::model::{Article, News, Source};
use crate::news_api::NewsApiError;
use crate::repository::{ArticleStore, NewsTransport};

/// Unsaved article with a url derived from its title
pub fn sample_article(title: &str) -> Article {
    Article {
        id: None,
        author: Some("Staff".to_string()),
        title: title.to_string(),
        description: Some(format!("About {}", title)),
        content: None,
        published_at: "2024-03-01T08:00:00Z".to_string(),
        source: Source::named("Example Times"),
        url: format!(
            "https://example.com/{}",
            title.to_lowercase().replace(' ', "-")
        ),
        url_to_image: None,
    }
}

/// Transport answering from per-query queues.
///
/// A query with no queued answer gets an empty `News`.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<HashMap<String, VecDeque<Result<News, NewsApiError>>>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: Mutex<Vec<(String, u32)>>,
    answered: AtomicUsize,
}

impl ScriptedTransport {
    pub fn respond(&self, query: &str, response: Result<News, NewsApiError>) {
        self.responses
            .lock()
            .unwrap()
            .entry(query.to_string())
            .or_default()
            .push_back(response);
    }

    /// Hold every answer to `query` back by `delay`
    pub fn delay(&self, query: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(query.to_string(), delay);
    }

    pub fn calls(&self) -> Vec<(String, u32)> {
        self.calls.lock().unwrap().clone()
    }

    /// Searches that ran to the end, delay included
    pub fn answered(&self) -> usize {
        self.answered.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NewsTransport for ScriptedTransport {
    async fn search(&self, query: &str, page: u32) -> Result<News, NewsApiError> {
        self.calls.lock().unwrap().push((query.to_string(), page));

        let delay = self.delays.lock().unwrap().get(query).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let response = self
            .responses
            .lock()
            .unwrap()
            .get_mut(query)
            .and_then(VecDeque::pop_front);
        self.answered.fetch_add(1, Ordering::SeqCst);
        response.unwrap_or_else(|| Ok(News::default()))
    }
}

/// Store whose snapshots are pushed by the test
pub struct ScriptedStore {
    tx: mpsc::UnboundedSender<Result<Vec<Article>, StoreError>>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<Result<Vec<Article>, StoreError>>>>,
    fail_writes: AtomicBool,
    write_delay: Mutex<Option<Duration>>,
    upserts: Mutex<Vec<Article>>,
    removes: Mutex<Vec<Article>>,
}

impl Default for ScriptedStore {
    fn default() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
            fail_writes: AtomicBool::new(false),
            write_delay: Mutex::new(None),
            upserts: Mutex::new(Vec::new()),
            removes: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedStore {
    /// Deliver a snapshot (or failure) to the observer
    pub fn emit(&self, snapshot: Result<Vec<Article>, StoreError>) {
        let _ = self.tx.send(snapshot);
    }

    /// Whether an observer is still attached to the snapshot feed
    pub fn observed(&self) -> bool {
        !self.tx.is_closed()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn upserts(&self) -> Vec<Article> {
        self.upserts.lock().unwrap().clone()
    }

    pub fn removes(&self) -> Vec<Article> {
        self.removes.lock().unwrap().clone()
    }

    /// Hold every write back by `delay` before it takes effect
    pub fn delay_writes(&self, delay: Duration) {
        *self.write_delay.lock().unwrap() = Some(delay);
    }

    async fn check_write(&self) -> Result<(), StoreError> {
        let delay = *self.write_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("disk full")));
        }
        Ok(())
    }
}

#[async_trait]
impl ArticleStore for ScriptedStore {
    /// Only the first observer receives snapshots
    fn observe_all(&self) -> BoxStream<'static, Result<Vec<Article>, StoreError>> {
        match self.rx.lock().unwrap().take() {
            Some(rx) => stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            })
            .boxed(),
            None => stream::pending().boxed(),
        }
    }

    async fn upsert(&self, article: &Article) -> Result<i64, StoreError> {
        self.check_write().await?;
        let mut upserts = self.upserts.lock().unwrap();
        upserts.push(article.clone());
        Ok(article.id.unwrap_or(upserts.len() as i64))
    }

    async fn remove(&self, article: &Article) -> Result<bool, StoreError> {
        self.check_write().await?;
        self.removes.lock().unwrap().push(article.clone());
        Ok(true)
    }
}

/// Image cache that counts `clear` calls
#[derive(Default)]
pub struct CountingImageCache {
    clears: AtomicUsize,
}

impl CountingImageCache {
    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

impl ImageCache for CountingImageCache {
    fn clear(&self) -> anyhow::Result<()> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
