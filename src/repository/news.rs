//! Remote search repository

use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};

use super::NewsTransport;
use crate::model::News;
use crate::pipeline::{self, AsyncResult};

/// Search access for the news controller
#[derive(Clone)]
pub struct NewsRepository {
    transport: Arc<dyn NewsTransport>,
}

impl NewsRepository {
    pub fn new(transport: Arc<dyn NewsTransport>) -> Self {
        Self { transport }
    }

    /// Search for `query` on `page`.
    ///
    /// The query is trimmed first. A blank query never reaches the transport
    /// and yields a single empty `Success`.
    pub fn search(&self, query: &str, page: u32) -> BoxStream<'static, AsyncResult<News>> {
        let query = query.trim().to_string();
        if query.is_empty() {
            tracing::debug!("Blank search query, skipping request");
            return stream::once(async {
                AsyncResult::Success {
                    data: News::default(),
                }
            })
            .boxed();
        }

        let transport = Arc::clone(&self.transport);
        pipeline::one_shot(async move {
            tracing::debug!("Searching for \"{}\" (page {})", query, page);
            transport.search(&query, page).await
        })
    }
}
