//! HTTP fetch utilities and the collection store seam for careersync.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use careersync_core::{CanonicalRecord, ExistingRecord, PerItemResult};
use futures::future::join_all;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{info_span, warn, Instrument};

/// Test doubles.
mod memory;
mod webflow;

pub use memory::{MemoryCollectionStore, StoreCall};
pub use webflow::{WebflowCollectionStore, WebflowConfig, DEFAULT_WEBFLOW_API_BASE};

pub const CRATE_NAME: &str = "careersync-storage";

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub user_agent: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            user_agent: None,
        }
    }
}

/// Shared reqwest client for listing pages and collection API calls.
/// Requests are issued once; a failed run is retried by the next invocation.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

#[derive(Debug, Clone)]
pub struct FetchedResponse {
    pub status: StatusCode,
    pub final_url: String,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
}

impl HttpFetcher {
    pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder.build().context("building reqwest client")?;
        Ok(Self { client })
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub async fn fetch_text(&self, source_id: &str, url: &str) -> Result<FetchedResponse, FetchError> {
        let span = info_span!("http_fetch", source_id, url);
        async {
            let resp = self.client.get(url).send().await?;
            let status = resp.status();
            let final_url = resp.url().to_string();
            if !status.is_success() {
                return Err(FetchError::HttpStatus {
                    status: status.as_u16(),
                    url: final_url,
                });
            }
            let body = resp.text().await?;
            Ok(FetchedResponse {
                status,
                final_url,
                body,
            })
        }
        .instrument(span)
        .await
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("collection request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("collection api returned {status} for {url}: {body}")]
    HttpStatus { status: u16, url: String, body: String },
    #[error("unreadable collection response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{0}")]
    Message(String),
}

/// Remote collection of job items, addressed by collection id.
#[async_trait]
pub trait CollectionStore: Send + Sync {
    async fn list(&self, collection_id: &str) -> Result<Vec<ExistingRecord>, StoreError>;

    /// Creates all records in one batched request and returns the created items.
    async fn create_many(
        &self,
        collection_id: &str,
        records: &[CanonicalRecord],
    ) -> Result<Vec<ExistingRecord>, StoreError>;

    async fn delete_item(&self, collection_id: &str, store_item_id: &str) -> Result<(), StoreError>;

    /// Deletes every item independently. The returned results follow the order of `store_item_ids`.
    async fn delete_many(&self, collection_id: &str, store_item_ids: &[String]) -> Vec<PerItemResult> {
        delete_concurrently(self, collection_id, store_item_ids).await
    }
}

/// Issues one `delete_item` per id concurrently; a failure never cancels its siblings.
pub async fn delete_concurrently<S>(
    store: &S,
    collection_id: &str,
    store_item_ids: &[String],
) -> Vec<PerItemResult>
where
    S: CollectionStore + ?Sized,
{
    let requests = store_item_ids.iter().map(|id| async move {
        match store.delete_item(collection_id, id).await {
            Ok(()) => PerItemResult::succeeded(id.as_str()),
            Err(err) => {
                warn!(collection_id, store_item_id = %id, error = %err, "collection item deletion failed");
                PerItemResult::failed(id.as_str(), err.to_string())
            }
        }
    });
    join_all(requests).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use careersync_core::ItemFieldData;
    use tokio::time::{sleep, Instant};

    /// Each delete sleeps for its own delay; `failing` is rejected after sleeping.
    struct SlowDeleteStore {
        delays_ms: Vec<(&'static str, u64)>,
        failing: &'static str,
    }

    #[async_trait]
    impl CollectionStore for SlowDeleteStore {
        async fn list(&self, _collection_id: &str) -> Result<Vec<ExistingRecord>, StoreError> {
            Ok(Vec::new())
        }

        async fn create_many(
            &self,
            _collection_id: &str,
            _records: &[CanonicalRecord],
        ) -> Result<Vec<ExistingRecord>, StoreError> {
            Ok(Vec::new())
        }

        async fn delete_item(&self, _collection_id: &str, store_item_id: &str) -> Result<(), StoreError> {
            let delay = self
                .delays_ms
                .iter()
                .find(|(id, _)| *id == store_item_id)
                .map_or(0, |(_, ms)| *ms);
            sleep(Duration::from_millis(delay)).await;
            if store_item_id == self.failing {
                return Err(StoreError::Message("item is locked".into()));
            }
            Ok(())
        }
    }

    fn item(id: &str, slug: &str) -> ExistingRecord {
        ExistingRecord::new(
            id,
            ItemFieldData {
                slug: Some(slug.to_string()),
                ..ItemFieldData::default()
            },
        )
    }

    #[test]
    fn default_http_config_has_timeout() {
        let config = HttpClientConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(20));
        assert!(HttpFetcher::new(config).is_ok());
    }

    #[tokio::test]
    async fn delete_many_keeps_input_order_and_isolates_failures() {
        let store = MemoryCollectionStore::new()
            .with_items("jobs", vec![item("a", "one"), item("b", "two"), item("c", "three")])
            .fail_delete_of("b", "item is locked");

        let ids = vec!["c".to_string(), "b".to_string(), "a".to_string()];
        let results = store.delete_many("jobs", &ids).await;

        assert_eq!(
            results,
            vec![
                PerItemResult::succeeded("c"),
                PerItemResult::failed("b", "item is locked"),
                PerItemResult::succeeded("a"),
            ]
        );
        let remaining = store.items("jobs").await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].store_item_id, "b");
    }

    #[tokio::test(start_paused = true)]
    async fn deletes_overlap_and_results_follow_input_order() {
        let store = SlowDeleteStore {
            delays_ms: vec![("a", 300), ("b", 50), ("c", 50)],
            failing: "b",
        };
        let ids = vec!["a".to_string(), "b".to_string(), "c".to_string()];

        let started = Instant::now();
        let results = store.delete_many("jobs", &ids).await;
        let elapsed = started.elapsed();

        assert_eq!(
            results,
            vec![
                PerItemResult::succeeded("a"),
                PerItemResult::failed("b", "item is locked"),
                PerItemResult::succeeded("c"),
            ]
        );
        assert!(elapsed >= Duration::from_millis(300));
        assert!(elapsed < Duration::from_millis(400), "deletes ran one after another: {elapsed:?}");
    }

    #[tokio::test]
    async fn deleting_unknown_item_reports_failure() {
        let store = MemoryCollectionStore::new();
        let results = store.delete_many("jobs", &["missing".to_string()]).await;
        assert_eq!(results.len(), 1);
        assert!(!results[0].ok);
        assert!(results[0].error.as_deref().unwrap().contains("missing"));
    }
}
