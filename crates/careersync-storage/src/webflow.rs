//! Webflow CMS v2 collection items, live endpoints.

use async_trait::async_trait;
use careersync_core::{CanonicalRecord, ExistingRecord, ItemFieldData};
use reqwest::RequestBuilder;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info};

use crate::{CollectionStore, HttpFetcher, StoreError};

pub const DEFAULT_WEBFLOW_API_BASE: &str = "https://api.webflow.com/v2";

#[derive(Debug, Clone)]
pub struct WebflowConfig {
    pub api_base: String,
    pub api_token: String,
    pub cms_locale_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WebflowCollectionStore {
    client: reqwest::Client,
    config: WebflowConfig,
}

#[derive(Debug, Deserialize)]
struct ListItemsResponse {
    #[serde(default)]
    items: Vec<ExistingRecord>,
}

#[derive(Debug, Serialize)]
struct CreateItemsRequest {
    items: Vec<NewItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    cms_locale_id: Option<String>,
    is_archived: bool,
    is_draft: bool,
    field_data: ItemFieldData,
}

/// The live create endpoint answers with either an item list or a single item.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CreatedItems {
    Batch { items: Vec<ExistingRecord> },
    Single(Box<ExistingRecord>),
}

impl CreatedItems {
    fn into_vec(self) -> Vec<ExistingRecord> {
        match self {
            Self::Batch { items } => items,
            Self::Single(item) => vec![*item],
        }
    }
}

impl WebflowCollectionStore {
    pub fn new(http: &HttpFetcher, config: WebflowConfig) -> Self {
        Self {
            client: http.client().clone(),
            config,
        }
    }

    fn live_items_url(&self, collection_id: &str) -> String {
        format!(
            "{}/collections/{}/items/live",
            self.config.api_base.trim_end_matches('/'),
            collection_id
        )
    }

    fn live_item_url(&self, collection_id: &str, store_item_id: &str) -> String {
        format!(
            "{}/collections/{}/items/{}/live",
            self.config.api_base.trim_end_matches('/'),
            collection_id,
            store_item_id
        )
    }

    fn create_request(&self, records: &[CanonicalRecord]) -> CreateItemsRequest {
        CreateItemsRequest {
            items: records
                .iter()
                .map(|record| NewItem {
                    cms_locale_id: self.config.cms_locale_id.clone(),
                    is_archived: false,
                    is_draft: false,
                    field_data: ItemFieldData::from_record(record),
                })
                .collect(),
        }
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        req.bearer_auth(&self.config.api_token)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn send(&self, url: &str, req: RequestBuilder) -> Result<String, StoreError> {
        let resp = self.authorized(req).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(StoreError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
                body,
            });
        }
        Ok(body)
    }

    async fn send_json<T: DeserializeOwned>(&self, url: &str, req: RequestBuilder) -> Result<T, StoreError> {
        let body = self.send(url, req).await?;
        serde_json::from_str(&body).map_err(|source| StoreError::Decode {
            url: url.to_string(),
            source,
        })
    }
}

#[async_trait]
impl CollectionStore for WebflowCollectionStore {
    async fn list(&self, collection_id: &str) -> Result<Vec<ExistingRecord>, StoreError> {
        let url = self.live_items_url(collection_id);
        let resp: ListItemsResponse = self.send_json(&url, self.client.get(&url)).await?;
        debug!(collection_id, items = resp.items.len(), "listed live collection items");
        Ok(resp.items)
    }

    async fn create_many(
        &self,
        collection_id: &str,
        records: &[CanonicalRecord],
    ) -> Result<Vec<ExistingRecord>, StoreError> {
        let url = self.live_items_url(collection_id);
        let body = self.create_request(records);
        let created: CreatedItems = self.send_json(&url, self.client.post(&url).json(&body)).await?;
        let created = created.into_vec();
        info!(collection_id, created = created.len(), "created live collection items");
        Ok(created)
    }

    async fn delete_item(&self, collection_id: &str, store_item_id: &str) -> Result<(), StoreError> {
        let url = self.live_item_url(collection_id, store_item_id);
        self.send(&url, self.client.delete(&url)).await?;
        debug!(collection_id, store_item_id, "deleted live collection item");
        Ok(())
    }
}
