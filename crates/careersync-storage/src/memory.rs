use std::collections::HashMap;

use async_trait::async_trait;
use careersync_core::{CanonicalRecord, ExistingRecord, ItemFieldData, PerItemResult};
use tokio::sync::Mutex;

use crate::{delete_concurrently, CollectionStore, StoreError};

/// One call received by a [`MemoryCollectionStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    List { collection_id: String },
    CreateMany { collection_id: String, slugs: Vec<String> },
    DeleteMany { collection_id: String, store_item_ids: Vec<String> },
    DeleteItem { collection_id: String, store_item_id: String },
}

/// In-process collection store with injectable failures and a call journal.
/// A test double for tests and dry runs; nothing is persisted.
#[derive(Debug, Default)]
pub struct MemoryCollectionStore {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    collections: HashMap<String, Vec<ExistingRecord>>,
    next_item: u64,
    list_failure: Option<String>,
    create_failure: Option<String>,
    delete_failures: HashMap<String, String>,
    calls: Vec<StoreCall>,
}

impl MemoryCollectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(mut self, collection_id: &str, items: Vec<ExistingRecord>) -> Self {
        self.state
            .get_mut()
            .collections
            .entry(collection_id.to_string())
            .or_default()
            .extend(items);
        self
    }

    pub fn fail_list_with(mut self, message: &str) -> Self {
        self.state.get_mut().list_failure = Some(message.to_string());
        self
    }

    pub fn fail_create_with(mut self, message: &str) -> Self {
        self.state.get_mut().create_failure = Some(message.to_string());
        self
    }

    pub fn fail_delete_of(mut self, store_item_id: &str, message: &str) -> Self {
        self.state
            .get_mut()
            .delete_failures
            .insert(store_item_id.to_string(), message.to_string());
        self
    }

    pub async fn items(&self, collection_id: &str) -> Vec<ExistingRecord> {
        self.state
            .lock()
            .await
            .collections
            .get(collection_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn calls(&self) -> Vec<StoreCall> {
        self.state.lock().await.calls.clone()
    }
}

#[async_trait]
impl CollectionStore for MemoryCollectionStore {
    async fn list(&self, collection_id: &str) -> Result<Vec<ExistingRecord>, StoreError> {
        let mut state = self.state.lock().await;
        state.calls.push(StoreCall::List {
            collection_id: collection_id.to_string(),
        });
        if let Some(message) = &state.list_failure {
            return Err(StoreError::Message(message.clone()));
        }
        Ok(state.collections.get(collection_id).cloned().unwrap_or_default())
    }

    async fn create_many(
        &self,
        collection_id: &str,
        records: &[CanonicalRecord],
    ) -> Result<Vec<ExistingRecord>, StoreError> {
        let mut state = self.state.lock().await;
        state.calls.push(StoreCall::CreateMany {
            collection_id: collection_id.to_string(),
            slugs: records
                .iter()
                .map(|r| r.slug().unwrap_or_default().to_string())
                .collect(),
        });
        if let Some(message) = &state.create_failure {
            return Err(StoreError::Message(message.clone()));
        }

        let mut created = Vec::with_capacity(records.len());
        for record in records {
            state.next_item += 1;
            created.push(ExistingRecord::new(
                format!("item-{}", state.next_item),
                ItemFieldData::from_record(record),
            ));
        }
        state
            .collections
            .entry(collection_id.to_string())
            .or_default()
            .extend(created.iter().cloned());
        Ok(created)
    }

    async fn delete_item(&self, collection_id: &str, store_item_id: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.calls.push(StoreCall::DeleteItem {
            collection_id: collection_id.to_string(),
            store_item_id: store_item_id.to_string(),
        });
        if let Some(message) = state.delete_failures.get(store_item_id) {
            return Err(StoreError::Message(message.clone()));
        }
        let items = state.collections.entry(collection_id.to_string()).or_default();
        let before = items.len();
        items.retain(|item| item.store_item_id != store_item_id);
        if items.len() == before {
            return Err(StoreError::Message(format!(
                "item {store_item_id} not found in collection {collection_id}"
            )));
        }
        Ok(())
    }

    async fn delete_many(&self, collection_id: &str, store_item_ids: &[String]) -> Vec<PerItemResult> {
        self.state.lock().await.calls.push(StoreCall::DeleteMany {
            collection_id: collection_id.to_string(),
            store_item_ids: store_item_ids.to_vec(),
        });
        delete_concurrently(self, collection_id, store_item_ids).await
    }
}
