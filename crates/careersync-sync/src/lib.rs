//! Sync pipeline: reconcile a job board listing against a CMS collection.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use careersync_adapters::{AdapterError, BreezyListingFetcher, SourceFetcher};
use careersync_core::{CanonicalRecord, ExistingRecord, PerItemResult};
use careersync_storage::{
    CollectionStore, HttpClientConfig, HttpFetcher, StoreError, WebflowCollectionStore, WebflowConfig,
    DEFAULT_WEBFLOW_API_BASE,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

pub mod reconcile;

pub use reconcile::{reconcile, ReconciliationResult};

pub const CRATE_NAME: &str = "careersync-sync";

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub targets_path: PathBuf,
    pub webflow_api_base: String,
    pub webflow_api_token: Option<String>,
    pub user_agent: String,
    pub http_timeout_secs: u64,
}

impl SyncConfig {
    pub fn from_env() -> Self {
        Self {
            targets_path: std::env::var("CAREERSYNC_TARGETS")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./targets.yaml")),
            webflow_api_base: std::env::var("WEBFLOW_API_BASE")
                .unwrap_or_else(|_| DEFAULT_WEBFLOW_API_BASE.to_string()),
            webflow_api_token: std::env::var("WEBFLOW_API_KEY").ok().filter(|v| !v.trim().is_empty()),
            user_agent: std::env::var("CAREERSYNC_USER_AGENT")
                .unwrap_or_else(|_| "careersync-bot/0.1".to_string()),
            http_timeout_secs: std::env::var("CAREERSYNC_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(20),
        }
    }

    pub fn http_fetcher(&self) -> Result<HttpFetcher> {
        HttpFetcher::new(HttpClientConfig {
            timeout: Duration::from_secs(self.http_timeout_secs),
            user_agent: Some(self.user_agent.clone()),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TargetRegistry {
    pub targets: Vec<SyncTarget>,
}

/// One job board kept in sync with one collection.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SyncTarget {
    pub target_id: String,
    pub display_name: String,
    pub enabled: bool,
    pub listing_url: String,
    pub base_url: String,
    pub collection_id: String,
    #[serde(default)]
    pub cms_locale_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl TargetRegistry {
    pub fn enabled(&self) -> impl Iterator<Item = &SyncTarget> {
        self.targets.iter().filter(|t| t.enabled)
    }

    pub fn find_enabled(&self, target_id: &str) -> Option<&SyncTarget> {
        self.enabled().find(|t| t.target_id == target_id)
    }
}

pub async fn load_target_registry(path: &Path) -> Result<TargetRegistry> {
    let text = fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let registry: TargetRegistry =
        serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    for target in &registry.targets {
        anyhow::ensure!(
            !target.collection_id.trim().is_empty(),
            "target {} in {} has an empty collection_id",
            target.target_id,
            path.display()
        );
    }
    Ok(registry)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Success,
    Error,
}

/// Structured result of one run, serialized with the endpoint's field names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncOutcome {
    pub status: SyncStatus,
    #[serde(rename = "newJobs")]
    pub desired_new: Vec<CanonicalRecord>,
    #[serde(rename = "jobsToRemove")]
    pub to_remove: Vec<ExistingRecord>,
    #[serde(rename = "addedJobsOutput")]
    pub created: Vec<ExistingRecord>,
    #[serde(rename = "removedJobsOutput")]
    pub removal_results: Vec<PerItemResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SyncOutcome {
    pub fn success(
        desired_new: Vec<CanonicalRecord>,
        to_remove: Vec<ExistingRecord>,
        created: Vec<ExistingRecord>,
        removal_results: Vec<PerItemResult>,
    ) -> Self {
        Self {
            status: SyncStatus::Success,
            desired_new,
            to_remove,
            created,
            removal_results,
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: SyncStatus::Error,
            desired_new: Vec::new(),
            to_remove: Vec::new(),
            created: Vec::new(),
            removal_results: Vec::new(),
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == SyncStatus::Success
    }
}

/// Failures that end a run before it completes.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("fetching postings failed: {0}")]
    Fetch(AdapterError),
    #[error("listing collection items failed: {0}")]
    StoreList(StoreError),
    #[error("creating collection items failed: {0}")]
    StoreWrite(StoreError),
}

/// Drives one fetch, diff and apply cycle against a single collection.
pub struct SyncOrchestrator {
    source: Arc<dyn SourceFetcher>,
    store: Arc<dyn CollectionStore>,
    collection_id: String,
}

impl SyncOrchestrator {
    pub fn new(
        source: Arc<dyn SourceFetcher>,
        store: Arc<dyn CollectionStore>,
        collection_id: impl Into<String>,
    ) -> Self {
        Self {
            source,
            store,
            collection_id: collection_id.into(),
        }
    }

    /// Runs one pass. Fatal failures are folded into an error outcome.
    pub async fn run(&self) -> SyncOutcome {
        let run_id = Uuid::new_v4();
        let span = info_span!(
            "sync_run",
            %run_id,
            source_id = self.source.source_id(),
            collection_id = %self.collection_id
        );
        async {
            match self.try_run().await {
                Ok(outcome) => outcome,
                Err(err) => {
                    error!(error = %err, "sync run failed");
                    SyncOutcome::error(err.to_string())
                }
            }
        }
        .instrument(span)
        .await
    }

    pub async fn try_run(&self) -> Result<SyncOutcome, SyncError> {
        let (desired, existing) = tokio::join!(
            self.source.fetch_records(),
            self.store.list(&self.collection_id)
        );
        let desired = desired.map_err(SyncError::Fetch)?;
        let existing = existing.map_err(SyncError::StoreList)?;

        let unidentified = desired.iter().filter(|r| r.slug().is_none()).count();
        if unidentified > 0 {
            warn!(unidentified, "postings without a slug are left out of the sync");
        }

        let ReconciliationResult { to_add, to_remove } = reconcile(&desired, &existing);
        info!(
            desired = desired.len(),
            existing = existing.len(),
            to_add = to_add.len(),
            to_remove = to_remove.len(),
            "reconciled listing against collection"
        );

        let created = if to_add.is_empty() {
            Vec::new()
        } else {
            self.store
                .create_many(&self.collection_id, &to_add)
                .await
                .map_err(SyncError::StoreWrite)?
        };

        let removal_results = if to_remove.is_empty() {
            Vec::new()
        } else {
            let store_item_ids = to_remove
                .iter()
                .map(|item| item.store_item_id.clone())
                .collect::<Vec<_>>();
            self.store.delete_many(&self.collection_id, &store_item_ids).await
        };

        let failed_removals = removal_results.iter().filter(|r| !r.ok).count();
        info!(
            created = created.len(),
            removed = removal_results.len() - failed_removals,
            failed_removals,
            "sync run complete"
        );

        Ok(SyncOutcome::success(to_add, to_remove, created, removal_results))
    }
}

pub fn source_for_target(target: &SyncTarget, http: &HttpFetcher) -> Arc<dyn SourceFetcher> {
    Arc::new(BreezyListingFetcher::new(
        target.target_id.clone(),
        target.listing_url.clone(),
        target.base_url.clone(),
        http.clone(),
    ))
}

pub fn store_for_target(
    config: &SyncConfig,
    target: &SyncTarget,
    http: &HttpFetcher,
) -> Result<Arc<dyn CollectionStore>> {
    let api_token = config
        .webflow_api_token
        .clone()
        .with_context(|| format!("WEBFLOW_API_KEY is required to sync target {}", target.target_id))?;
    Ok(Arc::new(WebflowCollectionStore::new(
        http,
        WebflowConfig {
            api_base: config.webflow_api_base.clone(),
            api_token,
            cms_locale_id: target.cms_locale_id.clone(),
        },
    )))
}

pub fn orchestrator_for_target(
    config: &SyncConfig,
    target: &SyncTarget,
    http: &HttpFetcher,
) -> Result<SyncOrchestrator> {
    Ok(SyncOrchestrator::new(
        source_for_target(target, http),
        store_for_target(config, target, http)?,
        target.collection_id.clone(),
    ))
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetRun {
    pub target_id: String,
    pub outcome: SyncOutcome,
}

/// Runs every enabled target (or only `only_target`) one after another.
pub async fn run_targets_from_env(only_target: Option<&str>) -> Result<Vec<TargetRun>> {
    let config = SyncConfig::from_env();
    let registry = load_target_registry(&config.targets_path).await?;
    let http = config.http_fetcher()?;

    let targets = registry
        .enabled()
        .filter(|t| only_target.map_or(true, |id| t.target_id == id))
        .collect::<Vec<_>>();
    if let Some(id) = only_target {
        anyhow::ensure!(!targets.is_empty(), "no enabled target named {id}");
    }

    let mut runs = Vec::with_capacity(targets.len());
    for target in targets {
        let orchestrator = orchestrator_for_target(&config, target, &http)?;
        let outcome = orchestrator.run().await;
        runs.push(TargetRun {
            target_id: target.target_id.clone(),
            outcome,
        });
    }
    Ok(runs)
}
