//! Axum surface: one GET per sync target runs a reconciliation pass.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path as AxumPath, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use careersync_sync::{load_target_registry, orchestrator_for_target, SyncConfig, SyncOrchestrator, SyncStatus};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::info;

pub const CRATE_NAME: &str = "careersync-web";

#[derive(Clone, Default)]
pub struct AppState {
    orchestrators: BTreeMap<String, Arc<SyncOrchestrator>>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_target(mut self, target_id: impl Into<String>, orchestrator: SyncOrchestrator) -> Self {
        self.orchestrators.insert(target_id.into(), Arc::new(orchestrator));
        self
    }

    pub fn target_ids(&self) -> impl Iterator<Item = &str> {
        self.orchestrators.keys().map(String::as_str)
    }

    /// Wires one live orchestrator per enabled target of the registry.
    pub async fn from_config(config: &SyncConfig) -> anyhow::Result<Self> {
        let registry = load_target_registry(&config.targets_path).await?;
        let http = config.http_fetcher()?;
        let mut state = Self::new();
        for target in registry.enabled() {
            let orchestrator = orchestrator_for_target(config, target, &http)?;
            state = state.with_target(target.target_id.clone(), orchestrator);
        }
        Ok(state)
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    status: SyncStatus,
    message: String,
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    targets: Vec<String>,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/{target_id}", get(sync_handler))
        .with_state(Arc::new(state))
}

pub async fn serve_from_env() -> anyhow::Result<()> {
    let port: u16 = std::env::var("CAREERSYNC_WEB_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8000);
    let state = AppState::from_config(&SyncConfig::from_env()).await?;
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, targets = ?state.target_ids().collect::<Vec<_>>(), "serving sync endpoints");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Response {
    Json(HealthBody {
        status: "ok",
        targets: state.target_ids().map(ToString::to_string).collect(),
    })
    .into_response()
}

async fn sync_handler(State(state): State<Arc<AppState>>, AxumPath(target_id): AxumPath<String>) -> Response {
    let Some(orchestrator) = state.orchestrators.get(&target_id) else {
        return error_response(StatusCode::NOT_FOUND, format!("unknown sync target {target_id}"));
    };

    let outcome = orchestrator.run().await;
    if !outcome.is_success() {
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            outcome.message.unwrap_or_else(|| "sync failed".to_string()),
        );
    }

    let mut resp = Json(outcome).into_response();
    resp.headers_mut().insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    resp
}

fn error_response(status: StatusCode, message: String) -> Response {
    (
        status,
        Json(ErrorBody {
            status: SyncStatus::Error,
            message,
        }),
    )
        .into_response()
}
