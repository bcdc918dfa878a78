//!
//! datadock HTTP server
//! --------------------
//! This module defines the Axum-based HTTP API over the dataset registry.
//!
//! Responsibilities:
//! - Startup wiring: config validation, initial directory load, optional
//!   change watcher, graceful shutdown.
//! - Read-only dataset endpoints with ETag/Last-Modified cache headers
//!   derived from the registry fingerprint and file metadata.
//! - Request validation mapped onto the unified error model; the response
//!   body union (bare array vs map vs map-of-paginated) is resolved here,
//!   never inside the registry.
//! - Static mock forecast endpoint kept as a stable demo surface.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{RawQuery, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::config::Config;
use crate::dataset::{DataRegistry, DatasetInfo, FileRecord, Record, RegistrySnapshot};
use crate::error::AppError;
use crate::watch;

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<DataRegistry>,
}

/// Validate configuration, perform the initial load, then serve until
/// shutdown. Startup problems (missing directory, no recognized files,
/// unreadable initial state) are fatal before the listener is bound.
pub async fn run(config: Config) -> Result<()> {
    config.validate()?;

    let registry = Arc::new(DataRegistry::new());
    {
        let registry = registry.clone();
        let dir = config.data_dir.clone();
        tokio::task::spawn_blocking(move || registry.reload(&dir))
            .await
            .context("initial load interrupted")?
            .with_context(|| format!("initial load of {} failed", config.data_dir.display()))?;
    }

    let watcher = if config.watch {
        Some(watch::spawn(
            registry.clone(),
            config.data_dir.clone(),
            config.debounce,
        )?)
    } else {
        None
    };

    let mut app = router(AppState { registry });
    if config.cors {
        app = app.layer(CorsLayer::permissive());
    }

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", config.host, config.port))?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(watcher) = watcher {
        watcher.shutdown().await;
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {err}");
    }
}

/// All HTTP routes over the given state. Split out so tests can drive the
/// router directly.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/datasets", get(get_datasets))
        .route("/data", get(get_data))
        .route("/forecast_demand", post(forecast_demand))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

#[derive(Debug, Serialize)]
struct DatasetsResponse {
    source: String,
    #[serde(rename = "type")]
    kind: String,
    datasets: Vec<DatasetInfo>,
    file_count: usize,
    files: Vec<FileRecord>,
}

async fn get_datasets(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.registry.snapshot();
    let summary = snapshot.file_summary();
    let body = DatasetsResponse {
        source: summary.source,
        kind: summary.kind,
        datasets: snapshot.datasets_info(),
        file_count: summary.file_count,
        files: summary.files,
    };
    (cache_headers(&snapshot), Json(body))
}

#[derive(Debug, Default)]
struct DataQuery {
    names: Vec<String>,
    limit: Option<usize>,
    offset: Option<usize>,
}

/// `name` is repeatable, which rules out the form-decoding extractors; the
/// raw query string is parsed by hand instead.
fn parse_data_query(raw: Option<&str>) -> Result<DataQuery, AppError> {
    let mut query = DataQuery::default();
    let Some(raw) = raw else { return Ok(query) };
    for pair in raw.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let value = urlencoding::decode(value).map_err(|_| {
            AppError::InvalidPagination(format!("malformed query parameter: {key}"))
        })?;
        match key {
            "name" => query.names.push(value.into_owned()),
            "limit" => query.limit = Some(parse_non_negative("Limit", &value)?),
            "offset" => query.offset = Some(parse_non_negative("Offset", &value)?),
            _ => {}
        }
    }
    Ok(query)
}

fn parse_non_negative(label: &str, raw: &str) -> Result<usize, AppError> {
    let n: i64 = raw.trim().parse().map_err(|_| {
        AppError::InvalidPagination(format!("{label} must be a non-negative integer"))
    })?;
    if n < 0 {
        return Err(AppError::InvalidPagination(format!(
            "{label} must be non-negative"
        )));
    }
    Ok(n as usize)
}

/// Response body union for `GET /data`, resolved from the request shape.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum DataBody {
    /// Exactly one dataset requested and no pagination: the bare records.
    Single(Vec<Record>),
    Multi(BTreeMap<String, DatasetPayload>),
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum DatasetPayload {
    Bare(Vec<Record>),
    Paginated(PaginatedData),
}

#[derive(Debug, Serialize)]
struct PaginatedData {
    total: usize,
    returned: usize,
    data: Vec<Record>,
}

async fn get_data(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> Result<impl IntoResponse, AppError> {
    let query = parse_data_query(raw.as_deref())?;
    // One snapshot per request: validation and data come from the same view.
    let snapshot = state.registry.snapshot();

    let available = snapshot.dataset_names();
    let unknown: Vec<String> = query
        .names
        .iter()
        .filter(|name| !snapshot.contains(name))
        .cloned()
        .collect();
    if !unknown.is_empty() {
        return Err(AppError::DatasetNotFound {
            requested: unknown,
            available,
        });
    }

    let selected = if query.names.is_empty() {
        available
    } else {
        query.names.clone()
    };
    let paginating = query.limit.is_some() || query.offset.is_some();

    let body = if selected.len() == 1 && !paginating {
        DataBody::Single(snapshot.dataset(&selected[0]).cloned().unwrap_or_default())
    } else {
        let mut map = BTreeMap::new();
        for name in &selected {
            let records = snapshot.dataset(name).cloned().unwrap_or_default();
            let payload = if paginating {
                let total = records.len();
                let start = query.offset.unwrap_or(0).min(total);
                let end = query
                    .limit
                    .map_or(total, |limit| start.saturating_add(limit))
                    .min(total);
                let data = records[start..end].to_vec();
                DatasetPayload::Paginated(PaginatedData {
                    total,
                    returned: data.len(),
                    data,
                })
            } else {
                DatasetPayload::Bare(records)
            };
            map.insert(name.clone(), payload);
        }
        DataBody::Multi(map)
    };

    Ok((cache_headers(&snapshot), Json(body)))
}

fn cache_headers(snapshot: &RegistrySnapshot) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some(tag) = snapshot.fingerprint() {
        if let Ok(value) = HeaderValue::from_str(tag) {
            headers.insert(header::ETAG, value);
        }
    }
    if let Some(ts) = snapshot.last_modified() {
        let secs = ts.trunc() as i64;
        let nanos = (ts.fract() * 1e9) as u32;
        if let Some(when) = chrono::DateTime::from_timestamp(secs, nanos) {
            let formatted = when.format("%a, %d %b %Y %H:%M:%S GMT").to_string();
            if let Ok(value) = HeaderValue::from_str(&formatted) {
                headers.insert(header::LAST_MODIFIED, value);
            }
        }
    }
    headers
}

#[derive(Debug, Deserialize)]
struct ForecastDemandRequest {
    filters: ForecastFilters,
}

#[derive(Debug, Deserialize)]
struct ForecastFilters {
    product_category: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ForecastEntry {
    category: String,
    product_id: String,
    forecasted_demand: u32,
    confidence_level: f64,
    forecast_date: String,
}

#[derive(Debug, Serialize)]
struct ForecastDemandResponse {
    forecast_data: Vec<ForecastEntry>,
    categories: Vec<String>,
    total_records: usize,
}

/// Static mock forecast: two fixed entries per requested category.
async fn forecast_demand(Json(request): Json<ForecastDemandRequest>) -> impl IntoResponse {
    let categories = request.filters.product_category;
    let mut forecast_data = Vec::with_capacity(categories.len() * 2);
    for category in &categories {
        let slug = category.to_uppercase().replace(' ', "_");
        forecast_data.push(ForecastEntry {
            category: category.clone(),
            product_id: format!("PROD_{slug}_001"),
            forecasted_demand: 150,
            confidence_level: 0.85,
            forecast_date: "2024-01-15".to_string(),
        });
        forecast_data.push(ForecastEntry {
            category: category.clone(),
            product_id: format!("PROD_{slug}_002"),
            forecasted_demand: 200,
            confidence_level: 0.92,
            forecast_date: "2024-01-15".to_string(),
        });
    }
    let total_records = forecast_data.len();
    Json(ForecastDemandResponse {
        forecast_data,
        categories,
        total_records,
    })
}
