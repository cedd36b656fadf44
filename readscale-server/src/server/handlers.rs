use crate::access::HandleFactory;
use crate::cache::{CacheStats, CacheStatsSnapshot, CacheStore, OperationSignature, Ttl};
use crate::config::ServerConfig;
use crate::core::ReadscaleError;
use crate::data::{Fields, Record, RecordId, Selection};
use crate::pipeline::{ReadPipeline, WritePipeline};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub reads: ReadPipeline,
    pub writes: WritePipeline,
    pub stats: Arc<CacheStats>,
    pub ttl_overrides: Arc<HashMap<String, Ttl>>,
}

impl AppState {
    /// Wire both pipelines from configuration
    pub fn new(config: &ServerConfig, store: Arc<dyn CacheStore>, handles: HandleFactory) -> Self {
        let stats = Arc::new(CacheStats::new());
        let cache = config.cache_aside(store).with_observer(stats.clone());

        Self {
            reads: ReadPipeline::new(handles.clone(), cache),
            writes: WritePipeline::new(handles),
            stats,
            ttl_overrides: Arc::new(config.cache.ttl_overrides.clone()),
        }
    }

    /// Per-collection TTL override, if any
    pub fn ttl_for(&self, collection: &str) -> Option<Ttl> {
        self.ttl_overrides.get(collection).copied()
    }
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub counters: CacheStatsSnapshot,
    pub hit_rate: f64,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
    pub id: RecordId,
}

/// Health check endpoint
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "readscale",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Cache counters since startup
pub async fn cache_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let counters = state.stats.snapshot();
    let hit_rate = counters.hit_rate();
    Json(StatsResponse { counters, hit_rate })
}

/// GET one record through the read pipeline
pub async fn get_record(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, RecordId)>,
    uri: Uri,
) -> Result<Json<Record>, ReadscaleError> {
    debug!("REST GET {}/{}", collection, id);

    let signature = OperationSignature::new(uri.path())
        .with_arg("collection", &collection)?
        .with_arg("id", &id)?;
    let ttl = state.ttl_for(&collection);

    let record = state
        .reads
        .execute(&signature, ttl, move |handle| {
            Box::pin(async move {
                let found = handle.find(&collection, id).await?;
                found.ok_or(ReadscaleError::NotFound { collection, id })
            })
        })
        .await?;

    Ok(Json(record))
}

/// GET a filtered listing. Every query parameter except `limit` is an
/// equality filter; values parse as JSON where possible (`?year=1959`
/// matches the number 1959).
pub async fn list_records(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Query(params): Query<BTreeMap<String, String>>,
    uri: Uri,
) -> Result<Json<Vec<Record>>, ReadscaleError> {
    debug!("REST LIST {} params={:?}", collection, params);

    let signature = OperationSignature::new(uri.path())
        .with_arg("collection", &collection)?
        .with_arg("query", &params)?;
    let selection = selection_from_params(&params)?;
    let ttl = state.ttl_for(&collection);

    let records = state
        .reads
        .execute(&signature, ttl, move |handle| {
            Box::pin(async move { Ok(handle.select(&collection, &selection).await?) })
        })
        .await?;

    Ok(Json(records))
}

/// POST a new record through the write pipeline
pub async fn create_record(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(fields): Json<Fields>,
) -> Result<(StatusCode, Json<Record>), ReadscaleError> {
    debug!("REST CREATE {}", collection);

    let record = state
        .writes
        .execute(move |handle| {
            Box::pin(async move { Ok(handle.insert(&collection, fields).await?) })
        })
        .await?;

    Ok((StatusCode::CREATED, Json(record)))
}

/// PUT merges fields into an existing record
pub async fn update_record(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, RecordId)>,
    Json(fields): Json<Fields>,
) -> Result<Json<Record>, ReadscaleError> {
    debug!("REST UPDATE {}/{}", collection, id);

    let record = state
        .writes
        .execute(move |handle| {
            Box::pin(async move { Ok(handle.update(&collection, id, fields).await?) })
        })
        .await?;

    Ok(Json(record))
}

pub async fn delete_record(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, RecordId)>,
) -> Result<Json<DeleteResponse>, ReadscaleError> {
    debug!("REST DELETE {}/{}", collection, id);

    state
        .writes
        .execute(move |handle| {
            Box::pin(async move {
                let existed = handle.delete(&collection, id).await?;
                if existed {
                    Ok(())
                } else {
                    Err(ReadscaleError::NotFound { collection, id })
                }
            })
        })
        .await?;

    Ok(Json(DeleteResponse { deleted: true, id }))
}

fn selection_from_params(params: &BTreeMap<String, String>) -> Result<Selection, ReadscaleError> {
    let mut selection = Selection::new();
    for (name, raw) in params {
        if name == "limit" {
            let limit = raw.parse::<usize>().map_err(|_| {
                ReadscaleError::InvalidRequest(format!("limit must be a number, got '{raw}'"))
            })?;
            selection = selection.limit(limit);
        } else {
            let value =
                serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.clone()));
            selection = selection.filter(name.clone(), value);
        }
    }
    Ok(selection)
}
