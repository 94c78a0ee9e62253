//! axum handlers for the block allocation service.
//!
//! [`IdService`] wraps a shared [`BlockAllocator`] and [`router`] mounts it
//! on the routes defined in [`objectid_axum_core`]. Counter writes block on
//! disk I/O, so setup and block allocation run on Tokio's blocking pool. A
//! client that disconnects mid-request never interrupts a write; the block
//! it would have received is simply never used.

use crate::server::telemetry::{increment_allocation_errors, record_block};
use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::header::CACHE_CONTROL,
    response::IntoResponse,
    routing::{get, post},
};
use objectid::{Block, BlockAllocator, CounterStore, Error, IdType};
use objectid_axum_core::{
    ApiError, ErrorBody, GENERATE_PATH, GenerateBlockRequest, HEALTH_PATH, SETUP_PATH,
    SetupResponse, TYPE_PATH, TYPES_PATH, TypeKey, cache_control,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared state of every handler.
pub struct IdService<S: CounterStore> {
    allocator: Arc<BlockAllocator<S>>,
    max_block_size: u64,
}

impl<S: CounterStore> Clone for IdService<S> {
    fn clone(&self) -> Self {
        Self {
            allocator: Arc::clone(&self.allocator),
            max_block_size: self.max_block_size,
        }
    }
}

impl<S: CounterStore> IdService<S> {
    pub fn new(allocator: Arc<BlockAllocator<S>>, max_block_size: u64) -> Self {
        Self {
            allocator,
            max_block_size,
        }
    }

    pub fn allocator(&self) -> &Arc<BlockAllocator<S>> {
        &self.allocator
    }

    pub const fn max_block_size(&self) -> u64 {
        self.max_block_size
    }
}

/// Builds the HTTP router for `service`.
pub fn router<S: CounterStore + 'static>(service: IdService<S>) -> Router {
    Router::new()
        .route(SETUP_PATH, post(setup_types::<S>).get(setup_types::<S>))
        .route(TYPES_PATH, get(list_types::<S>))
        .route(TYPE_PATH, get(get_type::<S>))
        .route(GENERATE_PATH, post(generate_block::<S>))
        .route(HEALTH_PATH, get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Runs durable work on the blocking pool.
async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> objectid::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError(Error::communication(format!("allocation task failed: {e}"))))?
        .map_err(ApiError)
}

fn log_failure(type_name: &str, err: &Error) {
    let code = ErrorBody::from(err).code;
    increment_allocation_errors(code.as_str());
    if err.is_fatal() {
        tracing::error!(type_name, error = %err, "allocation failed");
    } else {
        tracing::debug!(type_name, error = %err, "allocation rejected");
    }
}

#[tracing::instrument(skip_all)]
async fn setup_types<S: CounterStore + 'static>(
    State(service): State<IdService<S>>,
) -> Result<Json<SetupResponse>, ApiError> {
    let allocator = Arc::clone(&service.allocator);
    let report = blocking(move || allocator.setup_types())
        .await
        .inspect_err(|err| tracing::error!(error = %err.0, "type setup failed"))?;
    tracing::info!(created = ?report.created, "types set up");
    Ok(Json(report.into()))
}

async fn list_types<S: CounterStore + 'static>(
    State(service): State<IdService<S>>,
) -> impl IntoResponse {
    (
        [(
            CACHE_CONTROL,
            cache_control(service.allocator.max_cache_age()),
        )],
        Json(service.allocator.types()),
    )
}

async fn get_type<S: CounterStore + 'static>(
    State(service): State<IdService<S>>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let ty: IdType = match TypeKey::parse(&key) {
        TypeKey::Id(id) => service.allocator.type_by_id(id)?,
        TypeKey::Name(name) => service.allocator.type_by_name(&name)?,
    };
    Ok((
        [(
            CACHE_CONTROL,
            cache_control(service.allocator.max_cache_age()),
        )],
        Json(ty),
    ))
}

#[tracing::instrument(skip(service, payload))]
async fn generate_block<S: CounterStore + 'static>(
    State(service): State<IdService<S>>,
    Path(type_name): Path<String>,
    payload: Result<Json<GenerateBlockRequest>, JsonRejection>,
) -> Result<Json<Block>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        ApiError(Error::InvalidRequest {
            reason: rejection.body_text(),
        })
    })?;
    if request.amount > service.max_block_size {
        let err = Error::InvalidRequest {
            reason: format!(
                "requested {} values but at most {} may be reserved at once",
                request.amount, service.max_block_size
            ),
        };
        log_failure(&type_name, &err);
        return Err(ApiError(err));
    }

    let allocator = Arc::clone(&service.allocator);
    let name = type_name.clone();
    let block = blocking(move || allocator.generate_block(&name, request.amount))
        .await
        .inspect_err(|err| log_failure(&type_name, &err.0))?;

    record_block(block.type_name(), block.size());
    Ok(Json(block))
}

async fn health() -> &'static str {
    "ok"
}
