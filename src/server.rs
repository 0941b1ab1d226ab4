use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use alloy_primitives::B256;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::PayloadCache;
use crate::metrics::Metrics;
use crate::types::{CachedPayload, GetPayloadResponse, SubmitBlockRequest};

const PATH_GET_PAYLOAD: &str = "/eth/v1/builder/get_payload/{parent_hash}";
const PATH_SUBMIT_BLOCK: &str = "/relay/v1/builder/blocks";

/// Fixed textual length of a `0x`-prefixed 32-byte hash.
const PARENT_HASH_LEN: usize = 66;

#[derive(Clone)]
struct RelayState {
    cache: PayloadCache,
    metrics: Arc<Metrics>,
}

/// Structured error body returned for every 4xx.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: u16,
    message: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            code: status.as_u16(),
            message: message.into(),
        }),
    )
        .into_response()
}

/// The relay's HTTP surface: proposers poll cached payloads by parent
/// hash, builders push freshly built blocks.
///
/// The server never mutates cache entries beyond `put`; request errors
/// never escape their request.
pub struct RelayServer {
    listen_addr: SocketAddr,
    cache: PayloadCache,
    metrics: Arc<Metrics>,
}

impl RelayServer {
    pub fn new(listen_addr: SocketAddr, cache: PayloadCache, metrics: Arc<Metrics>) -> Self {
        Self {
            listen_addr,
            cache,
            metrics,
        }
    }

    /// The router, exposed separately so tests can serve it on an
    /// ephemeral port.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(handle_root))
            .route(PATH_GET_PAYLOAD, get(handle_get_payload))
            .route(PATH_SUBMIT_BLOCK, post(handle_submit_block))
            .with_state(RelayState {
                cache: self.cache.clone(),
                metrics: self.metrics.clone(),
            })
    }

    /// Bind and serve until the token is cancelled.
    pub async fn listen(&self, token: CancellationToken) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_addr).await?;
        info!(address = %listener.local_addr()?, "relay server listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(token.cancelled_owned())
            .await?;
        Ok(())
    }
}

async fn handle_root() -> Json<serde_json::Value> {
    Json(json!({}))
}

async fn handle_get_payload(
    State(state): State<RelayState>,
    Path(parent_hash): Path<String>,
) -> Response {
    // Validate the path parameter before touching the cache.
    if parent_hash.len() != PARENT_HASH_LEN || !parent_hash.starts_with("0x") {
        state.metrics.invalid_payload_requests.increment(1);
        return error_response(StatusCode::BAD_REQUEST, "invalid hash");
    }
    let parent_hash = match B256::from_str(&parent_hash) {
        Ok(hash) => hash,
        Err(_) => {
            state.metrics.invalid_payload_requests.increment(1);
            return error_response(StatusCode::BAD_REQUEST, "invalid hash");
        }
    };

    match state.cache.get(&parent_hash) {
        Some(cached) => {
            state.metrics.payload_hits.increment(1);
            debug!(parent_hash = %parent_hash, "serving cached payload");
            Json(GetPayloadResponse::from(&cached)).into_response()
        }
        None => {
            state.metrics.payload_misses.increment(1);
            error_response(StatusCode::NOT_FOUND, "bid not found")
        }
    }
}

async fn handle_submit_block(
    State(state): State<RelayState>,
    body: Result<Json<SubmitBlockRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return error_response(StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };

    let cached = CachedPayload::from(request);
    let parent_hash = cached.parent_hash;

    // Overwrites any prior entry for the same parent hash; last write
    // wins, so no 409 here.
    state.cache.put(parent_hash, cached);
    state.metrics.payloads_stored.increment(1);
    info!(parent_hash = %parent_hash, "stored builder payload");

    Json(json!({})).into_response()
}

// HTTP behavior is exercised end to end in tests/integration.rs against
// a server bound on an ephemeral port.
