//! Health probe: reports build metadata and whether the backing stores answer.

use axum::{
    body::Body,
    extract::Extension,
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::{future::Future, sync::Arc};
use tokio::time::{timeout, Duration};
use tracing::{debug, error, warn};
use utoipa::ToSchema;

use crate::api::state::AuthState;
use crate::GIT_COMMIT_HASH;

const HEALTH_PROBE_TIMEOUT_SECONDS: u64 = 2;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    commit: String,
    name: String,
    version: String,
    store: String,
    database: String,
}

// `ok` when the probe answers in time, `error` otherwise.
async fn probe<E, F>(name: &str, check: F) -> bool
where
    E: std::fmt::Display,
    F: Future<Output = Result<(), E>>,
{
    match timeout(Duration::from_secs(HEALTH_PROBE_TIMEOUT_SECONDS), check).await {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            error!("Failed to ping {name}: {err}");
            false
        }
        Err(_) => {
            warn!("{name} health check timed out");
            false
        }
    }
}

fn status_str(healthy: bool) -> String {
    if healthy { "ok" } else { "error" }.to_string()
}

#[utoipa::path(
    get,
    path = "/health",
    responses (
        (status = 200, description = "Stores are reachable", body = Health),
        (status = 503, description = "A store is unreachable", body = Health),
    ),
    tag = "health",
)]
pub async fn health(
    method: Method,
    Extension(state): Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let store_healthy = probe("store", state.kv().ping()).await;
    let database_healthy = probe("database", state.users().ping()).await;

    let health = Health {
        commit: GIT_COMMIT_HASH.to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: status_str(store_healthy),
        database: status_str(database_healthy),
    };

    let body = if method == Method::GET {
        Json(&health).into_response()
    } else {
        Body::empty().into_response()
    };

    let short_hash = if health.commit.len() > 7 {
        &health.commit[0..7]
    } else {
        ""
    };

    let headers = format!("{}:{}:{}", health.name, health.version, short_hash)
        .parse::<HeaderValue>()
        .map(|x_app_header_value| {
            debug!("X-App header: {:?}", x_app_header_value);

            let mut headers = HeaderMap::new();
            headers.insert("X-App", x_app_header_value);
            headers
        })
        .map_err(|err| {
            debug!("Failed to parse X-App header: {}", err);
        })
        .unwrap_or_else(|()| HeaderMap::new());

    if store_healthy && database_healthy {
        (StatusCode::OK, headers, body)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, headers, body)
    }
}
