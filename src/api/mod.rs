//! HTTP surface: routing, request guards and handlers.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod state;

pub use self::error::ApiError;
pub use self::openapi::openapi;
pub use self::state::{AuthConfig, AuthState};

use anyhow::Result;
use axum::{
    body::Body,
    extract::Extension,
    http::{HeaderName, HeaderValue, Method, Request},
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{debug_span, error, info, Span};
use ulid::Ulid;

use self::handlers::{health, jwks, login, logout, profile, refresh, register, reset};

/// Build the application router.
///
/// `/login` is throttled per client and everything under `/auth` requires a bearer
/// token. `state` is injected into every handler and guard as an `Extension`.
pub fn router(state: Arc<AuthState>) -> Router {
    let public = Router::new()
        .route("/.well-known/jwks.json", get(jwks::jwks))
        .route("/health", get(health::health).options(health::health))
        .route("/signin", post(register::register))
        .route("/refresh", post(refresh::refresh));

    let throttled = Router::new()
        .route("/login", post(login::login))
        .route_layer(from_fn(middleware::rate_limit));

    let protected = Router::new()
        .route("/auth/profile", get(profile::profile))
        .route("/auth/logout", post(logout::logout))
        .route("/auth/reset-request", post(reset::reset_request))
        .route("/auth/reset", post(reset::reset))
        .route_layer(from_fn(middleware::require_bearer));

    let cors = CorsLayer::new()
        // allow `GET` and `POST` when accessing the resource
        .allow_methods([Method::GET, Method::POST])
        // allow requests from any origin
        .allow_origin(Any);

    public.merge(throttled).merge(protected).layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(cors)
            .layer(Extension(state)),
    )
}

/// Serve the API until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn new(port: u16, state: Arc<AuthState>) -> Result<()> {
    let app = router(state);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("Gracefully shutdown");
}

// span
fn make_span(request: &Request<Body>) -> Span {
    let method = request.method();
    let path = request.uri().path();
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    // headers are left out: they carry bearer tokens
    debug_span!("http.request", %method, path, request_id)
}
