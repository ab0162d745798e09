//! Static host for the published files.
//!
//! Only the four resources under `/api/v1/` are routed; everything else is a
//! plain 404. Files are read on every request, so an atomic replace on disk
//! is observed whole by readers.

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::{Error, Result};
use crate::types::Resource;

pub const API_PREFIX: &str = "/api/v1";

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

pub struct AppState {
    dir: PathBuf,
    cache_control: HeaderValue,
}

impl AppState {
    pub fn new(dir: impl Into<PathBuf>, max_age_seconds: u64) -> Result<Self> {
        let cache_control = HeaderValue::from_str(&format!("public, max-age={max_age_seconds}"))
            .map_err(|e| Error::Config(format!("invalid cache max-age: {e}")))?;
        Ok(Self {
            dir: dir.into(),
            cache_control,
        })
    }
}

pub fn router(state: AppState) -> Router {
    let state = Arc::new(state);

    let mut router = Router::new();
    for resource in Resource::ALL {
        router = router.route(
            &format!("{API_PREFIX}/{}", resource.file_name()),
            get(move |State(state): State<Arc<AppState>>| serve_resource(state, resource)),
        );
    }

    router
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Any origin may read; nothing credential-bearing is accepted.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers(Any)
        .max_age(Duration::from_secs(86_400))
}

async fn serve_resource(state: Arc<AppState>, resource: Resource) -> Response {
    let path = state.dir.join(resource.file_name());
    match tokio::fs::read(&path).await {
        Ok(body) => (
            [
                (header::CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE)),
                (header::CACHE_CONTROL, state.cache_control.clone()),
            ],
            body,
        )
            .into_response(),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::warn!(file = %path.display(), "published file missing");
            StatusCode::NOT_FOUND.into_response()
        }
        Err(e) => {
            tracing::error!(file = %path.display(), error = %e, "failed to read published file");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Binds `addr` and serves until Ctrl-C.
pub async fn serve(state: AppState, addr: SocketAddr) -> Result<()> {
    tracing::info!(%addr, dir = %state.dir.display(), "serving published files");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}
