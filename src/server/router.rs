use crate::config::Config;
use crate::db::DbActorHandle;
use crate::error::WaltError;
use crate::server::guards::auth::RequireKeyAuth;
use crate::server::routes::{analyses, feedback, health, upload};
use crate::upstream::MasterClient;

use axum::{
    Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Request},
    http::{HeaderName, StatusCode, Version, header::USER_AGENT},
    middleware::{self, Next},
    response::Response,
    routing::any,
};
use base64::Engine as _;
use moka::sync::Cache;
use rand::RngCore;
use reqwest::header::HeaderValue;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tracing::{error, info, warn};

const MAX_REQUEST_ID_LEN: usize = 128;
const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

fn generate_request_id() -> String {
    // 96 bits => 16 chars base64url (no padding).
    let mut bytes = [0u8; 12];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn format_http_version(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_11 => "HTTP/1.1",
        Version::HTTP_2 => "HTTP/2",
        Version::HTTP_3 => "HTTP/3",
        _ => "HTTP/?",
    }
}

#[derive(Clone)]
pub struct WaltState {
    pub master: MasterClient,
    pub db: DbActorHandle,
    /// Relayed upstream bodies keyed by session id.
    pub results: Cache<String, Bytes>,
    pub walt_key: Arc<str>,
    pub mock_fallback: bool,
    pub static_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl WaltState {
    pub fn new(cfg: &Config, db: DbActorHandle) -> Result<Self, WaltError> {
        let master = MasterClient::new(&cfg.master)?;
        Ok(Self::with_master(cfg, db, master))
    }

    pub fn with_master(cfg: &Config, db: DbActorHandle, master: MasterClient) -> Self {
        Self {
            master,
            db,
            results: Cache::new(cfg.basic.result_cache_capacity),
            walt_key: Arc::from(cfg.basic.walt_key.as_str()),
            mock_fallback: cfg.master.mock_fallback,
            static_dir: cfg.basic.static_dir.clone(),
            max_upload_bytes: cfg.basic.max_upload_bytes,
        }
    }
}

async fn not_found_handler() -> StatusCode {
    StatusCode::NOT_FOUND
}

async fn access_log(req: Request, next: Next) -> Response {
    // Capture request metadata before moving `req` into the handler stack.
    let method = req.method().clone();
    let uri = req.uri().clone();
    let version = req.version();

    let request_id = req
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= MAX_REQUEST_ID_LEN)
        .map_or_else(generate_request_id, str::to_string);

    let user_agent = req
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let start = Instant::now();
    let mut resp = next.run(req).await;

    // Always reflect `x-request-id` for easier correlation, even if the client didn't send one.
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        resp.headers_mut().insert(X_REQUEST_ID, value);
    }

    let status = resp.status();
    let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    let path = uri.path();
    let protocol = format_http_version(version);

    if status.is_server_error() {
        error!(
            "| {:>3} | {} | {:^7} | {:<8} | {} | {}ms | {}",
            status.as_u16(),
            request_id,
            method.as_str(),
            protocol,
            path,
            latency_ms,
            user_agent
        );
    } else if status.is_client_error() {
        warn!(
            "| {:>3} | {} | {:^7} | {:<8} | {} | {}ms | {}",
            status.as_u16(),
            request_id,
            method.as_str(),
            protocol,
            path,
            latency_ms,
            user_agent
        );
    } else {
        info!(
            "| {:>3} | {} | {:^7} | {:<8} | {} | {}ms | {}",
            status.as_u16(),
            request_id,
            method.as_str(),
            protocol,
            path,
            latency_ms,
            user_agent
        );
    }

    resp
}

pub fn walt_router(state: WaltState) -> Router {
    let mobile = upload::mobile_router().layer(middleware::from_extractor_with_state::<
        RequireKeyAuth,
        _,
    >(state.clone()));

    let api = Router::new()
        .merge(upload::router())
        .merge(analyses::router())
        .merge(feedback::router())
        .merge(health::router())
        // Unknown API paths must not fall through to the SPA index.
        .route("/api/{*rest}", any(not_found_handler));

    let static_dir = state.static_dir.clone();
    let static_files =
        ServeDir::new(&static_dir).fallback(ServeFile::new(static_dir.join("index.html")));

    let body_limit = state.max_upload_bytes;

    Router::new()
        .merge(api)
        .merge(mobile)
        .fallback_service(static_files)
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(access_log))
}
