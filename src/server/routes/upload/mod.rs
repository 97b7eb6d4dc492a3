use crate::server::router::WaltState;
use axum::{Router, routing::post};

pub mod extract;
pub mod handlers;

/// Capture UI endpoint. The browser cannot hold a secret, so this route is not key-guarded.
pub fn router() -> Router<WaltState> {
    Router::new().route(
        handlers::WEB_UPLOAD_ENDPOINT,
        post(handlers::web_upload_handler),
    )
}

/// Mobile app endpoint; the caller layers `RequireKeyAuth` on top.
pub fn mobile_router() -> Router<WaltState> {
    Router::new().route(
        handlers::MOBILE_UPLOAD_ENDPOINT,
        post(handlers::mobile_upload_handler),
    )
}
