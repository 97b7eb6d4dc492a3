use crate::error::WaltError;
use crate::server::router::WaltState;
use axum::{
    Router,
    body::{Body, Bytes},
    extract::{Path, State},
    http::{HeaderValue, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::get,
};
use tracing::debug;

/// GET /api/analyses/{session_id}
///
/// Returns the body previously relayed for this session, so the results page survives a reload.
/// Memory cache first, then the `analyses` table.
async fn get_analysis_handler(
    State(state): State<WaltState>,
    Path(session_id): Path<String>,
) -> Result<Response, WaltError> {
    if let Some(body) = state.results.get(&session_id) {
        debug!(session_id = %session_id, "Analysis served from cache");
        return Ok(json_response(body));
    }

    let row = state
        .db
        .get_analysis(&session_id)
        .await?
        .ok_or_else(|| WaltError::NotFound(format!("Analysis {session_id}")))?;

    let body = Bytes::from(row.result_json);
    state.results.insert(session_id, body.clone());
    Ok(json_response(body))
}

fn json_response(body: Bytes) -> Response {
    (
        [(CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        Body::from(body),
    )
        .into_response()
}

pub fn router() -> Router<WaltState> {
    Router::new().route("/api/analyses/{session_id}", get(get_analysis_handler))
}
