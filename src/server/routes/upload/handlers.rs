use super::extract::UploadPreprocess;
use crate::db::{AnalysisCreate, AnalysisSource, ApiLogCreate};
use crate::error::UploadError;
use crate::image::CapturedImageSet;
use crate::server::router::WaltState;
use crate::upstream::{X_WALT_MOCK, mock_analysis};
use crate::utils::logging::with_pretty_json_debug;
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{HeaderValue, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;
use walt_schema::AnalysisResult;

pub(super) const WEB_UPLOAD_ENDPOINT: &str = "/api/upload";
pub(super) const MOBILE_UPLOAD_ENDPOINT: &str = "/api/mobile/upload";

pub(super) async fn web_upload_handler(
    State(state): State<WaltState>,
    UploadPreprocess(session_id, images): UploadPreprocess,
) -> Result<Response, UploadError> {
    process_upload(&state, WEB_UPLOAD_ENDPOINT, session_id, images).await
}

pub(super) async fn mobile_upload_handler(
    State(state): State<WaltState>,
    UploadPreprocess(session_id, images): UploadPreprocess,
) -> Result<Response, UploadError> {
    process_upload(&state, MOBILE_UPLOAD_ENDPOINT, session_id, images).await
}

async fn process_upload(
    state: &WaltState,
    endpoint: &'static str,
    session_id: Option<String>,
    images: CapturedImageSet,
) -> Result<Response, UploadError> {
    let session_id = session_id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let transport = state.master.transport().as_str();

    info!(
        session_id = %session_id,
        endpoint,
        transport,
        images = images.count(),
        "Forwarding pin images to master server"
    );

    let start = Instant::now();
    let outcome = state.master.submit(&session_id, &images).await;
    let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

    let (status_code, error) = match &outcome {
        Ok(reply) => (reply.status.as_u16(), None),
        Err(err) => (upstream_status_code(err), Some(err.to_string())),
    };

    record_api_call(
        state,
        ApiLogCreate {
            session_id: Some(session_id.clone()),
            endpoint: endpoint.to_string(),
            transport: transport.to_string(),
            status_code,
            latency_ms,
            error,
        },
    )
    .await;

    match outcome {
        Ok(reply) => {
            with_pretty_json_debug(&reply.value, |pretty_body| {
                debug!(
                    session_id = %session_id,
                    body = %pretty_body,
                    "[Master] Analysis result"
                );
            });
            store_result(
                state,
                &session_id,
                &reply.value,
                reply.body.clone(),
                AnalysisSource::Upstream,
            )
            .await;
            Ok(relay_json(reply.status, reply.body))
        }
        Err(err) if err.is_upstream_failure() && state.mock_fallback => {
            warn!(
                session_id = %session_id,
                error = %err,
                "Master server unavailable, serving mock analysis"
            );
            let mock = mock_analysis(&session_id);
            let body = Bytes::from(serde_json::to_vec(&mock).map_err(|e| {
                UploadError::Internal(format!("failed to serialize mock analysis: {e}"))
            })?);
            store_result(state, &session_id, &mock, body.clone(), AnalysisSource::Mock).await;

            let mut resp = relay_json(StatusCode::OK, body);
            resp.headers_mut()
                .insert(X_WALT_MOCK, HeaderValue::from_static("true"));
            Ok(resp)
        }
        Err(err) => Err(err),
    }
}

/// HTTP status seen from the master server, `0` when no response arrived.
fn upstream_status_code(err: &UploadError) -> u16 {
    match err {
        UploadError::UpstreamStatus { status, .. } => status.as_u16(),
        UploadError::Reqwest(e) => e.status().map_or(0, |s| s.as_u16()),
        _ => 0,
    }
}

fn relay_json(status: StatusCode, body: Bytes) -> Response {
    (
        status,
        [(CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        Body::from(body),
    )
        .into_response()
}

/// Caches the relayed body and persists a summary. Failures here never affect the response.
async fn store_result(
    state: &WaltState,
    session_id: &str,
    value: &Value,
    body: Bytes,
    source: AnalysisSource,
) {
    state.results.insert(session_id.to_string(), body.clone());

    let summary: AnalysisResult = serde_json::from_value(value.clone()).unwrap_or_default();
    let create = AnalysisCreate {
        session_id: session_id.to_string(),
        authentic: summary.authentic,
        authenticity_rating: summary.rating(),
        result_json: String::from_utf8_lossy(&body).into_owned(),
        source,
    };

    if let Err(e) = state.db.record_analysis(create).await {
        warn!(session_id, error = %e, "Failed to persist analysis result");
    }
}

async fn record_api_call(state: &WaltState, create: ApiLogCreate) {
    if let Err(e) = state.db.record_api_log(create).await {
        warn!(error = %e, "Failed to write mobile_app_api_log row");
    }
}
