use crate::db::FeedbackCreate;
use crate::error::WaltError;
use crate::server::router::WaltState;
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde_json::json;
use tracing::info;
use walt_schema::FeedbackRequest;

const MAX_COMMENT_CHARS: usize = 2000;

/// POST /api/feedback
///
/// Stores a 1..=5 rating (and optional comment) for a finished analysis.
async fn feedback_handler(
    State(state): State<WaltState>,
    payload: Result<Json<FeedbackRequest>, JsonRejection>,
) -> Result<Response, WaltError> {
    let Json(req) =
        payload.map_err(|e| WaltError::InvalidRequest(format!("invalid feedback body: {e}")))?;

    let create = validate_feedback(req)?;
    let session_id = create.session_id.clone();
    let rating = create.rating;
    let id = state.db.record_feedback(create).await?;

    info!(session_id = %session_id, rating, id, "Feedback recorded");
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "success": true, "id": id })),
    )
        .into_response())
}

fn validate_feedback(req: FeedbackRequest) -> Result<FeedbackCreate, WaltError> {
    let session_id = req.session_id.trim().to_string();
    if session_id.is_empty() {
        return Err(WaltError::InvalidRequest(
            "sessionId must be non-empty".to_string(),
        ));
    }
    if !(1..=5).contains(&req.rating) {
        return Err(WaltError::InvalidRequest(
            "rating must be between 1 and 5".to_string(),
        ));
    }

    let comment = req
        .comment
        .map(|c| c.trim().chars().take(MAX_COMMENT_CHARS).collect::<String>())
        .filter(|c| !c.is_empty());

    Ok(FeedbackCreate {
        session_id,
        rating: req.rating,
        comment,
    })
}

pub fn router() -> Router<WaltState> {
    Router::new().route("/api/feedback", post(feedback_handler))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(session_id: &str, rating: i64, comment: Option<&str>) -> FeedbackRequest {
        FeedbackRequest {
            session_id: session_id.to_string(),
            rating,
            comment: comment.map(str::to_string),
        }
    }

    #[test]
    fn rejects_out_of_range_rating_and_blank_session() {
        assert!(matches!(
            validate_feedback(request("s", 0, None)),
            Err(WaltError::InvalidRequest(_))
        ));
        assert!(matches!(
            validate_feedback(request("s", 6, None)),
            Err(WaltError::InvalidRequest(_))
        ));
        assert!(matches!(
            validate_feedback(request("  ", 3, None)),
            Err(WaltError::InvalidRequest(_))
        ));
    }

    #[test]
    fn trims_comment_and_drops_blank() {
        let create = validate_feedback(request(" s-1 ", 5, Some("  great  "))).unwrap();
        assert_eq!(create.session_id, "s-1");
        assert_eq!(create.comment.as_deref(), Some("great"));

        let blank = validate_feedback(request("s-1", 1, Some("   "))).unwrap();
        assert!(blank.comment.is_none());

        let long = "x".repeat(MAX_COMMENT_CHARS + 10);
        let capped = validate_feedback(request("s-1", 2, Some(&long))).unwrap();
        assert_eq!(capped.comment.map(|c| c.len()), Some(MAX_COMMENT_CHARS));
    }
}
