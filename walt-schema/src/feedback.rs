use serde::Deserialize;

/// User feedback on a finished analysis.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    #[serde(alias = "session_id")]
    pub session_id: String,
    pub rating: i64,
    #[serde(default)]
    pub comment: Option<String>,
}
