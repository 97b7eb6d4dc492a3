use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbUser {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbPin {
    pub id: i64,
    pub pin_id: String,
    pub name: String,
    pub series: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbAnalysis {
    pub id: i64,
    pub session_id: String,
    pub authentic: Option<bool>,
    pub authenticity_rating: Option<f64>,
    /// Upstream JSON exactly as relayed to the client.
    pub result_json: String,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbFeedback {
    pub id: i64,
    pub session_id: String,
    pub rating: i64,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbApiLog {
    pub id: i64,
    pub session_id: Option<String>,
    pub endpoint: String,
    pub transport: String,
    /// `0` when no HTTP response was received.
    pub status_code: i64,
    pub latency_ms: i64,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Where a stored analysis came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisSource {
    Upstream,
    Mock,
}

impl AnalysisSource {
    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisSource::Upstream => "upstream",
            AnalysisSource::Mock => "mock",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisCreate {
    pub session_id: String,
    pub authentic: Option<bool>,
    pub authenticity_rating: Option<f64>,
    pub result_json: String,
    pub source: AnalysisSource,
}

#[derive(Debug, Clone)]
pub struct FeedbackCreate {
    pub session_id: String,
    pub rating: i64,
    pub comment: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ApiLogCreate {
    pub session_id: Option<String>,
    pub endpoint: String,
    pub transport: String,
    pub status_code: u16,
    pub latency_ms: u64,
    pub error: Option<String>,
}
