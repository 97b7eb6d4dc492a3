use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Analysis result as returned by the master server.
///
/// Only used to read a few fields for bookkeeping. Responses are relayed to clients as the
/// original JSON value, never re-serialized from this struct.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    #[serde(default)]
    pub success: Option<bool>,

    #[serde(default)]
    pub authentic: Option<bool>,

    /// Upstream sends either a number or a string such as `"85"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticity_rating: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identification: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    #[serde(flatten)]
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

impl AnalysisResult {
    /// Best-effort view of the rating as a number.
    pub fn rating(&self) -> Option<f64> {
        match self.authenticity_rating.as_ref()? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().trim_end_matches('%').parse().ok(),
            _ => None,
        }
    }
}
