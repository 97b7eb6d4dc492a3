use axum::http::HeaderName;
use serde_json::{Value, json};

/// Marks responses that were substituted because the master server was unreachable.
pub const X_WALT_MOCK: HeaderName = HeaderName::from_static("x-walt-mock");

/// Canned demo verdict used when `master.mock_fallback` is enabled and the upstream call fails.
pub fn mock_analysis(session_id: &str) -> Value {
    json!({
        "success": true,
        "authentic": true,
        "authenticityRating": 85,
        "analysis": concat!(
            "<h3>Authenticity Analysis</h3>",
            "<p>This is a demonstration result. The pin analysis service could not be reached, ",
            "so no real assessment was made.</p>",
            "<ul><li>Enamel fill: consistent</li><li>Back stamp: present</li>",
            "<li>Edge finish: smooth</li></ul>"
        ),
        "identification": concat!(
            "<h3>Pin Identification</h3>",
            "<p>Sample result: Disney collectible trading pin.</p>"
        ),
        "pricing": concat!(
            "<h3>Estimated Value</h3>",
            "<p>Sample range: $10 - $25 USD. Submit again later for a real estimate.</p>"
        ),
        "sessionId": session_id,
    })
}
