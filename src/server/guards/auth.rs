use crate::server::router::WaltState;
use crate::upstream::X_API_KEY;
use axum::{
    Json,
    extract::FromRequestParts,
    http::{HeaderMap, HeaderValue, StatusCode, header::WWW_AUTHENTICATE, request::Parts},
    response::{IntoResponse, Response},
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use serde_json::json;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

/// Where the mobile app put its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Header,
    Bearer,
    Query,
}

impl KeySource {
    pub fn as_str(self) -> &'static str {
        match self {
            KeySource::Header => "x-api-key",
            KeySource::Bearer => "bearer",
            KeySource::Query => "query",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentedKey {
    pub source: KeySource,
    pub value: String,
}

/// First non-blank key in priority order: `x-api-key`, `Authorization: Bearer`, `?key=`.
///
/// A blank candidate does not shadow a later one.
pub fn presented_key(headers: &HeaderMap, query: Option<&str>) -> Option<PresentedKey> {
    let header = headers
        .get(X_API_KEY)
        .and_then(|v| v.to_str().ok())
        .map(|v| (KeySource::Header, v.trim().to_string()));

    let bearer = || {
        headers
            .typed_get::<Authorization<Bearer>>()
            .map(|auth| (KeySource::Bearer, auth.token().trim().to_string()))
    };

    let query_key = || {
        query.and_then(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .find(|(k, _)| k == "key")
                .map(|(_, v)| (KeySource::Query, v.trim().to_string()))
        })
    };

    [header, bearer(), query_key()]
        .into_iter()
        .flatten()
        .find(|(_, value)| !value.is_empty())
        .map(|(source, value)| PresentedKey { source, value })
}

/// Constant-time comparison against `basic.walt_key`.
pub fn verify_key(presented: Option<&PresentedKey>, expected: &str) -> Result<(), AuthError> {
    let presented = presented.ok_or(AuthError::MissingKey)?;
    if presented
        .value
        .as_bytes()
        .ct_eq(expected.as_bytes())
        .into()
    {
        Ok(())
    } else {
        Err(AuthError::InvalidKey)
    }
}

/// Guards mobile app routes with the shared `basic.walt_key`.
#[derive(Debug, Clone, Copy)]
pub struct RequireKeyAuth;

impl FromRequestParts<WaltState> for RequireKeyAuth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &WaltState,
    ) -> Result<Self, Self::Rejection> {
        let presented = presented_key(&parts.headers, parts.uri.query());

        match verify_key(presented.as_ref(), &state.walt_key) {
            Ok(()) => {
                if let Some(key) = &presented {
                    debug!(source = key.source.as_str(), "Mobile key accepted");
                }
                Ok(RequireKeyAuth)
            }
            Err(err) => {
                warn!(
                    path = %parts.uri.path(),
                    source = presented.as_ref().map_or("<none>", |k| k.source.as_str()),
                    reason = err.reason(),
                    "Mobile key rejected"
                );
                Err(err)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    MissingKey,
    InvalidKey,
}

impl AuthError {
    pub fn reason(self) -> &'static str {
        match self {
            AuthError::MissingKey => "Missing API key",
            AuthError::InvalidKey => "Invalid API key",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            [(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer realm=\"walt\""))],
            Json(json!({ "error": "unauthorized", "reason": self.reason() })),
        )
            .into_response()
    }
}
