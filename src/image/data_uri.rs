use base64::Engine as _;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::{DecodePaddingMode, general_purpose};
use thiserror::Error as ThisError;

pub const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

/// Standard alphabet, padding optional. Browsers always pad, some mobile encoders do not.
const LENIENT_STANDARD: GeneralPurpose = GeneralPurpose::new(
    &base64::alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// A parsed `data:` URI (or bare base64 payload).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri<'a> {
    pub mime: &'a str,
    pub payload: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub mime: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum DataUriError {
    #[error("empty image data")]
    Empty,
    #[error("data URI is not base64 encoded")]
    NotBase64Encoded,
    #[error("invalid base64: {0}")]
    InvalidBase64(String),
}

/// Splits `data:<mime>[;params];base64,<payload>` into its parts.
///
/// Input without a `data:` scheme is treated as a bare base64 payload of `DEFAULT_IMAGE_MIME`.
pub fn parse_data_uri(input: &str) -> Result<DataUri<'_>, DataUriError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(DataUriError::Empty);
    }

    let Some(rest) = strip_prefix_ignore_case(input, "data:") else {
        return Ok(DataUri {
            mime: DEFAULT_IMAGE_MIME,
            payload: input,
        });
    };

    let Some((header, payload)) = rest.split_once(',') else {
        return Err(DataUriError::NotBase64Encoded);
    };

    let mut params = header.split(';');
    let mime = params.next().map(str::trim).unwrap_or_default();
    if !params.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
        return Err(DataUriError::NotBase64Encoded);
    }

    let payload = payload.trim();
    if payload.is_empty() {
        return Err(DataUriError::Empty);
    }

    Ok(DataUri {
        mime: if mime.is_empty() {
            DEFAULT_IMAGE_MIME
        } else {
            mime
        },
        payload,
    })
}

/// Returns the base64 payload with any `data:...;base64,` prefix removed.
pub fn strip_data_uri_prefix(input: &str) -> &str {
    let trimmed = input.trim();
    match strip_prefix_ignore_case(trimmed, "data:").and_then(|rest| rest.split_once(',')) {
        Some((_, payload)) => payload.trim(),
        None => trimmed,
    }
}

/// Strips the prefix and decodes the payload into raw image bytes.
pub fn decode_image(input: &str) -> Result<DecodedImage, DataUriError> {
    let uri = parse_data_uri(input)?;
    // Line-wrapped base64 (MIME style) shows up from some Android encoders.
    let compact: String = uri
        .payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = LENIENT_STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| DataUriError::InvalidBase64(e.to_string()))?;
    if bytes.is_empty() {
        return Err(DataUriError::Empty);
    }
    Ok(DecodedImage {
        mime: uri.mime.to_ascii_lowercase(),
        bytes,
    })
}

/// Builds a `data:` URI from raw bytes.
pub fn encode_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!(
        "data:{mime};base64,{}",
        general_purpose::STANDARD.encode(bytes)
    )
}

/// File extension used when naming multipart parts.
pub fn file_extension(mime: &str) -> &'static str {
    match mime.to_ascii_lowercase().as_str() {
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/heic" | "image/heif" => "heic",
        _ => "jpg",
    }
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &s[prefix.len()..])
}
