use crate::error::UploadError;
use crate::image::data_uri::{DEFAULT_IMAGE_MIME, encode_data_uri};
use crate::image::{CapturedImageSet, ImageSlot};
use axum::{
    Json,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
};
use tracing::debug;
use walt_schema::ClientUploadBody;

/// Parsed upload: the client's session id (if it sent one) and the validated image set.
pub(crate) struct UploadPreprocess(pub(crate) Option<String>, pub(crate) CapturedImageSet);

impl<S> FromRequest<S> for UploadPreprocess
where
    S: Send + Sync,
{
    type Rejection = UploadError;

    /// Extract and validate an upload request.
    ///
    /// - `multipart/form-data`: `front_image`/`back_image`/`angled_image` as file parts or data-URI
    ///   text, plus optional `session_id`. Other fields (e.g. `api_key`) are ignored.
    /// - Anything else is read as JSON `ClientUploadBody`; syntax or content-type problems map
    ///   to 400 through `From<JsonRejection> for UploadError`.
    /// - A missing or blank front image is rejected before any upstream call.
    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| {
                ct.trim_start()
                    .to_ascii_lowercase()
                    .starts_with("multipart/form-data")
            });

        let (session_id, images) = if is_multipart {
            let multipart = Multipart::from_request(req, state).await?;
            read_multipart(multipart).await?
        } else {
            let Json(body) = Json::<ClientUploadBody>::from_request(req, state).await?;
            CapturedImageSet::from_client_body(body)?
        };

        debug!(
            session_id = session_id.as_deref().unwrap_or("<new>"),
            images = images.count(),
            multipart = is_multipart,
            "Extracted upload request"
        );

        Ok(Self(session_id, images))
    }
}

async fn read_multipart(
    mut multipart: Multipart,
) -> Result<(Option<String>, CapturedImageSet), UploadError> {
    let mut session_id = None;
    let mut images: [Option<String>; 3] = [None, None, None];

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        if name == "session_id" || name == "sessionId" {
            session_id = Some(field.text().await?.trim().to_string());
            continue;
        }

        let Some(slot) = ImageSlot::from_form_field(&name) else {
            continue;
        };

        let is_file = field.file_name().is_some()
            || field
                .content_type()
                .is_some_and(|ct| !ct.starts_with("text/"));

        let image = if is_file {
            let mime = field
                .content_type()
                .filter(|ct| ct.starts_with("image/"))
                .unwrap_or(DEFAULT_IMAGE_MIME)
                .to_string();
            let bytes = field.bytes().await?;
            (!bytes.is_empty()).then(|| encode_data_uri(&mime, &bytes))
        } else {
            Some(field.text().await?)
        };

        images[slot_index(slot)] = image;
    }

    let [front, back, angled] = images;
    let session_id = session_id.filter(|s| !s.is_empty());
    Ok((session_id, CapturedImageSet::new(front, back, angled)?))
}

fn slot_index(slot: ImageSlot) -> usize {
    match slot {
        ImageSlot::Front => 0,
        ImageSlot::Back => 1,
        ImageSlot::Angled => 2,
    }
}
