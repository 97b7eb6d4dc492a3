use reqwest::header::{ACCEPT, HeaderValue};
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use url::Url;
use walt_schema::MobileUploadRequest;

use crate::image::{DecodedImage, ImageSlot, data_uri::file_extension};

pub const X_API_KEY: &str = "x-api-key";

/// Outbound body, prepared once and rebuilt into a request on every attempt.
#[derive(Debug, Clone)]
pub enum OutboundPayload {
    Json(MobileUploadRequest),
    Multipart {
        session_id: String,
        images: Vec<(ImageSlot, DecodedImage)>,
    },
}

pub struct MasterApi;

impl MasterApi {
    pub fn build_request(
        client: &reqwest::Client,
        upload_url: &Url,
        api_key: &str,
        payload: &OutboundPayload,
        timeout: Duration,
    ) -> Result<reqwest::Request, reqwest::Error> {
        let builder = client
            .post(upload_url.clone())
            .header(X_API_KEY, api_key)
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .timeout(timeout);

        match payload {
            OutboundPayload::Json(body) => builder.json(body).build(),
            OutboundPayload::Multipart { session_id, images } => {
                let form = Self::build_form(api_key, session_id, images)?;
                builder.multipart(form).build()
            }
        }
    }

    fn build_form(
        api_key: &str,
        session_id: &str,
        images: &[(ImageSlot, DecodedImage)],
    ) -> Result<Form, reqwest::Error> {
        let mut form = Form::new()
            .text("api_key", api_key.to_string())
            .text("session_id", session_id.to_string());

        for (slot, image) in images {
            let part = Part::bytes(image.bytes.clone())
                .file_name(format!(
                    "{}.{}",
                    slot.label(),
                    file_extension(image.mime.as_str())
                ))
                .mime_str(image.mime.as_str())?;
            form = form.part(slot.form_field(), part);
        }
        Ok(form)
    }
}
