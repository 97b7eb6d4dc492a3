use walt_schema::ClientUploadBody;

use super::data_uri::{self, DecodedImage};
use crate::error::UploadError;

/// The three photo positions the capture UI asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSlot {
    Front,
    Back,
    Angled,
}

impl ImageSlot {
    pub const ALL: [ImageSlot; 3] = [ImageSlot::Front, ImageSlot::Back, ImageSlot::Angled];

    pub fn label(self) -> &'static str {
        match self {
            ImageSlot::Front => "front",
            ImageSlot::Back => "back",
            ImageSlot::Angled => "angled",
        }
    }

    /// Form field name used by multipart bodies, inbound and outbound.
    pub fn form_field(self) -> &'static str {
        match self {
            ImageSlot::Front => "front_image",
            ImageSlot::Back => "back_image",
            ImageSlot::Angled => "angled_image",
        }
    }

    pub fn from_form_field(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|slot| slot.form_field() == name)
    }
}

/// Images captured for one pin. Each image is a data URI or bare base64 string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedImageSet {
    pub front: String,
    pub back: Option<String>,
    pub angled: Option<String>,
}

impl CapturedImageSet {
    /// Builds a set, treating blank images as absent. The front image is mandatory.
    pub fn new(
        front: Option<String>,
        back: Option<String>,
        angled: Option<String>,
    ) -> Result<Self, UploadError> {
        let front = non_blank(front).ok_or(UploadError::MissingFrontImage)?;
        let set = Self {
            front,
            back: non_blank(back),
            angled: non_blank(angled),
        };
        set.validate()?;
        Ok(set)
    }

    /// Splits a JSON upload body into the client session id (if any) and the image set.
    pub fn from_client_body(
        body: ClientUploadBody,
    ) -> Result<(Option<String>, Self), UploadError> {
        let session_id = non_blank(body.session_id);
        let set = Self::new(
            body.front_image_data,
            body.back_image_data,
            body.angled_image_data,
        )?;
        Ok((session_id, set))
    }

    pub fn get(&self, slot: ImageSlot) -> Option<&str> {
        match slot {
            ImageSlot::Front => Some(self.front.as_str()),
            ImageSlot::Back => self.back.as_deref(),
            ImageSlot::Angled => self.angled.as_deref(),
        }
    }

    /// Present images in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (ImageSlot, &str)> {
        ImageSlot::ALL
            .into_iter()
            .filter_map(|slot| self.get(slot).map(|image| (slot, image)))
    }

    pub fn count(&self) -> usize {
        self.iter().count()
    }

    /// Checks every present image decodes, whichever transport later carries it.
    pub fn validate(&self) -> Result<(), UploadError> {
        if self.front.trim().is_empty() {
            return Err(UploadError::MissingFrontImage);
        }
        self.decode().map(|_| ())
    }

    /// Base64 payloads with any data-URI prefix removed.
    pub fn stripped(&self, slot: ImageSlot) -> Option<String> {
        self.get(slot)
            .map(|image| data_uri::strip_data_uri_prefix(image).to_string())
    }

    /// Decodes every present image to binary.
    pub fn decode(&self) -> Result<Vec<(ImageSlot, DecodedImage)>, UploadError> {
        self.iter()
            .map(|(slot, image)| {
                data_uri::decode_image(image)
                    .map(|decoded| (slot, decoded))
                    .map_err(|e| UploadError::InvalidImage {
                        field: slot.label(),
                        reason: e.to_string(),
                    })
            })
            .collect()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
