use serde::{Deserialize, Serialize};

/// JSON body accepted from the capture UI and the mobile app.
///
/// The web pages post `frontImageData`-style keys while older mobile builds send the short
/// `front`/`back`/`angled` names; both shapes land in the same struct.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientUploadBody {
    #[serde(default, alias = "session_id")]
    pub session_id: Option<String>,

    #[serde(default, alias = "front", alias = "frontImage", alias = "front_image")]
    pub front_image_data: Option<String>,

    #[serde(default, alias = "back", alias = "backImage", alias = "back_image")]
    pub back_image_data: Option<String>,

    #[serde(default, alias = "angled", alias = "angledImage", alias = "angled_image")]
    pub angled_image_data: Option<String>,
}

/// JSON body sent to the master server `mobile-upload` endpoint.
///
/// Image fields carry raw base64 (no `data:` prefix).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MobileUploadRequest {
    pub session_id: String,

    pub front_image_data: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub back_image_data: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub angled_image_data: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_body_accepts_short_aliases() {
        let body: ClientUploadBody = serde_json::from_value(json!({
            "front": "data:image/png;base64,AAAA",
            "angled": "BBBB",
            "session_id": "s-1"
        }))
        .unwrap();

        assert_eq!(body.session_id.as_deref(), Some("s-1"));
        assert_eq!(
            body.front_image_data.as_deref(),
            Some("data:image/png;base64,AAAA")
        );
        assert!(body.back_image_data.is_none());
        assert_eq!(body.angled_image_data.as_deref(), Some("BBBB"));
    }

    #[test]
    fn mobile_request_omits_absent_images() {
        let req = MobileUploadRequest {
            session_id: "abc".to_string(),
            front_image_data: "AAAA".to_string(),
            back_image_data: None,
            angled_image_data: Some("CCCC".to_string()),
        };

        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(
            value,
            json!({
                "sessionId": "abc",
                "frontImageData": "AAAA",
                "angledImageData": "CCCC"
            })
        );
    }
}
