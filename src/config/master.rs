use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use super::basic::deserialize_string_lax;

/// Path of the analysis endpoint on the master server.
pub const MOBILE_UPLOAD_PATH: &str = "mobile-upload";

/// Body encoding used for the outbound `mobile-upload` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// `{sessionId, frontImageData, backImageData, angledImageData}` with raw base64 payloads.
    #[default]
    Json,
    /// `front_image`/`back_image`/`angled_image` binary parts plus `api_key` and `session_id`.
    Multipart,
}

impl Transport {
    pub fn as_str(self) -> &'static str {
        match self {
            Transport::Json => "json",
            Transport::Multipart => "multipart",
        }
    }
}

/// Master server (upstream) configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MasterConfig {
    /// Base URL of the master server.
    /// TOML: `master.base_url`. Default: `https://master.pinauth.com`.
    #[serde(default = "default_base_url")]
    pub base_url: Url,

    /// Static secret sent as `x-api-key` (required, non-empty).
    /// TOML: `master.api_key`. Env: `WALT_MASTER__API_KEY`.
    #[serde(default)]
    #[serde(deserialize_with = "deserialize_string_lax")]
    pub api_key: String,

    /// Outbound body encoding.
    /// TOML: `master.transport` (`json` | `multipart`). Default: `json`.
    #[serde(default)]
    pub transport: Transport,

    /// Deadline for one upstream call, in seconds.
    /// TOML: `master.timeout_secs`. Default: `30`.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// TCP connect timeout, in seconds.
    /// TOML: `master.connect_timeout_secs`. Default: `10`.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Substitute a canned demo result when the upstream call fails.
    /// TOML: `master.mock_fallback`. Default: `false`.
    #[serde(default)]
    pub mock_fallback: bool,

    /// Optional upstream HTTP proxy. If set, used for the reqwest client.
    /// TOML: `master.proxy`. Example: `http://127.0.0.1:1080`.
    #[serde(default)]
    pub proxy: Option<Url>,

    /// Allow HTTP/2 multiplexing; disabled forces HTTP/1 with no connection reuse.
    /// TOML: `master.enable_multiplexing`. Default: `false`.
    #[serde(default)]
    pub enable_multiplexing: bool,

    /// Extra attempts after a transport error or upstream 5xx. `0` means a single attempt.
    /// TOML: `master.retry_max_times`. Default: `0`.
    #[serde(default)]
    pub retry_max_times: usize,

    /// Max outbound calls per second. `0` disables the limiter.
    /// TOML: `master.max_rps`. Default: `10`.
    #[serde(default = "default_max_rps")]
    pub max_rps: u32,
}

impl MasterConfig {
    /// Full URL of the `mobile-upload` endpoint, keeping any path prefix on `base_url`.
    pub fn upload_url(&self) -> Result<Url, url::ParseError> {
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join(MOBILE_UPLOAD_PATH)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.max(1))
    }
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            transport: Transport::default(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            mock_fallback: false,
            proxy: None,
            enable_multiplexing: false,
            retry_max_times: 0,
            max_rps: default_max_rps(),
        }
    }
}

fn default_base_url() -> Url {
    Url::parse("https://master.pinauth.com").expect("valid master server URL")
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_max_rps() -> u32 {
    10
}
