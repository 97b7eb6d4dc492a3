use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

/// Basic (core) configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BasicConfig {
    /// HTTP server listen address (e.g., "0.0.0.0", "127.0.0.1").
    /// TOML: `basic.listen_addr`. Default: `0.0.0.0`.
    #[serde(default = "default_listen_ip")]
    pub listen_addr: IpAddr,

    /// HTTP server listen port.
    /// TOML: `basic.listen_port`. Env: `WALT_BASIC__LISTEN_PORT` or `PORT`. Default: `8080`.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Database URL for SQLite.
    /// TOML: `basic.database_url`. Default: `sqlite://walt.db`.
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Log level for tracing subscriber initialization (e.g., "error", "warn", "info", "debug", "trace").
    /// TOML: `basic.loglevel`. Default: `info`.
    #[serde(default = "default_loglevel")]
    pub loglevel: String,

    /// Key the mobile app presents on `/api/mobile/*` routes (required, non-empty).
    /// TOML: `basic.walt_key`. Must be provided.
    #[serde(default)]
    #[serde(deserialize_with = "deserialize_string_lax")]
    pub walt_key: String,

    /// Directory holding the capture and results pages.
    /// TOML: `basic.static_dir`. Default: `static`.
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,

    /// Max number of analysis results kept in memory for `/api/analyses/{id}`.
    /// TOML: `basic.result_cache_capacity`. Default: `1024`.
    #[serde(default = "default_result_cache_capacity")]
    pub result_cache_capacity: u64,

    /// Max accepted request body size in bytes (three phone photos as base64 are large).
    /// TOML: `basic.max_upload_bytes`. Default: `26214400` (25 MiB).
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_ip(),
            listen_port: default_listen_port(),
            database_url: default_database_url(),
            loglevel: default_loglevel(),
            // No insecure default. `Config::validate()` enforces non-empty.
            walt_key: String::new(),
            static_dir: default_static_dir(),
            result_cache_capacity: default_result_cache_capacity(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

pub(super) fn deserialize_string_lax<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;

    match v {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(serde::de::Error::custom("expected a string or a number")),
    }
}

fn default_listen_ip() -> IpAddr {
    Ipv4Addr::new(0, 0, 0, 0).into()
}

fn default_listen_port() -> u16 {
    8080
}

fn default_database_url() -> String {
    "sqlite://walt.db".to_string()
}

fn default_loglevel() -> String {
    "info".to_string()
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

fn default_result_cache_capacity() -> u64 {
    1024
}

fn default_max_upload_bytes() -> usize {
    25 * 1024 * 1024
}
