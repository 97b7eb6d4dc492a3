mod basic;
mod master;

pub use basic::BasicConfig;
pub use master::{MOBILE_UPLOAD_PATH, MasterConfig, Transport};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::WaltError;

/// Application configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Core server configuration (see `basic` table in config.toml).
    #[serde(default)]
    pub basic: BasicConfig,

    /// Master server settings (see `master` table in config.toml).
    #[serde(default)]
    pub master: MasterConfig,
}

const DEFAULT_CONFIG_FILE: &str = "config.toml";
const ENV_PREFIX: &str = "WALT_";

impl Config {
    /// Builds a Figment that merges defaults, an optional TOML file, and environment variables.
    ///
    /// Precedence (lowest first): defaults, `config.toml`, `WALT_*` (tables split on `__`),
    /// then a bare `PORT` as set by hosting platforms.
    pub fn figment_with(path: &Path) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if path.is_file() {
            figment = figment.merge(Toml::file(path));
        }
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(
                Env::raw()
                    .only(&["PORT"])
                    .map(|_| "basic.listen_port".into()),
            )
    }

    pub fn figment() -> Figment {
        Self::figment_with(&PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    /// Loads configuration from all sources without validating required fields.
    pub fn from_sources() -> Result<Self, WaltError> {
        Self::figment()
            .extract()
            .map_err(|e| WaltError::Config(e.to_string()))
    }

    /// Loads configuration and rejects insecure or unusable settings.
    pub fn load() -> Result<Self, WaltError> {
        let cfg = Self::from_sources()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), WaltError> {
        if self.basic.walt_key.trim().is_empty() {
            return Err(WaltError::Config(
                "basic.walt_key must be set and non-empty".to_string(),
            ));
        }
        if self.master.api_key.trim().is_empty() {
            return Err(WaltError::Config(
                "master.api_key must be set and non-empty".to_string(),
            ));
        }
        self.master.upload_url()?;
        Ok(())
    }
}
