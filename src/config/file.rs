use std::path::Path;

use figment::{
    Figment,
    providers::{Format, Json},
};
use serde::Deserialize;
use tracing::{debug, warn};

/// Fallback values read from `config/default.json`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    #[serde(rename = "mongoURI", default)]
    pub mongo_uri: Option<String>,
    #[serde(rename = "MONGO_URI", default)]
    pub mongo_uri_upper: Option<String>,
    #[serde(rename = "SESSION_SECRET", default)]
    pub session_secret: Option<String>,
}

impl FileConfig {
    /// A missing file and an unparseable file both yield an empty configuration.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            debug!(path = %path.display(), "config file not found; using empty configuration");
            return Self::default();
        }
        match Figment::from(Json::file(path)).extract::<FileConfig>() {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file; using empty configuration"
                );
                Self::default()
            }
        }
    }

    /// `mongoURI` first, then `MONGO_URI`; blank values are skipped.
    pub fn connection_string(&self) -> Option<String> {
        [&self.mongo_uri, &self.mongo_uri_upper]
            .into_iter()
            .flatten()
            .map(|v| v.trim())
            .find(|v| !v.is_empty())
            .map(str::to_string)
    }

    pub fn session_secret(&self) -> Option<String> {
        self.session_secret
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }
}
