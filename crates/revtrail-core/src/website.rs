//! Website records handed to the engine by the hosting application

use serde::{Deserialize, Serialize};

/// Per-website tracking settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WebsiteSettings {
    pub exclude_ips: Vec<String>,
    pub exclude_countries: Vec<String>,
    pub exclude_hostnames: Vec<String>,
    /// Path prefixes, e.g. `/admin`
    pub exclude_paths: Vec<String>,
    /// Store an opaque digest of each path instead of the path itself
    pub hash_paths: bool,
}

/// A tracked website. Owned by the hosting application, read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Website {
    pub id: String,
    #[serde(default)]
    pub settings: WebsiteSettings,
}

impl Website {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            settings: WebsiteSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: WebsiteSettings) -> Self {
        self.settings = settings;
        self
    }
}
