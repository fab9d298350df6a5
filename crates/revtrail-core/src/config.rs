//! Configuration management utilities

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ServiceError, ServiceResult};

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://revtrail.db?mode=rwc".to_string(),
            max_connections: 100,
            min_connections: 5,
        }
    }
}

/// Cookie configuration for visitor/session tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieConfig {
    pub visitor_cookie_name: String,
    pub session_cookie_name: String,
    pub visitor_max_age_days: i64,
    pub session_max_age_minutes: i64,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<String>,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            visitor_cookie_name: "_pm_vid".to_string(),
            session_cookie_name: "_pm_sid".to_string(),
            visitor_max_age_days: 365,
            session_max_age_minutes: 30,
            secure: false,
            http_only: false,
            same_site: Some("Lax".to_string()),
        }
    }
}

impl CookieConfig {
    /// Sliding session lifetime
    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.session_max_age_minutes)
    }
}

/// Payment attribution tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributionConfig {
    /// Half-width of the timestamp-correlation window around a payment
    pub window_minutes: i64,
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self { window_minutes: 60 }
    }
}

impl AttributionConfig {
    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.window_minutes)
    }
}

/// Aggregation limits and real-time windows
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub breakdown_limit: usize,
    pub live_window_minutes: i64,
    pub realtime_limit: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            breakdown_limit: 20,
            live_window_minutes: 5,
            realtime_limit: 100,
        }
    }
}

impl AnalyticsConfig {
    pub fn live_window(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.live_window_minutes)
    }
}

/// Top-level configuration, usually loaded from a YAML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub cookies: CookieConfig,
    pub attribution: AttributionConfig,
    pub analytics: AnalyticsConfig,
}

impl AppConfig {
    pub fn from_yaml_str(contents: &str) -> ServiceResult<Self> {
        serde_yaml::from_str(contents).map_err(|e| ServiceError::Configuration {
            message: format!("invalid config: {}", e),
        })
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> ServiceResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ServiceError::Configuration {
            message: format!("failed to read {}: {}", path.display(), e),
        })?;
        Self::from_yaml_str(&contents)
    }
}
