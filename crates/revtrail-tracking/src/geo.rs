//! IP geolocation seam

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;
use thiserror::Error;
use tracing::debug;
use utoipa::ToSchema;

pub const UNKNOWN_COUNTRY: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Location {
    pub country: String,
    pub region: Option<String>,
    pub city: Option<String>,
}

impl Location {
    pub fn unknown() -> Self {
        Self {
            country: UNKNOWN_COUNTRY.to_string(),
            region: None,
            city: None,
        }
    }

    pub fn new(country: &str, region: Option<&str>, city: Option<&str>) -> Self {
        Self {
            country: country.to_string(),
            region: region.map(String::from),
            city: city.map(String::from),
        }
    }
}

#[derive(Error, Debug)]
pub enum GeoError {
    #[error("Invalid IP address: {0}")]
    InvalidIp(String),
    #[error("IP address not found: {0}")]
    NotFound(String),
    #[error("Geolocation backend error: {0}")]
    Backend(String),
}

/// Resolves a client IP to a coarse location. Failures are not fatal to
/// ingestion; callers fall back to [`Location::unknown`].
#[async_trait]
pub trait GeoLocator: Send + Sync {
    async fn locate(&self, ip: &str) -> Result<Location, GeoError>;
}

/// Locator that knows nothing; every IP resolves to an unknown country
#[derive(Debug, Clone, Default)]
pub struct UnknownLocator;

#[async_trait]
impl GeoLocator for UnknownLocator {
    async fn locate(&self, _ip: &str) -> Result<Location, GeoError> {
        Ok(Location::unknown())
    }
}

/// Fixed IP → location table, for embedded setups and tests
#[derive(Debug, Clone, Default)]
pub struct StaticLocator {
    entries: HashMap<IpAddr, Location>,
}

impl StaticLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, ip: &str, location: Location) -> Result<Self, GeoError> {
        let addr: IpAddr = ip
            .trim()
            .parse()
            .map_err(|_| GeoError::InvalidIp(ip.to_string()))?;
        self.entries.insert(addr, location);
        Ok(self)
    }
}

#[async_trait]
impl GeoLocator for StaticLocator {
    async fn locate(&self, ip: &str) -> Result<Location, GeoError> {
        let addr: IpAddr = ip
            .trim()
            .parse()
            .map_err(|_| GeoError::InvalidIp(ip.to_string()))?;

        if addr.is_loopback() || addr.is_unspecified() {
            debug!("Skipping geolocation for local IP {}", addr);
            return Ok(Location::unknown());
        }

        self.entries
            .get(&addr)
            .cloned()
            .ok_or_else(|| GeoError::NotFound(addr.to_string()))
    }
}
