use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::channel::Channel;
use crate::context::BeaconHeaders;
use crate::exclusion::ExclusionReason;
use crate::identity::CookieDirectives;

/// 1x1 transparent GIF returned for every beacon
pub const TRACKING_PIXEL: [u8; 42] = [
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x01, 0x44, 0x00, 0x3b,
];

pub const DEFAULT_PATH: &str = "/";
pub const DEFAULT_HOSTNAME: &str = "unknown";

/// A page-view beacon as received from the tracking script
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct Beacon {
    pub path: Option<String>,
    pub hostname: Option<String>,
    pub title: Option<String>,
    /// Full URL of the page, used for UTM tags when the referrer has none
    pub url: Option<String>,
    pub referrer: Option<String>,
    #[serde(default)]
    pub headers: BeaconHeaders,
}

impl Beacon {
    pub fn path(&self) -> &str {
        self.path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_PATH)
    }

    pub fn hostname(&self) -> &str {
        self.hostname
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .unwrap_or(DEFAULT_HOSTNAME)
    }

    pub fn referrer(&self) -> Option<&str> {
        self.referrer
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BeaconStatus {
    Recorded {
        visitor_id: String,
        session_id: String,
        is_new_session: bool,
        channel: Channel,
    },
    Excluded {
        reason: ExclusionReason,
    },
}

/// What `record_beacon` did, plus the cookies to send back
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BeaconOutcome {
    /// Absent for excluded visits, which leave cookies untouched
    pub cookies: Option<CookieDirectives>,
    pub status: BeaconStatus,
}

impl BeaconOutcome {
    pub fn is_recorded(&self) -> bool {
        matches!(self.status, BeaconStatus::Recorded { .. })
    }
}

/// Transport-neutral response for a beacon request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeaconResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub cache_control: &'static str,
    pub set_cookies: Vec<String>,
    pub body: Vec<u8>,
}

impl BeaconResponse {
    pub fn pixel(set_cookies: Vec<String>) -> Self {
        Self {
            status: 200,
            content_type: "image/gif",
            cache_control: "no-cache, no-store, must-revalidate",
            set_cookies,
            body: TRACKING_PIXEL.to_vec(),
        }
    }
}

/// A custom goal fired by the tracking script
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct GoalInput {
    pub event: String,
    pub path: Option<String>,
    /// Optional value in minor currency units
    pub value: Option<i64>,
}
