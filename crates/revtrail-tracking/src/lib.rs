//! Beacon ingestion for Revtrail
//!
//! Resolves cookie identity, extracts request context, classifies traffic
//! into marketing channels and writes sessions and page views through an
//! [`revtrail_database::EventStore`].

pub mod channel;
pub mod context;
pub mod error;
pub mod exclusion;
pub mod geo;
pub mod identity;
pub mod service;
pub mod types;

pub use channel::{
    format_referrer_name, is_alternative_source, referrer_bucket, referrer_image_url,
    resolve_channel, Channel, DIRECT_LABEL,
};
pub use context::{
    client_ip, extract_referrer_domain, extract_url_params, parse_device, parse_utm,
    BeaconHeaders, DeviceInfo, DeviceType, UrlParams, UtmParams,
};
pub use error::TrackingError;
pub use exclusion::{exclusion_reason, should_exclude, ExclusionReason};
pub use geo::{GeoError, GeoLocator, Location, StaticLocator, UnknownLocator};
pub use identity::{generate_id, resolve_identity, CookieDirectives, Identity};
pub use service::{hash_path, TrackingService};
pub use types::{Beacon, BeaconOutcome, BeaconResponse, BeaconStatus, GoalInput, TRACKING_PIXEL};
