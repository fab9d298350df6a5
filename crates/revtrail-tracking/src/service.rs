use base64::{engine::general_purpose::STANDARD, Engine};
use revtrail_core::{CookieConfig, UtcDateTime, Website};
use revtrail_database::{EventStore, NewGoalEvent, NewPageView, NewSession, SessionWrite};
use revtrail_entities::{goal_events, sessions, visitor_identities};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::channel::resolve_channel;
use crate::context::{
    client_ip, extract_referrer_domain, parse_device, parse_utm, referrer_path, DeviceInfo,
    UtmParams,
};
use crate::error::TrackingError;
use crate::exclusion::exclusion_reason;
use crate::geo::{GeoLocator, Location, UnknownLocator};
use crate::identity::{read_cookie, resolve_identity, CookieDirectives, Identity};
use crate::types::{Beacon, BeaconOutcome, BeaconResponse, BeaconStatus, GoalInput};

const HASHED_PATH_LEN: usize = 10;

/// Opaque stand-in for a path when a website hides its URLs
pub fn hash_path(path: &str) -> String {
    let encoded = STANDARD.encode(path.as_bytes());
    format!("#{}", &encoded[..encoded.len().min(HASHED_PATH_LEN)])
}

/// Everything derived from a beacon that is written to sessions and page views
struct BeaconContext {
    path: String,
    hostname: String,
    referrer: Option<String>,
    referrer_domain: Option<String>,
    referrer_path: Option<String>,
    utm: UtmParams,
    device: DeviceInfo,
    location: Location,
}

impl BeaconContext {
    fn new_session(&self, website_id: &str, identity: &Identity) -> NewSession {
        NewSession {
            website_id: website_id.to_string(),
            session_id: identity.session_id.clone(),
            visitor_id: identity.visitor_id.clone(),
            referrer: self.referrer.clone(),
            referrer_domain: self.referrer_domain.clone(),
            utm_source: self.utm.utm_source.clone(),
            utm_medium: self.utm.utm_medium.clone(),
            utm_campaign: self.utm.utm_campaign.clone(),
            utm_term: self.utm.utm_term.clone(),
            utm_content: self.utm.utm_content.clone(),
            landing_path: Some(self.path.clone()),
            device: Some(self.device.device.to_string()),
            browser: Some(self.device.browser.clone()),
            os: Some(self.device.os.clone()),
            country: Some(self.location.country.clone()),
            region: self.location.region.clone(),
            city: self.location.city.clone(),
        }
    }

    fn page_view(
        self,
        website_id: &str,
        identity: &Identity,
        title: Option<String>,
        now: UtcDateTime,
    ) -> NewPageView {
        NewPageView {
            website_id: website_id.to_string(),
            session_id: identity.session_id.clone(),
            visitor_id: identity.visitor_id.clone(),
            timestamp: now,
            path: self.path,
            hostname: Some(self.hostname),
            title,
            referrer: self.referrer,
            referrer_domain: self.referrer_domain,
            referrer_path: self.referrer_path,
            utm_source: self.utm.utm_source,
            utm_medium: self.utm.utm_medium,
            utm_campaign: self.utm.utm_campaign,
            utm_term: self.utm.utm_term,
            utm_content: self.utm.utm_content,
            device: Some(self.device.device.to_string()),
            browser: Some(self.device.browser),
            os: Some(self.device.os),
            country: Some(self.location.country),
            region: self.location.region,
            city: self.location.city,
        }
    }
}

/// Beacon ingestion: exclusion, identity, context, session and page view
pub struct TrackingService {
    store: Arc<dyn EventStore>,
    geo: Arc<dyn GeoLocator>,
    cookies: CookieConfig,
}

impl TrackingService {
    pub fn new(store: Arc<dyn EventStore>, cookies: CookieConfig) -> Self {
        Self {
            store,
            geo: Arc::new(UnknownLocator),
            cookies,
        }
    }

    pub fn with_geo(mut self, geo: Arc<dyn GeoLocator>) -> Self {
        self.geo = geo;
        self
    }

    async fn locate(&self, ip: &str) -> Location {
        match self.geo.locate(ip).await {
            Ok(location) => location,
            Err(e) => {
                debug!("Geolocation failed for {}: {}", ip, e);
                Location::unknown()
            }
        }
    }

    /// Record one page-view beacon
    pub async fn record_beacon(
        &self,
        website: &Website,
        beacon: &Beacon,
        now: UtcDateTime,
    ) -> Result<BeaconOutcome, TrackingError> {
        let ip = client_ip(&beacon.headers);
        let location = self.locate(&ip).await;
        let raw_path = beacon.path();
        let hostname = beacon.hostname();

        if let Some(reason) = exclusion_reason(website, &ip, &location.country, hostname, raw_path)
        {
            debug!(website_id = %website.id, "Beacon excluded: {}", reason);
            return Ok(BeaconOutcome {
                cookies: None,
                status: BeaconStatus::Excluded { reason },
            });
        }

        let (mut identity, _) = resolve_identity(
            beacon.headers.cookie.as_deref(),
            &self.cookies,
            beacon.headers.secure,
        );

        let referrer = beacon.referrer();
        let path = if website.settings.hash_paths {
            hash_path(raw_path)
        } else {
            raw_path.to_string()
        };
        let context = BeaconContext {
            path,
            hostname: hostname.to_string(),
            referrer: referrer.map(String::from),
            referrer_domain: extract_referrer_domain(referrer),
            referrer_path: referrer_path(referrer),
            utm: parse_utm(beacon.url.as_deref()).or(parse_utm(referrer)),
            device: parse_device(beacon.headers.user_agent.as_deref()),
            location,
        };

        let session = self.touch_session(&website.id, &mut identity, &context, now).await?;
        let channel = resolve_channel(session.referrer.as_deref(), session.utm_medium.as_deref());

        self.store
            .insert_page_view(context.page_view(&website.id, &identity, beacon.title.clone(), now))
            .await?;

        debug!(
            website_id = %website.id,
            session_id = %identity.session_id,
            "Recorded page view #{} ({})",
            session.page_views,
            channel
        );

        let cookies = CookieDirectives::for_identity(&identity, &self.cookies, beacon.headers.secure);
        Ok(BeaconOutcome {
            cookies: Some(cookies),
            status: BeaconStatus::Recorded {
                visitor_id: identity.visitor_id,
                session_id: identity.session_id,
                is_new_session: identity.is_new_session,
                channel,
            },
        })
    }

    /// Create or advance the session, rotating the id once if the stored
    /// session went idle past its lifetime
    async fn touch_session(
        &self,
        website_id: &str,
        identity: &mut Identity,
        context: &BeaconContext,
        now: UtcDateTime,
    ) -> Result<sessions::Model, TrackingError> {
        let ttl = self.cookies.session_ttl();
        let write = self
            .store
            .upsert_session(context.new_session(website_id, identity), now, ttl)
            .await?;

        let write = match write {
            SessionWrite::Expired(stale) => {
                debug!(
                    website_id = %website_id,
                    session_id = %stale.session_id,
                    "Session expired server-side, rotating"
                );
                identity.rotate_session();
                self.store
                    .upsert_session(context.new_session(website_id, identity), now, ttl)
                    .await?
            }
            other => other,
        };

        match write {
            SessionWrite::Created(session) => {
                identity.is_new_session = true;
                Ok(session)
            }
            SessionWrite::Continued(session) => Ok(session),
            SessionWrite::Expired(_) => Err(TrackingError::SessionConflict(identity.session_id.clone())),
        }
    }

    /// Beacon entry point for transports: always answers with the pixel
    pub async fn handle_beacon(
        &self,
        website: &Website,
        beacon: &Beacon,
        now: UtcDateTime,
    ) -> BeaconResponse {
        match self.record_beacon(website, beacon, now).await {
            Ok(outcome) => BeaconResponse::pixel(
                outcome
                    .cookies
                    .map(|cookies| cookies.as_vec())
                    .unwrap_or_default(),
            ),
            Err(e) => {
                error!(website_id = %website.id, "Failed to record beacon: {}", e);
                BeaconResponse::pixel(Vec::new())
            }
        }
    }

    /// Record a goal against the cookie identity. Never opens a session.
    pub async fn track_goal(
        &self,
        website: &Website,
        cookie_header: Option<&str>,
        goal: GoalInput,
        now: UtcDateTime,
    ) -> Result<goal_events::Model, TrackingError> {
        let event = goal.event.trim();
        if event.is_empty() {
            return Err(TrackingError::InvalidInput("goal event name is empty".to_string()));
        }

        let visitor_id = read_cookie(cookie_header, &self.cookies.visitor_cookie_name);
        let session_id = read_cookie(cookie_header, &self.cookies.session_cookie_name);
        if visitor_id.is_none() {
            warn!(website_id = %website.id, "Goal '{}' tracked without a visitor cookie", event);
        }

        let path = goal
            .path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or("/")
            .to_string();

        let model = self
            .store
            .insert_goal_event(NewGoalEvent {
                website_id: website.id.clone(),
                event: event.to_string(),
                visitor_id,
                session_id,
                path: Some(path),
                value: goal.value,
                timestamp: now,
            })
            .await?;
        debug!(website_id = %website.id, "Tracked goal '{}'", model.event);
        Ok(model)
    }

    /// Associate an email with a visitor so later payments can be linked to it
    pub async fn identify_visitor(
        &self,
        website_id: &str,
        visitor_id: &str,
        email: &str,
        now: UtcDateTime,
    ) -> Result<visitor_identities::Model, TrackingError> {
        let email = email.trim();
        if visitor_id.trim().is_empty() {
            return Err(TrackingError::InvalidInput("visitor id is empty".to_string()));
        }
        if !email.contains('@') {
            return Err(TrackingError::InvalidInput(format!("invalid email: {}", email)));
        }

        let identity = self
            .store
            .upsert_visitor_identity(website_id, visitor_id.trim(), email, now)
            .await?;
        info!(website_id = %website_id, visitor_id = %identity.visitor_id, "Visitor identified");
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_path() {
        // base64("/pricing") = "L3ByaWNpbmc="
        assert_eq!(hash_path("/pricing"), "#L3ByaWNpbm");
        assert_eq!(hash_path("/"), "#Lw==");
        assert_ne!(hash_path("/pricing"), hash_path("/checkout"));
    }
}
