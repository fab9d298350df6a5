//! Cookie-based visitor and session identity
//!
//! Resolution is pure: it reads the request's `Cookie` header and returns the
//! identity plus the `Set-Cookie` values the caller must emit.

use cookie::Cookie;
use rand::RngCore;
use revtrail_core::CookieConfig;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

const ID_BYTES: usize = 16;
const MAX_ID_LEN: usize = 128;

/// Visitor and session ids for one beacon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Identity {
    pub visitor_id: String,
    pub session_id: String,
    /// No session cookie was presented, or the presented one was rotated
    pub is_new_session: bool,
    /// The visitor cookie is being issued for the first time
    pub visitor_cookie_set: bool,
}

impl Identity {
    /// Replace the session id with a fresh one
    pub fn rotate_session(&mut self) {
        self.session_id = generate_id();
        self.is_new_session = true;
    }
}

/// `Set-Cookie` header values for the visitor and session cookies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CookieDirectives {
    pub visitor: String,
    pub session: String,
}

impl CookieDirectives {
    /// Build both directives. The session cookie is re-issued on every beacon
    /// so its lifetime slides with activity.
    pub fn for_identity(identity: &Identity, config: &CookieConfig, is_https: bool) -> Self {
        Self {
            visitor: build_cookie(
                &config.visitor_cookie_name,
                &identity.visitor_id,
                cookie::time::Duration::days(config.visitor_max_age_days),
                config,
                is_https,
            ),
            session: build_cookie(
                &config.session_cookie_name,
                &identity.session_id,
                cookie::time::Duration::minutes(config.session_max_age_minutes),
                config,
                is_https,
            ),
        }
    }

    pub fn as_vec(&self) -> Vec<String> {
        vec![self.visitor.clone(), self.session.clone()]
    }
}

fn build_cookie(
    name: &str,
    value: &str,
    max_age: cookie::time::Duration,
    config: &CookieConfig,
    is_https: bool,
) -> String {
    let mut cookie_builder = Cookie::build((name.to_string(), value.to_string()))
        .path("/")
        .max_age(max_age)
        .http_only(config.http_only)
        .secure(is_https && config.secure);

    if let Some(ref same_site_value) = config.same_site {
        let same_site = match same_site_value.to_lowercase().as_str() {
            "strict" => cookie::SameSite::Strict,
            "lax" => cookie::SameSite::Lax,
            "none" => cookie::SameSite::None,
            _ => cookie::SameSite::Lax,
        };
        cookie_builder = cookie_builder.same_site(same_site);
    }

    cookie_builder.build().to_string()
}

/// 16 random bytes, hex encoded
pub fn generate_id() -> String {
    let mut bytes = [0u8; ID_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn is_valid_id(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_ID_LEN
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Value of the named cookie, ignoring malformed pairs and unusable values
pub fn read_cookie(cookie_header: Option<&str>, name: &str) -> Option<String> {
    let header = cookie_header?;
    Cookie::split_parse(header)
        .filter_map(Result::ok)
        .find(|c| c.name() == name)
        .map(|c| c.value().trim().to_string())
        .filter(|v| is_valid_id(v))
}

/// Resolve the visitor and session from the request cookies, minting ids
/// for whichever cookie is missing
///
/// # Example
/// ```
/// use revtrail_core::CookieConfig;
/// use revtrail_tracking::identity::resolve_identity;
///
/// let config = CookieConfig::default();
/// let (identity, cookies) = resolve_identity(Some("_pm_vid=abc123; _pm_sid=def456"), &config, false);
/// assert_eq!(identity.visitor_id, "abc123");
/// assert!(!identity.is_new_session);
/// assert!(cookies.session.starts_with("_pm_sid=def456"));
/// ```
pub fn resolve_identity(
    cookie_header: Option<&str>,
    config: &CookieConfig,
    is_https: bool,
) -> (Identity, CookieDirectives) {
    let existing_visitor = read_cookie(cookie_header, &config.visitor_cookie_name);
    let existing_session = read_cookie(cookie_header, &config.session_cookie_name);

    let identity = Identity {
        visitor_cookie_set: existing_visitor.is_none(),
        visitor_id: existing_visitor.unwrap_or_else(generate_id),
        is_new_session: existing_session.is_none(),
        session_id: existing_session.unwrap_or_else(generate_id),
    };
    let cookies = CookieDirectives::for_identity(&identity, config, is_https);
    (identity, cookies)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_visitor_gets_both_ids() {
        let config = CookieConfig::default();
        let (identity, cookies) = resolve_identity(None, &config, false);

        assert!(identity.visitor_cookie_set);
        assert!(identity.is_new_session);
        assert_eq!(identity.visitor_id.len(), 32);
        assert_eq!(identity.session_id.len(), 32);
        assert_ne!(identity.visitor_id, identity.session_id);
        assert!(hex::decode(&identity.visitor_id).is_ok());

        assert!(cookies
            .visitor
            .starts_with(&format!("_pm_vid={}", identity.visitor_id)));
        assert!(cookies.visitor.contains("Path=/"));
        assert!(cookies.visitor.contains("Max-Age=31536000"));
        assert!(cookies.visitor.contains("SameSite=Lax"));
        assert!(!cookies.visitor.contains("Secure"));
        assert!(cookies.session.contains("Max-Age=1800"));
    }

    #[test]
    fn test_returning_visitor_new_session() {
        let config = CookieConfig::default();
        let (identity, cookies) = resolve_identity(Some("_pm_vid=v-123"), &config, false);

        assert_eq!(identity.visitor_id, "v-123");
        assert!(!identity.visitor_cookie_set);
        assert!(identity.is_new_session);
        // Visitor cookie refreshed on every beacon
        assert!(cookies.visitor.starts_with("_pm_vid=v-123"));
    }

    #[test]
    fn test_malformed_cookies_are_ignored() {
        let config = CookieConfig::default();
        let header = "garbage; =novalue; _pm_vid=; _pm_sid=\"><script>; other=1";
        let (identity, _) = resolve_identity(Some(header), &config, false);

        assert!(identity.visitor_cookie_set);
        assert!(identity.is_new_session);
        assert_eq!(identity.visitor_id.len(), 32);
    }

    #[test]
    fn test_secure_only_over_https() {
        let config = CookieConfig {
            secure: true,
            ..Default::default()
        };
        let (_, plain) = resolve_identity(None, &config, false);
        let (_, https) = resolve_identity(None, &config, true);

        assert!(!plain.session.contains("Secure"));
        assert!(https.session.contains("Secure"));
        assert!(https.visitor.contains("Secure"));
    }

    #[test]
    fn test_same_site_variants() {
        let strict = CookieConfig {
            same_site: Some("STRICT".to_string()),
            ..Default::default()
        };
        let (_, cookies) = resolve_identity(None, &strict, false);
        assert!(cookies.visitor.contains("SameSite=Strict"));

        let none = CookieConfig {
            same_site: None,
            ..Default::default()
        };
        let (_, cookies) = resolve_identity(None, &none, false);
        assert!(!cookies.visitor.contains("SameSite"));
    }

    #[test]
    fn test_rotate_session() {
        let config = CookieConfig::default();
        let (mut identity, _) = resolve_identity(Some("_pm_vid=v1; _pm_sid=s1"), &config, false);
        assert!(!identity.is_new_session);

        identity.rotate_session();
        assert_ne!(identity.session_id, "s1");
        assert!(identity.is_new_session);
        assert_eq!(identity.visitor_id, "v1");
    }
}
