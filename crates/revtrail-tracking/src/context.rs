//! Request context extraction: device, UTM tags, referrer and client IP
//!
//! Every function here is total. Garbage input degrades to "unknown" values
//! instead of errors.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;
use woothee::parser::{Parser, WootheeResult};

const UNKNOWN: &str = "Unknown";
const FALLBACK_IP: &str = "0.0.0.0";

static TABLET_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)ipad|tablet|playbook|silk").expect("valid tablet regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    #[default]
    Desktop,
    Mobile,
    Tablet,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Desktop => "desktop",
            DeviceType::Mobile => "mobile",
            DeviceType::Tablet => "tablet",
        }
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DeviceInfo {
    pub device: DeviceType,
    pub browser: String,
    pub browser_version: Option<String>,
    pub os: String,
    pub os_version: Option<String>,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            device: DeviceType::Desktop,
            browser: UNKNOWN.to_string(),
            browser_version: None,
            os: UNKNOWN.to_string(),
            os_version: None,
        }
    }
}

fn clean(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || value == "UNKNOWN" {
        None
    } else {
        Some(value.to_string())
    }
}

fn has_tablet_marker(ua: &str) -> bool {
    if TABLET_MARKER.is_match(ua) {
        return true;
    }
    let lowered = ua.to_lowercase();
    lowered.contains("android") && !lowered.contains("mobile")
}

fn classify_device(ua: &str, result: Option<&WootheeResult>) -> DeviceType {
    let tablet = has_tablet_marker(ua);
    match result.map(|r| r.category) {
        // woothee files iPads and Android tablets under smartphone
        Some("smartphone") | Some("mobilephone") if tablet => DeviceType::Tablet,
        Some("smartphone") | Some("mobilephone") => DeviceType::Mobile,
        _ if tablet => DeviceType::Tablet,
        _ => DeviceType::Desktop,
    }
}

/// Parse a user agent into device class, browser and operating system
///
/// # Example
/// ```
/// use revtrail_tracking::context::{parse_device, DeviceType};
///
/// let iphone = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
/// assert_eq!(parse_device(Some(iphone)).device, DeviceType::Mobile);
/// assert_eq!(parse_device(None).browser, "Unknown");
/// ```
pub fn parse_device(user_agent: Option<&str>) -> DeviceInfo {
    let Some(ua) = user_agent.map(str::trim).filter(|ua| !ua.is_empty()) else {
        return DeviceInfo::default();
    };

    let result = Parser::new().parse(ua);
    let device = classify_device(ua, result.as_ref());
    match result {
        Some(result) => DeviceInfo {
            device,
            browser: clean(result.name).unwrap_or_else(|| UNKNOWN.to_string()),
            browser_version: clean(result.version),
            os: clean(result.os).unwrap_or_else(|| UNKNOWN.to_string()),
            os_version: clean(&result.os_version),
        },
        None => DeviceInfo {
            device,
            ..DeviceInfo::default()
        },
    }
}

/// UTM campaign parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UtmParams {
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_term: Option<String>,
    pub utm_content: Option<String>,
}

impl UtmParams {
    /// Check if any UTM parameter is set
    pub fn has_any(&self) -> bool {
        self.utm_source.is_some()
            || self.utm_medium.is_some()
            || self.utm_campaign.is_some()
            || self.utm_term.is_some()
            || self.utm_content.is_some()
    }

    /// Fill absent fields from `fallback`, keeping our own values
    pub fn or(self, fallback: UtmParams) -> UtmParams {
        UtmParams {
            utm_source: self.utm_source.or(fallback.utm_source),
            utm_medium: self.utm_medium.or(fallback.utm_medium),
            utm_campaign: self.utm_campaign.or(fallback.utm_campaign),
            utm_term: self.utm_term.or(fallback.utm_term),
            utm_content: self.utm_content.or(fallback.utm_content),
        }
    }
}

fn query_pairs(query_string: &str) -> HashMap<String, String> {
    query_string
        .trim_start_matches('?')
        .split('&')
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next()?.to_lowercase();
            let value = parts.next().unwrap_or("").replace('+', " ");
            let decoded = urlencoding::decode(&value).ok()?.into_owned();
            if key.is_empty() || decoded.is_empty() {
                None
            } else {
                Some((key, decoded))
            }
        })
        .collect()
}

/// Parse UTM parameters from a raw query string
///
/// # Example
/// ```
/// use revtrail_tracking::context::parse_utm_params;
///
/// let utm = parse_utm_params("utm_source=google&utm_medium=cpc");
/// assert_eq!(utm.utm_source, Some("google".to_string()));
/// assert_eq!(utm.utm_medium, Some("cpc".to_string()));
/// ```
pub fn parse_utm_params(query_string: &str) -> UtmParams {
    let mut params = query_pairs(query_string);
    UtmParams {
        utm_source: params.remove("utm_source"),
        utm_medium: params.remove("utm_medium"),
        utm_campaign: params.remove("utm_campaign"),
        utm_term: params.remove("utm_term"),
        utm_content: params.remove("utm_content"),
    }
}

/// UTM parameters of an absolute URL; invalid URLs give an empty set
pub fn parse_utm(url: Option<&str>) -> UtmParams {
    url.and_then(|u| url::Url::parse(u.trim()).ok())
        .and_then(|u| u.query().map(parse_utm_params))
        .unwrap_or_default()
}

/// Hostname of a referrer URL, `None` for anything unparseable
///
/// # Example
/// ```
/// use revtrail_tracking::context::extract_referrer_domain;
///
/// assert_eq!(
///     extract_referrer_domain(Some("https://www.google.com/search?q=test")),
///     Some("www.google.com".to_string())
/// );
/// assert_eq!(extract_referrer_domain(Some("not a url")), None);
/// ```
pub fn extract_referrer_domain(referrer: Option<&str>) -> Option<String> {
    let url = url::Url::parse(referrer?.trim()).ok()?;
    url.host_str().map(str::to_lowercase)
}

/// Path component of a referrer URL
pub fn referrer_path(referrer: Option<&str>) -> Option<String> {
    let url = url::Url::parse(referrer?.trim()).ok()?;
    url.host_str()?;
    Some(url.path().to_string())
}

/// Query parameters of a referrer that identify its source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UrlParams {
    pub param_ref: Option<String>,
    pub param_via: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
}

/// Extract `ref`, `via` and UTM source/medium from a referrer. Referrers
/// without a scheme are treated as https.
pub fn extract_url_params(referrer: Option<&str>) -> UrlParams {
    let Some(raw) = referrer.map(str::trim).filter(|r| !r.is_empty()) else {
        return UrlParams::default();
    };
    let parsed = url::Url::parse(raw).or_else(|_| url::Url::parse(&format!("https://{}", raw)));
    let Some(query) = parsed.ok().and_then(|u| u.query().map(String::from)) else {
        return UrlParams::default();
    };

    let mut params = query_pairs(&query);
    UrlParams {
        param_ref: params.remove("ref"),
        param_via: params.remove("via"),
        utm_source: params.remove("utm_source"),
        utm_medium: params.remove("utm_medium"),
    }
}

/// Proxy headers carried by a beacon request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BeaconHeaders {
    pub user_agent: Option<String>,
    pub cookie: Option<String>,
    pub x_forwarded_for: Option<String>,
    pub x_real_ip: Option<String>,
    pub cf_connecting_ip: Option<String>,
    /// Whether the beacon arrived over HTTPS
    #[serde(default)]
    pub secure: bool,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Best-effort client IP: first `x-forwarded-for` hop, then `x-real-ip`,
/// then `cf-connecting-ip`
pub fn client_ip(headers: &BeaconHeaders) -> String {
    let forwarded = non_empty(headers.x_forwarded_for.as_deref())
        .and_then(|list| non_empty(list.split(',').next()));

    forwarded
        .or_else(|| non_empty(headers.x_real_ip.as_deref()))
        .or_else(|| non_empty(headers.cf_connecting_ip.as_deref()))
        .unwrap_or(FALLBACK_IP)
        .to_string()
}
