//! Per-website visit exclusion rules

use revtrail_core::Website;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Why a beacon was dropped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "rule", content = "value", rename_all = "snake_case")]
pub enum ExclusionReason {
    Ip(String),
    Country(String),
    Hostname(String),
    /// The configured prefix that matched
    Path(String),
}

impl std::fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExclusionReason::Ip(ip) => write!(f, "excluded ip {}", ip),
            ExclusionReason::Country(country) => write!(f, "excluded country {}", country),
            ExclusionReason::Hostname(host) => write!(f, "excluded hostname {}", host),
            ExclusionReason::Path(prefix) => write!(f, "excluded path prefix {}", prefix),
        }
    }
}

/// First exclusion rule the visit matches. IP, country and hostname compare
/// exactly; paths match by prefix.
pub fn exclusion_reason(
    website: &Website,
    ip: &str,
    country: &str,
    hostname: &str,
    path: &str,
) -> Option<ExclusionReason> {
    let settings = &website.settings;

    if settings.exclude_ips.iter().any(|x| x == ip) {
        return Some(ExclusionReason::Ip(ip.to_string()));
    }
    if settings.exclude_countries.iter().any(|x| x == country) {
        return Some(ExclusionReason::Country(country.to_string()));
    }
    if settings.exclude_hostnames.iter().any(|x| x == hostname) {
        return Some(ExclusionReason::Hostname(hostname.to_string()));
    }
    settings
        .exclude_paths
        .iter()
        .find(|prefix| path.starts_with(prefix.as_str()))
        .map(|prefix| ExclusionReason::Path(prefix.clone()))
}

pub fn should_exclude(
    website: &Website,
    ip: &str,
    country: &str,
    hostname: &str,
    path: &str,
) -> bool {
    exclusion_reason(website, ip, country, hostname, path).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use revtrail_core::WebsiteSettings;

    fn website() -> Website {
        Website::new("site_1").with_settings(WebsiteSettings {
            exclude_ips: vec!["10.0.0.1".to_string()],
            exclude_countries: vec!["FR".to_string()],
            exclude_hostnames: vec!["staging.example.com".to_string()],
            exclude_paths: vec!["/admin".to_string()],
            hash_paths: false,
        })
    }

    #[test]
    fn test_no_settings_never_excludes() {
        let site = Website::new("site_1");
        assert!(!should_exclude(&site, "10.0.0.1", "FR", "example.com", "/admin"));
    }

    #[test]
    fn test_each_rule() {
        let site = website();
        assert_eq!(
            exclusion_reason(&site, "10.0.0.1", "US", "example.com", "/"),
            Some(ExclusionReason::Ip("10.0.0.1".to_string()))
        );
        assert_eq!(
            exclusion_reason(&site, "1.1.1.1", "FR", "example.com", "/"),
            Some(ExclusionReason::Country("FR".to_string()))
        );
        assert_eq!(
            exclusion_reason(&site, "1.1.1.1", "US", "staging.example.com", "/"),
            Some(ExclusionReason::Hostname("staging.example.com".to_string()))
        );
        assert_eq!(
            exclusion_reason(&site, "1.1.1.1", "US", "example.com", "/admin/users"),
            Some(ExclusionReason::Path("/admin".to_string()))
        );
        assert!(!should_exclude(&site, "1.1.1.1", "US", "example.com", "/pricing"));
    }

    #[test]
    fn test_matching_is_exact_except_paths() {
        let site = website();
        assert!(!should_exclude(&site, "10.0.0.10", "US", "example.com", "/"));
        assert!(!should_exclude(&site, "1.1.1.1", "fr", "example.com", "/"));
        assert!(!should_exclude(&site, "1.1.1.1", "US", "www.staging.example.com", "/"));
        // Prefix match is literal, so `/administrator` is excluded too
        assert!(should_exclude(&site, "1.1.1.1", "US", "example.com", "/administrator"));
        assert!(!should_exclude(&site, "1.1.1.1", "US", "example.com", "/blog/admin"));
    }
}
