//! Channel attribution logic for referrers and UTM mediums
//!
//! This module provides functions to:
//! - Classify a `(referrer, utm_medium)` pair into a marketing channel
//! - Derive the referrer bucket used to group sessions in breakdowns
//! - Format human-readable referrer names and icons

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;

/// Label used for traffic without a referrer
pub const DIRECT_LABEL: &str = "Direct/None";

const ICON_SERVICE: &str = "https://icons.duckduckgo.com/ip3";

/// Marketing channel classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Channel {
    #[serde(rename = "Direct")]
    Direct,
    #[serde(rename = "Paid social")]
    PaidSocial,
    #[serde(rename = "Display")]
    Display,
    #[serde(rename = "Newsletter")]
    Newsletter,
    #[serde(rename = "A.I.")]
    Ai,
    #[serde(rename = "Organic search")]
    OrganicSearch,
    #[serde(rename = "Organic social")]
    OrganicSocial,
    #[serde(rename = "Affiliate")]
    Affiliate,
    #[serde(rename = "Referral")]
    Referral,
}

impl Channel {
    pub const ALL: [Channel; 9] = [
        Channel::Direct,
        Channel::PaidSocial,
        Channel::Display,
        Channel::Newsletter,
        Channel::Ai,
        Channel::OrganicSearch,
        Channel::OrganicSocial,
        Channel::Affiliate,
        Channel::Referral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Direct => "Direct",
            Channel::PaidSocial => "Paid social",
            Channel::Display => "Display",
            Channel::Newsletter => "Newsletter",
            Channel::Ai => "A.I.",
            Channel::OrganicSearch => "Organic search",
            Channel::OrganicSocial => "Organic social",
            Channel::Affiliate => "Affiliate",
            Channel::Referral => "Referral",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Channel::ALL
            .iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .copied()
            .ok_or_else(|| format!("unknown channel: {}", s))
    }
}

/// utm_medium values signalling paid placement
const PAID_MEDIUMS: &[&str] = &["paid", "cpc", "ppc", "ad", "ads", "sponsored", "display"];

/// Social platforms that sell ad placements
const PAID_SOCIAL_PLATFORMS: &[&str] = &[
    "facebook",
    "instagram",
    "twitter",
    "x",
    "linkedin",
    "tiktok",
    "pinterest",
    "snapchat",
    "youtube",
];

const NEWSLETTER_MEDIUMS: &[&str] = &["newsletter", "email"];

const NEWSLETTER_PLATFORMS: &[&str] = &["beehiiv", "substack", "mailchimp", "convertkit", "ghost"];

const AI_ASSISTANTS: &[&str] = &[
    "chatgpt",
    "openai",
    "perplexity",
    "gemini",
    "claude",
    "anthropic",
    "bard",
    "copilot",
];

const SEARCH_ENGINES: &[&str] = &[
    "google",
    "bing",
    "duckduckgo",
    "brave",
    "yandex",
    "kagi",
    "ecosia",
    "baidu",
    "yahoo",
    "ask.com",
];

const SOCIAL_NETWORKS: &[&str] = &[
    "twitter",
    "x",
    "facebook",
    "instagram",
    "linkedin",
    "reddit",
    "youtube",
    "medium",
    "producthunt",
    "tiktok",
    "pinterest",
    "snapchat",
    "telegram",
    "discord",
    "slack",
    "whatsapp",
    "hackernews",
    "news.ycombinator",
];

const AFFILIATE_MEDIUMS: &[&str] = &["affiliate", "referral"];

/// Communities surfaced as `ref`-type sources in breakdowns
const ALTERNATIVE_SOURCES: &[&str] = &[
    "producthunt",
    "hackernews",
    "news.ycombinator",
    "reddit",
    "indiehackers",
];

/// Normalized inputs every rule is evaluated against
#[derive(Debug, Clone)]
pub struct ReferrerSignal {
    /// Lower-cased, trimmed referrer as received
    pub raw: String,
    /// Lower-cased host (or bare token when the referrer is not a URL)
    pub host: String,
    pub medium: Option<String>,
}

impl ReferrerSignal {
    pub fn new(referrer: Option<&str>, utm_medium: Option<&str>) -> Self {
        let raw = referrer.unwrap_or_default().trim().to_lowercase();
        let host = referrer_host(&raw).unwrap_or_default();
        let medium = utm_medium
            .map(|m| m.trim().to_lowercase())
            .filter(|m| !m.is_empty());
        Self { raw, host, medium }
    }

    fn medium_in(&self, values: &[&str]) -> bool {
        self.medium
            .as_deref()
            .map(|m| values.contains(&m))
            .unwrap_or(false)
    }

    /// Matches host patterns on label boundaries: `x` matches `x.com` but
    /// not `dropbox.com`, `ask.com` matches `www.ask.com`.
    fn host_in(&self, patterns: &[&str]) -> bool {
        if self.host.is_empty() {
            return false;
        }
        let padded = format!(".{}.", self.host);
        patterns
            .iter()
            .any(|p| padded.contains(&format!(".{}.", p)))
    }
}

/// One step of the classification cascade
pub struct ChannelRule {
    pub name: &'static str,
    pub channel: Channel,
    pub matches: fn(&ReferrerSignal) -> bool,
}

/// Ordered rule table; the first matching rule wins.
pub const RULES: &[ChannelRule] = &[
    ChannelRule {
        name: "direct",
        channel: Channel::Direct,
        matches: |s| is_direct(Some(&s.raw)),
    },
    ChannelRule {
        name: "paid-social",
        channel: Channel::PaidSocial,
        matches: |s| s.medium_in(PAID_MEDIUMS) && s.host_in(PAID_SOCIAL_PLATFORMS),
    },
    ChannelRule {
        name: "display",
        channel: Channel::Display,
        matches: |s| s.medium_in(PAID_MEDIUMS),
    },
    ChannelRule {
        name: "newsletter",
        channel: Channel::Newsletter,
        matches: |s| s.medium_in(NEWSLETTER_MEDIUMS) || s.host_in(NEWSLETTER_PLATFORMS),
    },
    ChannelRule {
        name: "ai",
        channel: Channel::Ai,
        matches: |s| s.host_in(AI_ASSISTANTS),
    },
    ChannelRule {
        name: "organic-search",
        channel: Channel::OrganicSearch,
        matches: |s| s.host_in(SEARCH_ENGINES),
    },
    ChannelRule {
        name: "organic-social",
        channel: Channel::OrganicSocial,
        matches: |s| s.host_in(SOCIAL_NETWORKS),
    },
    ChannelRule {
        name: "affiliate",
        channel: Channel::Affiliate,
        // Short dot-less referrers are usually bare slugs such as `via=name`.
        // Known weakness: a short non-URL token that is not a slug lands here too.
        matches: |s| s.medium_in(AFFILIATE_MEDIUMS) || (s.raw.len() < 30 && !s.raw.contains('.')),
    },
];

/// Determine marketing channel from a referrer and UTM medium
///
/// # Example
/// ```
/// use revtrail_tracking::channel::{resolve_channel, Channel};
///
/// assert_eq!(resolve_channel(Some("https://facebook.com"), Some("cpc")), Channel::PaidSocial);
/// assert_eq!(resolve_channel(Some("https://facebook.com"), None), Channel::OrganicSocial);
/// assert_eq!(resolve_channel(None, None), Channel::Direct);
/// ```
pub fn resolve_channel(referrer: Option<&str>, utm_medium: Option<&str>) -> Channel {
    let signal = ReferrerSignal::new(referrer, utm_medium);
    matching_rule(&signal)
        .map(|rule| rule.channel)
        .unwrap_or(Channel::Referral)
}

/// The rule that decided a classification, `None` meaning the Referral fallback
pub fn matching_rule(signal: &ReferrerSignal) -> Option<&'static ChannelRule> {
    RULES.iter().find(|rule| (rule.matches)(signal))
}

fn is_direct(value: Option<&str>) -> bool {
    match value.map(str::trim) {
        None | Some("") => true,
        Some(v) => v.eq_ignore_ascii_case("direct") || v.eq_ignore_ascii_case(DIRECT_LABEL),
    }
}

fn strip_protocol(value: &str) -> &str {
    value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"))
        .unwrap_or(value)
}

/// Host of a referrer. Non-URL referrers yield their leading token.
fn referrer_host(referrer: &str) -> Option<String> {
    if referrer.is_empty() {
        return None;
    }
    if let Ok(url) = url::Url::parse(referrer) {
        if let Some(host) = url.host_str() {
            return Some(host.to_lowercase());
        }
    }
    let host = strip_protocol(referrer)
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    if host.is_empty() {
        None
    } else {
        Some(host.to_lowercase())
    }
}

/// Grouping key for a session's referrer in breakdown tables: the referrer
/// with its protocol and path removed, or [`DIRECT_LABEL`].
///
/// # Example
/// ```
/// use revtrail_tracking::channel::{referrer_bucket, DIRECT_LABEL};
///
/// assert_eq!(referrer_bucket(Some("https://www.google.com/search?q=x")), "www.google.com");
/// assert_eq!(referrer_bucket(None), DIRECT_LABEL);
/// ```
pub fn referrer_bucket(referrer: Option<&str>) -> String {
    if is_direct(referrer) {
        return DIRECT_LABEL.to_string();
    }
    let value = referrer.unwrap_or_default().trim();
    let bucket = strip_protocol(value).split('/').next().unwrap_or_default();
    if bucket.is_empty() {
        DIRECT_LABEL.to_string()
    } else {
        bucket.to_string()
    }
}

const STRIPPED_TLDS: &[&str] = &[
    "com", "org", "net", "io", "co", "dev", "ai", "app", "xyz", "me", "tv", "cc",
];

fn brand_name(clean_domain: &str) -> Option<&'static str> {
    let name = match clean_domain {
        "x" | "twitter" | "x.com" => "X",
        "youtube" | "youtube.com" => "YouTube",
        "facebook" | "facebook.com" => "Facebook",
        "instagram" | "instagram.com" => "Instagram",
        "linkedin" | "linkedin.com" => "LinkedIn",
        "medium" | "medium.com" => "Medium",
        "telegram" | "telegram.org" => "Telegram",
        "producthunt" | "producthunt.com" => "Product Hunt",
        "reddit" | "reddit.com" => "Reddit",
        "hackernews" | "news.ycombinator" | "news.ycombinator.com" => "Hacker News",
        "tiktok" | "tiktok.com" => "TikTok",
        "pinterest" | "pinterest.com" => "Pinterest",
        "snapchat" | "snapchat.com" => "Snapchat",
        "discord" | "discord.com" => "Discord",
        "slack" | "slack.com" => "Slack",
        "whatsapp" | "whatsapp.com" => "WhatsApp",
        "chatgpt" | "chat.openai" | "chat.openai.com" => "ChatGPT",
        "openai" | "openai.com" => "OpenAI",
        "perplexity" | "perplexity.ai" => "Perplexity",
        "gemini" | "gemini.google" | "gemini.google.com" => "Google Gemini",
        "claude" | "claude.ai" => "Claude",
        "anthropic" | "anthropic.com" => "Anthropic",
        "bard" => "Google Bard",
        "copilot" | "copilot.microsoft" | "copilot.microsoft.com" => "Microsoft Copilot",
        "google" | "google.com" => "Google",
        "bing" | "bing.com" => "Bing",
        "duckduckgo" | "duckduckgo.com" => "DuckDuckGo",
        "brave" | "brave.com" => "Brave",
        "yandex" | "yandex.com" => "Yandex",
        "kagi" | "kagi.com" => "Kagi",
        "ecosia" | "ecosia.org" => "Ecosia",
        "baidu" | "baidu.com" => "Baidu",
        "yahoo" | "yahoo.com" => "Yahoo",
        "ask" | "ask.com" => "Ask.com",
        "beehiiv" | "beehiiv.com" => "Beehiiv",
        "substack" | "substack.com" => "Substack",
        "mailchimp" | "mailchimp.com" => "Mailchimp",
        "convertkit" | "convertkit.com" => "ConvertKit",
        "ghost" | "ghost.org" => "Ghost",
        _ => return None,
    };
    Some(name)
}

fn title_case(part: &str) -> String {
    let mut chars = part.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Human-readable name for a referrer domain
///
/// Strips `www.` and one common TLD, maps well-known domains to their brand
/// and title-cases anything else.
///
/// # Example
/// ```
/// use revtrail_tracking::channel::format_referrer_name;
///
/// assert_eq!(format_referrer_name("news.ycombinator.com"), "Hacker News");
/// assert_eq!(format_referrer_name("www.indiehackers.com"), "Indiehackers");
/// assert_eq!(format_referrer_name("blog.example.io"), "Blog Example");
/// ```
pub fn format_referrer_name(domain: &str) -> String {
    if is_direct(Some(domain)) {
        return DIRECT_LABEL.to_string();
    }

    let lowered = domain.trim().to_lowercase();
    let without_www = lowered.strip_prefix("www.").unwrap_or(&lowered);
    let clean_domain = match without_www.rsplit_once('.') {
        Some((rest, tld)) if STRIPPED_TLDS.contains(&tld) => rest,
        _ => without_www,
    };

    if let Some(brand) = brand_name(clean_domain) {
        return brand.to_string();
    }

    clean_domain
        .split('.')
        .map(title_case)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Favicon URL for a referrer domain, with a sentinel icon for direct traffic
pub fn referrer_image_url(domain: Option<&str>) -> String {
    if is_direct(domain) {
        return format!("{}/none.ico", ICON_SERVICE);
    }
    let lowered = domain.unwrap_or_default().trim().to_lowercase();
    let clean = lowered.strip_prefix("www.").unwrap_or(&lowered);
    format!("{}/{}.ico", ICON_SERVICE, clean)
}

/// Whether a referrer domain is a community source shown as a `ref` link
pub fn is_alternative_source(domain: &str) -> bool {
    let lowered = domain.to_lowercase();
    ALTERNATIVE_SOURCES.iter().any(|s| lowered.contains(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_direct() {
        assert_eq!(resolve_channel(None, None), Channel::Direct);
        assert_eq!(resolve_channel(Some(""), Some("cpc")), Channel::Direct);
        assert_eq!(resolve_channel(Some("  Direct "), None), Channel::Direct);
    }

    #[test]
    fn test_direct_label_classifies_like_its_bucket() {
        assert_eq!(resolve_channel(Some(DIRECT_LABEL), None), Channel::Direct);
        assert_eq!(resolve_channel(Some("direct/none"), None), Channel::Direct);
        assert_eq!(referrer_bucket(Some(DIRECT_LABEL)), DIRECT_LABEL);
    }

    #[test]
    fn test_channel_paid_social_vs_display() {
        assert_eq!(
            resolve_channel(Some("https://facebook.com"), Some("cpc")),
            Channel::PaidSocial
        );
        assert_eq!(
            resolve_channel(Some("https://l.instagram.com/?u=x"), Some("Sponsored")),
            Channel::PaidSocial
        );
        assert_eq!(
            resolve_channel(Some("https://x.com/someone"), Some("ads")),
            Channel::PaidSocial
        );
        assert_eq!(
            resolve_channel(Some("https://some-blog.com"), Some("display")),
            Channel::Display
        );
        // Paid intent beats every organic rule
        assert_eq!(
            resolve_channel(Some("https://www.google.com"), Some("ppc")),
            Channel::Display
        );
    }

    #[test]
    fn test_channel_newsletter() {
        assert_eq!(
            resolve_channel(Some("https://google.com"), Some("email")),
            Channel::Newsletter
        );
        assert_eq!(
            resolve_channel(Some("https://weekly.beehiiv.com/p/issue-4"), None),
            Channel::Newsletter
        );
        assert_eq!(
            resolve_channel(Some("https://someone.substack.com"), None),
            Channel::Newsletter
        );
    }

    #[test]
    fn test_channel_ai_before_search() {
        assert_eq!(resolve_channel(Some("https://chatgpt.com/"), None), Channel::Ai);
        assert_eq!(
            resolve_channel(Some("https://gemini.google.com/app"), None),
            Channel::Ai
        );
        assert_eq!(resolve_channel(Some("https://www.perplexity.ai"), None), Channel::Ai);
    }

    #[test]
    fn test_channel_organic_search() {
        for referrer in [
            "https://www.google.com/search?q=revtrail",
            "https://www.bing.com/",
            "https://duckduckgo.com/",
            "https://search.brave.com/search?q=x",
            "https://www.ask.com/web?q=x",
        ] {
            assert_eq!(
                resolve_channel(Some(referrer), None),
                Channel::OrganicSearch,
                "{}",
                referrer
            );
        }
    }

    #[test]
    fn test_channel_organic_social() {
        assert_eq!(
            resolve_channel(Some("https://facebook.com"), None),
            Channel::OrganicSocial
        );
        assert_eq!(
            resolve_channel(Some("https://news.ycombinator.com"), None),
            Channel::OrganicSocial
        );
        assert_eq!(
            resolve_channel(Some("https://www.reddit.com/r/rust"), None),
            Channel::OrganicSocial
        );
        assert_eq!(resolve_channel(Some("https://t.x.com"), None), Channel::OrganicSocial);
    }

    #[test]
    fn test_host_matching_respects_label_boundaries() {
        // Contain the letter x or the word "medium" without being those sites
        assert_eq!(
            resolve_channel(Some("https://www.dropbox.com/s/file"), None),
            Channel::Referral
        );
        assert_eq!(
            resolve_channel(Some("https://mediumrare-blog.com/post"), None),
            Channel::Referral
        );
        assert_eq!(
            resolve_channel(Some("https://googleusercontent-mirror.net/a"), None),
            Channel::Referral
        );
    }

    #[test]
    fn test_channel_affiliate() {
        assert_eq!(
            resolve_channel(Some("https://partner-site.com/deals"), Some("affiliate")),
            Channel::Affiliate
        );
        assert_eq!(
            resolve_channel(Some("https://partner-site.com/deals"), Some("referral")),
            Channel::Affiliate
        );
        assert_eq!(resolve_channel(Some("via=marc"), None), Channel::Affiliate);
        assert_eq!(resolve_channel(Some("hackernews"), None), Channel::OrganicSocial);
    }

    #[test]
    fn test_channel_referral_fallback() {
        assert_eq!(
            resolve_channel(Some("https://example-blog.com/review"), None),
            Channel::Referral
        );
        // Short but dotted domains are not affiliate slugs
        assert_eq!(resolve_channel(Some("https://a.io"), None), Channel::Referral);
    }

    #[test]
    fn test_every_rule_is_reachable() {
        let cases = [
            ("direct", None, None),
            ("paid-social", Some("https://facebook.com"), Some("cpc")),
            ("display", Some("https://blog.com"), Some("cpc")),
            ("newsletter", Some("https://blog.com"), Some("newsletter")),
            ("ai", Some("https://claude.ai"), None),
            ("organic-search", Some("https://kagi.com"), None),
            ("organic-social", Some("https://discord.com"), None),
            ("affiliate", Some("ref-slug"), None),
        ];
        for (name, referrer, medium) in cases {
            let signal = ReferrerSignal::new(referrer, medium);
            assert_eq!(matching_rule(&signal).map(|r| r.name), Some(name));
        }
        let fallback = ReferrerSignal::new(Some("https://example.com/a"), None);
        assert!(matching_rule(&fallback).is_none());
    }

    #[test]
    fn test_channel_string_forms() {
        assert_eq!(Channel::Ai.to_string(), "A.I.");
        assert_eq!(
            serde_json::to_string(&Channel::OrganicSocial).unwrap(),
            r#""Organic social""#
        );
        assert_eq!("paid social".parse::<Channel>().unwrap(), Channel::PaidSocial);
        assert!("Carrier pigeon".parse::<Channel>().is_err());
    }

    #[test]
    fn test_referrer_bucket() {
        assert_eq!(referrer_bucket(Some("https://www.google.com/search")), "www.google.com");
        assert_eq!(referrer_bucket(Some("http://news.ycombinator.com")), "news.ycombinator.com");
        assert_eq!(referrer_bucket(Some("via=marc")), "via=marc");
        assert_eq!(referrer_bucket(Some("direct")), DIRECT_LABEL);
        assert_eq!(referrer_bucket(Some("   ")), DIRECT_LABEL);
    }

    #[test]
    fn test_format_referrer_name() {
        assert_eq!(format_referrer_name("www.google.com"), "Google");
        assert_eq!(format_referrer_name("x.com"), "X");
        assert_eq!(format_referrer_name("chat.openai.com"), "ChatGPT");
        assert_eq!(format_referrer_name("ask.com"), "Ask.com");
        assert_eq!(format_referrer_name("my-cool-site.org"), "My-cool-site");
        assert_eq!(format_referrer_name("bbc.co.uk"), "Bbc Co Uk");
        assert_eq!(format_referrer_name(""), DIRECT_LABEL);
        assert_eq!(format_referrer_name("Direct/None"), DIRECT_LABEL);
    }

    #[test]
    fn test_referrer_image_url() {
        assert_eq!(
            referrer_image_url(Some("www.Google.com")),
            "https://icons.duckduckgo.com/ip3/google.com.ico"
        );
        assert_eq!(
            referrer_image_url(None),
            "https://icons.duckduckgo.com/ip3/none.ico"
        );
        assert_eq!(
            referrer_image_url(Some("direct")),
            "https://icons.duckduckgo.com/ip3/none.ico"
        );
    }

    #[test]
    fn test_alternative_sources() {
        assert!(is_alternative_source("www.producthunt.com"));
        assert!(is_alternative_source("news.ycombinator.com"));
        assert!(is_alternative_source("www.indiehackers.com"));
        assert!(!is_alternative_source("www.google.com"));
    }
}
