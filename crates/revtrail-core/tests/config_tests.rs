use revtrail_core::config::{AppConfig, CookieConfig, DatabaseConfig};
use revtrail_core::{ServiceError, Website};

#[test]
fn test_database_config_serialization() {
    let config = DatabaseConfig {
        url: "postgresql://localhost:5432/test".to_string(),
        max_connections: 10,
        min_connections: 1,
    };

    let serialized = serde_json::to_string(&config).unwrap();
    assert!(serialized.contains("postgresql://localhost:5432/test"));

    let deserialized: DatabaseConfig = serde_json::from_str(&serialized).unwrap();
    assert_eq!(deserialized.url, config.url);
    assert_eq!(deserialized.max_connections, config.max_connections);
    assert_eq!(deserialized.min_connections, config.min_connections);
}

#[test]
fn test_cookie_config_defaults() {
    let config = CookieConfig::default();

    assert_eq!(config.visitor_cookie_name, "_pm_vid");
    assert_eq!(config.session_cookie_name, "_pm_sid");
    assert_eq!(config.visitor_max_age_days, 365);
    assert_eq!(config.session_max_age_minutes, 30);
    assert_eq!(config.session_ttl(), chrono::Duration::minutes(30));
    assert_eq!(config.same_site.as_deref(), Some("Lax"));
    assert!(!config.secure);
}

#[test]
fn test_app_config_partial_yaml_uses_defaults() {
    let yaml = r#"
database:
  url: "postgres://db/revtrail"
attribution:
  window_minutes: 90
"#;
    let config = AppConfig::from_yaml_str(yaml).unwrap();

    assert_eq!(config.database.url, "postgres://db/revtrail");
    assert_eq!(config.database.max_connections, 100);
    assert_eq!(config.attribution.window(), chrono::Duration::minutes(90));
    assert_eq!(config.analytics.breakdown_limit, 20);
    assert_eq!(config.analytics.live_window(), chrono::Duration::minutes(5));
    assert_eq!(config.cookies.session_cookie_name, "_pm_sid");
}

#[test]
fn test_app_config_invalid_yaml() {
    let result = AppConfig::from_yaml_str("database: [not, a, map]");
    assert!(matches!(result, Err(ServiceError::Configuration { .. })));
}

#[test]
fn test_app_config_from_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("revtrail.yaml");
    std::fs::write(
        &path,
        "analytics:\n  breakdown_limit: 5\ncookies:\n  secure: true\n",
    )
    .unwrap();

    let config = AppConfig::from_yaml_file(&path).unwrap();
    assert_eq!(config.analytics.breakdown_limit, 5);
    assert_eq!(config.analytics.realtime_limit, 100);
    assert!(config.cookies.secure);
}

#[test]
fn test_app_config_missing_file() {
    let result = AppConfig::from_yaml_file("/nonexistent/revtrail.yaml");
    assert!(matches!(result, Err(ServiceError::Configuration { .. })));
}

#[test]
fn test_website_settings_deserialize_camel_case() {
    let json = r#"{
        "id": "site_1",
        "settings": {
            "excludeIps": ["10.0.0.1"],
            "excludePaths": ["/admin"],
            "hashPaths": true
        }
    }"#;
    let website: Website = serde_json::from_str(json).unwrap();

    assert_eq!(website.id, "site_1");
    assert_eq!(website.settings.exclude_ips, vec!["10.0.0.1"]);
    assert_eq!(website.settings.exclude_paths, vec!["/admin"]);
    assert!(website.settings.exclude_countries.is_empty());
    assert!(website.settings.hash_paths);
}

#[test]
fn test_website_without_settings() {
    let website: Website = serde_json::from_str(r#"{"id": "site_2"}"#).unwrap();
    assert_eq!(website, Website::new("site_2"));
}
