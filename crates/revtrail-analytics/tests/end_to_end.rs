//! Beacons and payments flowing through ingestion into the aggregations

use chrono::{Duration, TimeZone, Utc};
use revtrail_analytics::{
    Analytics, AnalyticsService, LocationDimension, Metrics, PathDimension, ReferrerType,
    SourceDimension, SystemDimension,
};
use revtrail_core::{
    AnalyticsConfig, AttributionConfig, CookieConfig, DateRange, Granularity, UtcDateTime,
    Website,
};
use revtrail_database::{EventStore, MemoryEventStore};
use revtrail_revenue::{AttributionMethod, PaymentEvent, PaymentOutcome, PaymentService};
use revtrail_tracking::{
    Beacon, BeaconHeaders, BeaconStatus, Channel, GoalInput, Location, StaticLocator,
    TrackingService,
};
use std::sync::Arc;

const SITE: &str = "site_1";
const IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";

fn t0() -> UtcDateTime {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

fn hour_around(at: UtcDateTime) -> DateRange {
    DateRange::around(at, Duration::hours(1))
}

struct Harness {
    store: Arc<MemoryEventStore>,
    tracking: TrackingService,
    payments: PaymentService,
    analytics: AnalyticsService,
    website: Website,
}

impl Harness {
    fn new() -> Self {
        let store = Arc::new(MemoryEventStore::new());
        let locator = StaticLocator::new()
            .with_entry("203.0.113.7", Location::new("US", Some("California"), None))
            .unwrap();
        let tracking = TrackingService::new(store.clone(), CookieConfig::default())
            .with_geo(Arc::new(locator));
        let payments = PaymentService::new(store.clone(), &AttributionConfig::default());
        let analytics = AnalyticsService::new(store.clone(), AnalyticsConfig::default());
        Self {
            store,
            tracking,
            payments,
            analytics,
            website: Website::new(SITE),
        }
    }

    /// Send a beacon, echoing back `cookie` the way a browser would.
    /// Returns the cookie header for the next request and the session id.
    async fn visit(
        &self,
        path: &str,
        referrer: Option<&str>,
        cookie: Option<&str>,
        at: UtcDateTime,
    ) -> (String, String) {
        let beacon = Beacon {
            path: Some(path.to_string()),
            hostname: Some("shop.example.com".to_string()),
            title: None,
            url: Some(format!("https://shop.example.com{}", path)),
            referrer: referrer.map(String::from),
            headers: BeaconHeaders {
                user_agent: Some(IPHONE.to_string()),
                cookie: cookie.map(String::from),
                x_forwarded_for: Some("203.0.113.7".to_string()),
                ..Default::default()
            },
        };
        let outcome = self
            .tracking
            .record_beacon(&self.website, &beacon, at)
            .await
            .unwrap();
        let session_id = match &outcome.status {
            BeaconStatus::Recorded { session_id, .. } => session_id.clone(),
            other => panic!("expected recorded beacon, got {:?}", other),
        };
        let header = outcome
            .cookies
            .unwrap()
            .as_vec()
            .iter()
            .filter_map(|c| c.split(';').next().map(String::from))
            .collect::<Vec<_>>()
            .join("; ");
        (header, session_id)
    }
}

#[tokio::test]
async fn test_hacker_news_visit_converts_through_timestamp_tier() -> anyhow::Result<()> {
    let h = Harness::new();
    let (_, session_id) = h
        .visit("/pricing", Some("https://news.ycombinator.com"), None, t0())
        .await;

    let paid_at = t0() + Duration::minutes(10);
    let outcome = h
        .payments
        .ingest_payment(SITE, PaymentEvent::new("stripe", "pi_hn", 4900, "usd", paid_at))
        .await?;
    let PaymentOutcome::Recorded { attribution, .. } = &outcome else {
        panic!("expected new payment");
    };
    let attribution = attribution.as_ref().unwrap();
    assert_eq!(attribution.method, AttributionMethod::Timestamp);
    assert_eq!(attribution.session_id.as_deref(), Some(session_id.as_str()));

    let channels = h.analytics.channel_breakdown(SITE, hour_around(t0())).await?;
    assert_eq!(channels.len(), 1);
    let social = &channels[0];
    assert_eq!(social.name, Channel::OrganicSocial);
    assert_eq!(social.uv, 1);
    assert_eq!(social.revenue, 4900);
    assert_eq!(social.payment_count, 1);
    assert_eq!(social.conversion_rate, 1.0);

    let referrer = &social.referrers[0];
    assert_eq!(referrer.name, "Hacker News");
    assert_eq!(referrer.original_value, "news.ycombinator.com");
    assert_eq!(referrer.referrer_type, ReferrerType::Ref);
    assert_eq!(referrer.revenue, 4900);
    assert_eq!(referrer.conversion_rate, 1.0);

    let metrics = h.analytics.metrics(SITE, hour_around(t0())).await?;
    assert_eq!(metrics.revenue, 4900);
    assert_eq!(metrics.sessions, 1);
    assert_eq!(metrics.conversion_rate, 100.0);
    assert_eq!(metrics.revenue_per_visitor, 4900);
    Ok(())
}

#[tokio::test]
async fn test_fully_refunded_sale_nets_to_zero() -> anyhow::Result<()> {
    let h = Harness::new();
    h.payments
        .ingest_payment(SITE, PaymentEvent::new("stripe", "pi_r", 2500, "usd", t0()))
        .await?;
    h.payments.mark_refunded(SITE, "stripe", "pi_r").await?;

    let metrics = h.analytics.metrics(SITE, hour_around(t0())).await?;
    assert_eq!(metrics.revenue, 0);
    assert_eq!(metrics.revenue_refund, 2500);
    assert_eq!(metrics.net_revenue, 0);
    Ok(())
}

#[tokio::test]
async fn test_revenue_series_sums_to_metrics_totals() -> anyhow::Result<()> {
    let h = Harness::new();
    let range = DateRange::new(t0() - Duration::days(3), t0() + Duration::days(3));

    let mut first = PaymentEvent::new("stripe", "pi_1", 4900, "usd", t0() - Duration::days(2));
    first.customer_id = Some("cus_a".to_string());
    let mut renewal = PaymentEvent::new("stripe", "pi_2", 4900, "usd", t0());
    renewal.renewal = true;
    renewal.customer_id = Some("cus_a".to_string());
    let mut second = PaymentEvent::new("stripe", "pi_3", 9900, "usd", t0() + Duration::hours(1));
    second.customer_id = Some("cus_b".to_string());
    let refunded = PaymentEvent::new("stripe", "pi_4", 2500, "usd", t0() + Duration::days(1));

    for event in [first, renewal, second, refunded] {
        h.payments.ingest_payment(SITE, event).await?;
    }
    h.payments.mark_refunded(SITE, "stripe", "pi_4").await?;

    let series = h
        .analytics
        .revenue_over_time(SITE, range, Granularity::Day)
        .await?;
    assert_eq!(series.len(), 3);
    assert!(series.windows(2).all(|w| w[0].date < w[1].date));
    assert_eq!(series[1].revenue_new, 9900);
    assert_eq!(series[1].renewal_revenue, 4900);
    assert_eq!(series[2].revenue_refund, 2500);

    let metrics = h.analytics.metrics(SITE, range).await?;
    let total: i64 = series.iter().map(|p| p.total()).sum();
    assert_eq!(total, metrics.revenue + metrics.revenue_refund);
    assert_eq!(metrics.revenue, 19700);
    assert_eq!(metrics.net_revenue, 19700);
    // No page views, so no visitors to divide by
    assert_eq!(metrics.revenue_per_visitor, 0);

    let sales = h
        .analytics
        .customers_and_sales_over_time(SITE, range, Granularity::Day)
        .await?;
    assert_eq!(sales.len(), 2);
    assert_eq!((sales[0].customers, sales[0].sales), (1, 1));
    assert_eq!((sales[1].customers, sales[1].sales), (2, 2));
    Ok(())
}

#[tokio::test]
async fn test_empty_range_yields_empty_results() -> anyhow::Result<()> {
    let h = Harness::new();
    h.visit("/", None, None, t0()).await;
    let empty = DateRange::new(t0() + Duration::days(10), t0() + Duration::days(11));

    assert!(h
        .analytics
        .visitors_over_time(SITE, empty, Granularity::Hour)
        .await?
        .is_empty());
    assert!(h
        .analytics
        .revenue_over_time(SITE, empty, Granularity::Day)
        .await?
        .is_empty());
    assert!(h.analytics.channel_breakdown(SITE, empty).await?.is_empty());
    assert!(h
        .analytics
        .path_breakdown(SITE, empty, PathDimension::Entry)
        .await?
        .is_empty());
    assert!(h
        .analytics
        .location_breakdown(SITE, empty, LocationDimension::Country)
        .await?
        .is_empty());

    let metrics = h.analytics.metrics(SITE, empty).await?;
    assert_eq!(metrics, Metrics::default());
    assert_eq!(metrics.bounce_rate, 0.0);
    Ok(())
}

#[tokio::test]
async fn test_sessions_paths_and_live_visitors() -> anyhow::Result<()> {
    let h = Harness::new();

    let (cookie, session_a) = h.visit("/", Some("https://www.google.com/"), None, t0()).await;
    let (cookie, _) = h
        .visit("/pricing", None, Some(&cookie), t0() + Duration::minutes(1))
        .await;
    h.visit("/checkout", None, Some(&cookie), t0() + Duration::minutes(2))
        .await;
    h.visit("/blog", None, None, t0() + Duration::seconds(30)).await;

    let session = h.store.find_session(SITE, &session_a).await?.unwrap();
    assert_eq!(session.page_views, 3);
    assert!(!session.bounce);

    let range = hour_around(t0());
    let metrics = h.analytics.metrics(SITE, range).await?;
    assert_eq!(metrics.page_views, 4);
    assert_eq!(metrics.visitors, 2);
    assert_eq!(metrics.sessions, 2);
    assert_eq!(metrics.bounce_rate, 50.0);
    assert_eq!(metrics.session_time, 60.0);

    let names = |items: Vec<revtrail_analytics::BreakdownItem>| -> Vec<String> {
        items.into_iter().map(|i| i.name).collect()
    };
    let entry = h
        .analytics
        .path_breakdown(SITE, range, PathDimension::Entry)
        .await?;
    assert_eq!(names(entry), vec!["/", "/blog"]);
    let exit = h
        .analytics
        .path_breakdown(SITE, range, PathDimension::Exit)
        .await?;
    assert_eq!(names(exit), vec!["/blog", "/checkout"]);

    let devices = h
        .analytics
        .system_breakdown(SITE, range, SystemDimension::Device)
        .await?;
    assert_eq!(devices.len(), 1);
    assert_eq!((devices[0].name.as_str(), devices[0].value), ("mobile", 4));

    let regions = h
        .analytics
        .location_breakdown(SITE, range, LocationDimension::Region)
        .await?;
    assert_eq!(regions[0].name, "California");

    let sources = h
        .analytics
        .source_breakdown(SITE, range, SourceDimension::Referrer)
        .await?;
    assert_eq!(sources[0].name, "Direct");
    assert_eq!(sources[0].value, 3);

    let hourly = h
        .analytics
        .visitors_over_time(SITE, range, Granularity::Hour)
        .await?;
    assert_eq!(hourly.len(), 1);
    assert_eq!(hourly[0].date, t0());
    assert_eq!(hourly[0].visitors, 2);

    let now = t0() + Duration::minutes(3);
    assert_eq!(h.analytics.visitors_now(SITE, now).await?, 2);
    assert_eq!(
        h.analytics
            .visitors_now(SITE, t0() + Duration::minutes(10))
            .await?,
        0
    );

    let live = h.analytics.realtime_visitors(SITE, now).await?;
    assert_eq!(live.len(), 2);
    assert_eq!(live[0].session_id, session_a);
    assert_eq!(live[0].current_path, "/checkout");
    assert_eq!(live[0].channel, Channel::OrganicSearch);
    assert_eq!(live[0].conversion_score, 17);
    assert_eq!(live[1].current_path, "/blog");
    assert_eq!(live[1].conversion_score, 5);
    Ok(())
}

#[tokio::test]
async fn test_goals_attach_to_channel_of_session() -> anyhow::Result<()> {
    let h = Harness::new();
    let (cookie, _) = h
        .visit("/", Some("https://chatgpt.com/"), None, t0())
        .await;
    h.visit("/docs", Some("https://chatgpt.com/"), None, t0()).await;

    h.tracking
        .track_goal(
            &h.website,
            Some(&cookie),
            GoalInput {
                event: "signup".to_string(),
                ..Default::default()
            },
            t0() + Duration::minutes(1),
        )
        .await?;

    let channels = h.analytics.channel_breakdown(SITE, hour_around(t0())).await?;
    let ai = channels
        .iter()
        .find(|c| c.name == Channel::Ai)
        .expect("A.I. channel present");
    assert_eq!(ai.uv, 2);
    assert_eq!(ai.goal_count, 1);
    assert_eq!(ai.goal_conversion_rate, 0.5);
    assert_eq!(ai.referrers.len(), 1);
    assert_eq!(ai.referrers[0].name, "ChatGPT");
    Ok(())
}
