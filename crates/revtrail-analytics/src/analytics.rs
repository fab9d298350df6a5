use crate::channels::{group_key, ChannelAggregator};
use crate::traits::Analytics;
use crate::types::responses::{
    BreakdownItem, ChannelBreakdown, Metrics, RealtimeVisitor, RevenuePoint, SalesPoint,
    VisitorsPoint,
};
use crate::types::{
    percentage, AnalyticsError, LocationDimension, PathDimension, SourceDimension,
    SystemDimension,
};
use async_trait::async_trait;
use revtrail_core::{AnalyticsConfig, DateRange, Granularity, UtcDateTime};
use revtrail_database::EventStore;
use revtrail_entities::{page_views, sessions};
use revtrail_tracking::resolve_channel;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

const UNKNOWN: &str = "Unknown";
const DIRECT: &str = "Direct";

pub struct AnalyticsService {
    store: Arc<dyn EventStore>,
    config: AnalyticsConfig,
}

impl AnalyticsService {
    pub fn new(store: Arc<dyn EventStore>, config: AnalyticsConfig) -> Self {
        AnalyticsService { store, config }
    }

    async fn page_views(
        &self,
        website_id: &str,
        range: DateRange,
    ) -> Result<Vec<page_views::Model>, AnalyticsError> {
        let mut views = self.store.page_views_between(website_id, range).await?;
        views.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        Ok(views)
    }

    /// Frequency table over page views, top-N by count
    async fn count_page_views<F>(
        &self,
        website_id: &str,
        range: DateRange,
        key: F,
    ) -> Result<Vec<BreakdownItem>, AnalyticsError>
    where
        F: Fn(&page_views::Model) -> String + Send,
    {
        let views = self.page_views(website_id, range).await?;
        let mut counts: HashMap<String, i64> = HashMap::new();
        for view in &views {
            *counts.entry(key(view)).or_default() += 1;
        }
        Ok(top_n(counts, self.config.breakdown_limit))
    }
}

fn or_label(value: Option<&str>, label: &str) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => label.to_string(),
    }
}

/// Sort by count descending, then name, and keep the first `limit` rows
fn top_n(counts: HashMap<String, i64>, limit: usize) -> Vec<BreakdownItem> {
    let mut items: Vec<BreakdownItem> = counts
        .into_iter()
        .map(|(name, value)| BreakdownItem { name, value })
        .collect();
    items.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.name.cmp(&b.name)));
    items.truncate(limit);
    items
}

/// Engagement heuristic for a live session, capped at 100
pub fn conversion_score(page_views: i32, duration_secs: i64) -> i64 {
    let minutes = (duration_secs as f64 / 60.0).min(30.0);
    let score = (page_views as f64 * 10.0 + minutes * 2.0) / 2.0;
    score.round().min(100.0) as i64
}

fn entry_and_exit_counts(
    views: &[page_views::Model],
    dimension: PathDimension,
) -> HashMap<String, i64> {
    // Views are in timestamp order: first write wins for entry, last for exit
    let mut per_session: HashMap<&str, &str> = HashMap::new();
    for view in views {
        match dimension {
            PathDimension::Entry => {
                per_session
                    .entry(view.session_id.as_str())
                    .or_insert(view.path.as_str());
            }
            _ => {
                per_session.insert(view.session_id.as_str(), view.path.as_str());
            }
        }
    }

    let mut counts: HashMap<String, i64> = HashMap::new();
    for path in per_session.into_values() {
        *counts.entry(path.to_string()).or_default() += 1;
    }
    counts
}

fn realtime_row(
    session: &sessions::Model,
    current: Option<&page_views::Model>,
) -> RealtimeVisitor {
    let duration = session.effective_duration();
    RealtimeVisitor {
        visitor_id: session.visitor_id.clone(),
        session_id: session.session_id.clone(),
        country: session.country.clone(),
        region: session.region.clone(),
        city: session.city.clone(),
        device: session.device.clone(),
        browser: session.browser.clone(),
        os: session.os.clone(),
        referrer: session.referrer.clone(),
        referrer_domain: session.referrer_domain.clone(),
        channel: resolve_channel(session.referrer.as_deref(), session.utm_medium.as_deref()),
        current_path: current
            .map(|view| view.path.clone())
            .unwrap_or_else(|| "/".to_string()),
        last_seen_at: session.last_seen_at,
        page_views: session.page_views,
        duration,
        conversion_score: conversion_score(session.page_views, duration),
    }
}

#[async_trait]
impl Analytics for AnalyticsService {
    async fn visitors_over_time(
        &self,
        website_id: &str,
        range: DateRange,
        granularity: Granularity,
    ) -> Result<Vec<VisitorsPoint>, AnalyticsError> {
        let views = self.page_views(website_id, range).await?;

        let mut buckets: BTreeMap<UtcDateTime, HashSet<&str>> = BTreeMap::new();
        for view in &views {
            buckets
                .entry(granularity.truncate(view.timestamp))
                .or_default()
                .insert(view.visitor_id.as_str());
        }

        Ok(buckets
            .into_iter()
            .map(|(date, visitors)| VisitorsPoint {
                date,
                visitors: visitors.len() as i64,
            })
            .collect())
    }

    async fn revenue_over_time(
        &self,
        website_id: &str,
        range: DateRange,
        granularity: Granularity,
    ) -> Result<Vec<RevenuePoint>, AnalyticsError> {
        let payments = self.store.payments_between(website_id, range).await?;

        let mut buckets: BTreeMap<UtcDateTime, RevenuePoint> = BTreeMap::new();
        for payment in &payments {
            let date = granularity.truncate(payment.timestamp);
            let point = buckets.entry(date).or_insert_with(|| RevenuePoint {
                date,
                revenue_new: 0,
                renewal_revenue: 0,
                revenue_refund: 0,
            });
            if payment.refunded {
                point.revenue_refund += payment.amount;
            } else if payment.renewal {
                point.renewal_revenue += payment.amount;
            } else {
                point.revenue_new += payment.amount;
            }
        }

        Ok(buckets.into_values().collect())
    }

    async fn customers_and_sales_over_time(
        &self,
        website_id: &str,
        range: DateRange,
        granularity: Granularity,
    ) -> Result<Vec<SalesPoint>, AnalyticsError> {
        let payments = self.store.payments_between(website_id, range).await?;

        let mut buckets: BTreeMap<UtcDateTime, (HashSet<&str>, i64)> = BTreeMap::new();
        for payment in payments.iter().filter(|p| !p.refunded) {
            let (customers, sales) = buckets
                .entry(granularity.truncate(payment.timestamp))
                .or_default();
            if let Some(customer_id) = payment.customer_id.as_deref() {
                customers.insert(customer_id);
            }
            *sales += 1;
        }

        Ok(buckets
            .into_iter()
            .map(|(date, (customers, sales))| SalesPoint {
                date,
                customers: customers.len() as i64,
                sales,
            })
            .collect())
    }

    async fn channel_breakdown(
        &self,
        website_id: &str,
        range: DateRange,
    ) -> Result<Vec<ChannelBreakdown>, AnalyticsError> {
        let sessions = self
            .store
            .sessions_started_between(website_id, range)
            .await?;

        let mut aggregator = ChannelAggregator::default();
        for session in &sessions {
            aggregator.add_session(session);
        }

        let payments: Vec<_> = self
            .store
            .payments_between(website_id, range)
            .await?
            .into_iter()
            .filter(|p| !p.refunded && p.session_id.is_some())
            .collect();
        let goals: Vec<_> = self
            .store
            .goal_events_between(website_id, range)
            .await?
            .into_iter()
            .filter(|g| g.session_id.is_some())
            .collect();

        let mut linked_ids: Vec<String> = payments
            .iter()
            .filter_map(|p| p.session_id.clone())
            .chain(goals.iter().filter_map(|g| g.session_id.clone()))
            .collect();
        linked_ids.sort();
        linked_ids.dedup();

        let linked: HashMap<String, sessions::Model> = if linked_ids.is_empty() {
            HashMap::new()
        } else {
            self.store
                .sessions_by_ids(website_id, &linked_ids)
                .await?
                .into_iter()
                .map(|s| (s.session_id.clone(), s))
                .collect()
        };

        let mut unmatched = 0usize;
        for payment in &payments {
            let session = payment.session_id.as_ref().and_then(|id| linked.get(id));
            let attached = match session {
                Some(session) => aggregator.add_payment(&group_key(session), payment),
                None => false,
            };
            if !attached {
                unmatched += 1;
            }
        }
        for goal in &goals {
            if let Some(session) = goal.session_id.as_ref().and_then(|id| linked.get(id)) {
                aggregator.add_goal(&group_key(session), goal, &session.visitor_id);
            }
        }

        if unmatched > 0 {
            debug!(
                "{} payments for website {} had no session group in range",
                unmatched, website_id
            );
        }

        Ok(aggregator.finish())
    }

    async fn path_breakdown(
        &self,
        website_id: &str,
        range: DateRange,
        dimension: PathDimension,
    ) -> Result<Vec<BreakdownItem>, AnalyticsError> {
        match dimension {
            PathDimension::Page => {
                self.count_page_views(website_id, range, |v| v.path.clone())
                    .await
            }
            PathDimension::Hostname => {
                self.count_page_views(website_id, range, |v| {
                    or_label(v.hostname.as_deref(), UNKNOWN)
                })
                .await
            }
            PathDimension::Entry | PathDimension::Exit => {
                let views = self.page_views(website_id, range).await?;
                Ok(top_n(
                    entry_and_exit_counts(&views, dimension),
                    self.config.breakdown_limit,
                ))
            }
        }
    }

    async fn location_breakdown(
        &self,
        website_id: &str,
        range: DateRange,
        dimension: LocationDimension,
    ) -> Result<Vec<BreakdownItem>, AnalyticsError> {
        self.count_page_views(website_id, range, move |v| {
            let value = match dimension {
                LocationDimension::Country => v.country.as_deref(),
                LocationDimension::Region => v.region.as_deref(),
                LocationDimension::City => v.city.as_deref(),
            };
            or_label(value, UNKNOWN)
        })
        .await
    }

    async fn system_breakdown(
        &self,
        website_id: &str,
        range: DateRange,
        dimension: SystemDimension,
    ) -> Result<Vec<BreakdownItem>, AnalyticsError> {
        self.count_page_views(website_id, range, move |v| {
            let value = match dimension {
                SystemDimension::Browser => v.browser.as_deref(),
                SystemDimension::Os => v.os.as_deref(),
                SystemDimension::Device => v.device.as_deref(),
            };
            or_label(value, UNKNOWN)
        })
        .await
    }

    async fn source_breakdown(
        &self,
        website_id: &str,
        range: DateRange,
        dimension: SourceDimension,
    ) -> Result<Vec<BreakdownItem>, AnalyticsError> {
        self.count_page_views(website_id, range, move |v| {
            let value = match dimension {
                SourceDimension::Referrer => v.referrer_domain.as_deref(),
                SourceDimension::Campaign => v.utm_campaign.as_deref(),
                SourceDimension::Keyword => v.utm_term.as_deref(),
            };
            or_label(value, DIRECT)
        })
        .await
    }

    async fn metrics(
        &self,
        website_id: &str,
        range: DateRange,
    ) -> Result<Metrics, AnalyticsError> {
        let views = self.store.page_views_between(website_id, range).await?;
        let sessions = self
            .store
            .sessions_started_between(website_id, range)
            .await?;
        let payments = self.store.payments_between(website_id, range).await?;

        let visitors: HashSet<&str> = views.iter().map(|v| v.visitor_id.as_str()).collect();

        let gross: i64 = payments.iter().map(|p| p.amount).sum();
        let revenue_refund: i64 = payments
            .iter()
            .filter(|p| p.refunded)
            .map(|p| p.amount)
            .sum();
        let revenue = gross - revenue_refund;

        let session_ids: HashSet<&str> = sessions.iter().map(|s| s.session_id.as_str()).collect();
        let converted: HashSet<&str> = payments
            .iter()
            .filter(|p| !p.refunded)
            .filter_map(|p| p.session_id.as_deref())
            .filter(|id| session_ids.contains(id))
            .collect();

        let bounced = sessions.iter().filter(|s| s.bounce).count();
        let session_time = if sessions.is_empty() {
            0.0
        } else {
            sessions
                .iter()
                .map(|s| s.effective_duration() as f64)
                .sum::<f64>()
                / sessions.len() as f64
        };
        let revenue_per_visitor = if visitors.is_empty() {
            0
        } else {
            revenue / visitors.len() as i64
        };

        Ok(Metrics {
            visitors: visitors.len() as i64,
            page_views: views.len() as i64,
            revenue,
            revenue_refund,
            net_revenue: gross - revenue_refund,
            sessions: sessions.len() as i64,
            bounce_rate: percentage(bounced, sessions.len()),
            session_time,
            conversion_rate: percentage(converted.len(), sessions.len()),
            revenue_per_visitor,
        })
    }

    async fn visitors_now(
        &self,
        website_id: &str,
        now: UtcDateTime,
    ) -> Result<i64, AnalyticsError> {
        let window = DateRange::new(now - self.config.live_window(), now);
        let sessions = self.store.sessions_seen_between(website_id, window).await?;
        let visitors: HashSet<&str> = sessions.iter().map(|s| s.visitor_id.as_str()).collect();
        Ok(visitors.len() as i64)
    }

    async fn realtime_visitors(
        &self,
        website_id: &str,
        now: UtcDateTime,
    ) -> Result<Vec<RealtimeVisitor>, AnalyticsError> {
        let window = DateRange::new(now - self.config.live_window(), now);
        let mut sessions = self.store.sessions_seen_between(website_id, window).await?;
        sessions.sort_by(|a, b| b.last_seen_at.cmp(&a.last_seen_at));
        sessions.truncate(self.config.realtime_limit);
        if sessions.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = sessions.iter().map(|s| s.session_id.clone()).collect();
        let current = self
            .store
            .latest_page_views_for_sessions(website_id, &ids)
            .await?;

        Ok(sessions
            .iter()
            .map(|session| realtime_row(session, current.get(&session.session_id)))
            .collect())
    }
}
