//! Channel and referrer grouping for [`crate::Analytics::channel_breakdown`]

use revtrail_entities::{goal_events, payments, sessions};
use revtrail_tracking::{
    extract_url_params, format_referrer_name, is_alternative_source, referrer_bucket,
    referrer_image_url, resolve_channel, Channel,
};
use std::collections::{HashMap, HashSet};

use crate::types::{ratio, ChannelBreakdown, ReferrerBreakdown, ReferrerType};

/// `(channel, referrer bucket)` a session is grouped under
pub(crate) type GroupKey = (Channel, String);

pub(crate) fn group_key(session: &sessions::Model) -> GroupKey {
    (
        resolve_channel(session.referrer.as_deref(), session.utm_medium.as_deref()),
        referrer_bucket(session.referrer.as_deref()),
    )
}

struct ReferrerGroup {
    channel: Channel,
    bucket: String,
    // First-touch context of the first session seen in the group
    referrer: Option<String>,
    utm_source: Option<String>,
    utm_medium: Option<String>,
    visitors: HashSet<String>,
    revenue: i64,
    payment_count: i64,
    sessions_with_payments: HashSet<String>,
    goal_count: i64,
    visitors_with_goals: HashSet<String>,
}

impl ReferrerGroup {
    fn new(key: GroupKey, session: &sessions::Model) -> Self {
        let (channel, bucket) = key;
        Self {
            channel,
            bucket,
            referrer: session.referrer.clone(),
            utm_source: session.utm_source.clone(),
            utm_medium: session.utm_medium.clone(),
            visitors: HashSet::new(),
            revenue: 0,
            payment_count: 0,
            sessions_with_payments: HashSet::new(),
            goal_count: 0,
            visitors_with_goals: HashSet::new(),
        }
    }

    fn to_breakdown(&self) -> ReferrerBreakdown {
        let params = extract_url_params(self.referrer.as_deref());
        let alternative = is_alternative_source(&self.bucket);
        let uv = self.visitors.len();

        ReferrerBreakdown {
            name: format_referrer_name(&self.bucket),
            channel: self.channel,
            uv: uv as i64,
            image: referrer_image_url(Some(&self.bucket)),
            is_alternative_source: alternative,
            referrer_type: if alternative {
                ReferrerType::Ref
            } else {
                ReferrerType::Referrer
            },
            original_value: self.bucket.clone(),
            has_paid_medium: false,
            paid_medium_hint: None,
            revenue: self.revenue,
            payment_count: self.payment_count,
            conversion_rate: ratio(self.sessions_with_payments.len(), uv),
            goal_count: self.goal_count,
            goal_conversion_rate: ratio(self.visitors_with_goals.len(), uv),
            param_ref: params.param_ref,
            param_via: params.param_via,
            utm_source: self.utm_source.clone().or(params.utm_source),
            utm_medium: self.utm_medium.clone().or(params.utm_medium),
        }
    }
}

/// Accumulates sessions, payments and goals into referrer groups, then folds
/// the groups into channels.
#[derive(Default)]
pub(crate) struct ChannelAggregator {
    groups: Vec<ReferrerGroup>,
    index: HashMap<GroupKey, usize>,
}

impl ChannelAggregator {
    pub fn add_session(&mut self, session: &sessions::Model) {
        let key = group_key(session);
        let idx = match self.index.get(&key) {
            Some(idx) => *idx,
            None => {
                self.groups.push(ReferrerGroup::new(key.clone(), session));
                self.index.insert(key, self.groups.len() - 1);
                self.groups.len() - 1
            }
        };
        self.groups[idx]
            .visitors
            .insert(session.visitor_id.clone());
    }

    /// Attach a payment to the group of its session. Returns false when no
    /// session in the range produced that group.
    pub fn add_payment(&mut self, key: &GroupKey, payment: &payments::Model) -> bool {
        let Some(&idx) = self.index.get(key) else {
            return false;
        };
        let group = &mut self.groups[idx];
        group.revenue += payment.amount;
        group.payment_count += 1;
        if let Some(session_id) = &payment.session_id {
            group.sessions_with_payments.insert(session_id.clone());
        }
        true
    }

    /// Attach a goal event. `session_visitor` stands in when the goal
    /// carries no visitor of its own.
    pub fn add_goal(
        &mut self,
        key: &GroupKey,
        goal: &goal_events::Model,
        session_visitor: &str,
    ) -> bool {
        let Some(&idx) = self.index.get(key) else {
            return false;
        };
        let group = &mut self.groups[idx];
        group.goal_count += 1;
        let visitor = goal.visitor_id.as_deref().unwrap_or(session_visitor);
        group.visitors_with_goals.insert(visitor.to_string());
        true
    }

    pub fn finish(self) -> Vec<ChannelBreakdown> {
        let mut order: Vec<Channel> = Vec::new();
        let mut members: HashMap<Channel, Vec<&ReferrerGroup>> = HashMap::new();
        for group in &self.groups {
            if !members.contains_key(&group.channel) {
                order.push(group.channel);
            }
            members.entry(group.channel).or_default().push(group);
        }

        let mut channels: Vec<ChannelBreakdown> = order
            .into_iter()
            .map(|channel| {
                let groups = members.remove(&channel).unwrap_or_default();
                fold_channel(channel, &groups)
            })
            .collect();
        channels.sort_by(|a, b| b.uv.cmp(&a.uv));
        channels
    }
}

fn fold_channel(channel: Channel, groups: &[&ReferrerGroup]) -> ChannelBreakdown {
    let mut visitors: HashSet<&str> = HashSet::new();
    let mut sessions_with_payments: HashSet<&str> = HashSet::new();
    let mut visitors_with_goals: HashSet<&str> = HashSet::new();
    let mut revenue = 0;
    let mut payment_count = 0;
    let mut goal_count = 0;

    for group in groups {
        visitors.extend(group.visitors.iter().map(String::as_str));
        sessions_with_payments.extend(group.sessions_with_payments.iter().map(String::as_str));
        visitors_with_goals.extend(group.visitors_with_goals.iter().map(String::as_str));
        revenue += group.revenue;
        payment_count += group.payment_count;
        goal_count += group.goal_count;
    }

    let mut referrers: Vec<ReferrerBreakdown> =
        groups.iter().map(|group| group.to_breakdown()).collect();
    referrers.sort_by(|a, b| b.uv.cmp(&a.uv));

    let uv = visitors.len();
    ChannelBreakdown {
        name: channel,
        uv: uv as i64,
        revenue,
        payment_count,
        conversion_rate: ratio(sessions_with_payments.len(), uv),
        goal_count,
        goal_conversion_rate: ratio(visitors_with_goals.len(), uv),
        image: referrers.first().map(|r| r.image.clone()),
        referrers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use revtrail_tracking::DIRECT_LABEL;

    fn session(id: &str, visitor: &str, referrer: Option<&str>) -> sessions::Model {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        sessions::Model {
            id: 0,
            website_id: "site".to_string(),
            session_id: id.to_string(),
            visitor_id: visitor.to_string(),
            first_visit_at: at,
            last_seen_at: at,
            page_views: 1,
            duration: 0,
            bounce: true,
            referrer: referrer.map(String::from),
            referrer_domain: None,
            utm_source: None,
            utm_medium: None,
            utm_campaign: None,
            utm_term: None,
            utm_content: None,
            landing_path: Some("/".to_string()),
            device: None,
            browser: None,
            os: None,
            country: None,
            region: None,
            city: None,
        }
    }

    #[test]
    fn test_channel_uv_is_union_of_referrers() {
        let mut agg = ChannelAggregator::default();
        agg.add_session(&session("s1", "v1", Some("https://www.google.com/search")));
        agg.add_session(&session("s2", "v1", Some("https://duckduckgo.com/")));
        agg.add_session(&session("s3", "v2", Some("https://duckduckgo.com/?q=x")));

        let channels = agg.finish();
        assert_eq!(channels.len(), 1);
        let search = &channels[0];
        assert_eq!(search.name, Channel::OrganicSearch);
        assert_eq!(search.uv, 2);
        let referrer_uv: i64 = search.referrers.iter().map(|r| r.uv).sum();
        assert_eq!(referrer_uv, 3);
        assert_eq!(search.referrers[0].original_value, "duckduckgo.com");
        assert_eq!(search.image, Some(search.referrers[0].image.clone()));
    }

    #[test]
    fn test_payments_and_goals_attach_to_groups() {
        let mut agg = ChannelAggregator::default();
        let direct = session("s1", "v1", None);
        agg.add_session(&direct);
        agg.add_session(&session("s2", "v2", None));

        let key = group_key(&direct);
        assert_eq!(key, (Channel::Direct, DIRECT_LABEL.to_string()));

        let payment = payments::Model {
            id: 1,
            website_id: "site".to_string(),
            provider: "stripe".to_string(),
            provider_payment_id: "pi_1".to_string(),
            amount: 1500,
            currency: "usd".to_string(),
            refunded: false,
            renewal: false,
            customer_email: None,
            customer_id: None,
            metadata: None,
            visitor_id: Some("v1".to_string()),
            session_id: Some("s1".to_string()),
            attribution_method: Some("timestamp".to_string()),
            timestamp: direct.first_visit_at,
        };
        assert!(agg.add_payment(&key, &payment));
        assert!(!agg.add_payment(&(Channel::Ai, "chatgpt.com".to_string()), &payment));

        let goal = goal_events::Model {
            id: 1,
            website_id: "site".to_string(),
            event: "signup".to_string(),
            visitor_id: None,
            session_id: Some("s1".to_string()),
            path: None,
            value: None,
            timestamp: direct.first_visit_at,
        };
        assert!(agg.add_goal(&key, &goal, "v1"));

        let channels = agg.finish();
        let direct = &channels[0];
        assert_eq!(direct.uv, 2);
        assert_eq!(direct.revenue, 1500);
        assert_eq!(direct.payment_count, 1);
        assert_eq!(direct.conversion_rate, 0.5);
        assert_eq!(direct.goal_count, 1);
        assert_eq!(direct.goal_conversion_rate, 0.5);
        assert_eq!(direct.referrers[0].name, DIRECT_LABEL);
    }

    #[test]
    fn test_referrer_params_prefer_session_utm() {
        let mut first = session(
            "s1",
            "v1",
            Some("https://www.producthunt.com/posts/x?ref=launch&utm_source=ph"),
        );
        first.utm_medium = Some("social".to_string());
        first.utm_source = Some("producthunt".to_string());

        let mut agg = ChannelAggregator::default();
        agg.add_session(&first);
        let channels = agg.finish();
        let referrer = &channels[0].referrers[0];

        assert_eq!(referrer.param_ref.as_deref(), Some("launch"));
        assert_eq!(referrer.utm_source.as_deref(), Some("producthunt"));
        assert_eq!(referrer.utm_medium.as_deref(), Some("social"));
        assert_eq!(referrer.name, "Product Hunt");
    }
}
