//! Custom types for common data structures and validation

use chrono::{
    DateTime as ChronoDateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime,
    TimeZone, Timelike, Utc,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;
use utoipa::ToSchema;

/// Database DateTime type used across all Revtrail crates
pub type DBDateTime = ChronoDateTime<Utc>;

/// Standard UTC DateTime type used across all Revtrail crates
///
/// This is the canonical datetime type for:
/// - API responses (serializes as ISO 8601 with 'Z' suffix: `2025-10-12T12:15:47.609192Z`)
/// - Database TIMESTAMPTZ columns
/// - Time bucket labels produced by the aggregation engine
pub type UtcDateTime = ChronoDateTime<Utc>;

/// Wrapper type for DateTime<Utc> that automatically parses ISO 8601 format
/// Accepts multiple formats:
/// - `2024-01-15T14:30:00` (naive datetime, assumes UTC)
/// - `2024-01-15T14:30:00Z` (UTC)
/// - `2024-01-15T14:30:00+00:00` (with timezone offset)
/// - `2024-01-15` (midnight UTC)
///
/// All formats are converted to DateTime<Utc>. Serializes with 'Z' suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, ToSchema)]
#[schema(value_type = String, example = "2024-01-15T14:30:00Z")]
pub struct DateTime(pub ChronoDateTime<Utc>);

impl FromStr for DateTime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Try parsing as RFC3339 (with timezone) first
        if let Ok(dt) = s.parse::<ChronoDateTime<Utc>>() {
            return Ok(DateTime(dt));
        }

        // Try parsing as naive datetime (YYYY-MM-DDTHH:MM:SS) and assume UTC
        if let Ok(naive_dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
            return Ok(DateTime(Utc.from_utc_datetime(&naive_dt)));
        }

        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Ok(DateTime(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))));
        }

        Err("Invalid datetime format. Use ISO 8601: YYYY-MM-DDTHH:MM:SSZ".to_string())
    }
}

impl<'de> Deserialize<'de> for DateTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl Serialize for DateTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_rfc3339())
    }
}

// Allow using DateTime like DateTime<Utc>
impl Deref for DateTime {
    type Target = ChronoDateTime<Utc>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<ChronoDateTime<Utc>> for DateTime {
    fn from(dt: ChronoDateTime<Utc>) -> Self {
        DateTime(dt)
    }
}

impl From<DateTime> for ChronoDateTime<Utc> {
    fn from(dt: DateTime) -> Self {
        dt.0
    }
}

/// Time bucket size for over-time series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[serde(alias = "hourly")]
    Hour,
    #[default]
    #[serde(alias = "daily")]
    Day,
    #[serde(alias = "weekly")]
    Week,
    #[serde(alias = "monthly")]
    Month,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Hour => "hour",
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
        }
    }

    /// Start of the bucket containing `ts`. Weeks start on Sunday.
    pub fn truncate(&self, ts: UtcDateTime) -> UtcDateTime {
        let naive = ts.naive_utc();
        let day_start = naive.date().and_time(NaiveTime::MIN);
        let start = match self {
            Granularity::Hour => day_start + Duration::hours(naive.hour() as i64),
            Granularity::Day => day_start,
            Granularity::Week => {
                day_start - Duration::days(naive.weekday().num_days_from_sunday() as i64)
            }
            Granularity::Month => day_start - Duration::days(naive.day0() as i64),
        };
        Utc.from_utc_datetime(&start)
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hour" | "hourly" => Ok(Granularity::Hour),
            "day" | "daily" => Ok(Granularity::Day),
            "week" | "weekly" => Ok(Granularity::Week),
            "month" | "monthly" => Ok(Granularity::Month),
            other => Err(format!("unknown granularity: {}", other)),
        }
    }
}

/// Inclusive `[start, end]` query window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: UtcDateTime,
    pub end: UtcDateTime,
}

impl DateRange {
    /// Builds a range, swapping the bounds if they arrive reversed.
    pub fn new(start: UtcDateTime, end: UtcDateTime) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    pub fn contains(&self, ts: UtcDateTime) -> bool {
        ts >= self.start && ts <= self.end
    }

    /// Window of `radius` on each side of `center`
    pub fn around(center: UtcDateTime, radius: Duration) -> Self {
        Self::new(center - radius, center + radius)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(y: i32, m: u32, d: u32, h: u32, min: u32) -> UtcDateTime {
        Utc.with_ymd_and_hms(y, m, d, h, min, 17).unwrap()
    }

    #[test]
    fn test_datetime_deserialize_valid() {
        let json = r#""2024-01-15T14:30:00""#;
        let dt: DateTime = serde_json::from_str(json).unwrap();
        assert_eq!(dt.year(), 2024);
        assert_eq!(dt.month(), 1);
        assert_eq!(dt.day(), 15);
        assert_eq!(dt.hour(), 14);
        assert_eq!(dt.minute(), 30);
    }

    #[test]
    fn test_datetime_parses_plain_date() {
        let dt: DateTime = "2024-03-02".parse().unwrap();
        assert_eq!(*dt, Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_datetime_rejects_garbage() {
        assert!("yesterday".parse::<DateTime>().is_err());
    }

    #[test]
    fn test_truncate_hour_and_day() {
        let t = ts(2024, 5, 17, 13, 42);
        assert_eq!(
            Granularity::Hour.truncate(t),
            Utc.with_ymd_and_hms(2024, 5, 17, 13, 0, 0).unwrap()
        );
        assert_eq!(
            Granularity::Day.truncate(t),
            Utc.with_ymd_and_hms(2024, 5, 17, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_truncate_week_starts_sunday() {
        // 2024-05-17 is a Friday
        let t = ts(2024, 5, 17, 13, 42);
        assert_eq!(
            Granularity::Week.truncate(t),
            Utc.with_ymd_and_hms(2024, 5, 12, 0, 0, 0).unwrap()
        );
        // A Sunday maps onto itself
        let sunday = ts(2024, 5, 12, 8, 0);
        assert_eq!(
            Granularity::Week.truncate(sunday),
            Utc.with_ymd_and_hms(2024, 5, 12, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_truncate_month() {
        let t = ts(2024, 2, 29, 23, 59);
        assert_eq!(
            Granularity::Month.truncate(t),
            Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_granularity_parsing() {
        assert_eq!("daily".parse::<Granularity>().unwrap(), Granularity::Day);
        assert_eq!("Week".parse::<Granularity>().unwrap(), Granularity::Week);
        assert!("fortnight".parse::<Granularity>().is_err());

        let g: Granularity = serde_json::from_str(r#""hourly""#).unwrap();
        assert_eq!(g, Granularity::Hour);
        assert_eq!(serde_json::to_string(&Granularity::Month).unwrap(), r#""month""#);
    }

    #[test]
    fn test_date_range_orders_bounds() {
        let a = ts(2024, 1, 1, 0, 0);
        let b = ts(2024, 1, 2, 0, 0);
        let range = DateRange::new(b, a);
        assert_eq!(range.start, a);
        assert_eq!(range.end, b);
        assert!(range.contains(a));
        assert!(range.contains(b));
        assert!(!range.contains(b + Duration::seconds(1)));
    }

    #[test]
    fn test_date_range_around() {
        let center = ts(2024, 1, 1, 12, 0);
        let range = DateRange::around(center, Duration::hours(1));
        assert_eq!(range.start, center - Duration::hours(1));
        assert_eq!(range.end, center + Duration::hours(1));
    }
}
