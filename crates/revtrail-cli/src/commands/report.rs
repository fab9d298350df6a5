use chrono::Duration;
use clap::Args;
use colored::Colorize;
use revtrail_analytics::{
    Analytics, AnalyticsService, ChannelBreakdown, Metrics, RevenuePoint, VisitorsPoint,
};
use revtrail_core::{DateRange, Granularity, UtcDateTime};
use serde::Serialize;
use tracing::info;

use super::{analytics_service, DatabaseArgs};

#[derive(Args)]
pub struct ReportCommand {
    #[command(flatten)]
    pub database: DatabaseArgs,

    /// Website to report on
    #[arg(long)]
    pub website: String,

    /// Range start (YYYY-MM-DD or ISO 8601)
    #[arg(long)]
    pub from: String,

    /// Range end, inclusive. A bare date covers the whole day.
    #[arg(long)]
    pub to: String,

    /// Bucket size for time series: hour, day, week, month
    #[arg(long, default_value = "day")]
    pub granularity: Granularity,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct Report {
    website_id: String,
    range: DateRange,
    granularity: Granularity,
    metrics: Metrics,
    channels: Vec<ChannelBreakdown>,
    visitors: Vec<VisitorsPoint>,
    revenue: Vec<RevenuePoint>,
}

fn parse_bound(value: &str, end_of_day: bool) -> anyhow::Result<UtcDateTime> {
    let parsed: revtrail_core::DateTime = value
        .trim()
        .parse()
        .map_err(|e: String| anyhow::anyhow!("{}: {}", value, e))?;
    let date_only = value.trim().len() == "YYYY-MM-DD".len();
    if end_of_day && date_only {
        Ok(parsed.0 + Duration::days(1) - Duration::seconds(1))
    } else {
        Ok(parsed.0)
    }
}

/// Minor units as a decimal amount, e.g. `4900` -> `49.00`
fn format_money(amount: i64) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

async fn build_report(
    service: &AnalyticsService,
    website_id: &str,
    range: DateRange,
    granularity: Granularity,
) -> anyhow::Result<Report> {
    Ok(Report {
        website_id: website_id.to_string(),
        range,
        granularity,
        metrics: service.metrics(website_id, range).await?,
        channels: service.channel_breakdown(website_id, range).await?,
        visitors: service
            .visitors_over_time(website_id, range, granularity)
            .await?,
        revenue: service
            .revenue_over_time(website_id, range, granularity)
            .await?,
    })
}

fn print_report(report: &Report) {
    let m = &report.metrics;
    println!(
        "{} {} ({} to {})",
        "Report for".bright_white().bold(),
        report.website_id.bright_cyan(),
        report.range.start.format("%Y-%m-%d %H:%M"),
        report.range.end.format("%Y-%m-%d %H:%M")
    );
    println!();
    println!("  {:<20} {}", "Visitors:".bright_white(), m.visitors);
    println!("  {:<20} {}", "Page views:".bright_white(), m.page_views);
    println!("  {:<20} {}", "Sessions:".bright_white(), m.sessions);
    println!("  {:<20} {:.1}%", "Bounce rate:".bright_white(), m.bounce_rate);
    println!("  {:<20} {:.0}s", "Session time:".bright_white(), m.session_time);
    println!(
        "  {:<20} {}",
        "Revenue:".bright_white(),
        format_money(m.revenue).bright_green()
    );
    println!(
        "  {:<20} {}",
        "Refunded:".bright_white(),
        format_money(m.revenue_refund).bright_red()
    );
    println!("  {:<20} {}", "Net revenue:".bright_white(), format_money(m.net_revenue));
    println!("  {:<20} {:.2}%", "Conversion rate:".bright_white(), m.conversion_rate);
    println!(
        "  {:<20} {}",
        "Revenue/visitor:".bright_white(),
        format_money(m.revenue_per_visitor)
    );

    println!();
    println!("{}", "Channels".bright_white().bold());
    if report.channels.is_empty() {
        println!("  {}", "No sessions in range".dimmed());
    }
    for channel in &report.channels {
        println!(
            "  {:<18} uv {:>6}  revenue {:>10}  conv {:>5.1}%",
            channel.name.to_string().bright_cyan(),
            channel.uv,
            format_money(channel.revenue),
            channel.conversion_rate * 100.0
        );
        for referrer in &channel.referrers {
            println!(
                "    {:<24} uv {:>6}  revenue {:>10}",
                referrer.name,
                referrer.uv,
                format_money(referrer.revenue)
            );
        }
    }

    println!();
    println!(
        "{} ({})",
        "Visitors over time".bright_white().bold(),
        report.granularity
    );
    for point in &report.visitors {
        println!("  {}  {}", point.date.format("%Y-%m-%d %H:%M"), point.visitors);
    }
}

impl ReportCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let config = self.database.load_config()?;
        let range = DateRange::new(parse_bound(&self.from, false)?, parse_bound(&self.to, true)?);
        info!(website_id = %self.website, "Building report");

        let rt = tokio::runtime::Runtime::new()?;
        let report = rt.block_on(async {
            let service = analytics_service(&config).await?;
            build_report(&service, &self.website, range, self.granularity).await
        })?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_report(&report);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_parse_bound_extends_bare_end_dates() {
        let start = parse_bound("2024-06-01", false).unwrap();
        let end = parse_bound("2024-06-01", true).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 6, 1, 23, 59, 59).unwrap());

        let exact = parse_bound("2024-06-01T10:00:00Z", true).unwrap();
        assert_eq!(exact, Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap());
        assert!(parse_bound("yesterday", false).is_err());
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(4900), "49.00");
        assert_eq!(format_money(5), "0.05");
        assert_eq!(format_money(-1250), "-12.50");
    }
}
