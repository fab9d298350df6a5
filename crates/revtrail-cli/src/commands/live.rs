use chrono::Utc;
use clap::Args;
use colored::Colorize;
use revtrail_analytics::Analytics;
use tracing::debug;

use super::{analytics_service, DatabaseArgs};

#[derive(Args)]
pub struct LiveCommand {
    #[command(flatten)]
    pub database: DatabaseArgs,

    /// Website to watch
    #[arg(long)]
    pub website: String,

    /// Print active sessions as JSON
    #[arg(long)]
    pub json: bool,
}

impl LiveCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let config = self.database.load_config()?;
        let now = Utc::now();
        debug!(website_id = %self.website, "Reading live visitors");

        let rt = tokio::runtime::Runtime::new()?;
        let (count, sessions) = rt.block_on(async {
            let service = analytics_service(&config).await?;
            let count = service.visitors_now(&self.website, now).await?;
            let sessions = service.realtime_visitors(&self.website, now).await?;
            Ok::<_, anyhow::Error>((count, sessions))
        })?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "visitors": count,
                    "sessions": sessions,
                }))?
            );
            return Ok(());
        }

        println!(
            "{} {} {}",
            count.to_string().bright_green().bold(),
            "visitors on".bright_white(),
            self.website.bright_cyan()
        );
        for visitor in &sessions {
            println!(
                "  {:<28} {:<16} {:<10} {:>3} pv  score {:>3}  {}",
                visitor.current_path,
                visitor.channel.to_string(),
                visitor.country.as_deref().unwrap_or("-"),
                visitor.page_views,
                visitor.conversion_score,
                visitor.last_seen_at.format("%H:%M:%S").to_string().dimmed()
            );
        }
        Ok(())
    }
}
