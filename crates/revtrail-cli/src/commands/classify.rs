use clap::Args;
use colored::Colorize;
use revtrail_tracking::channel::{matching_rule, ReferrerSignal};
use revtrail_tracking::{
    format_referrer_name, referrer_bucket, resolve_channel, Channel, DIRECT_LABEL,
};
use serde::Serialize;

#[derive(Args)]
pub struct ClassifyCommand {
    /// Referrer URL or domain, omit for direct traffic
    #[arg(long)]
    pub referrer: Option<String>,

    /// utm_medium tag of the landing URL
    #[arg(long)]
    pub utm_medium: Option<String>,

    /// Print the classification as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct Classification {
    channel: Channel,
    rule: Option<&'static str>,
    bucket: String,
    name: String,
}

fn classify(referrer: Option<&str>, utm_medium: Option<&str>) -> Classification {
    let signal = ReferrerSignal::new(referrer, utm_medium);
    let bucket = referrer_bucket(referrer);
    Classification {
        channel: resolve_channel(referrer, utm_medium),
        rule: matching_rule(&signal).map(|rule| rule.name),
        name: format_referrer_name(&bucket),
        bucket,
    }
}

impl ClassifyCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let result = classify(self.referrer.as_deref(), self.utm_medium.as_deref());

        if self.json {
            println!("{}", serde_json::to_string_pretty(&result)?);
            return Ok(());
        }

        println!(
            "{} {}",
            "Channel:".bright_white().bold(),
            result.channel.to_string().bright_cyan()
        );
        println!(
            "{} {}",
            "Rule:".bright_white().bold(),
            result.rule.unwrap_or("fallback")
        );
        if result.bucket != DIRECT_LABEL {
            println!("{} {}", "Referrer:".bright_white().bold(), result.bucket);
        }
        println!("{} {}", "Name:".bright_white().bold(), result.name);
        Ok(())
    }
}
