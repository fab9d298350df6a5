pub mod classify;
pub mod live;
pub mod migrate;
pub mod report;

pub use classify::ClassifyCommand;
pub use live::LiveCommand;
pub use migrate::MigrateCommand;
pub use report::ReportCommand;

use clap::Args;
use revtrail_analytics::AnalyticsService;
use revtrail_core::AppConfig;
use revtrail_database::{establish_connection_with, SeaOrmEventStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Connection options shared by every command that touches the database
#[derive(Args)]
pub struct DatabaseArgs {
    /// Database connection URL (overrides the config file)
    #[arg(long, env = "REVTRAIL_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Path to a YAML configuration file
    #[arg(long, env = "REVTRAIL_CONFIG")]
    pub config: Option<PathBuf>,
}

impl DatabaseArgs {
    pub fn load_config(&self) -> anyhow::Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => {
                debug!("Loading configuration from {}", path.display());
                AppConfig::from_yaml_file(path)?
            }
            None => AppConfig::default(),
        };
        if let Some(url) = &self.database_url {
            config.database.url = url.clone();
        }
        Ok(config)
    }
}

/// Connect, migrate and build the aggregation service
pub async fn analytics_service(config: &AppConfig) -> anyhow::Result<AnalyticsService> {
    let db = establish_connection_with(&config.database).await?;
    let store = Arc::new(SeaOrmEventStore::new(db));
    Ok(AnalyticsService::new(store, config.analytics.clone()))
}
