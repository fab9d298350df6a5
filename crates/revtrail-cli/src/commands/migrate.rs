use clap::Args;
use colored::Colorize;
use revtrail_database::establish_connection_with;
use tracing::info;

use super::DatabaseArgs;

#[derive(Args)]
pub struct MigrateCommand {
    #[command(flatten)]
    pub database: DatabaseArgs,
}

impl MigrateCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let config = self.database.load_config()?;
        info!("Applying migrations");

        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(establish_connection_with(&config.database))?;

        println!("{}", "Database is up to date".bright_green());
        Ok(())
    }
}
