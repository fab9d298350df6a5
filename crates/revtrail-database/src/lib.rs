//! Database connection and event storage

pub use sea_orm;

mod connection;
mod error;
mod memory;
mod models;
mod sea_orm_store;
mod store;

pub use connection::{establish_connection, establish_connection_with, DbConnection};
pub use error::StoreError;
pub use memory::MemoryEventStore;
pub use models::{NewGoalEvent, NewPageView, NewPayment, NewSession, PaymentInsert, SessionWrite};
pub use sea_orm_store::SeaOrmEventStore;
pub use store::EventStore;

// Export test utilities for use by other crates in their tests
pub mod test_utils;

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{ConnectionTrait, DatabaseBackend, Statement};

    #[tokio::test]
    async fn test_establish_connection_with_migrations() -> anyhow::Result<()> {
        let db = establish_connection_with(&revtrail_core::DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
        })
        .await?;

        let result = db
            .query_one(Statement::from_string(
                DatabaseBackend::Sqlite,
                "SELECT COUNT(*) AS n FROM sessions".to_owned(),
            ))
            .await?;
        assert!(result.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_establish_connection_rejects_bad_url() {
        let result = establish_connection("not-a-database://nowhere").await;
        assert!(result.is_err());
    }
}
