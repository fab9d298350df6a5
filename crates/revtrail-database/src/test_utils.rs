//! Test utilities for database integration tests
//!
//! Provides an in-memory SQLite database with all migrations applied, shared
//! by the test suites of every Revtrail crate.

use crate::DbConnection;
use revtrail_migrations::Migrator;
use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;

/// Isolated, migrated database living for the duration of one test
pub struct TestDatabase {
    pub db: Arc<DbConnection>,
}

impl TestDatabase {
    /// Create a fresh in-memory database with migrations applied.
    ///
    /// The pool is pinned to a single connection so every query sees the
    /// same in-memory database.
    pub async fn with_migrations() -> anyhow::Result<Self> {
        let mut opt = ConnectOptions::new("sqlite::memory:");
        opt.max_connections(1)
            .min_connections(1)
            .sqlx_logging(false);

        let db = Database::connect(opt).await?;
        Migrator::up(&db, None).await?;

        Ok(Self { db: Arc::new(db) })
    }

    pub fn connection(&self) -> &DbConnection {
        self.db.as_ref()
    }

    pub fn connection_arc(&self) -> Arc<DbConnection> {
        self.db.clone()
    }
}
