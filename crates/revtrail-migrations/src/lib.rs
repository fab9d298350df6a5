//! Database migrations for the Revtrail attribution engine

pub use sea_orm_migration::prelude::*;

mod migration;
pub use migration::Migrator;
