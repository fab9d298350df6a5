//! Visitor identification records used for email-based payment attribution

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Alias::new("visitor_identities"))
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Alias::new("id"))
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Alias::new("website_id")).string().not_null())
                    .col(ColumnDef::new(Alias::new("visitor_id")).string().not_null())
                    .col(ColumnDef::new(Alias::new("email")).string().not_null())
                    .col(
                        ColumnDef::new(Alias::new("identified_at"))
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_visitor_identities_website_visitor_email")
                    .table(Alias::new("visitor_identities"))
                    .col(Alias::new("website_id"))
                    .col(Alias::new("visitor_id"))
                    .col(Alias::new("email"))
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_visitor_identities_website_email")
                    .table(Alias::new("visitor_identities"))
                    .col(Alias::new("website_id"))
                    .col(Alias::new("email"))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(Alias::new("visitor_identities"))
                    .if_exists()
                    .to_owned(),
            )
            .await?;
        Ok(())
    }
}
