//! Initial schema: sessions, page views, payments and goal events

use sea_orm_migration::prelude::*;

/// Denormalized marketing/device/geo columns shared by sessions and page views
const CONTEXT_COLUMNS: &[&str] = &[
    "referrer",
    "referrer_domain",
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "device",
    "browser",
    "os",
    "country",
    "region",
    "city",
];

#[derive(DeriveMigrationName)]
pub struct Migration;

fn id_column() -> ColumnDef {
    ColumnDef::new(Alias::new("id"))
        .integer()
        .not_null()
        .auto_increment()
        .primary_key()
        .to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create sessions table
        let mut sessions = Table::create();
        sessions
            .table(Alias::new("sessions"))
            .if_not_exists()
            .col(id_column())
            .col(ColumnDef::new(Alias::new("website_id")).string().not_null())
            .col(ColumnDef::new(Alias::new("session_id")).string().not_null())
            .col(ColumnDef::new(Alias::new("visitor_id")).string().not_null())
            .col(
                ColumnDef::new(Alias::new("first_visit_at"))
                    .timestamp_with_time_zone()
                    .not_null(),
            )
            .col(
                ColumnDef::new(Alias::new("last_seen_at"))
                    .timestamp_with_time_zone()
                    .not_null(),
            )
            .col(
                ColumnDef::new(Alias::new("page_views"))
                    .integer()
                    .not_null()
                    .default(1),
            )
            .col(
                ColumnDef::new(Alias::new("duration"))
                    .big_integer()
                    .not_null()
                    .default(0),
            )
            .col(
                ColumnDef::new(Alias::new("bounce"))
                    .boolean()
                    .not_null()
                    .default(true),
            )
            .col(ColumnDef::new(Alias::new("landing_path")).string().null());
        for name in CONTEXT_COLUMNS {
            sessions.col(ColumnDef::new(Alias::new(*name)).string().null());
        }
        manager.create_table(sessions.to_owned()).await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_sessions_website_session")
                    .table(Alias::new("sessions"))
                    .col(Alias::new("website_id"))
                    .col(Alias::new("session_id"))
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_sessions_website_first_visit")
                    .table(Alias::new("sessions"))
                    .col(Alias::new("website_id"))
                    .col(Alias::new("first_visit_at"))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_sessions_website_last_seen")
                    .table(Alias::new("sessions"))
                    .col(Alias::new("website_id"))
                    .col(Alias::new("last_seen_at"))
                    .to_owned(),
            )
            .await?;

        // Create page_views table
        let mut page_views = Table::create();
        page_views
            .table(Alias::new("page_views"))
            .if_not_exists()
            .col(id_column())
            .col(ColumnDef::new(Alias::new("website_id")).string().not_null())
            .col(ColumnDef::new(Alias::new("session_id")).string().not_null())
            .col(ColumnDef::new(Alias::new("visitor_id")).string().not_null())
            .col(
                ColumnDef::new(Alias::new("timestamp"))
                    .timestamp_with_time_zone()
                    .not_null(),
            )
            .col(ColumnDef::new(Alias::new("path")).text().not_null())
            .col(ColumnDef::new(Alias::new("hostname")).string().null())
            .col(ColumnDef::new(Alias::new("title")).text().null())
            .col(ColumnDef::new(Alias::new("referrer_path")).text().null());
        for name in CONTEXT_COLUMNS {
            page_views.col(ColumnDef::new(Alias::new(*name)).string().null());
        }
        manager.create_table(page_views.to_owned()).await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_page_views_website_timestamp")
                    .table(Alias::new("page_views"))
                    .col(Alias::new("website_id"))
                    .col(Alias::new("timestamp"))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_page_views_session")
                    .table(Alias::new("page_views"))
                    .col(Alias::new("website_id"))
                    .col(Alias::new("session_id"))
                    .to_owned(),
            )
            .await?;

        // Create payments table
        manager
            .create_table(
                Table::create()
                    .table(Alias::new("payments"))
                    .if_not_exists()
                    .col(id_column())
                    .col(ColumnDef::new(Alias::new("website_id")).string().not_null())
                    .col(ColumnDef::new(Alias::new("provider")).string().not_null())
                    .col(
                        ColumnDef::new(Alias::new("provider_payment_id"))
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Alias::new("amount")).big_integer().not_null())
                    .col(ColumnDef::new(Alias::new("currency")).string().not_null())
                    .col(
                        ColumnDef::new(Alias::new("refunded"))
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Alias::new("renewal"))
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Alias::new("customer_email")).string().null())
                    .col(ColumnDef::new(Alias::new("customer_id")).string().null())
                    .col(ColumnDef::new(Alias::new("metadata")).json().null())
                    .col(ColumnDef::new(Alias::new("visitor_id")).string().null())
                    .col(ColumnDef::new(Alias::new("session_id")).string().null())
                    .col(
                        ColumnDef::new(Alias::new("attribution_method"))
                            .string()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("timestamp"))
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Re-delivered webhooks must not double count revenue
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_payments_provider_payment")
                    .table(Alias::new("payments"))
                    .col(Alias::new("website_id"))
                    .col(Alias::new("provider"))
                    .col(Alias::new("provider_payment_id"))
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_payments_website_timestamp")
                    .table(Alias::new("payments"))
                    .col(Alias::new("website_id"))
                    .col(Alias::new("timestamp"))
                    .to_owned(),
            )
            .await?;

        // Create goal_events table
        manager
            .create_table(
                Table::create()
                    .table(Alias::new("goal_events"))
                    .if_not_exists()
                    .col(id_column())
                    .col(ColumnDef::new(Alias::new("website_id")).string().not_null())
                    .col(ColumnDef::new(Alias::new("event")).string().not_null())
                    .col(ColumnDef::new(Alias::new("visitor_id")).string().null())
                    .col(ColumnDef::new(Alias::new("session_id")).string().null())
                    .col(ColumnDef::new(Alias::new("path")).text().null())
                    .col(ColumnDef::new(Alias::new("value")).big_integer().null())
                    .col(
                        ColumnDef::new(Alias::new("timestamp"))
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
                    .name("idx_goal_events_website_timestamp")
                    .table(Alias::new("goal_events"))
                    .col(Alias::new("website_id"))
                    .col(Alias::new("timestamp"))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in ["goal_events", "payments", "page_views", "sessions"] {
            manager
                .drop_table(Table::drop().table(Alias::new(table)).if_exists().to_owned())
                .await?;
        }
        Ok(())
    }
}
