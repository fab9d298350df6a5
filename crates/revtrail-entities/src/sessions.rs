//! `SeaORM` Entity for sessions table

use revtrail_core::DBDateTime;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Rolling per-session aggregate. One row per `(website_id, session_id)`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "sessions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub website_id: String,
    pub session_id: String,
    pub visitor_id: String,
    pub first_visit_at: DBDateTime,
    pub last_seen_at: DBDateTime,
    pub page_views: i32,
    /// Seconds between the first and the latest beacon
    pub duration: i64,
    pub bounce: bool,

    // First-touch marketing context, never rewritten after creation
    pub referrer: Option<String>,
    pub referrer_domain: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_term: Option<String>,
    pub utm_content: Option<String>,
    pub landing_path: Option<String>,

    // Device/Browser
    pub device: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,

    // Geography
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Session duration, falling back to the first/last timestamps when the
    /// stored counter was never advanced.
    pub fn effective_duration(&self) -> i64 {
        if self.duration > 0 {
            self.duration
        } else {
            (self.last_seen_at - self.first_visit_at).num_seconds().max(0)
        }
    }
}
