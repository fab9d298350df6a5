//! `SeaORM` Entity for page_views table

use revtrail_core::DBDateTime;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One immutable row per tracked page load
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "page_views")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub website_id: String,
    pub session_id: String,
    pub visitor_id: String,
    pub timestamp: DBDateTime,

    // Page data
    pub path: String,
    pub hostname: Option<String>,
    pub title: Option<String>,
    pub referrer: Option<String>,
    pub referrer_domain: Option<String>,
    pub referrer_path: Option<String>,

    // Traffic source
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_term: Option<String>,
    pub utm_content: Option<String>,

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
