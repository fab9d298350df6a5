//! `SeaORM` Entity for goal_events table

use revtrail_core::DBDateTime;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Custom conversion events, joined into channel breakdowns by session
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "goal_events")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub website_id: String,
    pub event: String,
    pub visitor_id: Option<String>,
    pub session_id: Option<String>,
    pub path: Option<String>,
    pub value: Option<i64>,
    pub timestamp: DBDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
