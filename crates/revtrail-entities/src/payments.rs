//! `SeaORM` Entity for payments table

use revtrail_core::DBDateTime;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub website_id: String,
    /// e.g. "stripe", "lemonsqueezy"
    pub provider: String,
    /// Idempotency key within `(website_id, provider)`
    pub provider_payment_id: String,
    /// Integer minor currency units
    pub amount: i64,
    pub currency: String,
    pub refunded: bool,
    pub renewal: bool,
    pub customer_email: Option<String>,
    pub customer_id: Option<String>,
    #[sea_orm(column_type = "Json", nullable)]
    pub metadata: Option<Json>,

    // Attribution, written once at ingestion
    pub visitor_id: Option<String>,
    pub session_id: Option<String>,
    pub attribution_method: Option<String>,

    pub timestamp: DBDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
