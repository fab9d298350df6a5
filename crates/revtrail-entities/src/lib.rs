//! Database entities for the Revtrail attribution engine

pub mod goal_events;
pub mod page_views;
pub mod payments;
pub mod sessions;
pub mod visitor_identities;

pub mod prelude {
    pub use super::goal_events::Entity as GoalEvents;
    pub use super::page_views::Entity as PageViews;
    pub use super::payments::Entity as Payments;
    pub use super::sessions::Entity as Sessions;
    pub use super::visitor_identities::Entity as VisitorIdentities;
}
