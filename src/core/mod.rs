//! Browsing core: schema catalog, query building, paged fetching and the
//! session that ties them to user actions.

pub mod action;
pub mod cache;
pub mod catalog;
pub mod coordinator;
pub mod fetch;
pub mod query_builder;
pub mod session;
pub mod view_state;

pub use action::UserAction;
pub use coordinator::{Coordinator, Delivery, Tab};
pub use session::Session;
