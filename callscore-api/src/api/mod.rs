//! HTTP API handlers for callscore-api

pub mod calls;
pub mod figures;
pub mod health;
pub mod identity;
pub mod roleplay;

pub use calls::call_routes;
pub use figures::figures_routes;
pub use health::health_routes;
pub use identity::{ORGANIZATION_ID_HEADER, USER_ID_HEADER};
pub use roleplay::roleplay_routes;
