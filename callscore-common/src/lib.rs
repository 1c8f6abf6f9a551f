//! # Callscore Common Library
//!
//! Shared code for the callscore service crates:
//! - Error type and result alias
//! - Configuration loading and root folder resolution
//! - Database initialization and declarative schema synchronization
//! - Calendar month helpers used for figures attribution

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
pub use time::YearMonth;
