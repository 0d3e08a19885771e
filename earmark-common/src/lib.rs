//! # earmark common library
//!
//! Shared code for the earmark review crates:
//! - Error type shared by the runtime and the binary
//! - TOML bootstrap configuration and its resolution order
//! - Event types (ReviewEvent) and the broadcast EventBus
//! - Tag side-store connection and schema
//! - Timestamp helpers

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
pub use events::{EventBus, ReviewEvent};
