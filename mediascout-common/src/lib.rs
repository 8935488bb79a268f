//! # MediaScout Common Library
//!
//! Shared code for MediaScout services including:
//! - Error types
//! - Event types (ScoutEvent enum) and the EventBus
//! - Configuration loading

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
