//! # Lupulo Common Library
//!
//! Shared code for the lupulo dashboard crates including:
//! - Error type and result alias
//! - Bootstrap configuration loading
//! - Dashboard event types (DashEvent enum) and the EventBus
//! - Server-Sent Events framing (inbound parser, outbound stream)
//! - Timestamp helpers

pub mod config;
pub mod error;
pub mod events;
pub mod sse;
pub mod time;

pub use error::{Error, Result};
