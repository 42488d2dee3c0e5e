//! # folio-core
//!
//! Core types and primitives for the Folio portfolio engine.
//! This crate contains foundational types shared across all Folio crates:
//! monotonic time, clocks, configuration and error types.

pub mod config;
pub mod error;
pub mod time;

pub use config::*;

pub use error::{FolioError, FolioResult};
pub use time::{Clock, Duration, ManualClock, Timestamp};
