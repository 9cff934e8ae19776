//! Common infrastructure for the phonekit crates
//!
//! - [`events`]: typed synchronous event bus
//! - [`logging`]: `tracing` subscriber setup
//! - [`config`]: layered TOML/environment configuration loading
//! - [`errors`]: shared error type

pub mod config;
pub mod errors;
pub mod events;
pub mod logging;

pub use errors::{Error, Result};
