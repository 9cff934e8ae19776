/*!
Logging

Standardized `tracing` setup for applications embedding phonekit:

- Subscriber installation driven by [`LoggingConfig`]
- Log level parsing
*/

pub mod setup;

pub use setup::{LoggingConfig, log_welcome, parse_log_level, setup_logging};
