/*!
Configuration System

Configuration loading for phonekit components:

- Layered loading from TOML files, inline documents and environment variables
- Self-validating configuration types
*/

pub mod loader;
pub mod schema;

pub use loader::{ConfigLoader, DEFAULT_ENV_PREFIX, from_toml_file, from_toml_str};
pub use schema::SelfValidating;
