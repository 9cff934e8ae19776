/*!
Error Handling

Common error type shared by the phonekit crates for configuration, event
and validation failures. Domain crates keep their own error enums and map
into this one where they cross the infrastructure boundary.
*/

pub mod types;

pub use types::{Error, Result};
