//! High-level softphone client
//!
//! - **`manager`** - [`ClientManager`]: registry, audio engine, signaling intake
//! - **`controls`** - user actions on the primary call (answer, hold, transfer, ...)
//! - **`builder`** - [`ClientBuilder`] for assembling a manager
//! - **`config`** - [`ClientConfig`]
//!
//! # Basic call flow
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use phonekit_client_core::{ClientBuilder, ClientEvent};
//! # use phonekit_client_core::testing::{MockMediaCapture, MockUserAgent};
//! # use phonekit_audio_core::testing::TestAudioContext;
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ClientBuilder::new()
//!     .audio_context(Arc::new(TestAudioContext::new()))
//!     .media_capture(MockMediaCapture::new())
//!     .user_agent(MockUserAgent::new())
//!     .build()?;
//!
//! client.events().subscribe_topic("call", |event: &ClientEvent| {
//!     println!("{:?}", event);
//! });
//!
//! let call_id = client.make_call("sip:bob@example.com").await?;
//! client.send_dtmf("1")?;
//! client.hold()?;
//! client.hangup()?;
//! # let _ = call_id;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod config;
pub mod controls;
pub mod manager;

pub use builder::ClientBuilder;
pub use config::ClientConfig;
pub use manager::ClientManager;
