#![deny(unsafe_code)]

//! Shared test utilities for the ngctl workspace.
//!
//! Provides a mock control-socket daemon, a scripted in-memory channel,
//! canned payloads, config builders, and tracing helpers so that individual
//! crate tests stay concise and consistent.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! ngctl-test-utils = { workspace = true }
//! ```

pub mod channel;
pub mod config;
pub mod daemon;
pub mod fixtures;
pub mod tracing_setup;

pub use channel::ScriptedChannel;
pub use config::TestConfigBuilder;
pub use daemon::{MockDaemon, MockDaemonBuilder};
