#![deny(unsafe_code)]

//! ngctl core: a client for the control socket of a syslog-ng style daemon.
//!
//! A [`ControlChannel`] exchanges one command line for one framed response.
//! The [`Controller`] turns those exchanges into typed operations, the
//! [`stats`] module parses the `STATS` table, and [`metrics`] projects the
//! parsed counters into Prometheus families.
//!
//! ```text
//! caller ─▶ Controller ─▶ ControlChannel ─▶ daemon control socket
//!              │
//!              ├─▶ stats::parse_stats
//!              └─▶ metrics::stats_to_families
//! ```

use std::future::Future;
use std::pin::Pin;

/// A type-erased, `Send`-safe, boxed future, the return type for async trait
/// methods consumed through `dyn Trait`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Line-framed transport to the daemon's control socket.
pub mod channel;
/// Cancellation token plus deadline threaded through every operation.
pub mod context;
/// Typed administrative commands.
pub mod controller;
/// Prometheus projection of parsed stats.
pub mod metrics;
/// `STATS` table parser.
pub mod stats;

pub use channel::{ChannelError, ControlChannel, UnixSocketControlChannel};
pub use context::Context;
pub use controller::{Controller, ControllerError, PrometheusStats};
pub use prometheus::proto::MetricFamily;
pub use stats::{SourceState, Stat, StatLineError, StatsErrors, StatsResponse};
