//! Typed administrative commands over a [`ControlChannel`].
//!
//! Replies that carry a status begin with `OK` or `FAIL`, optionally
//! followed by a message on the same line:
//!
//! ```text
//! OK Pong
//! FAIL Error while reloading configuration
//! ```
//!
//! `STATS` answers with its table directly and has no status line.

use std::sync::Arc;

use prometheus::proto::MetricFamily;
use tracing::debug;

use crate::channel::{ChannelError, ControlChannel};
use crate::context::Context;
use crate::metrics::{self, EncodeError};
use crate::stats::{self, StatsErrors, StatsResponse};

pub const CMD_PING: &str = "PING";
pub const CMD_RELOAD: &str = "RELOAD";
pub const CMD_LICENSE: &str = "LICENSE";
pub const CMD_STATS: &str = "STATS";

const STATUS_OK: &str = "OK";
const STATUS_FAIL: &str = "FAIL";

/// Errors from a controller operation.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("daemon rejected {command}: {message}")]
    Daemon {
        command: &'static str,
        message: String,
    },

    #[error(transparent)]
    Encode(#[from] EncodeError),
}

impl ControllerError {
    /// True for failures of the connection rather than of the command.
    pub fn is_transport(&self) -> bool {
        matches!(self, ControllerError::Channel(_))
    }
}

/// A successful reply split into its status message and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Text after `OK` on the status line; empty without a status line.
    pub message: String,
    /// Everything after the status line, or the whole reply without one.
    pub body: String,
}

impl Reply {
    /// Message and body joined into a single blob, without the status token.
    pub fn into_text(self) -> String {
        let body = self.body.trim_end_matches('\n');
        match (self.message.is_empty(), body.is_empty()) {
            (_, true) => self.message,
            (true, false) => body.to_string(),
            (false, false) => format!("{}\n{body}", self.message),
        }
    }
}

/// Split a reply on its status line; `FAIL` becomes an error.
pub fn classify(command: &'static str, response: &str) -> Result<Reply, ControllerError> {
    let (first, rest) = response.split_once('\n').unwrap_or((response, ""));

    if let Some(message) = status_message(first, STATUS_FAIL) {
        let mut message = message.to_string();
        let rest = rest.trim_end_matches('\n');
        if !rest.is_empty() {
            if !message.is_empty() {
                message.push('\n');
            }
            message.push_str(rest);
        }
        return Err(ControllerError::Daemon { command, message });
    }

    match status_message(first, STATUS_OK) {
        Some(message) => Ok(Reply {
            message: message.to_string(),
            body: rest.to_string(),
        }),
        None => Ok(Reply {
            message: String::new(),
            body: response.to_string(),
        }),
    }
}

/// `Some(message)` if `line` is `token` alone or `token` followed by a space.
fn status_message<'a>(line: &'a str, token: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(token)?;
    if rest.is_empty() {
        Some("")
    } else {
        rest.strip_prefix(' ').map(str::trim_end)
    }
}

/// Prometheus families plus the rows that could not be parsed.
#[derive(Debug, Clone, Default)]
pub struct PrometheusStats {
    pub families: Vec<MetricFamily>,
    pub errors: StatsErrors,
}

/// Typed command layer over a shared control channel.
#[derive(Clone)]
pub struct Controller {
    channel: Arc<dyn ControlChannel>,
}

impl Controller {
    pub fn new(channel: Arc<dyn ControlChannel>) -> Self {
        Self { channel }
    }

    async fn command(&self, ctx: &Context, command: &'static str) -> Result<Reply, ControllerError> {
        let response = self.channel.send_command(ctx, command).await?;
        classify(command, &response)
    }

    /// Check that the daemon is alive and answering.
    pub async fn ping(&self, ctx: &Context) -> Result<(), ControllerError> {
        self.command(ctx, CMD_PING).await.map(drop)
    }

    /// Ask the daemon to reload its configuration.
    pub async fn reload(&self, ctx: &Context) -> Result<(), ControllerError> {
        self.command(ctx, CMD_RELOAD).await.map(drop)
    }

    /// License information, passed through as the daemon formats it.
    pub async fn license_info(&self, ctx: &Context) -> Result<String, ControllerError> {
        self.command(ctx, CMD_LICENSE).await.map(Reply::into_text)
    }

    /// Fetch and parse the stats table.
    ///
    /// Rows that fail to parse are reported in [`StatsResponse::errors`]
    /// alongside the rows that did parse.
    pub async fn stats(&self, ctx: &Context) -> Result<StatsResponse, ControllerError> {
        let reply = self.command(ctx, CMD_STATS).await?;
        let response = stats::parse_stats(&reply.body);
        debug!(
            stats = response.stats.len(),
            errors = response.errors.len(),
            "stats fetched"
        );
        Ok(response)
    }

    /// Fetch stats and project them into Prometheus counter families.
    pub async fn stats_prometheus(&self, ctx: &Context) -> Result<PrometheusStats, ControllerError> {
        let StatsResponse { stats, errors } = self.stats(ctx).await?;
        Ok(PrometheusStats {
            families: metrics::stats_to_families(&stats),
            errors,
        })
    }
}

impl PrometheusStats {
    /// Render the families in the text exposition format.
    pub fn to_text(&self) -> Result<String, ControllerError> {
        Ok(metrics::encode_text(&self.families)?)
    }
}
