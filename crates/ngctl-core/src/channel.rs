//! Control channel: one command, one framed response, over a Unix socket.
//!
//! The daemon's control protocol is line oriented. A command is a single
//! line terminated by `\n`. The reply is zero or more lines followed by a
//! line consisting solely of `.`:
//!
//! ```text
//! client → daemon   STATS\n
//! daemon → client   SourceName;SourceId;SourceInstance;State;Type;Number\n
//!                   src.internal;s_local#0;;a;processed;42\n
//!                   .\n
//! ```
//!
//! [`UnixSocketControlChannel`] opens a fresh connection for every command,
//! so a connection is never shared between callers and never reused after a
//! cancelled or failed exchange.

use std::path::{Path, PathBuf};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::{debug, trace};

use crate::BoxFuture;
use crate::context::Context;

/// Line that terminates every daemon response.
pub const END_OF_RESPONSE: &str = ".";

/// Default upper bound on the size of a single response.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 16 * 1024 * 1024;

/// Errors from a control channel exchange.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("daemon is not running (control socket not found at {0})")]
    NotRunning(PathBuf),

    #[error("failed to connect to control socket at {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid command {0:?}: must be a single non-empty ASCII line")]
    InvalidCommand(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection closed before end of response ({received} bytes received)")]
    UnexpectedEof { received: usize },

    #[error("response exceeds {limit} bytes")]
    ResponseTooLarge { limit: usize },

    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// The capability to exchange one command for one response.
///
/// Returns [`BoxFuture`] so that controllers can hold `dyn ControlChannel`
/// and tests can substitute their own implementation.
pub trait ControlChannel: Send + Sync {
    /// Send `command` and return the response with framing stripped.
    fn send_command<'a>(
        &'a self,
        ctx: &'a Context,
        command: &'a str,
    ) -> BoxFuture<'a, Result<String, ChannelError>>;
}

/// Control channel backed by the daemon's Unix domain control socket.
#[derive(Debug, Clone)]
pub struct UnixSocketControlChannel {
    socket_path: PathBuf,
    max_response_bytes: usize,
}

impl UnixSocketControlChannel {
    /// Create a channel targeting the given socket path.
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }

    /// Override the response size limit.
    pub fn with_max_response_bytes(mut self, limit: usize) -> Self {
        self.max_response_bytes = limit;
        self
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Check if the socket file exists (daemon is likely running).
    pub fn daemon_available(&self) -> bool {
        self.socket_path.exists()
    }

    async fn exchange(&self, command: &str) -> Result<String, ChannelError> {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ChannelError::NotRunning(self.socket_path.clone()),
                _ => ChannelError::Connect {
                    path: self.socket_path.clone(),
                    source: e,
                },
            })?;

        let (read_half, mut write_half) = stream.into_split();

        debug!(command, path = %self.socket_path.display(), "control request");

        let mut line = String::with_capacity(command.len() + 1);
        line.push_str(command);
        line.push('\n');
        write_half.write_all(line.as_bytes()).await?;
        write_half.flush().await?;

        let response = read_response(BufReader::new(read_half), self.max_response_bytes).await?;
        debug!(command, bytes = response.len(), "control response");
        Ok(response)
    }
}

impl ControlChannel for UnixSocketControlChannel {
    fn send_command<'a>(
        &'a self,
        ctx: &'a Context,
        command: &'a str,
    ) -> BoxFuture<'a, Result<String, ChannelError>> {
        Box::pin(async move {
            validate_command(command)?;
            ctx.run(self.exchange(command)).await
        })
    }
}

/// Reject commands the line protocol cannot carry.
pub fn validate_command(command: &str) -> Result<(), ChannelError> {
    if command.is_empty() || !command.is_ascii() || command.contains(['\n', '\r']) {
        return Err(ChannelError::InvalidCommand(command.to_string()));
    }
    Ok(())
}

/// Read one framed response: every line up to (not including) the `.`
/// terminator line. Each returned line keeps its trailing `\n`.
///
/// Lines are decoded lossily, so a stray non-UTF-8 byte only affects the row
/// that carries it.
pub async fn read_response<R>(mut reader: R, limit: usize) -> Result<String, ChannelError>
where
    R: AsyncBufRead + Unpin,
{
    let mut response = String::new();
    let mut received = 0usize;
    let mut line = Vec::new();

    loop {
        line.clear();
        let budget = ((limit - received.min(limit)) as u64).saturating_add(1);
        let n = (&mut reader).take(budget).read_until(b'\n', &mut line).await?;
        if n == 0 {
            return Err(ChannelError::UnexpectedEof { received });
        }
        received = received.saturating_add(n);
        if received > limit {
            return Err(ChannelError::ResponseTooLarge { limit });
        }

        if line.last() != Some(&b'\n') {
            // Only a closed connection ends a line without a terminator.
            return Err(ChannelError::UnexpectedEof { received });
        }

        let decoded = String::from_utf8_lossy(&line);
        let content = decoded.trim_end_matches('\n').trim_end_matches('\r');
        if content == END_OF_RESPONSE {
            trace!(bytes = received, "end of response");
            return Ok(response);
        }
        response.push_str(content);
        response.push('\n');
    }
}
