//! Mock control-socket daemon.
//!
//! [`MockDaemon`] binds a Unix socket inside a temp directory and answers
//! commands with scripted replies using the daemon's real framing (reply
//! lines followed by a `.` line). It records every command it receives and
//! counts connections that have ended.
//!
//! Must be spawned from inside a tokio runtime.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// What the mock daemon does with a command.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Send these lines, then the `.` terminator.
    Framed(String),
    /// Send these bytes verbatim, then close the connection.
    Raw(Vec<u8>),
    /// Never answer; keep the connection open until the client drops it.
    Stall,
}

#[derive(Default)]
struct Shared {
    received: Mutex<Vec<String>>,
    closed: AtomicUsize,
}

/// Builder for [`MockDaemon`].
#[derive(Debug, Default)]
pub struct MockDaemonBuilder {
    replies: HashMap<String, MockReply>,
}

impl MockDaemonBuilder {
    /// Answer `command` with `body` followed by the terminator line.
    pub fn reply(mut self, command: &str, body: &str) -> Self {
        self.replies
            .insert(command.to_string(), MockReply::Framed(body.to_string()));
        self
    }

    /// Answer `command` with raw bytes and hang up.
    pub fn raw(mut self, command: &str, bytes: impl AsRef<[u8]>) -> Self {
        self.replies
            .insert(command.to_string(), MockReply::Raw(bytes.as_ref().to_vec()));
        self
    }

    /// Never answer `command`.
    pub fn stall(mut self, command: &str) -> Self {
        self.replies.insert(command.to_string(), MockReply::Stall);
        self
    }

    /// Bind the socket and start serving.
    pub fn spawn(self) -> MockDaemon {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let socket_path = temp_dir.path().join("syslog-ng.ctl");
        let listener = UnixListener::bind(&socket_path).expect("failed to bind mock socket");
        let shared = Arc::new(Shared::default());
        let replies = Arc::new(self.replies);

        let accept_shared = Arc::clone(&shared);
        let handle = tokio::spawn(async move {
            loop {
                let (stream, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "mock daemon accept failed");
                        return;
                    }
                };
                let shared = Arc::clone(&accept_shared);
                let replies = Arc::clone(&replies);
                tokio::spawn(async move {
                    if let Err(e) = serve_connection(stream, &replies, &shared).await {
                        debug!(error = %e, "mock daemon connection ended with error");
                    }
                    shared.closed.fetch_add(1, Ordering::SeqCst);
                });
            }
        });

        MockDaemon {
            socket_path,
            shared,
            handle,
            _temp_dir: temp_dir,
        }
    }
}

async fn serve_connection(
    stream: UnixStream,
    replies: &HashMap<String, MockReply>,
    shared: &Shared,
) -> std::io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(());
        }
        let command = line.trim_end_matches(['\n', '\r']).to_string();
        debug!(command = %command, "mock daemon received");
        shared
            .received
            .lock()
            .expect("received lock poisoned")
            .push(command.clone());

        match replies.get(&command) {
            Some(MockReply::Framed(body)) => {
                let mut out = body.clone();
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                out.push_str(".\n");
                write_half.write_all(out.as_bytes()).await?;
            }
            Some(MockReply::Raw(bytes)) => {
                write_half.write_all(bytes).await?;
                write_half.shutdown().await?;
                return Ok(());
            }
            Some(MockReply::Stall) => {}
            None => {
                write_half
                    .write_all(format!("FAIL Unknown command {command}\n.\n").as_bytes())
                    .await?;
            }
        }
    }
}

/// A running mock daemon. Stops serving when dropped.
pub struct MockDaemon {
    socket_path: PathBuf,
    shared: Arc<Shared>,
    handle: JoinHandle<()>,
    _temp_dir: TempDir,
}

impl MockDaemon {
    pub fn builder() -> MockDaemonBuilder {
        MockDaemonBuilder::default()
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Commands received so far, in arrival order.
    pub fn received(&self) -> Vec<String> {
        self.shared
            .received
            .lock()
            .expect("received lock poisoned")
            .clone()
    }

    /// Number of connections that have ended.
    pub fn closed_connections(&self) -> usize {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Poll until at least `n` connections have closed or `timeout` passes.
    pub async fn wait_for_closed(&self, n: usize, timeout: std::time::Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.closed_connections() >= n {
                return true;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        self.closed_connections() >= n
    }
}

impl Drop for MockDaemon {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
