//! Cancellation-aware execution context for control-socket operations.
//!
//! Every [`Controller`](crate::Controller) operation takes a [`Context`]. The
//! context carries a [`CancellationToken`] and an optional deadline; an
//! exchange that is still pending when either fires is dropped, which closes
//! its connection.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::channel::ChannelError;

/// Cancellation token plus optional deadline, cloned into each call.
#[derive(Debug, Clone, Default)]
pub struct Context {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Wrap an existing cancellation token.
    pub fn with_token(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            deadline: None,
        }
    }

    /// Derive a context that additionally expires after `timeout`.
    ///
    /// An earlier deadline already set on `self` is kept.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derive a context that additionally expires at `deadline`.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        };
        Self {
            cancel: self.cancel.clone(),
            deadline: Some(deadline),
        }
    }

    /// Derive a context whose cancellation does not propagate back to `self`.
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            deadline: self.deadline,
        }
    }

    /// Cancel this context and every context derived from it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Drive `fut` to completion unless the context is cancelled or its
    /// deadline passes first. In those cases `fut` is dropped.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, ChannelError>
    where
        F: Future<Output = Result<T, ChannelError>>,
    {
        if self.cancel.is_cancelled() {
            return Err(ChannelError::Cancelled);
        }

        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => Err(ChannelError::Cancelled),
                    _ = tokio::time::sleep_until(deadline) => Err(ChannelError::DeadlineExceeded),
                    res = fut => res,
                }
            }
            None => {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => Err(ChannelError::Cancelled),
                    res = fut => res,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_completes_without_cancellation() {
        let ctx = Context::background();
        let out = ctx.run(async { Ok::<_, ChannelError>(7) }).await.unwrap();
        assert_eq!(out, 7);
    }

    #[tokio::test]
    async fn test_run_cancelled_before_start() {
        let ctx = Context::background();
        ctx.cancel();
        let res = ctx.run(async { Ok::<_, ChannelError>(()) }).await;
        assert!(matches!(res, Err(ChannelError::Cancelled)));
    }

    #[tokio::test]
    async fn test_run_cancelled_while_pending() {
        let ctx = Context::background();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let res = ctx
            .run(std::future::pending::<Result<(), ChannelError>>())
            .await;
        assert!(matches!(res, Err(ChannelError::Cancelled)));
    }

    #[tokio::test]
    async fn test_run_deadline_exceeded() {
        let ctx = Context::background().with_timeout(Duration::from_millis(20));
        let res = ctx
            .run(std::future::pending::<Result<(), ChannelError>>())
            .await;
        assert!(matches!(res, Err(ChannelError::DeadlineExceeded)));
    }

    #[test]
    fn test_with_deadline_keeps_earlier() {
        let base = Context::background().with_timeout(Duration::from_secs(1));
        let later = base.with_timeout(Duration::from_secs(60));
        assert_eq!(later.deadline(), base.deadline());
    }

    #[test]
    fn test_child_cancel_does_not_propagate_up() {
        let parent = Context::background();
        let child = parent.child();
        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());

        let child = parent.child();
        parent.cancel();
        assert!(child.is_cancelled());
    }
}
