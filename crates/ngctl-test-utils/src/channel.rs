//! In-memory [`ControlChannel`] for controller tests.
//!
//! Replies come from a script instead of a socket; the execution context is
//! still honoured, so cancellation and deadlines behave as they do against a
//! real daemon.

use std::collections::HashMap;
use std::sync::Mutex;

use ngctl_core::channel::validate_command;
use ngctl_core::{BoxFuture, ChannelError, Context, ControlChannel};

type ErrorFactory = Box<dyn Fn() -> ChannelError + Send + Sync>;

enum Scripted {
    Reply(String),
    Fail(ErrorFactory),
    Hang,
}

/// A control channel that answers from a fixed script.
///
/// Unscripted commands fail with [`ChannelError::UnexpectedEof`].
#[derive(Default)]
pub struct ScriptedChannel {
    script: HashMap<String, Scripted>,
    sent: Mutex<Vec<String>>,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `command` with `response` (framing already stripped).
    pub fn reply(mut self, command: &str, response: &str) -> Self {
        self.script
            .insert(command.to_string(), Scripted::Reply(response.to_string()));
        self
    }

    /// Fail `command` with the error produced by `make`.
    pub fn fail_with<F>(mut self, command: &str, make: F) -> Self
    where
        F: Fn() -> ChannelError + Send + Sync + 'static,
    {
        self.script
            .insert(command.to_string(), Scripted::Fail(Box::new(make)));
        self
    }

    /// Never answer `command`; only cancellation or a deadline ends the call.
    pub fn hang(mut self, command: &str) -> Self {
        self.script.insert(command.to_string(), Scripted::Hang);
        self
    }

    /// Commands sent so far, in order.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().expect("sent lock poisoned").clone()
    }
}

impl ControlChannel for ScriptedChannel {
    fn send_command<'a>(
        &'a self,
        ctx: &'a Context,
        command: &'a str,
    ) -> BoxFuture<'a, Result<String, ChannelError>> {
        Box::pin(async move {
            validate_command(command)?;
            self.sent
                .lock()
                .expect("sent lock poisoned")
                .push(command.to_string());

            ctx.run(async move {
                match self.script.get(command) {
                    Some(Scripted::Reply(response)) => Ok(response.clone()),
                    Some(Scripted::Fail(make)) => Err(make()),
                    Some(Scripted::Hang) => std::future::pending().await,
                    None => Err(ChannelError::UnexpectedEof { received: 0 }),
                }
            })
            .await
        })
    }
}
