//! Execution host lifecycle.
//!
//! Each host instance runs on its own OS thread, owns one [`UiRuntime`],
//! and is reachable only through its command channel. The readiness
//! signal is emitted exactly once, after the runtime is built; commands
//! are handled strictly one at a time; a failure inside a document never
//! escapes the loop.

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::error::SandboxError;
use super::protocol::{HostCommand, HostEvent, HostSignal};
use super::runtime::UiRuntime;

/// Depth of the inbound command channel.
const COMMAND_CHANNEL_CAPACITY: usize = 32;

pub struct ExecutionHost;

impl ExecutionHost {
    /// Spawn a fresh host instance. Outbound signals, tagged with the new
    /// instance's id, arrive on `events`. The host runs until its command
    /// channel closes; a new preview cycle spawns a new instance instead
    /// of reusing this one.
    pub fn spawn(events: mpsc::UnboundedSender<HostEvent>) -> Result<ExecutionHostHandle, SandboxError> {
        let instance = Uuid::new_v4();
        let (commands_tx, commands_rx) = mpsc::channel::<Value>(COMMAND_CHANNEL_CAPACITY);

        std::thread::Builder::new()
            .name(format!("execution-host-{instance}"))
            .spawn(move || host_loop(instance, commands_rx, events))
            .map_err(|e| SandboxError::Init(e.to_string()))?;

        Ok(ExecutionHostHandle {
            instance,
            commands: commands_tx,
        })
    }
}

/// Channel-backed handle to one host instance. Dropping the handle
/// closes the command channel and tears the host down.
#[derive(Debug, Clone)]
pub struct ExecutionHostHandle {
    instance: Uuid,
    commands: mpsc::Sender<Value>,
}

impl ExecutionHostHandle {
    pub fn instance(&self) -> Uuid {
        self.instance
    }

    /// Deliver one raw wire message to the host.
    pub async fn deliver(&self, message: Value) -> Result<(), SandboxError> {
        self.commands
            .send(message)
            .await
            .map_err(|_| SandboxError::HostGone)
    }

    /// Deliver an execute command carrying one source document.
    pub async fn execute(&self, source: impl Into<String>) -> Result<(), SandboxError> {
        self.deliver(HostCommand::execute(source).into_value()).await
    }
}

fn host_loop(
    instance: Uuid,
    mut commands: mpsc::Receiver<Value>,
    events: mpsc::UnboundedSender<HostEvent>,
) {
    let runtime = match UiRuntime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(%instance, "execution host failed to initialize: {err}");
            let (message, trace) = err.diagnostic();
            let _ = events.send(HostEvent {
                instance,
                signal: HostSignal::ExecFailed { message, trace },
            });
            return;
        }
    };

    info!(%instance, "execution host ready");
    let _ = events.send(HostEvent {
        instance,
        signal: HostSignal::Ready,
    });

    while let Some(message) = commands.blocking_recv() {
        let Some(command) = HostCommand::parse(&message) else {
            debug!(%instance, "ignoring malformed control message");
            continue;
        };

        match command {
            HostCommand::Execute { source } => match runtime.execute(&source) {
                Ok(html) => {
                    debug!(%instance, bytes = html.len(), "document rendered");
                    let _ = events.send(HostEvent {
                        instance,
                        signal: HostSignal::Rendered { html },
                    });
                }
                Err(err) => {
                    let (message, trace) = err.diagnostic();
                    error!(%instance, "document execution failed: {message}");
                    runtime.mount_error_panel(&message, &trace);
                    let _ = events.send(HostEvent {
                        instance,
                        signal: HostSignal::ExecFailed { message, trace },
                    });
                }
            },
        }
    }

    debug!(%instance, "execution host shutting down");
}
