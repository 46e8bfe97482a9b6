//! Controller owning one execution host instance and its session.
//!
//! The controller pumps host events through the session state machine,
//! performs the deferred source delivery the moment readiness is
//! observed, and republishes render results on a broadcast channel for
//! whatever presentation layer is mounted. A new preview cycle builds a
//! new controller; dropping the old one closes its host's command
//! channel and any late signals from the torn-down instance fail the
//! session's origin check.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};
use uuid::Uuid;

use super::session::{PreviewSession, SessionReaction};
use super::SourceDocument;
use crate::sandbox::{ExecutionHost, ExecutionHostHandle, HostEvent, HostSignal, SandboxError};

/// Depth of the broadcast channel carrying updates to subscribers.
const UPDATE_CHANNEL_CAPACITY: usize = 64;

/// Updates published to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PreviewUpdate {
    /// The host instance completed its readiness handshake.
    Ready,
    /// A document rendered successfully.
    Rendered { html: String },
    /// A document failed to compile or run; the host rendered its
    /// diagnostic panel and remains usable.
    Failed { message: String, trace: String },
    /// The readiness handshake did not arrive within the bounded wait.
    ReadyTimeout,
}

pub struct PreviewController {
    host: ExecutionHostHandle,
    session: Arc<Mutex<PreviewSession>>,
    updates_tx: broadcast::Sender<PreviewUpdate>,
}

impl PreviewController {
    /// Spawn a fresh host instance and start pumping its events. The
    /// readiness handshake is given `ready_timeout` to arrive; expiry
    /// publishes [`PreviewUpdate::ReadyTimeout`] instead of hanging.
    pub fn new(ready_timeout: Duration) -> Result<Self, SandboxError> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let host = ExecutionHost::spawn(events_tx)?;
        let session = Arc::new(Mutex::new(PreviewSession::new(host.instance())));
        let (updates_tx, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);

        tokio::spawn(pump_events(
            events_rx,
            Arc::clone(&session),
            host.clone(),
            updates_tx.clone(),
        ));
        tokio::spawn(watch_readiness(
            ready_timeout,
            Arc::clone(&session),
            updates_tx.clone(),
        ));

        Ok(Self {
            host,
            session,
            updates_tx,
        })
    }

    pub fn instance(&self) -> Uuid {
        self.host.instance()
    }

    pub fn is_ready(&self) -> bool {
        self.session.lock().map(|s| s.is_ready()).unwrap_or(false)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PreviewUpdate> {
        self.updates_tx.subscribe()
    }

    /// Target a document at this session. Delivery happens now if the
    /// host is ready and the document changed; otherwise it is deferred
    /// until the readiness handshake (latest document wins).
    pub async fn set_document(&self, document: SourceDocument) -> Result<(), SandboxError> {
        let delivery = match self.session.lock() {
            Ok(mut session) => session.set_document(document),
            Err(_) => return Err(SandboxError::HostGone),
        };
        if let Some(document) = delivery {
            self.host.execute(document.as_str()).await?;
        }
        Ok(())
    }
}

async fn pump_events(
    mut events_rx: mpsc::UnboundedReceiver<HostEvent>,
    session: Arc<Mutex<PreviewSession>>,
    host: ExecutionHostHandle,
    updates_tx: broadcast::Sender<PreviewUpdate>,
) {
    // The pump only needs the host for the deferred delivery that can
    // happen at the readiness handshake; holding it longer would keep
    // the command channel open after the controller is dropped.
    let mut host = Some(host);

    while let Some(event) = events_rx.recv().await {
        let reaction = match session.lock() {
            Ok(mut session) => session.observe(event.instance, &event.signal),
            Err(_) => break,
        };

        match reaction {
            SessionReaction::Ignored => continue,
            SessionReaction::Deliver(document) => {
                if let Some(host) = host.as_ref() {
                    if let Err(err) = host.execute(document.as_str()).await {
                        warn!("deferred delivery failed: {err}");
                    }
                }
            }
            SessionReaction::None => {}
        }

        if matches!(event.signal, HostSignal::Ready) {
            host.take();
        }

        let update = match event.signal {
            HostSignal::Ready => PreviewUpdate::Ready,
            HostSignal::Rendered { html } => PreviewUpdate::Rendered { html },
            HostSignal::ExecFailed { message, trace } => PreviewUpdate::Failed { message, trace },
        };
        let _ = updates_tx.send(update);
    }
    debug!("preview event pump stopped");
}

async fn watch_readiness(
    ready_timeout: Duration,
    session: Arc<Mutex<PreviewSession>>,
    updates_tx: broadcast::Sender<PreviewUpdate>,
) {
    tokio::time::sleep(ready_timeout).await;
    let ready = session.lock().map(|s| s.is_ready()).unwrap_or(true);
    if !ready {
        warn!("execution host readiness handshake timed out");
        let _ = updates_tx.send(PreviewUpdate::ReadyTimeout);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ready_timeout_published_when_handshake_never_lands() {
        let session = Arc::new(Mutex::new(PreviewSession::new(Uuid::new_v4())));
        let (updates_tx, mut updates_rx) = broadcast::channel(4);

        watch_readiness(Duration::from_millis(10), session, updates_tx).await;

        assert_eq!(updates_rx.try_recv().unwrap(), PreviewUpdate::ReadyTimeout);
    }

    #[tokio::test]
    async fn test_no_timeout_after_readiness_handshake() {
        let instance = Uuid::new_v4();
        let session = Arc::new(Mutex::new(PreviewSession::new(instance)));
        if let Ok(mut locked) = session.lock() {
            locked.observe(instance, &HostSignal::Ready);
        }
        let (updates_tx, mut updates_rx) = broadcast::channel(4);

        watch_readiness(Duration::from_millis(10), session, updates_tx).await;

        assert!(updates_rx.try_recv().is_err());
    }
}
