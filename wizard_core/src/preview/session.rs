//! Per-session readiness state machine, kept free of I/O so every
//! transition is synchronously testable.

use tracing::debug;
use uuid::Uuid;

use super::SourceDocument;
use crate::sandbox::HostSignal;

/// Session states. A session is created `AwaitingReady` the moment its
/// host instance is spawned; there is no transition back; a new cycle
/// gets a new session with a new instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingReady,
    Ready,
}

/// Outcome of feeding one host signal into the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionReaction {
    /// Nothing to do.
    None,
    /// Deliver this document to the host now.
    Deliver(SourceDocument),
    /// Signal originated from a different (stale or foreign) instance
    /// and was dropped without a state change.
    Ignored,
}

/// Pairing of one execution host instance with the document currently
/// targeted at it.
#[derive(Debug)]
pub struct PreviewSession {
    instance: Uuid,
    state: SessionState,
    /// Latest document recorded while awaiting readiness; an older
    /// pending document is superseded, never queued.
    pending: Option<SourceDocument>,
    /// Document last delivered to the host.
    current: Option<SourceDocument>,
}

impl PreviewSession {
    pub fn new(instance: Uuid) -> Self {
        Self {
            instance,
            state: SessionState::AwaitingReady,
            pending: None,
            current: None,
        }
    }

    pub fn instance(&self) -> Uuid {
        self.instance
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    /// Record a new target document. Returns the document to deliver
    /// when the session is ready and the document actually changed;
    /// while awaiting readiness the document is deferred (latest wins),
    /// never dropped.
    pub fn set_document(&mut self, document: SourceDocument) -> Option<SourceDocument> {
        match self.state {
            SessionState::AwaitingReady => {
                self.pending = Some(document);
                None
            }
            SessionState::Ready => {
                if self.current.as_ref() == Some(&document) {
                    // Re-preview of an unchanged document: no re-send.
                    return None;
                }
                self.current = Some(document.clone());
                Some(document)
            }
        }
    }

    /// Feed one signal received from `origin` into the state machine.
    /// Signals from any other instance are ignored without a transition.
    pub fn observe(&mut self, origin: Uuid, signal: &HostSignal) -> SessionReaction {
        if origin != self.instance {
            debug!(%origin, live = %self.instance, "dropping signal from stale instance");
            return SessionReaction::Ignored;
        }

        match signal {
            HostSignal::Ready => match self.state {
                SessionState::Ready => SessionReaction::None,
                SessionState::AwaitingReady => {
                    self.state = SessionState::Ready;
                    match self.pending.take() {
                        Some(document) => {
                            self.current = Some(document.clone());
                            SessionReaction::Deliver(document)
                        }
                        None => SessionReaction::None,
                    }
                }
            },
            HostSignal::Rendered { .. } | HostSignal::ExecFailed { .. } => SessionReaction::None,
        }
    }
}
