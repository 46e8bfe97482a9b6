//! Preview session lifecycle: one execution host instance per active
//! preview, with source delivery gated on the host's readiness
//! handshake and every inbound signal checked against the live
//! instance's identity.

pub mod controller;
pub mod session;

pub use controller::{PreviewController, PreviewUpdate};
pub use session::{PreviewSession, SessionReaction, SessionState};

use serde::{Deserialize, Serialize};

/// One self-contained generated UI unit. Immutable once produced; a new
/// generation cycle supersedes it with a fresh document rather than
/// mutating this one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceDocument(String);

impl SourceDocument {
    pub fn new(source: impl Into<String>) -> Self {
        Self(source.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SourceDocument {
    fn from(source: String) -> Self {
        Self(source)
    }
}

impl std::fmt::Display for SourceDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
