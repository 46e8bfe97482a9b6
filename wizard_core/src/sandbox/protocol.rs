//! JSON wire format of the host message channel.
//!
//! Inbound messages carry a `type` discriminant; anything without one
//! (or with an unknown one) is ignored by the host rather than treated
//! as source. The readiness signal is a fixed bare sentinel,
//! distinguishable from every executable-source message.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

/// The one-time readiness token emitted when the host can accept source.
pub const READY_SENTINEL: &str = "ready";

/// Messages accepted by the execution host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostCommand {
    /// Compile and execute one source document.
    Execute { source: String },
}

impl HostCommand {
    pub fn execute(source: impl Into<String>) -> Self {
        HostCommand::Execute {
            source: source.into(),
        }
    }

    /// Parse an inbound channel value. Returns `None` for any message
    /// lacking the discriminant field or carrying an unknown variant;
    /// such messages produce no execution attempt.
    pub fn parse(value: &Value) -> Option<Self> {
        value.get("type")?;
        serde_json::from_value(value.clone()).ok()
    }

    pub fn into_value(self) -> Value {
        match self {
            HostCommand::Execute { source } => json!({ "type": "execute", "source": source }),
        }
    }
}

/// Messages emitted by the execution host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostSignal {
    /// Emitted exactly once, when the host is prepared to accept source.
    Ready,
    /// A document executed and mounted output.
    Rendered { html: String },
    /// Compile or runtime failure, caught at the host boundary.
    ExecFailed { message: String, trace: String },
}

impl HostSignal {
    pub fn to_wire(&self) -> Value {
        match self {
            HostSignal::Ready => json!(READY_SENTINEL),
            HostSignal::Rendered { html } => json!({ "type": "rendered", "html": html }),
            HostSignal::ExecFailed { message, trace } => {
                json!({ "type": "error", "message": message, "trace": trace })
            }
        }
    }

    pub fn from_wire(value: &Value) -> Option<Self> {
        if value.as_str() == Some(READY_SENTINEL) {
            return Some(HostSignal::Ready);
        }
        match value.get("type")?.as_str()? {
            "rendered" => Some(HostSignal::Rendered {
                html: value.get("html")?.as_str()?.to_string(),
            }),
            "error" => Some(HostSignal::ExecFailed {
                message: value.get("message")?.as_str()?.to_string(),
                trace: value.get("trace")?.as_str()?.to_string(),
            }),
            _ => None,
        }
    }
}

/// An outbound signal tagged with the identity of the host instance that
/// produced it. Consumers drop events whose instance does not match the
/// live one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEvent {
    pub instance: Uuid,
    pub signal: HostSignal,
}
