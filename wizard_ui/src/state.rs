use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use wizard_core::account::{AccountClient, CredentialStore};
use wizard_core::generation::GenerationService;
use wizard_core::preview::{PreviewController, PreviewUpdate, SourceDocument};
use wizard_core::sandbox::SandboxError;

use crate::config::Config;

/// Depth of the broadcast channel feeding SSE subscribers.
const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Events streamed to the host page over `/events`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEvent {
    CycleStarted,
    CycleFailed { message: String },
    PreviewReady,
    Rendered { html: String },
    ExecutionFailed { message: String, trace: String },
    ReadyTimeout,
}

impl From<PreviewUpdate> for UiEvent {
    fn from(update: PreviewUpdate) -> Self {
        match update {
            PreviewUpdate::Ready => UiEvent::PreviewReady,
            PreviewUpdate::Rendered { html } => UiEvent::Rendered { html },
            PreviewUpdate::Failed { message, trace } => UiEvent::ExecutionFailed { message, trace },
            PreviewUpdate::ReadyTimeout => UiEvent::ReadyTimeout,
        }
    }
}

/// The live preview cycle: its controller plus the task forwarding the
/// controller's updates onto the shared UI event channel.
pub struct ActivePreview {
    pub controller: PreviewController,
    forwarder: tokio::task::JoinHandle<()>,
}

/// Shared application state.
pub struct AppState {
    pub config: Config,
    /// Broadcast channel for real-time preview/cycle events.
    pub events_tx: broadcast::Sender<UiEvent>,
    pub generation: Arc<dyn GenerationService>,
    pub account: AccountClient,
    pub credentials: Arc<CredentialStore>,
    /// The active preview cycle; replaced wholesale on each new
    /// generation cycle.
    pub preview: RwLock<Option<ActivePreview>>,
    /// The current source document, if a cycle has completed.
    pub document: RwLock<Option<SourceDocument>>,
}

impl AppState {
    pub fn new(config: Config, generation: Arc<dyn GenerationService>) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let credentials = Arc::new(CredentialStore::new());
        let account = AccountClient::new(config.account_url.clone(), Arc::clone(&credentials));

        Self {
            config,
            events_tx,
            generation,
            account,
            credentials,
            preview: RwLock::new(None),
            document: RwLock::new(None),
        }
    }

    /// Start a fresh preview cycle for `document`: spawn a new execution
    /// host instance, forward its updates onto the event stream, retire
    /// the previous instance, and target the document at the new session
    /// (delivery waits on the readiness handshake).
    pub async fn start_preview(&self, document: SourceDocument) -> Result<(), SandboxError> {
        let controller = PreviewController::new(self.config.ready_timeout)?;

        let mut updates = controller.subscribe();
        let events_tx = self.events_tx.clone();
        let forwarder = tokio::spawn(async move {
            while let Ok(update) = updates.recv().await {
                let _ = events_tx.send(UiEvent::from(update));
            }
        });

        // Retire the old cycle before the new document goes out: its
        // forwarder is aborted so a slow render from the discarded
        // instance never reaches the shared event stream, and dropping
        // its controller tears the old host down.
        let mut slot = self.preview.write().await;
        if let Some(previous) = slot.take() {
            previous.forwarder.abort();
        }

        controller.set_document(document.clone()).await?;
        *self.document.write().await = Some(document);
        *slot = Some(ActivePreview {
            controller,
            forwarder,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::net::SocketAddr;
    use std::time::Duration;
    use wizard_core::generation::{GeneratedImage, GenerationError, SketchAnalysis};

    struct NoGeneration;

    #[async_trait]
    impl GenerationService for NoGeneration {
        async fn analyze_sketch(
            &self,
            _image: &[u8],
            _media_type: &str,
        ) -> Result<SketchAnalysis, GenerationError> {
            Err(GenerationError::MalformedAnalysis("unused".to_string()))
        }

        async fn synthesize_image(
            &self,
            _prompt: &str,
        ) -> Result<GeneratedImage, GenerationError> {
            Err(GenerationError::EmptyImage)
        }
    }

    fn test_state() -> AppState {
        let config = Config {
            addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            generation_url: "http://localhost:0".to_string(),
            generation_api_key: String::new(),
            account_url: "http://localhost:0".to_string(),
            ready_timeout: Duration::from_secs(5),
        };
        AppState::new(config, Arc::new(NoGeneration))
    }

    #[tokio::test]
    async fn test_retired_cycle_render_stays_off_the_event_stream() {
        let state = test_state();
        let mut events = state.events_tx.subscribe();

        // The first document busy-loops long enough that its render can
        // only complete after the second cycle has replaced it.
        let slow = "local n = 0\n\
                    for i = 1, 4000000 do n = n + i end\n\
                    ui.mount(ui.text(\"first cycle\"))";
        state
            .start_preview(SourceDocument::new(slow))
            .await
            .unwrap();
        state
            .start_preview(SourceDocument::new("ui.mount(ui.text(\"second cycle\"))"))
            .await
            .unwrap();

        // Collect until the live cycle renders, then keep draining long
        // enough for the retired instance to have finished its work.
        let mut seen = Vec::new();
        loop {
            match tokio::time::timeout(Duration::from_secs(20), events.recv()).await {
                Ok(Ok(UiEvent::Rendered { html })) => {
                    let done = html.contains("second cycle");
                    seen.push(html);
                    if done {
                        break;
                    }
                }
                Ok(Ok(_)) => continue,
                other => panic!("event stream ended unexpectedly: {other:?}"),
            }
        }
        loop {
            match tokio::time::timeout(Duration::from_secs(1), events.recv()).await {
                Ok(Ok(UiEvent::Rendered { html })) => seen.push(html),
                Ok(Ok(_)) => continue,
                _ => break,
            }
        }

        assert!(
            seen.iter().all(|html| !html.contains("first cycle")),
            "retired cycle leaked onto the event stream: {seen:?}"
        );
    }

    #[test]
    fn test_ui_event_wire_shape() {
        let event = UiEvent::Rendered {
            html: "<div>ok</div>".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "rendered");
        assert_eq!(json["html"], "<div>ok</div>");

        let failed = UiEvent::ExecutionFailed {
            message: "runtime error: boom".to_string(),
            trace: "runtime error: boom\nstack traceback".to_string(),
        };
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["type"], "execution_failed");
        assert!(json["trace"].as_str().unwrap().contains("traceback"));
    }

    #[test]
    fn test_preview_update_mapping() {
        assert_eq!(UiEvent::from(PreviewUpdate::Ready), UiEvent::PreviewReady);
        assert_eq!(
            UiEvent::from(PreviewUpdate::ReadyTimeout),
            UiEvent::ReadyTimeout
        );
    }
}
