use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::timeout;
use wizard_core::preview::{PreviewController, PreviewUpdate, SourceDocument};

const READY_TIMEOUT: Duration = Duration::from_secs(5);
const RECV_TIMEOUT: Duration = Duration::from_secs(20);

async fn next_update(rx: &mut broadcast::Receiver<PreviewUpdate>) -> PreviewUpdate {
    timeout(RECV_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for preview update")
        .expect("update channel closed")
}

/// Receive updates until a render outcome (success or failure) arrives,
/// skipping lifecycle updates like `Ready`.
async fn next_outcome(rx: &mut broadcast::Receiver<PreviewUpdate>) -> PreviewUpdate {
    loop {
        match next_update(rx).await {
            PreviewUpdate::Ready => continue,
            other => return other,
        }
    }
}

#[tokio::test]
async fn test_document_delivered_after_readiness() {
    let controller = PreviewController::new(READY_TIMEOUT).unwrap();
    let mut updates = controller.subscribe();

    // Sent immediately, likely before the host's handshake: the
    // controller defers delivery rather than dropping the document.
    controller
        .set_document(SourceDocument::new(
            "ui.mount(ui.el(\"div\", { class = \"page\" }, ui.text(\"Hello\")))",
        ))
        .await
        .unwrap();

    match next_outcome(&mut updates).await {
        PreviewUpdate::Rendered { html } => {
            assert_eq!(html, "<div class=\"page\">Hello</div>");
        }
        other => panic!("expected Rendered, got {other:?}"),
    }
}

#[tokio::test]
async fn test_second_document_leaves_no_stale_content() {
    let controller = PreviewController::new(READY_TIMEOUT).unwrap();
    let mut updates = controller.subscribe();

    controller
        .set_document(SourceDocument::new(
            "ui.mount(ui.el(\"section\", nil, ui.text(\"first-render\")))",
        ))
        .await
        .unwrap();
    match next_outcome(&mut updates).await {
        PreviewUpdate::Rendered { html } => assert!(html.contains("first-render")),
        other => panic!("expected Rendered, got {other:?}"),
    }

    controller
        .set_document(SourceDocument::new(
            "ui.mount(ui.el(\"section\", nil, ui.text(\"second-render\")))",
        ))
        .await
        .unwrap();
    match next_outcome(&mut updates).await {
        PreviewUpdate::Rendered { html } => {
            assert!(html.contains("second-render"));
            assert!(!html.contains("first-render"));
        }
        other => panic!("expected Rendered, got {other:?}"),
    }
}

#[tokio::test]
async fn test_failed_document_reports_diagnostics_and_recovers() {
    let controller = PreviewController::new(READY_TIMEOUT).unwrap();
    let mut updates = controller.subscribe();

    controller
        .set_document(SourceDocument::new("error(\"synthetic failure\")"))
        .await
        .unwrap();
    match next_outcome(&mut updates).await {
        PreviewUpdate::Failed { message, trace } => {
            assert!(message.contains("synthetic failure"));
            assert!(!trace.is_empty());
        }
        other => panic!("expected Failed, got {other:?}"),
    }

    // The same instance stays usable after a failed execute.
    controller
        .set_document(SourceDocument::new("ui.mount(ui.text(\"recovered\"))"))
        .await
        .unwrap();
    match next_outcome(&mut updates).await {
        PreviewUpdate::Rendered { html } => assert_eq!(html, "recovered"),
        other => panic!("expected Rendered, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unchanged_document_is_not_redelivered() {
    let controller = PreviewController::new(READY_TIMEOUT).unwrap();
    let mut updates = controller.subscribe();

    let document = SourceDocument::new("ui.mount(ui.text(\"stable\"))");
    controller.set_document(document.clone()).await.unwrap();
    match next_outcome(&mut updates).await {
        PreviewUpdate::Rendered { html } => assert_eq!(html, "stable"),
        other => panic!("expected Rendered, got {other:?}"),
    }

    // Re-targeting the identical document (device change, tab switch)
    // must not re-execute; the next render comes from the changed one.
    controller.set_document(document).await.unwrap();
    controller
        .set_document(SourceDocument::new("ui.mount(ui.text(\"changed\"))"))
        .await
        .unwrap();
    match next_outcome(&mut updates).await {
        PreviewUpdate::Rendered { html } => assert_eq!(html, "changed"),
        other => panic!("expected Rendered, got {other:?}"),
    }
}

#[tokio::test]
async fn test_each_cycle_gets_a_fresh_instance() {
    let first = PreviewController::new(READY_TIMEOUT).unwrap();
    let second = PreviewController::new(READY_TIMEOUT).unwrap();
    assert_ne!(first.instance(), second.instance());
}
