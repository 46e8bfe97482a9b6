use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::{info, warn};
use wizard_core::generation::generate_document;

use crate::state::{AppState, UiEvent};

type ApiError = (StatusCode, Json<Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

/// `POST /api/generate`: run one full generation cycle from an
/// uploaded sketch. On upstream failure nothing is assembled and any
/// previously rendered preview is left untouched.
pub async fn generate_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut sketch: Option<Vec<u8>> = None;
    let mut media_type: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?
    {
        match field.name() {
            Some("sketch") => {
                let declared = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;
                media_type = media_type.or(declared);
                sketch = Some(bytes.to_vec());
            }
            Some("media_type") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;
                media_type = Some(text);
            }
            _ => {}
        }
    }

    let Some(sketch) = sketch else {
        return Err(api_error(StatusCode::BAD_REQUEST, "missing sketch upload"));
    };
    let media_type = media_type.unwrap_or_else(|| "image/png".to_string());

    info!(bytes = sketch.len(), %media_type, "starting generation cycle");
    let _ = state.events_tx.send(UiEvent::CycleStarted);

    let document = match generate_document(state.generation.as_ref(), &sketch, &media_type).await {
        Ok(document) => document,
        Err(err) => {
            warn!("generation cycle failed: {err}");
            let message = format!("Failed to generate code: {err}");
            let _ = state.events_tx.send(UiEvent::CycleFailed {
                message: message.clone(),
            });
            return Err(api_error(StatusCode::BAD_GATEWAY, message));
        }
    };

    state
        .start_preview(document.clone())
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(json!({ "source": document.as_str() })))
}

/// `GET /api/source`: the current source document verbatim, feeding
/// the read-only code view.
pub async fn source_handler(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    match state.document.read().await.as_ref() {
        Some(document) => Ok(Json(json!({ "source": document.as_str() }))),
        None => Err(api_error(
            StatusCode::NOT_FOUND,
            "no document generated yet",
        )),
    }
}
