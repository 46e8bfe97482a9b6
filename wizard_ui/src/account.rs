//! Authentication and snippet-persistence endpoints. These proxy the
//! external account service; a failed save is reported here and never
//! touches the preview state.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;
use wizard_core::account::{AccountError, AuthSession, SnippetRecord};

use crate::state::AppState;

type ApiError = (StatusCode, Json<Value>);

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    pub email_or_username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SignupBody {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SaveSnippetBody {
    pub title: String,
    pub thumbnail: String,
    pub language: Option<String>,
}

fn account_error(err: AccountError) -> ApiError {
    let status = match &err {
        AccountError::NotAuthenticated => StatusCode::UNAUTHORIZED,
        AccountError::Rejected { status, .. } => {
            StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
        }
        AccountError::Http(_) => StatusCode::BAD_GATEWAY,
    };
    (status, Json(json!({ "error": err.to_string() })))
}

pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginBody>,
) -> Result<Json<AuthSession>, ApiError> {
    state
        .account
        .login(&body.email_or_username, &body.password)
        .await
        .map(Json)
        .map_err(account_error)
}

pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SignupBody>,
) -> Result<Json<AuthSession>, ApiError> {
    state
        .account
        .signup(&body.email, &body.username, &body.password)
        .await
        .map(Json)
        .map_err(account_error)
}

pub async fn logout_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    state.account.logout();
    Json(json!({ "ok": true }))
}

/// `POST /api/snippets`: persist the current document. The preview
/// keeps whatever it already rendered even when the save fails.
pub async fn save_snippet_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SaveSnippetBody>,
) -> Result<Json<SnippetRecord>, ApiError> {
    let code = match state.document.read().await.as_ref() {
        Some(document) => document.as_str().to_string(),
        None => {
            return Err((
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "no document to save" })),
            ))
        }
    };

    state
        .account
        .save_snippet(&body.title, &code, &body.thumbnail, body.language.as_deref())
        .await
        .map(Json)
        .map_err(|err| {
            warn!("snippet save failed: {err}");
            account_error(err)
        })
}

pub async fn list_snippets_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SnippetRecord>>, ApiError> {
    state
        .account
        .list_snippets()
        .await
        .map(Json)
        .map_err(account_error)
}
