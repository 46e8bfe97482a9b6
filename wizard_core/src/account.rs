//! Client side of the external account/persistence service, plus the
//! process-wide credential store with an explicit lifecycle: set on
//! successful authentication, attached to every outgoing request,
//! cleared atomically on logout.
//!
//! Saving a snippet is independent of the generation that produced it:
//! a save failure is reported through its own error path and never
//! disturbs an already-rendered preview.

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::info;

/// Language tag recorded on saved snippets when the caller does not
/// supply one.
const DEFAULT_LANGUAGE: &str = "luau";

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("account service request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("not authenticated")]
    NotAuthenticated,

    #[error("account service rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

/// Identity issued by the account service on login or signup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    #[serde(rename = "_id")]
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub token: String,
}

/// A saved generation artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnippetRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub user: String,
    pub title: String,
    pub code: String,
    pub language: String,
    pub thumbnail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Process-wide bearer-token holder.
#[derive(Debug, Default)]
pub struct CredentialStore {
    session: RwLock<Option<AuthSession>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, session: AuthSession) {
        if let Ok(mut slot) = self.session.write() {
            *slot = Some(session);
        }
    }

    /// Clear the logged-in identity in one swap.
    pub fn clear(&self) {
        if let Ok(mut slot) = self.session.write() {
            slot.take();
        }
    }

    pub fn current(&self) -> Option<AuthSession> {
        self.session.read().ok().and_then(|slot| slot.clone())
    }

    pub fn bearer_token(&self) -> Option<String> {
        self.session
            .read()
            .ok()
            .and_then(|slot| slot.as_ref().map(|s| s.token.clone()))
    }
}

#[derive(Debug)]
pub struct AccountClient {
    client: reqwest::Client,
    base_url: String,
    credentials: std::sync::Arc<CredentialStore>,
}

impl AccountClient {
    pub fn new(base_url: impl Into<String>, credentials: std::sync::Arc<CredentialStore>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            credentials,
        }
    }

    pub async fn login(
        &self,
        email_or_username: &str,
        password: &str,
    ) -> Result<AuthSession, AccountError> {
        let session = self
            .authenticate(
                "/auth/login",
                json!({
                    "emailOrUsername": email_or_username,
                    "password": password,
                }),
            )
            .await?;
        info!(username = %session.username, "logged in");
        Ok(session)
    }

    pub async fn signup(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> Result<AuthSession, AccountError> {
        let session = self
            .authenticate(
                "/auth/signup",
                json!({
                    "email": email,
                    "username": username,
                    "password": password,
                }),
            )
            .await?;
        info!(username = %session.username, "account created");
        Ok(session)
    }

    pub fn logout(&self) {
        self.credentials.clear();
        info!("logged out");
    }

    /// Persist a generated document. Requires a live session; the
    /// language tag defaults to [`DEFAULT_LANGUAGE`].
    pub async fn save_snippet(
        &self,
        title: &str,
        code: &str,
        thumbnail: &str,
        language: Option<&str>,
    ) -> Result<SnippetRecord, AccountError> {
        let token = self
            .credentials
            .bearer_token()
            .ok_or(AccountError::NotAuthenticated)?;

        let response = self
            .client
            .post(format!("{}/snippets", self.base_url))
            .bearer_auth(token)
            .json(&json!({
                "title": title,
                "code": code,
                "language": language.unwrap_or(DEFAULT_LANGUAGE),
                "thumbnail": thumbnail,
            }))
            .send()
            .await?;

        Self::parse(response).await
    }

    pub async fn list_snippets(&self) -> Result<Vec<SnippetRecord>, AccountError> {
        let token = self
            .credentials
            .bearer_token()
            .ok_or(AccountError::NotAuthenticated)?;

        let response = self
            .client
            .get(format!("{}/snippets", self.base_url))
            .bearer_auth(token)
            .send()
            .await?;

        Self::parse(response).await
    }

    async fn authenticate(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<AuthSession, AccountError> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(&body)
            .send()
            .await?;

        let session: AuthSession = Self::parse(response).await?;
        self.credentials.store(session.clone());
        Ok(session)
    }

    async fn parse<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, AccountError> {
        let status = response.status();
        if !status.is_success() {
            return Err(AccountError::Rejected {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response.json().await?)
    }
}
