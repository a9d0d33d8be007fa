//! HTTP client for the hosted backend.
//!
//! Auth goes through the `/auth/v1` endpoints, tables through the
//! `/rest/v1/{table}` row API with `column=eq.value` filters, files through
//! `/storage/v1/object`. Change feeds are delivered by polling the table and
//! diffing rows by `id`.

use crate::backend::{
    AuthGrant, AuthProvider, AuthUser, BlobStore, ChangeCallback, ChangeEvent, Credential,
    DataStore, Filter, SignUpAttributes, SignUpResult, Subscription,
};
use crate::config::Config;
use crate::error::{AuthError, BackendError};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    user: UserResponse,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

/// Sign-up answers with a full session, or just the user when the account
/// still needs confirming.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(TokenResponse),
    User(UserResponse),
}

impl TokenResponse {
    fn into_grant(self, fallback_email: &str) -> AuthGrant {
        AuthGrant {
            user: AuthUser {
                id: self.user.id,
                email: self.user.email.unwrap_or_else(|| fallback_email.to_string()),
            },
            credential: Credential {
                access_token: self.access_token,
                refresh_token: self.refresh_token,
                expires_at: self
                    .expires_in
                    .map(|secs| Utc::now() + ChronoDuration::seconds(secs)),
            },
        }
    }
}

#[derive(Clone)]
pub struct RestBackend {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
    // User token once signed in; requests fall back to the anon key
    access_token: Arc<RwLock<Option<String>>>,
    poll_interval: Duration,
}

impl RestBackend {
    pub fn new(base_url: &str, anon_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            access_token: Arc::new(RwLock::new(None)),
            poll_interval: Duration::from_secs(5),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let base_url = config.backend_url.as_deref().context("BACKEND_URL not set")?;
        let anon_key = config
            .backend_anon_key
            .as_deref()
            .context("BACKEND_ANON_KEY not set")?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            ..Self::new(base_url, anon_key)
        }
        .with_poll_interval(config.realtime_poll_interval))
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn set_access_token(&self, token: Option<String>) {
        *self.access_token.write().unwrap_or_else(|e| e.into_inner()) = token;
    }

    // Only clears when `token` is still the active one
    fn forget_access_token(&self, token: &str) {
        let mut current = self.access_token.write().unwrap_or_else(|e| e.into_inner());
        if current.as_deref() == Some(token) {
            *current = None;
        }
    }

    fn bearer(&self) -> String {
        self.access_token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .unwrap_or_else(|| self.anon_key.clone())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", self.bearer()))
    }

    fn table_request(&self, method: Method, table: &str, filter: Option<&Filter>) -> RequestBuilder {
        let builder = self.request(method, &format!("/rest/v1/{}", table));
        match filter {
            Some(filter) => builder.query(&[(filter.column.as_str(), format!("eq.{}", filter.value))]),
            None => builder,
        }
    }

    async fn fetch_rows(&self, table: &str, filter: &Filter) -> Result<Vec<Value>, BackendError> {
        let response = self
            .table_request(Method::GET, table, Some(filter))
            .query(&[("select", "*")])
            .send()
            .await?;

        let response = check_read(response).await?;
        Ok(response.json::<Vec<Value>>().await?)
    }
}

/// Pull the most useful message out of an error body.
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["msg", "message", "error_description", "error"]
                .iter()
                .find_map(|key| v.get(*key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| format!("{} {}", status, body))
}

fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

async fn check_read(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AuthError::SessionExpired.into(),
        s if is_transient_status(s) => BackendError::Network(error_message(s, &body)),
        s => BackendError::Unexpected(error_message(s, &body)),
    })
}

async fn check_write(response: Response) -> Result<(), BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AuthError::SessionExpired.into(),
        s => BackendError::WriteFailed(error_message(s, &body)),
    })
}

/// Compare a fresh table snapshot with the previous one, keyed by `id`.
fn diff_rows(previous: &HashMap<String, Value>, current: Vec<Value>) -> (HashMap<String, Value>, Vec<ChangeEvent>) {
    let mut events = Vec::new();
    let mut next = HashMap::with_capacity(current.len());

    for row in current {
        let Some(id) = row.get("id").map(|id| match id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }) else {
            continue;
        };
        match previous.get(&id) {
            None => events.push(ChangeEvent::Insert(row.clone())),
            Some(old) if *old != row => events.push(ChangeEvent::Update(row.clone())),
            Some(_) => {}
        }
        next.insert(id, row);
    }

    for (id, row) in previous {
        if !next.contains_key(id) {
            events.push(ChangeEvent::Delete(row.clone()));
        }
    }

    (next, events)
}

#[async_trait]
impl AuthProvider for RestBackend {
    async fn authenticate(&self, email: &str, password: &str) -> Result<AuthGrant, BackendError> {
        let response = self
            .request(Method::POST, "/auth/v1/token")
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => AuthError::InvalidCredentials.into(),
                s if is_transient_status(s) => BackendError::Network(error_message(s, &body)),
                s => AuthError::Rejected(error_message(s, &body)).into(),
            });
        }

        let token: TokenResponse = response.json().await?;
        let grant = token.into_grant(email);
        info!("Signed in to backend as {}", grant.user.email);
        Ok(grant)
    }

    async fn create_account(
        &self,
        email: &str,
        password: &str,
        attributes: &SignUpAttributes,
    ) -> Result<SignUpResult, BackendError> {
        let response = self
            .request(Method::POST, "/auth/v1/signup")
            .json(&json!({ "email": email, "password": password, "data": attributes }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(if is_transient_status(status) {
                BackendError::Network(error_message(status, &body))
            } else {
                AuthError::Rejected(error_message(status, &body)).into()
            });
        }

        match response.json::<SignUpResponse>().await? {
            SignUpResponse::Session(token) => Ok(SignUpResult::Session(token.into_grant(email))),
            SignUpResponse::User(user) => Ok(SignUpResult::ConfirmationRequired(AuthUser {
                id: user.id,
                email: user.email.unwrap_or_else(|| email.to_string()),
            })),
        }
    }

    async fn restore_session(&self, credential: &Credential) -> Result<AuthGrant, BackendError> {
        let refresh_token = credential
            .refresh_token
            .as_deref()
            .ok_or(AuthError::SessionExpired)?;

        let response = self
            .request(Method::POST, "/auth/v1/token")
            .query(&[("grant_type", "refresh_token")])
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(if is_transient_status(status) {
                BackendError::Network(error_message(status, &body))
            } else {
                AuthError::SessionExpired.into()
            });
        }

        // The refresh response may omit the email; the caller keeps the one it had
        let token: TokenResponse = response.json().await?;
        Ok(token.into_grant(""))
    }

    async fn terminate_session(&self, credential: &Credential) -> Result<(), BackendError> {
        let result = self
            .client
            .post(format!("{}/auth/v1/logout", self.base_url))
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", credential.access_token))
            .send()
            .await;

        // Forget the token whatever the server said
        self.forget_access_token(&credential.access_token);

        let response = result?;
        let status = response.status();
        if status.is_success() || status == StatusCode::UNAUTHORIZED {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(BackendError::Network(error_message(status, &body)))
    }

    fn use_credential(&self, credential: Option<&Credential>) {
        self.set_access_token(credential.map(|c| c.access_token.clone()));
    }
}

#[async_trait]
impl DataStore for RestBackend {
    async fn fetch_record(&self, table: &str, filter: &Filter) -> Result<Value, BackendError> {
        self.fetch_rows(table, filter)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::NotFound {
                table: table.to_string(),
            })
    }

    async fn fetch_records(&self, table: &str, filter: &Filter) -> Result<Vec<Value>, BackendError> {
        self.fetch_rows(table, filter).await
    }

    async fn upsert_record(&self, table: &str, row: Value) -> Result<(), BackendError> {
        let response = self
            .table_request(Method::POST, table, None)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&row)
            .send()
            .await?;
        check_write(response).await
    }

    async fn delete_record(&self, table: &str, filter: &Filter) -> Result<(), BackendError> {
        let response = self
            .table_request(Method::DELETE, table, Some(filter))
            .send()
            .await?;
        check_write(response).await
    }

    fn subscribe_to_changes(
        &self,
        table: &str,
        filter: Filter,
        callback: ChangeCallback,
    ) -> Subscription {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime; change feed for '{}' is disabled", table);
            return Subscription::new(|| {});
        };

        let backend = self.clone();
        let table = table.to_string();
        let task = runtime.spawn(async move {
            let mut known: Option<HashMap<String, Value>> = None;
            let mut ticker = tokio::time::interval(backend.poll_interval);
            loop {
                ticker.tick().await;
                let rows = match backend.fetch_rows(&table, &filter).await {
                    Ok(rows) => rows,
                    Err(e) => {
                        debug!("Change feed poll for '{}' failed: {}", table, e);
                        continue;
                    }
                };
                match known.as_ref() {
                    // The first snapshot is the baseline, not a change
                    None => known = Some(diff_rows(&HashMap::new(), rows).0),
                    Some(previous) => {
                        let (next, events) = diff_rows(previous, rows);
                        known = Some(next);
                        for event in events {
                            callback(event);
                        }
                    }
                }
            }
        });

        Subscription::new(move || task.abort())
    }
}

#[async_trait]
impl BlobStore for RestBackend {
    async fn upload_blob(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), BackendError> {
        let response = self
            .request(Method::POST, &format!("/storage/v1/object/{}/{}", bucket, key))
            .header("Content-Type", content_type)
            .body(bytes)
            .send()
            .await?;
        check_write(response).await
    }

    async fn delete_blob(&self, bucket: &str, key: &str) -> Result<(), BackendError> {
        let response = self
            .request(Method::DELETE, &format!("/storage/v1/object/{}/{}", bucket, key))
            .send()
            .await?;
        check_write(response).await
    }
}
