//! Interfaces consumed from the hosted backend service.
//!
//! The service provides authentication, row storage, object storage and
//! change feeds. The core only talks to these traits; `rest` is the client
//! for the real service and `memory` is a self-contained stand-in used by the
//! offline mode and the tests.

pub mod memory;
pub mod rest;

use crate::error::BackendError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

pub use memory::InMemoryBackend;
pub use rest::RestBackend;

/// Identity returned by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
}

/// Opaque provider credential.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

// Tokens must never end up in logs
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// A successful authentication: who, plus the credential proving it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthGrant {
    pub user: AuthUser,
    pub credential: Credential,
}

/// Attributes attached to a new account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignUpAttributes {
    pub full_name: String,
    pub locale: String,
}

/// Result of account creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpResult {
    /// The provider signed the new user in right away.
    Session(AuthGrant),
    /// The account exists but must be confirmed out of band first.
    ConfirmationRequired(AuthUser),
}

/// Notifications pushed by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    SessionEstablished(AuthGrant),
    SessionExpired,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn authenticate(&self, email: &str, password: &str) -> Result<AuthGrant, BackendError>;

    async fn create_account(
        &self,
        email: &str,
        password: &str,
        attributes: &SignUpAttributes,
    ) -> Result<SignUpResult, BackendError>;

    /// Re-validate a persisted credential (refreshing it if possible).
    async fn restore_session(&self, credential: &Credential) -> Result<AuthGrant, BackendError>;

    async fn terminate_session(&self, credential: &Credential) -> Result<(), BackendError>;

    /// Act as `credential` on later data and blob requests; `None` goes back
    /// to anonymous access. Only the session store calls this, so a grant is
    /// never used before the store has accepted it.
    fn use_credential(&self, _credential: Option<&Credential>) {}
}

/// Equality filter on one column (`column = value`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: String,
    pub value: String,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    /// Whether a JSON row satisfies this filter.
    pub fn matches(&self, row: &Value) -> bool {
        match row.get(&self.column) {
            Some(Value::String(s)) => *s == self.value,
            Some(Value::Null) | None => false,
            Some(other) => other.to_string() == self.value,
        }
    }
}

/// A row-level change delivered by a change feed.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    Insert(Value),
    Update(Value),
    Delete(Value),
}

impl ChangeEvent {
    pub fn row(&self) -> &Value {
        match self {
            ChangeEvent::Insert(row) | ChangeEvent::Update(row) | ChangeEvent::Delete(row) => row,
        }
    }
}

pub type ChangeCallback = Arc<dyn Fn(ChangeEvent) + Send + Sync>;

/// Live change-feed subscription. Dropping it stops delivery.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

#[async_trait]
pub trait DataStore: Send + Sync {
    /// Fetch exactly one row; `BackendError::NotFound` when nothing matches.
    async fn fetch_record(&self, table: &str, filter: &Filter) -> Result<Value, BackendError>;

    async fn fetch_records(&self, table: &str, filter: &Filter) -> Result<Vec<Value>, BackendError>;

    /// Insert or merge a row keyed by its `id` (last writer wins).
    async fn upsert_record(&self, table: &str, row: Value) -> Result<(), BackendError>;

    async fn delete_record(&self, table: &str, filter: &Filter) -> Result<(), BackendError>;

    fn subscribe_to_changes(
        &self,
        table: &str,
        filter: Filter,
        callback: ChangeCallback,
    ) -> Subscription;
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload_blob(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), BackendError>;

    async fn delete_blob(&self, bucket: &str, key: &str) -> Result<(), BackendError>;
}
