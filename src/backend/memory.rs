//! In-process backend.
//!
//! Implements every backend trait against plain maps so the portal can run
//! without a hosted project (offline mode) and so the session and locale
//! logic can be exercised deterministically. It mirrors the hosted service's
//! observable behaviour: sign-up creates the profile row, upserts merge by
//! `id`, change feeds fire on matching writes. Fault injection hooks let
//! callers simulate write failures, dead sessions and slow reads.

use crate::backend::{
    AuthGrant, AuthProvider, AuthUser, BlobStore, ChangeCallback, ChangeEvent, Credential,
    DataStore, Filter, SignUpAttributes, SignUpResult, Subscription,
};
use crate::error::{AuthError, BackendError};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Notify, Semaphore};
use tracing::debug;
use uuid::Uuid;

struct Account {
    user: AuthUser,
    password: String,
    confirmed: bool,
}

struct Watcher {
    id: u64,
    table: String,
    filter: Filter,
    callback: ChangeCallback,
}

#[derive(Default)]
struct State {
    accounts: HashMap<String, Account>,
    // access token -> user id
    tokens: HashMap<String, String>,
    tables: HashMap<String, Vec<Value>>,
    blobs: HashMap<(String, String), Vec<u8>>,
    watchers: Vec<Watcher>,
    next_watcher_id: u64,

    require_confirmation: bool,
    failing_upserts: usize,
    fail_terminate: bool,
    offline: bool,

    upserts: Vec<(String, Value)>,
    terminate_calls: usize,
}

#[derive(Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<Mutex<State>>,
    read_gate: Arc<Mutex<Option<Arc<Semaphore>>>>,
    read_started: Arc<Notify>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Seed a confirmed account together with its profile row.
    pub fn with_user(self, email: &str, password: &str, full_name: &str, locale: &str) -> Self {
        {
            let mut state = self.lock();
            let user = AuthUser {
                id: Uuid::new_v4().to_string(),
                email: email.to_string(),
            };
            insert_profile_row(&mut state, &user.id, full_name, locale);
            state.accounts.insert(
                email.to_string(),
                Account {
                    user,
                    password: password.to_string(),
                    confirmed: true,
                },
            );
        }
        self
    }

    /// New accounts must be confirmed before they can sign in.
    pub fn require_confirmation(&self, required: bool) {
        self.lock().require_confirmation = required;
    }

    /// Confirm a pending account (the out-of-band e-mail link).
    pub fn confirm(&self, email: &str) {
        if let Some(account) = self.lock().accounts.get_mut(email) {
            account.confirmed = true;
        }
    }

    pub fn user_id(&self, email: &str) -> Option<String> {
        self.lock().accounts.get(email).map(|a| a.user.id.clone())
    }

    /// Make the next `count` upserts fail with `WriteFailed`.
    pub fn fail_next_upserts(&self, count: usize) {
        self.lock().failing_upserts = count;
    }

    /// Make `terminate_session` fail (the session is still dropped server side).
    pub fn fail_terminate(&self, fail: bool) {
        self.lock().fail_terminate = fail;
    }

    /// Simulate a lost connection: every call fails with `Network`.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Invalidate every issued access token.
    pub fn expire_all_tokens(&self) {
        self.lock().tokens.clear();
    }

    /// Hold single-row reads until [`InMemoryBackend::resume_reads`].
    pub fn pause_reads(&self) {
        *self.read_gate.lock().unwrap_or_else(|e| e.into_inner()) = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn resume_reads(&self) {
        if let Some(gate) = self.read_gate.lock().unwrap_or_else(|e| e.into_inner()).take() {
            gate.close();
        }
    }

    /// Signalled whenever a single-row read starts.
    pub fn read_started(&self) -> &Notify {
        &self.read_started
    }

    /// Every successful upsert against `table`, in completion order.
    pub fn upserts(&self, table: &str) -> Vec<Value> {
        self.lock()
            .upserts
            .iter()
            .filter(|(t, _)| t == table)
            .map(|(_, row)| row.clone())
            .collect()
    }

    pub fn terminate_calls(&self) -> usize {
        self.lock().terminate_calls
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.lock().tables.get(table).cloned().unwrap_or_default()
    }

    pub fn blob(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.lock()
            .blobs
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn active_watchers(&self) -> usize {
        self.lock().watchers.len()
    }

    /// Write a row as if another client did it (fires change feeds, not
    /// recorded as one of our upserts).
    pub fn external_upsert(&self, table: &str, row: Value) {
        let event = {
            let mut state = self.lock();
            store_row(&mut state, table, row)
        };
        self.dispatch(table, event);
    }

    fn issue_grant(state: &mut State, user: &AuthUser) -> AuthGrant {
        let access_token = Uuid::new_v4().to_string();
        state.tokens.insert(access_token.clone(), user.id.clone());
        AuthGrant {
            user: user.clone(),
            credential: Credential {
                access_token,
                refresh_token: Some(Uuid::new_v4().to_string()),
                expires_at: None,
            },
        }
    }

    fn check_online(&self) -> Result<(), BackendError> {
        if self.lock().offline {
            return Err(BackendError::Network("connection refused".to_string()));
        }
        Ok(())
    }

    fn dispatch(&self, table: &str, event: ChangeEvent) {
        // Collect first so callbacks run without the lock held
        let callbacks: Vec<ChangeCallback> = self
            .lock()
            .watchers
            .iter()
            .filter(|w| w.table == table && w.filter.matches(event.row()))
            .map(|w| w.callback.clone())
            .collect();
        for callback in callbacks {
            callback(event.clone());
        }
    }
}

fn insert_profile_row(state: &mut State, user_id: &str, full_name: &str, locale: &str) {
    let now = Utc::now();
    let row = json!({
        "id": Uuid::new_v4().to_string(),
        "user_id": user_id,
        "full_name": full_name,
        "locale": locale,
        "role": "user",
        "created_at": now,
        "updated_at": now,
    });
    state
        .tables
        .entry("profiles".to_string())
        .or_default()
        .push(row);
}

/// Insert or merge `row` by `id`, returning the change it represents.
fn store_row(state: &mut State, table: &str, mut row: Value) -> ChangeEvent {
    if row.get("id").map_or(true, Value::is_null) {
        row["id"] = Value::String(Uuid::new_v4().to_string());
    }
    let rows = state.tables.entry(table.to_string()).or_default();
    match rows.iter().position(|existing| existing["id"] == row["id"]) {
        Some(index) => {
            let existing = &mut rows[index];
            if let (Some(target), Some(fields)) = (existing.as_object_mut(), row.as_object()) {
                for (key, value) in fields {
                    target.insert(key.clone(), value.clone());
                }
            }
            ChangeEvent::Update(existing.clone())
        }
        None => {
            rows.push(row.clone());
            ChangeEvent::Insert(row)
        }
    }
}

#[async_trait]
impl AuthProvider for InMemoryBackend {
    async fn authenticate(&self, email: &str, password: &str) -> Result<AuthGrant, BackendError> {
        self.check_online()?;
        let mut state = self.lock();
        let user = match state.accounts.get(email) {
            Some(account) if account.password == password && account.confirmed => {
                account.user.clone()
            }
            Some(account) if account.password == password => {
                return Err(AuthError::Rejected("email not confirmed".to_string()).into())
            }
            _ => return Err(AuthError::InvalidCredentials.into()),
        };
        debug!("In-memory sign-in for {}", email);
        Ok(Self::issue_grant(&mut state, &user))
    }

    async fn create_account(
        &self,
        email: &str,
        password: &str,
        attributes: &SignUpAttributes,
    ) -> Result<SignUpResult, BackendError> {
        self.check_online()?;
        let mut state = self.lock();
        if state.accounts.contains_key(email) {
            return Err(AuthError::Rejected("user already registered".to_string()).into());
        }

        let user = AuthUser {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
        };
        // The hosted project creates the profile row from a sign-up trigger
        insert_profile_row(&mut state, &user.id, &attributes.full_name, &attributes.locale);

        let confirmed = !state.require_confirmation;
        state.accounts.insert(
            email.to_string(),
            Account {
                user: user.clone(),
                password: password.to_string(),
                confirmed,
            },
        );

        if confirmed {
            Ok(SignUpResult::Session(Self::issue_grant(&mut state, &user)))
        } else {
            Ok(SignUpResult::ConfirmationRequired(user))
        }
    }

    async fn restore_session(&self, credential: &Credential) -> Result<AuthGrant, BackendError> {
        self.check_online()?;
        let state = self.lock();
        let user_id = state
            .tokens
            .get(&credential.access_token)
            .ok_or(AuthError::SessionExpired)?;
        let user = state
            .accounts
            .values()
            .find(|a| &a.user.id == user_id)
            .map(|a| a.user.clone())
            .ok_or(AuthError::SessionExpired)?;
        Ok(AuthGrant {
            user,
            credential: credential.clone(),
        })
    }

    async fn terminate_session(&self, credential: &Credential) -> Result<(), BackendError> {
        let mut state = self.lock();
        state.terminate_calls += 1;
        state.tokens.remove(&credential.access_token);
        if state.fail_terminate || state.offline {
            return Err(BackendError::Network("logout request timed out".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DataStore for InMemoryBackend {
    async fn fetch_record(&self, table: &str, filter: &Filter) -> Result<Value, BackendError> {
        self.read_started.notify_one();
        let gate = self
            .read_gate
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(gate) = gate {
            // Resolves once the gate is closed by resume_reads()
            let _ = gate.acquire().await;
        }

        self.check_online()?;
        self.lock()
            .tables
            .get(table)
            .and_then(|rows| rows.iter().find(|row| filter.matches(row)).cloned())
            .ok_or_else(|| BackendError::NotFound {
                table: table.to_string(),
            })
    }

    async fn fetch_records(&self, table: &str, filter: &Filter) -> Result<Vec<Value>, BackendError> {
        self.check_online()?;
        Ok(self
            .lock()
            .tables
            .get(table)
            .map(|rows| rows.iter().filter(|row| filter.matches(row)).cloned().collect())
            .unwrap_or_default())
    }

    async fn upsert_record(&self, table: &str, row: Value) -> Result<(), BackendError> {
        self.check_online()?;
        let event = {
            let mut state = self.lock();
            if state.failing_upserts > 0 {
                state.failing_upserts -= 1;
                return Err(BackendError::WriteFailed(format!("upsert into {} rejected", table)));
            }
            state.upserts.push((table.to_string(), row.clone()));
            store_row(&mut state, table, row)
        };
        self.dispatch(table, event);
        Ok(())
    }

    async fn delete_record(&self, table: &str, filter: &Filter) -> Result<(), BackendError> {
        self.check_online()?;
        let removed: Vec<Value> = {
            let mut state = self.lock();
            let rows = state.tables.entry(table.to_string()).or_default();
            let (removed, kept): (Vec<Value>, Vec<Value>) =
                rows.drain(..).partition(|row| filter.matches(row));
            *rows = kept;
            removed
        };
        for row in removed {
            self.dispatch(table, ChangeEvent::Delete(row));
        }
        Ok(())
    }

    fn subscribe_to_changes(
        &self,
        table: &str,
        filter: Filter,
        callback: ChangeCallback,
    ) -> Subscription {
        let id = {
            let mut state = self.lock();
            state.next_watcher_id += 1;
            let id = state.next_watcher_id;
            state.watchers.push(Watcher {
                id,
                table: table.to_string(),
                filter,
                callback,
            });
            id
        };

        let state = Arc::downgrade(&self.state);
        Subscription::new(move || {
            if let Some(state) = state.upgrade() {
                let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
                state.watchers.retain(|w| w.id != id);
            }
        })
    }
}

#[async_trait]
impl BlobStore for InMemoryBackend {
    async fn upload_blob(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), BackendError> {
        self.check_online()?;
        let mut state = self.lock();
        let slot = (bucket.to_string(), key.to_string());
        if state.blobs.contains_key(&slot) {
            return Err(BackendError::WriteFailed(format!("{}/{} already exists", bucket, key)));
        }
        state.blobs.insert(slot, bytes);
        Ok(())
    }

    async fn delete_blob(&self, bucket: &str, key: &str) -> Result<(), BackendError> {
        self.check_online()?;
        self.lock()
            .blobs
            .remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }
}
