//! Session Store: the authentication lifecycle and the cached profile.
//!
//! One store exists per process (created by `App::bootstrap`) and is cheap to
//! clone. It moves between three states:
//!
//! ```text
//! Unauthenticated --sign_in/restore--> Authenticating --profile loaded--> Authenticated
//!        ^                                   |                                  |
//!        +---------------- failure ----------+------ sign_out / expiry ---------+
//! ```
//!
//! Every operation that starts or ends a session bumps a generation counter.
//! Async completions (profile fetches, profile writes, change-feed rows)
//! carry the generation they started under and are discarded if it is no
//! longer current, so a response for a signed-out user can never be applied.
//!
//! Listeners are invoked after every transition, outside the state lock.

use crate::backend::{
    AuthGrant, AuthProvider, AuthUser, ChangeCallback, ChangeEvent, Credential, DataStore, Filter,
    ProviderEvent, SignUpAttributes, SignUpResult, Subscription,
};
use crate::error::{AuthError, BackendError, SessionError};
use crate::i18n::Language;
use crate::retry::{with_retry_if, RetryConfig};
use crate::storage::{KeyValueStore, SESSION_KEY};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, Weak};
use tracing::{debug, info, warn};

pub const PROFILES_TABLE: &str = "profiles";

static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticating,
    Authenticated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub credential: Credential,
}

impl From<&AuthGrant> for Session {
    fn from(grant: &AuthGrant) -> Self {
        Self {
            user_id: grant.user.id.clone(),
            email: grant.user.email.clone(),
            credential: grant.credential.clone(),
        }
    }
}

/// A row of the `profiles` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub full_name: Option<String>,
    pub locale: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial profile update; `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub locale: Option<String>,
    pub role: Option<String>,
}

impl ProfileUpdate {
    pub fn locale(code: impl Into<String>) -> Self {
        Self {
            locale: Some(code.into()),
            ..Self::default()
        }
    }

    fn apply_to(self, profile: &mut Profile) {
        if let Some(full_name) = self.full_name {
            profile.full_name = Some(full_name);
        }
        if let Some(locale) = self.locale {
            profile.locale = locale;
        }
        if let Some(role) = self.role {
            profile.role = role;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignUpOutcome {
    SignedIn,
    /// The account was created but must be confirmed before signing in.
    ConfirmationRequired,
}

/// What caused a listener notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Authenticating,
    SignedIn,
    SignInFailed,
    SignedOut,
    SessionExpired,
    /// Written by this client through `update_profile`.
    ProfileUpdated,
    /// Changed remotely (another device) and picked up from the change feed.
    ProfileRefreshed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub session: Option<Session>,
    pub profile: Option<Profile>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionChange {
    pub kind: ChangeKind,
    pub snapshot: SessionSnapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&SessionChange) + Send + Sync>;

// Session that was active when a new authentication attempt started
type Previous = Option<(Session, Option<Profile>)>;

struct Inner {
    state: SessionState,
    session: Option<Session>,
    profile: Option<Profile>,
    generation: u64,
    profile_feed: Option<Subscription>,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
}

impl Inner {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            session: self.session.clone(),
            profile: self.profile.clone(),
        }
    }
}

struct Shared {
    auth: Arc<dyn AuthProvider>,
    data: Arc<dyn DataStore>,
    storage: Arc<dyn KeyValueStore>,
    retry: RetryConfig,
    inner: Mutex<Inner>,
}

#[derive(Clone)]
pub struct SessionStore {
    shared: Arc<Shared>,
}

impl SessionStore {
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        data: Arc<dyn DataStore>,
        storage: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self::with_retry_config(auth, data, storage, RetryConfig::profile_fetch())
    }

    pub fn with_retry_config(
        auth: Arc<dyn AuthProvider>,
        data: Arc<dyn DataStore>,
        storage: Arc<dyn KeyValueStore>,
        retry: RetryConfig,
    ) -> Self {
        // A persisted credential means a restore is pending, not a signed-out user
        let state = match storage.get(SESSION_KEY) {
            Ok(Some(_)) => SessionState::Authenticating,
            _ => SessionState::Unauthenticated,
        };
        Self {
            shared: Arc::new(Shared {
                auth,
                data,
                storage,
                retry,
                inner: Mutex::new(Inner {
                    state,
                    session: None,
                    profile: None,
                    generation: 0,
                    profile_feed: None,
                    listeners: Vec::new(),
                    next_listener: 0,
                }),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ==================== Readers ====================

    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock().snapshot()
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    pub fn session(&self) -> Option<Session> {
        self.lock().session.clone()
    }

    pub fn profile(&self) -> Option<Profile> {
        self.lock().profile.clone()
    }

    // ==================== Listeners ====================

    pub fn subscribe(&self, listener: impl Fn(&SessionChange) + Send + Sync + 'static) -> ListenerId {
        let mut inner = self.lock();
        inner.next_listener += 1;
        let id = ListenerId(inner.next_listener);
        inner.listeners.push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) {
        self.lock().listeners.retain(|(listener_id, _)| *listener_id != id);
    }

    fn notify(&self, kind: ChangeKind) {
        let (listeners, snapshot) = {
            let inner = self.lock();
            let listeners: Vec<Listener> = inner.listeners.iter().map(|(_, l)| l.clone()).collect();
            (listeners, inner.snapshot())
        };
        let change = SessionChange { kind, snapshot };
        for listener in listeners {
            listener(&change);
        }
    }

    // ==================== Operations ====================

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), SessionError> {
        let (generation, previous) = self.begin_authenticating();
        info!("Signing in as {}", email);

        let result = self.authenticate(generation, email, password).await;
        self.finish_attempt(generation, previous, result)
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
        locale: &str,
    ) -> Result<SignUpOutcome, SessionError> {
        let email_regex = EMAIL_REGEX.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());
        let email = email.trim();
        if !email_regex.is_match(email) {
            return Err(AuthError::InvalidEmail(email.to_string()).into());
        }

        let attributes = SignUpAttributes {
            full_name: full_name.trim().to_string(),
            locale: Language::resolve(locale).code().to_string(),
        };

        match self.shared.auth.create_account(email, password, &attributes).await? {
            SignUpResult::Session(grant) => {
                self.handle_provider_event(ProviderEvent::SessionEstablished(grant))
                    .await?;
                Ok(SignUpOutcome::SignedIn)
            }
            SignUpResult::ConfirmationRequired(user) => {
                info!("Account {} created, waiting for confirmation", user.email);
                Ok(SignUpOutcome::ConfirmationRequired)
            }
        }
    }

    /// End the session. Local state is cleared even if the provider call fails.
    pub async fn sign_out(&self) {
        let Some(credential) = self.clear(ChangeKind::SignedOut) else {
            return;
        };
        if let Err(e) = self.shared.auth.terminate_session(&credential).await {
            warn!("Remote sign-out failed, local session cleared anyway: {}", e);
        }
    }

    /// Merge `update` into the cached profile and write it back.
    ///
    /// On failure the cached profile is left untouched.
    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<Profile, SessionError> {
        let (generation, mut profile) = {
            let inner = self.lock();
            match (&inner.session, &inner.profile) {
                (Some(_), Some(profile)) => (inner.generation, profile.clone()),
                _ => return Err(SessionError::NoSession),
            }
        };

        update.apply_to(&mut profile);
        profile.updated_at = Utc::now();
        let row = serde_json::to_value(&profile)
            .map_err(|e| BackendError::Unexpected(format!("Failed to encode profile: {}", e)))?;

        self.shared.data.upsert_record(PROFILES_TABLE, row).await?;

        {
            let mut inner = self.lock();
            if inner.generation != generation {
                debug!("Discarding profile write result from an ended session");
                return Err(SessionError::Superseded);
            }
            inner.profile = Some(profile.clone());
        }
        self.notify(ChangeKind::ProfileUpdated);
        Ok(profile)
    }

    /// Re-establish a persisted session on start. Failure is silent and
    /// leaves the store Unauthenticated. Returns whether a session is active.
    pub async fn restore(&self) -> bool {
        let stored = match self.shared.storage.get(SESSION_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                self.abandon_restore();
                return false;
            }
            Err(e) => {
                debug!("Could not read the persisted session: {}", e);
                self.abandon_restore();
                return false;
            }
        };
        let grant: AuthGrant = match serde_json::from_str(&stored) {
            Ok(grant) => grant,
            Err(e) => {
                debug!("Discarding unreadable persisted session: {}", e);
                self.forget_credential();
                self.abandon_restore();
                return false;
            }
        };

        let (generation, previous) = self.begin_authenticating();
        let result = self.revalidate(generation, &grant).await;

        match self.finish_attempt(generation, previous, result) {
            Ok(()) => true,
            Err(e) => {
                info!("Persisted session could not be restored: {}", e);
                false
            }
        }
    }

    /// Apply a notification pushed by the auth provider.
    pub async fn handle_provider_event(&self, event: ProviderEvent) -> Result<(), SessionError> {
        match event {
            ProviderEvent::SessionEstablished(grant) => {
                let (generation, previous) = self.begin_authenticating();
                let result = self.establish(generation, grant).await;
                self.finish_attempt(generation, previous, result)
            }
            ProviderEvent::SessionExpired => {
                if self.clear(ChangeKind::SessionExpired).is_some() {
                    info!("Session expired");
                }
                Ok(())
            }
        }
    }

    // ==================== Internals ====================

    fn begin_authenticating(&self) -> (u64, Previous) {
        let (generation, previous, feed) = {
            let mut inner = self.lock();
            inner.generation += 1;
            let previous = match (inner.state, &inner.session) {
                (SessionState::Authenticated, Some(session)) => {
                    Some((session.clone(), inner.profile.clone()))
                }
                _ => None,
            };
            inner.state = SessionState::Authenticating;
            (inner.generation, previous, inner.profile_feed.take())
        };
        drop(feed);
        self.notify(ChangeKind::Authenticating);
        (generation, previous)
    }

    async fn authenticate(&self, generation: u64, email: &str, password: &str) -> Result<(), SessionError> {
        let grant = self.shared.auth.authenticate(email, password).await?;
        self.establish(generation, grant).await
    }

    async fn revalidate(&self, generation: u64, persisted: &AuthGrant) -> Result<(), SessionError> {
        let mut grant = self.shared.auth.restore_session(&persisted.credential).await?;
        if grant.user.email.is_empty() && grant.user.id == persisted.user.id {
            grant.user.email = persisted.user.email.clone();
        }
        self.establish(generation, grant).await
    }

    /// Leave the startup `Authenticating` state when there is nothing to restore.
    fn abandon_restore(&self) {
        let reset = {
            let mut inner = self.lock();
            let pending = inner.generation == 0 && inner.state == SessionState::Authenticating;
            if pending {
                inner.state = SessionState::Unauthenticated;
            }
            pending
        };
        if reset {
            self.notify(ChangeKind::SignInFailed);
        }
    }

    /// Record the session, load its profile, and go Authenticated.
    async fn establish(&self, generation: u64, grant: AuthGrant) -> Result<(), SessionError> {
        let session = Session::from(&grant);
        let accepted = {
            let mut inner = self.lock();
            if inner.generation == generation {
                inner.session = Some(session.clone());
                inner.profile = None;
                true
            } else {
                false
            }
        };
        if !accepted {
            self.discard_grant(&grant).await;
            return Err(SessionError::Superseded);
        }
        self.shared.auth.use_credential(Some(&grant.credential));
        self.persist_credential(&grant);

        let profile = self.load_profile(&session.user_id).await?;

        {
            let mut inner = self.lock();
            if inner.generation != generation {
                debug!("Discarding profile of a superseded session");
                return Err(SessionError::Superseded);
            }
            inner.profile = Some(profile);
            inner.state = SessionState::Authenticated;
        }
        self.watch_profile(generation, &session.user_id);
        info!("Signed in as {}", session.email);
        self.notify(ChangeKind::SignedIn);
        Ok(())
    }

    /// Settle the outcome of an authentication attempt.
    fn finish_attempt(
        &self,
        generation: u64,
        previous: Previous,
        result: Result<(), SessionError>,
    ) -> Result<(), SessionError> {
        let error = match result {
            Ok(()) => return Ok(()),
            Err(SessionError::Superseded) => return Err(SessionError::Superseded),
            Err(e) => e,
        };

        let restored = {
            let mut inner = self.lock();
            if inner.generation != generation {
                return Err(SessionError::Superseded);
            }
            match previous {
                Some((session, profile)) => {
                    inner.state = SessionState::Authenticated;
                    inner.session = Some(session.clone());
                    inner.profile = profile;
                    Some(session)
                }
                None => {
                    inner.state = SessionState::Unauthenticated;
                    inner.session = None;
                    inner.profile = None;
                    None
                }
            }
        };

        self.shared
            .auth
            .use_credential(restored.as_ref().map(|s| &s.credential));
        match &restored {
            Some(session) => {
                self.persist_credential(&AuthGrant {
                    user: AuthUser {
                        id: session.user_id.clone(),
                        email: session.email.clone(),
                    },
                    credential: session.credential.clone(),
                });
                self.watch_profile(generation, &session.user_id);
            }
            None => self.forget_credential(),
        }

        info!("Authentication failed: {}", error);
        self.notify(ChangeKind::SignInFailed);
        Err(error)
    }

    /// Drop the session locally. Returns the credential that was active.
    fn clear(&self, kind: ChangeKind) -> Option<Credential> {
        let (was_active, credential, feed) = {
            let mut inner = self.lock();
            inner.generation += 1;
            let was_active = inner.state != SessionState::Unauthenticated || inner.session.is_some();
            inner.state = SessionState::Unauthenticated;
            inner.profile = None;
            let credential = inner.session.take().map(|s| s.credential);
            (was_active, credential, inner.profile_feed.take())
        };
        drop(feed);
        self.shared.auth.use_credential(None);
        self.forget_credential();

        if was_active {
            info!("Session cleared ({:?})", kind);
            self.notify(kind);
        }
        credential
    }

    /// End the provider session of a grant that arrived after its attempt
    /// was superseded. The store never recorded it, so nobody else will.
    async fn discard_grant(&self, grant: &AuthGrant) {
        let in_use = self
            .lock()
            .session
            .as_ref()
            .is_some_and(|s| s.credential.access_token == grant.credential.access_token);
        if in_use {
            return;
        }
        debug!("Ending provider session of a superseded sign-in");
        if let Err(e) = self.shared.auth.terminate_session(&grant.credential).await {
            debug!("Could not end superseded provider session: {}", e);
        }
    }

    async fn load_profile(&self, user_id: &str) -> Result<Profile, SessionError> {
        let filter = Filter::eq("user_id", user_id);
        let row = with_retry_if(
            &self.shared.retry,
            "Profile fetch",
            || self.shared.data.fetch_record(PROFILES_TABLE, &filter),
            BackendError::is_transient,
        )
        .await?;
        Ok(decode_profile(row)?)
    }

    fn watch_profile(&self, generation: u64, user_id: &str) {
        let store: Weak<Shared> = Arc::downgrade(&self.shared);
        let callback: ChangeCallback = Arc::new(move |event| {
            if let Some(shared) = store.upgrade() {
                SessionStore { shared }.apply_remote_profile(generation, event);
            }
        });
        let subscription = self.shared.data.subscribe_to_changes(
            PROFILES_TABLE,
            Filter::eq("user_id", user_id),
            callback,
        );

        let stale = {
            let mut inner = self.lock();
            if inner.generation == generation && inner.state == SessionState::Authenticated {
                inner.profile_feed.replace(subscription)
            } else {
                Some(subscription)
            }
        };
        drop(stale);
    }

    fn apply_remote_profile(&self, generation: u64, event: ChangeEvent) {
        let row = match event {
            ChangeEvent::Insert(row) | ChangeEvent::Update(row) => row,
            ChangeEvent::Delete(_) => {
                debug!("Profile row deleted remotely; keeping cached copy");
                return;
            }
        };
        let profile = match decode_profile(row) {
            Ok(profile) => profile,
            Err(e) => {
                warn!("Ignoring malformed profile change: {}", e);
                return;
            }
        };

        {
            let mut inner = self.lock();
            let owned = inner
                .session
                .as_ref()
                .is_some_and(|s| s.user_id == profile.user_id);
            if inner.generation != generation || !owned {
                debug!("Dropping profile change for an ended session");
                return;
            }
            if inner.profile.as_ref() == Some(&profile) {
                return;
            }
            inner.profile = Some(profile);
        }
        info!("Profile refreshed from a remote change");
        self.notify(ChangeKind::ProfileRefreshed);
    }

    fn persist_credential(&self, grant: &AuthGrant) {
        match serde_json::to_string(grant) {
            Ok(raw) => self
                .shared
                .storage
                .set(SESSION_KEY, &raw)
                .unwrap_or_else(|e| warn!("Failed to persist session: {}", e)),
            Err(e) => warn!("Failed to encode session: {}", e),
        }
    }

    fn forget_credential(&self) {
        if let Err(e) = self.shared.storage.remove(SESSION_KEY) {
            warn!("Failed to clear persisted session: {}", e);
        }
    }
}

fn decode_profile(row: Value) -> Result<Profile, BackendError> {
    serde_json::from_value(row)
        .map_err(|e| BackendError::Unexpected(format!("Malformed profile row: {}", e)))
}
