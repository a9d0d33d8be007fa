//! Language Sync Controller.
//!
//! Keeps three copies of the locale in agreement: the translation engine,
//! the local preference slot and the signed-in user's profile. All changes go
//! through one reconciliation routine, tagged with where they came from:
//!
//! - `UserAction`: engine, then preference, then a profile write if the
//!   profile disagrees. The remote write may fail; the local change stands.
//! - `ProfileSync`: a profile was loaded or changed. Engine and preference
//!   follow it; nothing is written back, so a profile change can never
//!   trigger another profile write.
//!
//! Concurrent user changes race at the backend (last completion wins); a
//! late completion of an older write comes back through the profile feed and
//! is applied like any other remote change.

use crate::error::SessionError;
use crate::i18n::{Language, TranslationEngine};
use crate::session::{ChangeKind, ListenerId, ProfileUpdate, SessionChange, SessionStore};
use crate::storage::{KeyValueStore, LANGUAGE_KEY};
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    UserAction,
    ProfileSync,
}

/// Result of [`LanguageSync::change_language`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LanguageChange {
    /// Already active everywhere; nothing was written.
    Unchanged,
    /// Applied locally; no profile to update.
    Applied(Language),
    /// Applied locally and written to the profile.
    Synced(Language),
    /// Applied locally, but the profile write failed.
    SyncFailed { language: Language, error: SessionError },
}

impl LanguageChange {
    pub fn language(&self) -> Option<Language> {
        match self {
            LanguageChange::Unchanged => None,
            LanguageChange::Applied(language) | LanguageChange::Synced(language) => Some(*language),
            LanguageChange::SyncFailed { language, .. } => Some(*language),
        }
    }
}

/// Local effects of a reconciliation, and the remote write still owed.
struct Reconciled {
    changed: bool,
    write_profile: bool,
}

pub struct LanguageSync {
    engine: TranslationEngine,
    preferences: Arc<dyn KeyValueStore>,
    session: SessionStore,
    listener: Mutex<Option<ListenerId>>,
}

impl LanguageSync {
    pub fn new(
        engine: TranslationEngine,
        preferences: Arc<dyn KeyValueStore>,
        session: SessionStore,
    ) -> Arc<Self> {
        Arc::new(Self {
            engine,
            preferences,
            session,
            listener: Mutex::new(None),
        })
    }

    /// Start following profile changes from the session store.
    pub fn attach(self: &Arc<Self>) {
        let this: Weak<Self> = Arc::downgrade(self);
        let id = self.session.subscribe(move |change| {
            if let Some(this) = this.upgrade() {
                this.on_session_change(change);
            }
        });
        let previous = self
            .listener
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(id);
        if let Some(previous) = previous {
            self.session.unsubscribe(previous);
        }

        // A session may already be active
        if let Some(profile) = self.session.profile() {
            self.reconcile(Language::resolve(&profile.locale), Origin::ProfileSync);
        }
    }

    pub fn detach(&self) {
        if let Some(id) = self.listener.lock().unwrap_or_else(|e| e.into_inner()).take() {
            self.session.unsubscribe(id);
        }
    }

    pub fn engine(&self) -> &TranslationEngine {
        &self.engine
    }

    pub fn current(&self) -> Language {
        self.engine.language()
    }

    pub fn font_family(&self) -> &'static str {
        self.engine.font_family()
    }

    /// The stored preference, if any.
    pub fn preference(&self) -> Option<String> {
        self.preferences.get(LANGUAGE_KEY).unwrap_or_else(|e| {
            warn!("Failed to read language preference: {}", e);
            None
        })
    }

    /// Switch language on explicit user request.
    ///
    /// The engine is updated before any remote call is issued, so the UI
    /// reflects the new language even if the profile write is slow or fails.
    pub async fn change_language(&self, code: &str) -> LanguageChange {
        let language = match Language::parse(code) {
            Some(language) => language,
            None => {
                let fallback = Language::default_language();
                warn!("Unsupported language '{}', using '{}'", code, fallback);
                fallback
            }
        };

        let Reconciled {
            changed,
            write_profile,
        } = self.reconcile(language, Origin::UserAction);

        if !write_profile {
            return if changed {
                LanguageChange::Applied(language)
            } else {
                LanguageChange::Unchanged
            };
        }

        match self
            .session
            .update_profile(ProfileUpdate::locale(language.code()))
            .await
        {
            Ok(_) => {
                info!("Saved language '{}' to profile", language);
                LanguageChange::Synced(language)
            }
            Err(error) => {
                warn!("Failed to save language '{}' to profile: {}", language, error);
                LanguageChange::SyncFailed { language, error }
            }
        }
    }

    fn on_session_change(&self, change: &SessionChange) {
        match change.kind {
            ChangeKind::SignedIn | ChangeKind::ProfileRefreshed | ChangeKind::ProfileUpdated => {}
            _ => return,
        }
        if let Some(profile) = &change.snapshot.profile {
            self.reconcile(Language::resolve(&profile.locale), Origin::ProfileSync);
        }
    }

    /// Apply `language` locally and work out whether the profile needs it.
    fn reconcile(&self, language: Language, origin: Origin) -> Reconciled {
        if origin == Origin::ProfileSync && self.engine.language() == language {
            debug!("Profile language '{}' already active", language);
            return Reconciled {
                changed: false,
                write_profile: false,
            };
        }

        let changed = self.engine.set_language(language);
        if let Err(e) = self.preferences.set(LANGUAGE_KEY, language.code()) {
            warn!("Failed to save language preference: {}", e);
        }

        let write_profile = origin == Origin::UserAction
            && self
                .session
                .profile()
                .is_some_and(|profile| profile.locale != language.code());

        Reconciled {
            changed,
            write_profile,
        }
    }
}

impl Drop for LanguageSync {
    fn drop(&mut self) {
        self.detach();
    }
}
