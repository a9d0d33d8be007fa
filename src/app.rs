//! Application context: builds the backend, the session store and the
//! language controller, and restores the previous session on start.

use crate::backend::{AuthProvider, BlobStore, DataStore, InMemoryBackend, RestBackend};
use crate::config::Config;
use crate::i18n::{detect_locale, startup_language, Language, TranslationEngine};
use crate::language_sync::LanguageSync;
use crate::records::{ChatSessions, Documents, Grievances};
use crate::session::SessionStore;
use crate::storage::{FileStore, KeyValueStore, LANGUAGE_KEY};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

/// Account seeded into the offline backend.
pub const DEMO_EMAIL: &str = "demo@example.com";
pub const DEMO_PASSWORD: &str = "demo1234";

/// The three backend roles. One implementation usually fills all of them.
#[derive(Clone)]
pub struct Backends {
    pub auth: Arc<dyn AuthProvider>,
    pub data: Arc<dyn DataStore>,
    pub blobs: Arc<dyn BlobStore>,
}

impl Backends {
    pub fn in_memory(backend: InMemoryBackend) -> Self {
        let backend = Arc::new(backend);
        Self {
            auth: backend.clone(),
            data: backend.clone(),
            blobs: backend,
        }
    }

    pub fn rest(backend: RestBackend) -> Self {
        let backend = Arc::new(backend);
        Self {
            auth: backend.clone(),
            data: backend.clone(),
            blobs: backend,
        }
    }

    /// Hosted backend when configured, otherwise the offline one.
    pub fn from_config(config: &Config) -> Result<Self> {
        if config.is_offline() {
            info!(
                "No BACKEND_URL configured; running offline (demo account {} / {})",
                DEMO_EMAIL, DEMO_PASSWORD
            );
            let backend = InMemoryBackend::new().with_user(DEMO_EMAIL, DEMO_PASSWORD, "Demo Investor", "en");
            return Ok(Self::in_memory(backend));
        }

        let backend = RestBackend::from_config(config).context("Failed to set up backend client")?;
        info!(
            "Using backend at {}",
            config.backend_url.as_deref().unwrap_or_default()
        );
        Ok(Self::rest(backend))
    }
}

#[derive(Clone)]
pub struct App {
    backends: Backends,
    session: SessionStore,
    language: Arc<LanguageSync>,
}

impl App {
    /// Build the context from configuration and restore any saved session.
    pub async fn bootstrap(config: &Config) -> Result<Self> {
        let backends = Backends::from_config(config)?;
        let storage: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(&config.local_store_path));
        let detected = detect_locale(config.app_locale.as_deref());

        let app = Self::new(backends, storage, detected);
        if app.session.restore().await {
            info!("Restored previous session");
        }
        Ok(app)
    }

    /// Wire the components together without touching the network.
    pub fn new(backends: Backends, storage: Arc<dyn KeyValueStore>, detected: Option<Language>) -> Self {
        let preference = storage.get(LANGUAGE_KEY).unwrap_or_else(|e| {
            warn!("Ignoring unreadable local storage: {}", e);
            None
        });
        let initial = startup_language(preference.as_deref(), detected);
        info!("Starting in '{}' ({})", initial, initial.name());

        let session = SessionStore::new(backends.auth.clone(), backends.data.clone(), storage.clone());
        let language = LanguageSync::new(TranslationEngine::new(initial), storage, session.clone());
        language.attach();

        Self {
            backends,
            session,
            language,
        }
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn language(&self) -> &LanguageSync {
        &self.language
    }

    pub fn engine(&self) -> &TranslationEngine {
        self.language.engine()
    }

    pub fn documents(&self) -> Documents {
        Documents::new(
            self.session.clone(),
            self.backends.data.clone(),
            self.backends.blobs.clone(),
        )
    }

    pub fn grievances(&self) -> Grievances {
        Grievances::new(self.session.clone(), self.backends.data.clone())
    }

    pub fn chat_sessions(&self) -> ChatSessions {
        ChatSessions::new(self.session.clone(), self.backends.data.clone())
    }
}
