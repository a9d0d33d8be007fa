//! Integration tests for the bond portal client core
//!
//! These tests drive the public API the way the front-end does: an `App`
//! wired to the in-memory backend (or to a mocked hosted backend), with the
//! session store, language controller and route gate interacting.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::{
    matchers::{body_partial_json, header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

use bond_portal::{
    app::{App, Backends},
    backend::{DataStore, Filter, InMemoryBackend, RestBackend},
    commands::Shell,
    error::SessionError,
    i18n::{resolve_locale, Language},
    language_sync::LanguageChange,
    records::{ChatMessage, Role},
    routes::{gate, GateDecision, Route},
    session::{SessionState, PROFILES_TABLE},
    storage::{FileStore, KeyValueStore, MemoryStore, LANGUAGE_KEY, SESSION_KEY},
};

// ==================== Test Helpers ====================

fn backend_with(locale: &str) -> InMemoryBackend {
    InMemoryBackend::new().with_user("asha@example.com", "pw", "Asha Rao", locale)
}

fn app_with(backend: &InMemoryBackend, detected: Option<Language>) -> (App, Arc<MemoryStore>) {
    let storage = Arc::new(MemoryStore::new());
    let app = App::new(Backends::in_memory(backend.clone()), storage.clone(), detected);
    (app, storage)
}

fn profile_row(locale: &str) -> serde_json::Value {
    json!({
        "id": "profile-1",
        "user_id": "user-1",
        "full_name": "Asha Rao",
        "locale": locale,
        "role": "investor",
        "created_at": "2024-01-15T10:30:00Z",
        "updated_at": "2024-01-15T10:30:00Z"
    })
}

fn token_body(access_token: &str, user_id: &str, email: &str) -> serde_json::Value {
    json!({
        "access_token": access_token,
        "refresh_token": format!("{}-refresh", access_token),
        "expires_in": 3600,
        "user": { "id": user_id, "email": email }
    })
}

// ==================== Locale Lifecycle Tests ====================

#[tokio::test]
async fn test_profile_locale_wins_over_browser_locale() {
    let backend = backend_with("en");
    let (app, storage) = app_with(&backend, Some(Language::HINDI));
    assert_eq!(app.engine().language(), Language::HINDI);

    app.session().sign_in("asha@example.com", "pw").await.unwrap();

    assert_eq!(app.engine().language(), Language::ENGLISH);
    assert_eq!(storage.get(LANGUAGE_KEY).unwrap().as_deref(), Some("en"));
    assert!(backend.upserts(PROFILES_TABLE).is_empty());
}

#[tokio::test]
async fn test_user_change_writes_profile_exactly_once() {
    let backend = backend_with("en");
    let (app, storage) = app_with(&backend, None);
    app.session().sign_in("asha@example.com", "pw").await.unwrap();

    let outcome = app.language().change_language("te").await;

    assert_eq!(outcome, LanguageChange::Synced(Language::TELUGU));
    assert_eq!(app.engine().language(), Language::TELUGU);
    assert_eq!(storage.get(LANGUAGE_KEY).unwrap().as_deref(), Some("te"));
    let upserts = backend.upserts(PROFILES_TABLE);
    assert_eq!(upserts.len(), 1);
    assert_eq!(upserts[0]["locale"], "te");
    assert_eq!(app.session().profile().unwrap().locale, "te");
}

#[tokio::test]
async fn test_change_to_current_language_is_idempotent() {
    let backend = backend_with("hi");
    let (app, _) = app_with(&backend, None);
    app.session().sign_in("asha@example.com", "pw").await.unwrap();

    for _ in 0..3 {
        assert_eq!(app.language().change_language("hi").await, LanguageChange::Unchanged);
    }
    assert!(backend.upserts(PROFILES_TABLE).is_empty());
}

#[tokio::test]
async fn test_profile_changes_never_cause_profile_writes() {
    let backend = backend_with("en");
    let (app, _) = app_with(&backend, None);
    app.session().sign_in("asha@example.com", "pw").await.unwrap();

    for locale in ["hi", "te", "en", "hi"] {
        let mut row = serde_json::to_value(app.session().profile().unwrap()).unwrap();
        row["locale"] = locale.into();
        backend.external_upsert(PROFILES_TABLE, row);
        assert_eq!(app.engine().language().code(), locale);
    }

    assert!(backend.upserts(PROFILES_TABLE).is_empty());
}

#[tokio::test]
async fn test_remote_write_failure_keeps_local_language() {
    let backend = backend_with("en");
    let (app, storage) = app_with(&backend, None);
    app.session().sign_in("asha@example.com", "pw").await.unwrap();
    backend.fail_next_upserts(1);

    let outcome = app.language().change_language("te").await;

    assert!(matches!(outcome, LanguageChange::SyncFailed { .. }));
    assert_eq!(app.engine().language(), Language::TELUGU);
    assert_eq!(storage.get(LANGUAGE_KEY).unwrap().as_deref(), Some("te"));
    assert_eq!(app.session().profile().unwrap().locale, "en");
}

#[tokio::test]
async fn test_unknown_codes_fall_back_to_english() {
    let backend = InMemoryBackend::new();
    let storage = Arc::new(MemoryStore::new());
    storage.set(LANGUAGE_KEY, "fr").unwrap();

    let app = App::new(Backends::in_memory(backend), storage, None);
    assert_eq!(app.engine().language(), Language::ENGLISH);

    assert_eq!(
        app.language().change_language("xx-YY").await,
        LanguageChange::Unchanged
    );
    assert_eq!(resolve_locale("klingon").language, Language::ENGLISH);
}

#[tokio::test]
async fn test_language_survives_sign_out() {
    let backend = backend_with("te");
    let (app, _) = app_with(&backend, None);
    app.session().sign_in("asha@example.com", "pw").await.unwrap();
    assert_eq!(app.engine().language(), Language::TELUGU);

    app.session().sign_out().await;

    assert_eq!(app.engine().language(), Language::TELUGU);
    assert!(app.engine().font_family().contains("Telugu"));
}

// ==================== Session Lifecycle Tests ====================

#[tokio::test]
async fn test_sign_out_clears_state_even_if_remote_fails() {
    let backend = backend_with("en");
    let (app, storage) = app_with(&backend, None);
    app.session().sign_in("asha@example.com", "pw").await.unwrap();
    backend.fail_terminate(true);

    app.session().sign_out().await;

    let snapshot = app.session().snapshot();
    assert_eq!(snapshot.state, SessionState::Unauthenticated);
    assert!(snapshot.session.is_none());
    assert!(snapshot.profile.is_none());
    assert!(storage.get(SESSION_KEY).unwrap().is_none());
    assert_eq!(
        gate(app.session().state(), "/dashboard"),
        GateDecision::RedirectToLogin {
            from: "/dashboard".to_string()
        }
    );
}

#[tokio::test]
async fn test_sign_out_during_profile_fetch_discards_response() {
    let backend = backend_with("te");
    let (app, _) = app_with(&backend, Some(Language::HINDI));
    backend.pause_reads();

    let session = app.session().clone();
    let sign_in = tokio::spawn(async move { session.sign_in("asha@example.com", "pw").await });

    backend.read_started().notified().await;
    assert_eq!(app.session().state(), SessionState::Authenticating);
    assert_eq!(gate(app.session().state(), "/portfolio"), GateDecision::Loading);

    app.session().sign_out().await;
    backend.resume_reads();

    assert_eq!(sign_in.await.unwrap(), Err(SessionError::Superseded));
    let snapshot = app.session().snapshot();
    assert_eq!(snapshot.state, SessionState::Unauthenticated);
    assert!(snapshot.session.is_none());
    assert!(snapshot.profile.is_none());
    // The late profile must not have touched the language either
    assert_eq!(app.engine().language(), Language::HINDI);
    assert_eq!(backend.active_watchers(), 0);
}

#[tokio::test]
async fn test_session_restored_across_restarts() {
    let dir = TempDir::new().unwrap();
    let store_path = dir.path().join("local.json");
    let backend = backend_with("hi");

    {
        let storage: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(&store_path));
        let app = App::new(Backends::in_memory(backend.clone()), storage, None);
        app.session().sign_in("asha@example.com", "pw").await.unwrap();
        assert_eq!(app.engine().language(), Language::HINDI);
    }

    let storage: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(&store_path));
    let app = App::new(Backends::in_memory(backend.clone()), storage, Some(Language::TELUGU));
    // Stored preference beats the detected locale before the session is back
    assert_eq!(app.engine().language(), Language::HINDI);

    assert!(app.session().restore().await);
    assert_eq!(app.session().state(), SessionState::Authenticated);
    assert_eq!(app.session().session().unwrap().email, "asha@example.com");
}

#[tokio::test]
async fn test_failed_restore_is_silent() {
    let backend = backend_with("hi");
    let (first, storage) = app_with(&backend, None);
    first.session().sign_in("asha@example.com", "pw").await.unwrap();
    backend.expire_all_tokens();

    let app = App::new(Backends::in_memory(backend.clone()), storage.clone(), None);

    assert!(!app.session().restore().await);
    assert_eq!(app.session().state(), SessionState::Unauthenticated);
    assert!(storage.get(SESSION_KEY).unwrap().is_none());
}

#[tokio::test]
async fn test_grievance_uses_profile_locale() {
    let backend = backend_with("te");
    let (app, _) = app_with(&backend, None);
    app.session().sign_in("asha@example.com", "pw").await.unwrap();

    app.grievances()
        .file(bond_portal::records::NewGrievance {
            title: "Coupon not credited".to_string(),
            description: "The March coupon is missing".to_string(),
            category: bond_portal::records::Category::Platform,
            priority: bond_portal::records::Priority::Urgent,
        })
        .await
        .unwrap();

    let filed = app.grievances().list().await.unwrap();
    assert_eq!(filed.len(), 1);
    assert_eq!(filed[0].locale.as_deref(), Some("te"));
}

// ==================== Shell Tests ====================

#[tokio::test]
async fn test_shell_redirects_then_resumes_after_login() {
    let backend = backend_with("en");
    let (app, _) = app_with(&backend, None);
    let mut shell = Shell::new(app);

    let reply = shell.handle_line("/go /portfolio").await.unwrap();
    assert_eq!(reply, "Please sign in to open /portfolio");

    let reply = shell.handle_line("/login asha@example.com pw").await.unwrap();
    assert!(reply.contains("Signed in successfully"));
    assert!(reply.contains("Portfolio"));
    assert_eq!(shell.navigator().location(), Route::Portfolio.path());
}

#[tokio::test]
async fn test_shell_language_reply_uses_new_language() {
    let backend = backend_with("en");
    let (app, _) = app_with(&backend, None);
    let mut shell = Shell::new(app);
    shell.handle_line("/login asha@example.com pw").await;

    let reply = shell.handle_line("/language hi").await.unwrap();

    assert!(reply.starts_with("भाषा बदलकर हिंदी (hi)"));
    assert_eq!(backend.upserts(PROFILES_TABLE).len(), 1);

    let status = shell.handle_line("/status").await.unwrap();
    assert!(status.contains("asha@example.com"));
}

#[tokio::test]
async fn test_shell_rejects_unknown_language_code() {
    let backend = InMemoryBackend::new();
    let (app, _) = app_with(&backend, None);
    let mut shell = Shell::new(app);

    let reply = shell.handle_line("/language de").await.unwrap();

    assert!(reply.starts_with("Invalid language"));
    assert_eq!(shell.app().engine().language(), Language::ENGLISH);
}

#[tokio::test]
async fn test_shell_bad_password() {
    let backend = backend_with("en");
    let (app, _) = app_with(&backend, None);
    let mut shell = Shell::new(app);

    let reply = shell.handle_line("/login asha@example.com nope").await.unwrap();

    assert_eq!(reply, "Authentication failed: invalid email or password");
    assert_eq!(shell.app().session().state(), SessionState::Unauthenticated);
}

// ==================== Hosted Backend Tests ====================

#[tokio::test]
async fn test_hosted_backend_sign_in_and_language_sync() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "user-token",
            "refresh_token": "refresh-token",
            "expires_in": 3600,
            "user": { "id": "user-1", "email": "asha@example.com" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("user_id", "eq.user-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([profile_row("hi")])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/profiles"))
        .and(body_partial_json(json!({ "id": "profile-1", "locale": "te" })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let backend = RestBackend::new(&server.uri(), "anon-key");
    let app = App::new(
        Backends::rest(backend),
        Arc::new(MemoryStore::new()),
        Some(Language::ENGLISH),
    );

    app.session().sign_in("asha@example.com", "pw").await.unwrap();
    assert_eq!(app.engine().language(), Language::HINDI);

    let outcome = app.language().change_language("te").await;
    assert_eq!(outcome, LanguageChange::Synced(Language::TELUGU));
    assert_eq!(app.session().profile().unwrap().role, "investor");
}

#[tokio::test]
async fn test_hosted_backend_profile_write_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "user-token",
            "user": { "id": "user-1", "email": "asha@example.com" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([profile_row("en")])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/profiles"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "message": "new row violates row-level security policy"
        })))
        .mount(&server)
        .await;

    let app = App::new(
        Backends::rest(RestBackend::new(&server.uri(), "anon-key")),
        Arc::new(MemoryStore::new()),
        None,
    );
    app.session().sign_in("asha@example.com", "pw").await.unwrap();

    let outcome = app.language().change_language("hi").await;

    assert!(matches!(outcome, LanguageChange::SyncFailed { .. }));
    assert_eq!(app.engine().language(), Language::HINDI);
    assert_eq!(app.session().profile().unwrap().locale, "en");
}

#[tokio::test]
async fn test_sign_out_during_hosted_sign_in_leaves_no_token_behind() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_body("user-token", "user-1", "asha@example.com"))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;
    // The late grant is ended on the provider side
    Mock::given(method("POST"))
        .and(path("/auth/v1/logout"))
        .and(header("Authorization", "Bearer user-token"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/grievances"))
        .and(header("Authorization", "Bearer anon-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let backend = RestBackend::new(&server.uri(), "anon-key");
    let app = App::new(
        Backends::rest(backend.clone()),
        Arc::new(MemoryStore::new()),
        None,
    );

    let session = app.session().clone();
    let sign_in = tokio::spawn(async move { session.sign_in("asha@example.com", "pw").await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    app.session().sign_out().await;

    assert_eq!(sign_in.await.unwrap(), Err(SessionError::Superseded));
    assert_eq!(app.session().state(), SessionState::Unauthenticated);

    // Later requests go out anonymously
    let rows = backend
        .fetch_records("grievances", &Filter::eq("user_id", "user-1"))
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_failed_second_sign_in_keeps_first_users_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(body_partial_json(json!({ "email": "asha@example.com" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_body("asha-token", "user-1", "asha@example.com")),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(body_partial_json(json!({ "email": "ravi@example.com" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_body("ravi-token", "user-2", "ravi@example.com")),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("user_id", "eq.user-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([profile_row("en")])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("user_id", "eq.user-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/profiles"))
        .and(header("Authorization", "Bearer asha-token"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let app = App::new(
        Backends::rest(RestBackend::new(&server.uri(), "anon-key")),
        Arc::new(MemoryStore::new()),
        None,
    );
    app.session().sign_in("asha@example.com", "pw").await.unwrap();

    let err = app.session().sign_in("ravi@example.com", "pw").await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Backend(bond_portal::error::BackendError::NotFound { .. })
    ));
    assert_eq!(app.session().session().unwrap().email, "asha@example.com");

    // Asha's profile write must carry Asha's token, not Ravi's
    let outcome = app.language().change_language("te").await;
    assert_eq!(outcome, LanguageChange::Synced(Language::TELUGU));
}

#[tokio::test]
async fn test_hosted_restore_waits_then_keeps_persisted_email() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "refresh_token"))
        .and(body_partial_json(json!({ "refresh_token": "old-refresh" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-token",
            "refresh_token": "fresh-refresh",
            "user": { "id": "user-1" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .and(header("Authorization", "Bearer fresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([profile_row("te")])))
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryStore::new());
    let persisted = json!({
        "user": { "id": "user-1", "email": "asha@example.com" },
        "credential": { "access_token": "old-token", "refresh_token": "old-refresh" }
    });
    storage.set(SESSION_KEY, &persisted.to_string()).unwrap();

    let app = App::new(
        Backends::rest(RestBackend::new(&server.uri(), "anon-key")),
        storage,
        Some(Language::ENGLISH),
    );
    // A returning user is not bounced to the login page while restoring
    assert_eq!(gate(app.session().state(), "/portfolio"), GateDecision::Loading);

    assert!(app.session().restore().await);
    assert_eq!(app.session().state(), SessionState::Authenticated);
    assert_eq!(app.session().session().unwrap().email, "asha@example.com");
    assert_eq!(app.engine().language(), Language::TELUGU);
}

// ==================== Chat Session Tests ====================

#[tokio::test]
async fn test_chat_session_round_trip_through_app() {
    let backend = backend_with("hi");
    let (app, _) = app_with(&backend, None);
    app.session().sign_in("asha@example.com", "pw").await.unwrap();
    assert_eq!(app.chat_sessions().load_latest().await.unwrap(), None);

    let transcript = vec![
        ChatMessage::new(Role::User, "Is this bond tax free?"),
        ChatMessage::new(Role::Assistant, "Interest is taxable as income."),
    ];
    app.chat_sessions().save(None, &transcript).await.unwrap();

    let latest = app.chat_sessions().load_latest().await.unwrap().unwrap();
    assert_eq!(latest.locale.as_deref(), Some("hi"));
    assert_eq!(latest.messages, transcript);
}
