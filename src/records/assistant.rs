//! Conversation history of the assistant page.
//!
//! Each save writes the whole transcript; reopening the page picks up the
//! newest `chat` session of the signed-in user.

use crate::backend::{DataStore, Filter};
use crate::error::RecordError;
use crate::i18n::Language;
use crate::records::{newest_first, row_id, signed_in_user};
use crate::session::SessionStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

pub const AI_SESSIONS_TABLE: &str = "ai_sessions";
pub const CHAT_SESSION_TYPE: &str = "chat";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Some(Utc::now()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSession {
    #[serde(deserialize_with = "row_id")]
    pub id: String,
    pub user_id: String,
    pub session_type: String,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

pub struct ChatSessions {
    session: SessionStore,
    data: Arc<dyn DataStore>,
}

impl ChatSessions {
    pub fn new(session: SessionStore, data: Arc<dyn DataStore>) -> Self {
        Self { session, data }
    }

    /// The newest chat session of the signed-in user, if there is one.
    ///
    /// Messages saved without a timestamp take the session's creation time.
    pub async fn load_latest(&self) -> Result<Option<ChatSession>, RecordError> {
        let user_id = signed_in_user(&self.session)?;
        let rows = self
            .data
            .fetch_records(AI_SESSIONS_TABLE, &Filter::eq("user_id", user_id))
            .await?;

        let mut sessions: Vec<ChatSession> = rows
            .into_iter()
            .filter(|row| row.get("session_type").and_then(Value::as_str) == Some(CHAT_SESSION_TYPE))
            .filter_map(|row| {
                serde_json::from_value(row)
                    .map_err(|e| warn!("Skipping malformed chat session row: {}", e))
                    .ok()
            })
            .collect();
        newest_first(&mut sessions, |s| s.created_at);

        let Some(mut latest) = sessions.into_iter().next() else {
            debug!("No previous chat session");
            return Ok(None);
        };
        for message in &mut latest.messages {
            if message.timestamp.is_none() {
                message.timestamp = latest.created_at;
            }
        }
        Ok(Some(latest))
    }

    /// Store the transcript under the profile's locale.
    ///
    /// Passing the id of a loaded session overwrites it; `None` starts a new one.
    pub async fn save(&self, session_id: Option<&str>, messages: &[ChatMessage]) -> Result<(), RecordError> {
        let user_id = signed_in_user(&self.session)?;
        let locale = self
            .session
            .profile()
            .map(|p| p.locale)
            .unwrap_or_else(|| Language::default_language().code().to_string());

        let now = Utc::now();
        let mut row = json!({
            "user_id": user_id,
            "session_type": CHAT_SESSION_TYPE,
            "locale": locale,
            "messages": messages,
            "updated_at": now,
        });
        match session_id {
            Some(id) => row["id"] = Value::String(id.to_string()),
            None => row["created_at"] = json!(now),
        }

        self.data.upsert_record(AI_SESSIONS_TABLE, row).await?;
        debug!("Saved chat session with {} messages", messages.len());
        Ok(())
    }
}
