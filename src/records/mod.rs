//! Direct table access used by individual page views.
//!
//! These helpers have no shared state of their own: each call reads the
//! signed-in user from the session store and talks straight to the backend.

pub mod assistant;
pub mod documents;
pub mod grievances;

pub use assistant::{ChatMessage, ChatSession, ChatSessions, Role};
pub use documents::{Document, Documents, Upload};
pub use grievances::{Category, Grievance, Grievances, NewGrievance, Priority, Status};

use crate::error::RecordError;
use crate::session::SessionStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

/// Hosted tables use integer keys; rows created offline get string ids.
pub(crate) fn row_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Number(n) => n.to_string(),
        RawId::Text(s) => s,
    })
}

pub(crate) fn signed_in_user(session: &SessionStore) -> Result<String, RecordError> {
    session
        .session()
        .map(|s| s.user_id)
        .ok_or(RecordError::NoProfile)
}

/// Newest first; rows without a timestamp go last.
pub(crate) fn newest_first<T>(rows: &mut [T], created_at: impl Fn(&T) -> Option<DateTime<Utc>>) {
    rows.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
}
