//! Grievances filed by the signed-in investor.

use crate::backend::{ChangeEvent, DataStore, Filter, Subscription};
use crate::error::RecordError;
use crate::records::{newest_first, row_id, signed_in_user};
use crate::session::SessionStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

pub const GRIEVANCES_TABLE: &str = "grievances";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Fraud,
    Trading,
    Platform,
    Compliance,
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Status {
    #[default]
    Open,
    InProgress,
    Resolved,
    Closed,
}

// Wire names double as the user-facing codes
macro_rules! wire_name_impls {
    ($ty:ty) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match serde_json::to_value(self) {
                    Ok(serde_json::Value::String(name)) => f.write_str(&name),
                    _ => Err(fmt::Error),
                }
            }
        }

        impl FromStr for $ty {
            type Err = RecordError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                serde_json::from_value(serde_json::Value::String(s.trim().to_string())).map_err(
                    |_| RecordError::Validation(format!("Unknown {} '{}'", stringify!($ty), s)),
                )
            }
        }
    };
}

wire_name_impls!(Category);
wire_name_impls!(Priority);
wire_name_impls!(Status);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGrievance {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub priority: Priority,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grievance {
    #[serde(deserialize_with = "row_id")]
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

pub struct Grievances {
    session: SessionStore,
    data: Arc<dyn DataStore>,
}

impl Grievances {
    pub fn new(session: SessionStore, data: Arc<dyn DataStore>) -> Self {
        Self { session, data }
    }

    /// File a grievance tagged with the profile's locale.
    pub async fn file(&self, grievance: NewGrievance) -> Result<(), RecordError> {
        let title = grievance.title.trim();
        let description = grievance.description.trim();
        if title.is_empty() {
            return Err(RecordError::Validation("A title is required".to_string()));
        }
        if description.is_empty() {
            return Err(RecordError::Validation("A description is required".to_string()));
        }

        let profile = self.session.profile().ok_or(RecordError::NoProfile)?;
        let now = Utc::now();
        let row = json!({
            "user_id": profile.user_id,
            "title": title,
            "description": description,
            "category": grievance.category,
            "priority": grievance.priority,
            "locale": profile.locale,
            "status": Status::Open,
            "created_at": now,
            "updated_at": now,
        });
        self.data.upsert_record(GRIEVANCES_TABLE, row).await?;

        info!("Filed {} priority grievance '{}'", grievance.priority, title);
        Ok(())
    }

    /// The signed-in user's grievances, newest first.
    pub async fn list(&self) -> Result<Vec<Grievance>, RecordError> {
        let user_id = signed_in_user(&self.session)?;
        let rows = self
            .data
            .fetch_records(GRIEVANCES_TABLE, &Filter::eq("user_id", user_id))
            .await?;

        let mut grievances: Vec<Grievance> = rows
            .into_iter()
            .filter_map(|row| {
                serde_json::from_value(row)
                    .map_err(|e| warn!("Skipping malformed grievance row: {}", e))
                    .ok()
            })
            .collect();
        newest_first(&mut grievances, |g| g.created_at);
        Ok(grievances)
    }

    /// Follow changes to the signed-in user's grievances.
    pub fn watch(
        &self,
        on_change: impl Fn(ChangeEvent) + Send + Sync + 'static,
    ) -> Result<Subscription, RecordError> {
        let user_id = signed_in_user(&self.session)?;
        Ok(self.data.subscribe_to_changes(
            GRIEVANCES_TABLE,
            Filter::eq("user_id", user_id),
            Arc::new(on_change),
        ))
    }
}
