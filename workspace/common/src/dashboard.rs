use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Aggregated counts shown on the admin dashboard.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct DashboardSummary {
    pub total_users: u64,
    pub active_users: u64,
    pub total_datasets: u64,
    /// Accounts that joined in the last 7 days.
    pub recent_users: u64,
    /// Datasets uploaded in the last 7 days.
    pub recent_datasets: u64,
    /// Accounts that joined in the last 30 days.
    pub users_this_month: u64,
    /// Accounts with the most datasets, descending.
    pub top_users: Vec<TopUser>,
    /// Newest first.
    pub recent_activity: Vec<ActivityEvent>,
}

/// An account together with the number of datasets it owns.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct TopUser {
    pub id: i32,
    pub username: String,
    pub dataset_count: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    UserJoined,
    DatasetUploaded,
}

/// A single entry of the dashboard's recent activity feed.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ActivityEvent {
    pub kind: ActivityKind,
    /// Username for sign-ups, dataset name for uploads.
    pub subject: String,
    /// Owner of the uploaded dataset; `None` for sign-ups.
    pub username: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl ActivityEvent {
    pub fn user_joined(username: impl Into<String>, occurred_at: DateTime<Utc>) -> Self {
        Self {
            kind: ActivityKind::UserJoined,
            subject: username.into(),
            username: None,
            occurred_at,
        }
    }

    pub fn dataset_uploaded(
        dataset_name: impl Into<String>,
        owner: Option<String>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: ActivityKind::DatasetUploaded,
            subject: dataset_name.into(),
            username: owner,
            occurred_at,
        }
    }
}
