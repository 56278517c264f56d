use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use sqlx::types::Json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum NotificationKind {
    BookingCreated,
    StatusChanged,
    BookingUpdated,
    BookingDeleted,
    PendingApprovals,
    ConflictFlag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Level {
    Info,
    Success,
    Warning,
    Error,
}

/// Kind of record a notification points at.
pub const TARGET_BOOKING: &str = "booking";

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Notification {
    pub id: i64,
    pub recipient_id: i64,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub level: Level,
    pub target_type: Option<String>,
    pub target_id: Option<i64>,
    pub message: String,
    pub payload: Json<Value>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub dedupe_key: String,
}

/// A notification waiting for its transaction to commit.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub recipient_id: i64,
    pub kind: NotificationKind,
    pub level: Level,
    pub target: Option<(&'static str, i64)>,
    pub message: String,
    pub payload: Value,
    pub dedupe_key: String,
}

#[derive(Debug, Serialize)]
pub struct UnreadCount {
    pub unread: i64,
}
