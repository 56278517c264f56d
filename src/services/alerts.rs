//! Notification creation.
//!
//! Notifications produced while a booking is written are queued in an
//! [`AlertQueue`] and only inserted once the caller has committed, so no
//! notification ever describes a write that was rolled back.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use sqlx::{SqliteConnection, SqlitePool};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::dto::booking_dto::{BookingStatus, BookingView};
use crate::dto::notification_dto::{
    Level, NewNotification, Notification, NotificationKind, TARGET_BOOKING,
};
use crate::errors::Result;

pub fn fmt_time(dt: &DateTime<Utc>) -> String {
    dt.format("%H:%M %d/%m/%y").to_string()
}

pub fn level_for_status(status: BookingStatus) -> Level {
    match status {
        BookingStatus::Approved => Level::Success,
        BookingStatus::Conflicting => Level::Warning,
        BookingStatus::Rejected => Level::Error,
        BookingStatus::Pending => Level::Info,
    }
}

#[derive(Debug, Default)]
pub struct AlertQueue {
    pending: Vec<NewNotification>,
}

impl AlertQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, notification: NewNotification) {
        self.pending.push(notification);
    }

    pub fn extend(&mut self, notifications: impl IntoIterator<Item = NewNotification>) {
        self.pending.extend(notifications);
    }

    /// Inserts everything queued and pushes each new row to live listeners.
    ///
    /// Must only run after the transaction that produced the queue committed.
    /// A failed insert (for instance a recipient that no longer exists) is
    /// logged and skipped.
    pub async fn flush(
        self,
        pool: &SqlitePool,
        tx: &broadcast::Sender<Notification>,
    ) -> Vec<Notification> {
        let mut created = Vec::with_capacity(self.pending.len());

        for new in self.pending {
            let mut conn = match pool.acquire().await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("Could not acquire a connection for a notification: {}", e);
                    continue;
                }
            };

            match insert_notification(&mut conn, &new).await {
                Ok(Some(notification)) => {
                    let _ = tx.send(notification.clone());
                    created.push(notification);
                }
                Ok(None) => {
                    debug!(
                        "Skipped duplicate notification '{}' for account {}",
                        new.dedupe_key, new.recipient_id
                    );
                }
                Err(e) => {
                    warn!(
                        "Dropped {:?} notification for account {}: {}",
                        new.kind, new.recipient_id, e
                    );
                }
            }
        }

        created
    }
}

/// Inserts one notification. Returns `None` when the recipient already has an
/// unread notification with the same non-empty dedupe key.
pub async fn insert_notification(
    conn: &mut SqliteConnection,
    new: &NewNotification,
) -> Result<Option<Notification>> {
    if !new.dedupe_key.is_empty() {
        let existing = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM notifications
            WHERE recipient_id = ? AND dedupe_key = ? AND is_read = 0
            "#,
        )
        .bind(new.recipient_id)
        .bind(&new.dedupe_key)
        .fetch_one(&mut *conn)
        .await?;

        if existing > 0 {
            return Ok(None);
        }
    }

    let (target_type, target_id) = match new.target {
        Some((kind, id)) => (Some(kind), Some(id)),
        None => (None, None),
    };

    let notification = sqlx::query_as::<_, Notification>(
        r#"
        INSERT INTO notifications
            (recipient_id, kind, level, target_type, target_id, message, payload, is_read, created_at, dedupe_key)
        VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
        RETURNING *
        "#,
    )
    .bind(new.recipient_id)
    .bind(new.kind)
    .bind(new.level)
    .bind(target_type)
    .bind(target_id)
    .bind(&new.message)
    .bind(sqlx::types::Json(&new.payload))
    .bind(Utc::now())
    .bind(&new.dedupe_key)
    .fetch_one(&mut *conn)
    .await?;

    Ok(Some(notification))
}

fn booking_window(view: &BookingView) -> String {
    format!(
        "Booking for {} from {} to {}",
        view.pitch_name,
        fmt_time(&view.booking.start_time),
        fmt_time(&view.booking.end_time)
    )
}

fn about_booking(
    recipient_id: i64,
    view: &BookingView,
    kind: NotificationKind,
    level: Level,
    message: String,
    payload: Value,
) -> NewNotification {
    NewNotification {
        recipient_id,
        kind,
        level,
        target: Some((TARGET_BOOKING, view.booking.id)),
        message,
        payload,
        dedupe_key: String::new(),
    }
}

pub fn booking_created(view: &BookingView) -> Option<NewNotification> {
    let recipient = view.booking.created_by?;
    let status = view.booking.status;
    Some(about_booking(
        recipient,
        view,
        NotificationKind::BookingCreated,
        Level::Success,
        format!(
            "{} was created, booking status is currently '{}'.",
            booking_window(view),
            status
        ),
        json!({ "status": status }),
    ))
}

pub fn status_changed(
    view: &BookingView,
    old: BookingStatus,
    new: BookingStatus,
) -> Option<NewNotification> {
    let recipient = view.booking.created_by?;
    Some(about_booking(
        recipient,
        view,
        NotificationKind::StatusChanged,
        level_for_status(new),
        format!("{} changed status: {} → {}.", booking_window(view), old, new),
        json!({ "old_status": old, "new_status": new }),
    ))
}

pub fn booking_updated(view: &BookingView, changed_fields: &[&str]) -> Option<NewNotification> {
    let recipient = view.booking.created_by?;
    Some(about_booking(
        recipient,
        view,
        NotificationKind::BookingUpdated,
        Level::Info,
        format!("{} was updated.", booking_window(view)),
        json!({ "changed_fields": changed_fields }),
    ))
}

/// Pending booking waiting on `reviewer_id`.
pub fn pending_approval(view: &BookingView, reviewer_id: i64) -> NewNotification {
    let mut notification = about_booking(
        reviewer_id,
        view,
        NotificationKind::PendingApprovals,
        Level::Info,
        format!("{} is waiting for approval.", booking_window(view)),
        json!({ "booking_id": view.booking.id }),
    );
    notification.dedupe_key = format!("pending:{}", view.booking.id);
    notification
}

pub fn conflict_flag(view: &BookingView, reviewer_id: i64) -> NewNotification {
    let mut notification = about_booking(
        reviewer_id,
        view,
        NotificationKind::ConflictFlag,
        Level::Warning,
        format!(
            "{} overlaps an approved booking and was marked conflicting.",
            booking_window(view)
        ),
        json!({ "booking_id": view.booking.id }),
    );
    notification.dedupe_key = format!("conflict:{}", view.booking.id);
    notification
}

/// What is left of a booking once it is gone.
#[derive(Debug, Clone)]
pub struct DeletedBooking {
    pub id: i64,
    pub user_id: Option<i64>,
    pub pitch_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: BookingStatus,
}

impl From<&BookingView> for DeletedBooking {
    fn from(view: &BookingView) -> Self {
        Self {
            id: view.booking.id,
            user_id: view.booking.created_by,
            pitch_name: view.pitch_name.clone(),
            start_time: view.booking.start_time,
            end_time: view.booking.end_time,
            status: view.booking.status,
        }
    }
}

pub fn booking_deleted(snapshot: &DeletedBooking, recipient_id: i64) -> NewNotification {
    NewNotification {
        recipient_id,
        kind: NotificationKind::BookingDeleted,
        level: Level::Error,
        target: None,
        message: format!(
            "Booking for {} from {} to {} was deleted.",
            snapshot.pitch_name,
            fmt_time(&snapshot.start_time),
            fmt_time(&snapshot.end_time)
        ),
        payload: json!({
            "id": snapshot.id,
            "user_id": snapshot.user_id,
            "pitch_name": snapshot.pitch_name,
            "start_time": snapshot.start_time.to_rfc3339(),
            "end_time": snapshot.end_time.to_rfc3339(),
            "status": snapshot.status,
        }),
        dedupe_key: String::new(),
    }
}
