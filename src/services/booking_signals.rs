//! Works out which notifications a booking write produces.
//!
//! Callers capture the stored row before writing, then hand both versions in
//! here while still inside their transaction. Everything lands in the
//! caller's [`AlertQueue`], which is flushed after commit.

use sqlx::SqliteConnection;
use tracing::debug;

use crate::dto::booking_dto::{Booking, BookingStatus, BookingView};
use crate::errors::Result;
use crate::services::alerts::{self, AlertQueue, DeletedBooking};
use crate::services::booking_rules::PitchClass;

/// Names of the scheduling fields that differ between two versions of a booking.
pub fn changed_core_fields(old: &Booking, new: &Booking) -> Vec<&'static str> {
    let mut changed = Vec::new();
    if old.pitch_id != new.pitch_id {
        changed.push("pitch");
    }
    if old.start_time != new.start_time {
        changed.push("start_time");
    }
    if old.end_time != new.end_time {
        changed.push("end_time");
    }
    changed
}

/// Accounts that review bookings on a pitch like this one.
pub async fn reviewer_ids(conn: &mut SqliteConnection, pitch: PitchClass) -> Result<Vec<i64>> {
    let ids = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT id FROM accounts
        WHERE (role = 'manager' AND ?)
           OR (role IN ('chairman', 'secretary') AND ?)
        ORDER BY id
        "#,
    )
    .bind(pitch.astro)
    .bind(pitch.main)
    .fetch_all(conn)
    .await?;

    Ok(ids)
}

async fn officer_ids(conn: &mut SqliteConnection) -> Result<Vec<i64>> {
    reviewer_ids(conn, PitchClass { astro: false, main: true }).await
}

/// Queues the notifications for a booking that was just inserted (`old` is
/// `None`) or updated.
pub async fn booking_saved(
    conn: &mut SqliteConnection,
    old: Option<&Booking>,
    new: &BookingView,
    queue: &mut AlertQueue,
) -> Result<()> {
    let creator = new.booking.created_by;

    let Some(old) = old else {
        queue.extend(alerts::booking_created(new));

        match new.booking.status {
            BookingStatus::Pending => {
                let pitch = PitchClass::of(&new.pitch_name);
                for reviewer in reviewer_ids(conn, pitch).await? {
                    if Some(reviewer) != creator {
                        queue.push(alerts::pending_approval(new, reviewer));
                    }
                }
            }
            BookingStatus::Conflicting => flag_conflict(conn, new, queue).await?,
            _ => {}
        }
        return Ok(());
    };

    if old.status != new.booking.status {
        queue.extend(alerts::status_changed(new, old.status, new.booking.status));
        if new.booking.status == BookingStatus::Conflicting {
            flag_conflict(conn, new, queue).await?;
        }
    }

    let changed = changed_core_fields(old, &new.booking);
    if !changed.is_empty() {
        queue.extend(alerts::booking_updated(new, &changed));
    }

    Ok(())
}

async fn flag_conflict(
    conn: &mut SqliteConnection,
    view: &BookingView,
    queue: &mut AlertQueue,
) -> Result<()> {
    for officer in officer_ids(conn).await? {
        queue.push(alerts::conflict_flag(view, officer));
    }
    Ok(())
}

/// Queues the deletion notice for the booking's creator, if that account
/// still exists.
pub async fn booking_deleting(
    conn: &mut SqliteConnection,
    view: &BookingView,
    queue: &mut AlertQueue,
) -> Result<()> {
    let snapshot = DeletedBooking::from(view);

    let Some(user_id) = snapshot.user_id else {
        return Ok(());
    };

    let recipient = sqlx::query_scalar::<_, i64>("SELECT id FROM accounts WHERE id = ?")
        .bind(user_id)
        .fetch_optional(conn)
        .await?;

    match recipient {
        Some(recipient) => queue.push(alerts::booking_deleted(&snapshot, recipient)),
        None => debug!("Creator {} of booking {} is gone, no notice sent", user_id, snapshot.id),
    }

    Ok(())
}
