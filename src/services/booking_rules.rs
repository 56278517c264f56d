//! Approval rules for pitch bookings.
//!
//! Pitches are not stored with a category; whether a pitch is the astro or the
//! main pitch is read from its name. A name may match both.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::dto::account_dto::Role;
use crate::dto::booking_dto::{BookingMethod, BookingStatus};
use crate::errors::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PitchClass {
    pub astro: bool,
    pub main: bool,
}

impl PitchClass {
    pub fn of(pitch_name: &str) -> Self {
        let name = pitch_name.to_lowercase();
        Self {
            astro: name.contains("astro"),
            main: name.contains("main"),
        }
    }
}

/// Who is submitting the booking. `Account(None)` is a signed-in account with no role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submitter {
    Anonymous,
    Account(Option<Role>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Status(BookingStatus),
    /// Approved unless an approved booking on the same pitch overlaps.
    ApproveIfClear,
}

impl Decision {
    pub fn resolve(self, has_conflict: bool) -> BookingStatus {
        match self {
            Decision::Status(status) => status,
            Decision::ApproveIfClear if has_conflict => BookingStatus::Conflicting,
            Decision::ApproveIfClear => BookingStatus::Approved,
        }
    }
}

/// Initial status of a submission; first matching rule wins.
pub fn decide(submitter: Submitter, pitch: PitchClass) -> Decision {
    let role = match submitter {
        Submitter::Anonymous => return Decision::Status(BookingStatus::Pending),
        Submitter::Account(role) => role,
    };

    match role {
        Some(r) if r.is_officer() && pitch.main => Decision::Status(BookingStatus::Approved),
        Some(Role::Manager) if pitch.astro => Decision::Status(BookingStatus::Approved),
        Some(Role::Manager) if pitch.main => Decision::ApproveIfClear,
        Some(Role::Coach) if pitch.main => Decision::ApproveIfClear,
        _ => Decision::Status(BookingStatus::Pending),
    }
}

/// Only managers pick the channel; every other submission is recorded as web.
pub fn channel_for(submitter: Submitter, requested: Option<BookingMethod>) -> BookingMethod {
    match submitter {
        Submitter::Account(Some(Role::Manager)) => requested.unwrap_or(BookingMethod::Web),
        _ => BookingMethod::Web,
    }
}

/// Managers review astro bookings, chairman and secretary review main pitch bookings.
pub fn can_review(role: Option<Role>, pitch: PitchClass) -> bool {
    match role {
        Some(Role::Manager) => pitch.astro,
        Some(r) if r.is_officer() => pitch.main,
        _ => false,
    }
}

/// Whether an approved booking on `pitch_id` overlaps `[start, end)`.
/// Intervals that only touch end to start do not clash.
///
/// Point-in-time read with no lock held, so two concurrent submissions for the
/// same slot can both see it free.
pub async fn has_approved_conflict(
    conn: &mut SqliteConnection,
    pitch_id: i64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    exclude_booking: Option<i64>,
) -> Result<bool> {
    let conflict = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM bookings
            WHERE pitch_id = ?
              AND status = 'approved'
              AND start_time < ?
              AND end_time > ?
              AND (? IS NULL OR id != ?)
        )
        "#,
    )
    .bind(pitch_id)
    .bind(end)
    .bind(start)
    .bind(exclude_booking)
    .bind(exclude_booking)
    .fetch_one(conn)
    .await?;

    Ok(conflict != 0)
}
