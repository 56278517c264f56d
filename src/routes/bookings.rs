use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    Json,
};
use chrono::SubsecRound;
use sqlx::{SqliteConnection, SqlitePool};
use tokio::sync::broadcast;
use tracing::info;

use crate::dto::account_dto::{Account, Role};
use crate::dto::booking_dto::{BookingForm, BookingMethod, BookingStatus, BookingView};
use crate::dto::notification_dto::{Notification, TARGET_BOOKING};
use crate::dto::pitch_dto::Pitch;
use crate::errors::{AppError, FieldErrors, Result};
use crate::services::alerts::AlertQueue;
use crate::services::auth_user::{AuthUser, MaybeAuthUser};
use crate::services::booking_rules::{
    can_review, channel_for, decide, has_approved_conflict, Decision, PitchClass, Submitter,
};
use crate::services::booking_signals;

const INVALID_CHOICE: &str = "Select a valid choice. That choice is not one of the available choices.";

const BOOKING_VIEW_SELECT: &str = r#"
    SELECT b.*, p.name AS pitch_name
    FROM bookings b
    JOIN pitches p ON p.id = b.pitch_id
"#;

pub async fn fetch_booking(conn: &mut SqliteConnection, id: i64) -> Result<Option<BookingView>> {
    let view = sqlx::query_as::<_, BookingView>(&format!("{BOOKING_VIEW_SELECT} WHERE b.id = ?"))
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(view)
}

fn submitter_of(account: Option<&Account>) -> Submitter {
    match account {
        None => Submitter::Anonymous,
        Some(a) => Submitter::Account(a.role),
    }
}

/// Creator or any manager, chairman or secretary.
fn can_modify(account: &Account, view: &BookingView) -> bool {
    account.is_privileged() || view.booking.created_by == Some(account.id)
}

/// Checks a submitted form and returns the chosen pitch.
///
/// Anonymous and role-less submitters may only choose astro pitches. A
/// manager's channel is phone or email, never web; `require_channel` also
/// makes it mandatory.
async fn validate_form(
    conn: &mut SqliteConnection,
    form: &BookingForm,
    submitter: Submitter,
    require_channel: bool,
) -> Result<Pitch> {
    let mut errors = FieldErrors::new();

    let pitch = sqlx::query_as::<_, Pitch>("SELECT * FROM pitches WHERE id = ?")
        .bind(form.pitch_id)
        .fetch_optional(conn)
        .await?;

    let restricted = matches!(submitter, Submitter::Anonymous | Submitter::Account(None));
    match &pitch {
        None => errors.add("pitch_id", INVALID_CHOICE),
        Some(p) if restricted && !PitchClass::of(&p.name).astro => {
            errors.add("pitch_id", INVALID_CHOICE)
        }
        Some(_) => {}
    }

    if submitter == Submitter::Anonymous {
        if form.name.trim().is_empty() {
            errors.add("name", "This field is required.");
        }
        let email = form.email.trim();
        if !email.is_empty() && !email.contains('@') {
            errors.add("email", "Enter a valid email address.");
        }
    }

    if form.start_time.trunc_subsecs(0) >= form.end_time.trunc_subsecs(0) {
        errors.add("end_time", "End time must be after the start time.");
    }

    if submitter == Submitter::Account(Some(Role::Manager)) {
        match form.method {
            None if require_channel => errors.add("method", "This field is required."),
            Some(BookingMethod::Web) => errors.add("method", INVALID_CHOICE),
            _ => {}
        }
    }

    errors.into_result()?;
    pitch.ok_or_else(|| AppError::field("pitch_id", INVALID_CHOICE))
}

/// Runs the approval rules, consulting the conflict check only when a rule asks for it.
async fn decide_status(
    conn: &mut SqliteConnection,
    submitter: Submitter,
    pitch: &Pitch,
    form: &BookingForm,
    exclude_booking: Option<i64>,
) -> Result<BookingStatus> {
    let decision = decide(submitter, PitchClass::of(&pitch.name));
    let has_conflict = match decision {
        Decision::ApproveIfClear => {
            has_approved_conflict(
                conn,
                pitch.id,
                form.start_time.trunc_subsecs(0),
                form.end_time.trunc_subsecs(0),
                exclude_booking,
            )
            .await?
        }
        Decision::Status(_) => false,
    };
    Ok(decision.resolve(has_conflict))
}

/**
 * POST request to submit a booking, signed in or anonymously.
 */
pub async fn create_booking(
    Extension(pool): Extension<SqlitePool>,
    Extension(tx): Extension<broadcast::Sender<Notification>>,
    MaybeAuthUser(account): MaybeAuthUser,
    Json(form): Json<BookingForm>,
) -> Result<(StatusCode, Json<BookingView>)> {
    let submitter = submitter_of(account.as_ref());
    info!("Booking request for pitch {} from {:?}", form.pitch_id, submitter);

    let mut db_tx = pool.begin().await?;
    let pitch = validate_form(&mut db_tx, &form, submitter, true).await?;
    let status = decide_status(&mut db_tx, submitter, &pitch, &form, None).await?;
    let method = channel_for(submitter, form.method);

    let (name, email, created_by) = match &account {
        Some(a) => (a.display_name(), a.email.clone(), Some(a.id)),
        None => (form.name.trim().to_string(), form.email.trim().to_string(), None),
    };

    let id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO bookings
            (pitch_id, name, email, phone, created_by, start_time, end_time, method, status, submitted_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(pitch.id)
    .bind(name)
    .bind(email)
    .bind(form.phone.trim())
    .bind(created_by)
    .bind(form.start_time.trunc_subsecs(0))
    .bind(form.end_time.trunc_subsecs(0))
    .bind(method)
    .bind(status)
    .bind(chrono::Utc::now().trunc_subsecs(0))
    .fetch_one(&mut *db_tx)
    .await?;

    let view = fetch_booking(&mut db_tx, id)
        .await?
        .ok_or(AppError::NotFound("Booking"))?;

    let mut queue = AlertQueue::new();
    booking_signals::booking_saved(&mut db_tx, None, &view, &mut queue).await?;
    db_tx.commit().await?;
    queue.flush(&pool, &tx).await;

    info!("Booking {} on {} is {}", view.booking.id, view.pitch_name, view.booking.status);
    Ok((StatusCode::CREATED, Json(view)))
}

/**
 * GET request for the bookings the account may see.
 */
pub async fn get_bookings(
    Extension(pool): Extension<SqlitePool>,
    AuthUser(account): AuthUser,
) -> Result<Json<Vec<BookingView>>> {
    info!("Fetching bookings for {}", account.username);

    let bookings = if account.is_staff || account.is_privileged() {
        sqlx::query_as::<_, BookingView>(&format!(
            "{BOOKING_VIEW_SELECT} ORDER BY b.start_time, b.id"
        ))
        .fetch_all(&pool)
        .await?
    } else {
        sqlx::query_as::<_, BookingView>(&format!(
            "{BOOKING_VIEW_SELECT} WHERE b.created_by = ? ORDER BY b.start_time, b.id"
        ))
        .bind(account.id)
        .fetch_all(&pool)
        .await?
    };

    Ok(Json(bookings))
}

pub async fn get_booking(
    Extension(pool): Extension<SqlitePool>,
    AuthUser(account): AuthUser,
    Path(booking_id): Path<i64>,
) -> Result<Json<BookingView>> {
    let mut conn = pool.acquire().await?;
    let view = fetch_booking(&mut conn, booking_id)
        .await?
        .ok_or(AppError::NotFound("Booking"))?;

    if !(account.is_staff || can_modify(&account, &view)) {
        return Err(AppError::Forbidden);
    }

    Ok(Json(view))
}

/**
 * PUT request to edit a booking. Moving it re-runs the approval rules for the editor.
 */
pub async fn update_booking(
    Extension(pool): Extension<SqlitePool>,
    Extension(tx): Extension<broadcast::Sender<Notification>>,
    AuthUser(account): AuthUser,
    Path(booking_id): Path<i64>,
    Json(form): Json<BookingForm>,
) -> Result<Json<BookingView>> {
    info!("{} editing booking {}", account.username, booking_id);

    let mut db_tx = pool.begin().await?;
    let old = fetch_booking(&mut db_tx, booking_id)
        .await?
        .ok_or(AppError::NotFound("Booking"))?;

    if !can_modify(&account, &old) {
        return Err(AppError::Forbidden);
    }

    let submitter = Submitter::Account(account.role);
    let pitch = validate_form(&mut db_tx, &form, submitter, false).await?;

    let start = form.start_time.trunc_subsecs(0);
    let end = form.end_time.trunc_subsecs(0);
    let moved = pitch.id != old.booking.pitch_id
        || start != old.booking.start_time
        || end != old.booking.end_time;

    let status = if moved {
        decide_status(&mut db_tx, submitter, &pitch, &form, Some(booking_id)).await?
    } else {
        old.booking.status
    };

    // Only a manager may change how the request arrived.
    let method = match account.role {
        Some(Role::Manager) => form.method.unwrap_or(old.booking.method),
        _ => old.booking.method,
    };

    let keep_or = |given: &str, current: &str| {
        let given = given.trim();
        if given.is_empty() { current.to_string() } else { given.to_string() }
    };

    sqlx::query(
        r#"
        UPDATE bookings
        SET pitch_id = ?, name = ?, email = ?, phone = ?, start_time = ?, end_time = ?,
            method = ?, status = ?
        WHERE id = ?
        "#,
    )
    .bind(pitch.id)
    .bind(keep_or(&form.name, &old.booking.name))
    .bind(keep_or(&form.email, &old.booking.email))
    .bind(keep_or(&form.phone, &old.booking.phone))
    .bind(start)
    .bind(end)
    .bind(method)
    .bind(status)
    .bind(booking_id)
    .execute(&mut *db_tx)
    .await?;

    let view = fetch_booking(&mut db_tx, booking_id)
        .await?
        .ok_or(AppError::NotFound("Booking"))?;

    let mut queue = AlertQueue::new();
    booking_signals::booking_saved(&mut db_tx, Some(&old.booking), &view, &mut queue).await?;
    db_tx.commit().await?;
    queue.flush(&pool, &tx).await;

    Ok(Json(view))
}

/**
 * DELETE request to remove a booking.
 */
pub async fn delete_booking(
    Extension(pool): Extension<SqlitePool>,
    Extension(tx): Extension<broadcast::Sender<Notification>>,
    AuthUser(account): AuthUser,
    Path(booking_id): Path<i64>,
) -> Result<StatusCode> {
    info!("{} deleting booking {}", account.username, booking_id);

    let mut db_tx = pool.begin().await?;
    let view = fetch_booking(&mut db_tx, booking_id)
        .await?
        .ok_or(AppError::NotFound("Booking"))?;

    if !can_modify(&account, &view) {
        return Err(AppError::Forbidden);
    }

    let mut queue = AlertQueue::new();
    booking_signals::booking_deleting(&mut db_tx, &view, &mut queue).await?;

    sqlx::query(
        "UPDATE notifications SET target_type = NULL, target_id = NULL WHERE target_type = ? AND target_id = ?",
    )
    .bind(TARGET_BOOKING)
    .bind(booking_id)
    .execute(&mut *db_tx)
    .await?;

    sqlx::query("DELETE FROM bookings WHERE id = ?")
        .bind(booking_id)
        .execute(&mut *db_tx)
        .await?;

    db_tx.commit().await?;
    queue.flush(&pool, &tx).await;

    Ok(StatusCode::NO_CONTENT)
}

/// Moves a pending booking to `outcome`. Bookings that are no longer pending
/// are returned untouched.
async fn review_booking(
    pool: &SqlitePool,
    tx: &broadcast::Sender<Notification>,
    account: &Account,
    booking_id: i64,
    outcome: BookingStatus,
) -> Result<Json<BookingView>> {
    if !account.is_privileged() {
        return Err(AppError::Forbidden);
    }

    let mut db_tx = pool.begin().await?;
    let old = fetch_booking(&mut db_tx, booking_id)
        .await?
        .ok_or(AppError::NotFound("Booking"))?;

    if !can_review(account.role, PitchClass::of(&old.pitch_name)) {
        return Err(AppError::Forbidden);
    }

    if old.booking.status != BookingStatus::Pending {
        info!(
            "Booking {} is {}, leaving it as it is",
            booking_id, old.booking.status
        );
        return Ok(Json(old));
    }

    sqlx::query("UPDATE bookings SET status = ? WHERE id = ? AND status = 'pending'")
        .bind(outcome)
        .bind(booking_id)
        .execute(&mut *db_tx)
        .await?;

    let view = fetch_booking(&mut db_tx, booking_id)
        .await?
        .ok_or(AppError::NotFound("Booking"))?;

    let mut queue = AlertQueue::new();
    booking_signals::booking_saved(&mut db_tx, Some(&old.booking), &view, &mut queue).await?;
    db_tx.commit().await?;
    queue.flush(pool, tx).await;

    info!("{} marked booking {} {}", account.username, booking_id, outcome);
    Ok(Json(view))
}

pub async fn approve_booking(
    Extension(pool): Extension<SqlitePool>,
    Extension(tx): Extension<broadcast::Sender<Notification>>,
    AuthUser(account): AuthUser,
    Path(booking_id): Path<i64>,
) -> Result<Json<BookingView>> {
    review_booking(&pool, &tx, &account, booking_id, BookingStatus::Approved).await
}

pub async fn reject_booking(
    Extension(pool): Extension<SqlitePool>,
    Extension(tx): Extension<broadcast::Sender<Notification>>,
    AuthUser(account): AuthUser,
    Path(booking_id): Path<i64>,
) -> Result<Json<BookingView>> {
    review_booking(&pool, &tx, &account, booking_id, BookingStatus::Rejected).await
}
