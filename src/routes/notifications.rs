use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    Json,
};
use sqlx::SqlitePool;
use tracing::info;

use crate::dto::notification_dto::{Notification, UnreadCount};
use crate::errors::{AppError, Result};
use crate::services::auth_user::AuthUser;

/**
 * GET the signed-in account's notifications, newest first.
 */
pub async fn get_notifications(
    Extension(pool): Extension<SqlitePool>,
    AuthUser(account): AuthUser,
) -> Result<Json<Vec<Notification>>> {
    let notifications = sqlx::query_as::<_, Notification>(
        "SELECT * FROM notifications WHERE recipient_id = ? ORDER BY created_at DESC, id DESC",
    )
    .bind(account.id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(notifications))
}

pub async fn unread_count(
    Extension(pool): Extension<SqlitePool>,
    AuthUser(account): AuthUser,
) -> Result<Json<UnreadCount>> {
    let unread = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM notifications WHERE recipient_id = ? AND is_read = 0",
    )
    .bind(account.id)
    .fetch_one(&pool)
    .await?;

    Ok(Json(UnreadCount { unread }))
}

/**
 * GET one notification; viewing it marks it read.
 */
pub async fn get_notification(
    Extension(pool): Extension<SqlitePool>,
    AuthUser(account): AuthUser,
    Path(notification_id): Path<i64>,
) -> Result<Json<Notification>> {
    let mut notification = sqlx::query_as::<_, Notification>(
        "SELECT * FROM notifications WHERE id = ? AND recipient_id = ?",
    )
    .bind(notification_id)
    .bind(account.id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Notification"))?;

    if !notification.is_read {
        sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ?")
            .bind(notification.id)
            .execute(&pool)
            .await?;
        notification.is_read = true;
    }

    Ok(Json(notification))
}

pub async fn delete_notification(
    Extension(pool): Extension<SqlitePool>,
    AuthUser(account): AuthUser,
    Path(notification_id): Path<i64>,
) -> Result<StatusCode> {
    let res = sqlx::query("DELETE FROM notifications WHERE id = ? AND recipient_id = ?")
        .bind(notification_id)
        .bind(account.id)
        .execute(&pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound("Notification"));
    }

    info!("{} removed notification {}", account.username, notification_id);
    Ok(StatusCode::NO_CONTENT)
}
