use axum::{extract::Extension, http::StatusCode, Json};
use sqlx::SqlitePool;
use tracing::info;

use crate::dto::pitch_dto::{CreatePitch, Pitch};
use crate::errors::{AppError, Result};
use crate::services::auth_user::AuthUser;

/**
 * GET request to list the pitches, staff only.
 */
pub async fn get_pitches(
    Extension(pool): Extension<SqlitePool>,
    AuthUser(account): AuthUser,
) -> Result<Json<Vec<Pitch>>> {
    if !account.is_staff {
        return Err(AppError::Forbidden);
    }

    info!("Fetching pitches.");
    let pitches = sqlx::query_as::<_, Pitch>("SELECT * FROM pitches ORDER BY name")
        .fetch_all(&pool)
        .await?;

    Ok(Json(pitches))
}

/**
 * POST request to add a pitch, staff only.
 */
pub async fn create_pitch(
    Extension(pool): Extension<SqlitePool>,
    AuthUser(account): AuthUser,
    Json(payload): Json<CreatePitch>,
) -> Result<(StatusCode, Json<Pitch>)> {
    if !account.is_staff {
        return Err(AppError::Forbidden);
    }

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::field("name", "This field is required."));
    }

    let pitch = sqlx::query_as::<_, Pitch>(
        "INSERT INTO pitches (name, description, is_public) VALUES (?, ?, ?) RETURNING *",
    )
    .bind(name)
    .bind(payload.description.trim())
    .bind(payload.is_public)
    .fetch_one(&pool)
    .await?;

    info!("{} added pitch {}", account.username, pitch.name);
    Ok((StatusCode::CREATED, Json(pitch)))
}
