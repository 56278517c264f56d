use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    Json,
};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::dto::account_dto::Role;
use crate::dto::team_dto::{Team, TeamForm, TeamResponse};
use crate::errors::{AppError, Result};
use crate::services::auth_user::AuthUser;

const TEAM_ADMINS: &[Role] = &[Role::Chairman, Role::Secretary];

/// A team's coach must be an account holding the coach role.
async fn check_coach(pool: &SqlitePool, coach_id: Option<i64>) -> Result<()> {
    let Some(coach_id) = coach_id else {
        return Ok(());
    };

    let is_coach = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM accounts WHERE id = ? AND role = 'coach'",
    )
    .bind(coach_id)
    .fetch_one(pool)
    .await?;

    if is_coach == 0 {
        warn!("Account {} is not a coach", coach_id);
        return Err(AppError::field(
            "coach_id",
            "Select a valid choice. That choice is not one of the available choices.",
        ));
    }
    Ok(())
}

/**
 * GET request to get all the teams.
 */
pub async fn get_teams(Extension(pool): Extension<SqlitePool>) -> Result<Json<Vec<TeamResponse>>> {
    info!("Fetching teams.");

    let teams = sqlx::query_as::<_, Team>("SELECT * FROM teams ORDER BY id")
        .fetch_all(&pool)
        .await?;

    Ok(Json(teams.into_iter().map(TeamResponse::from).collect()))
}

pub async fn get_team(
    Extension(pool): Extension<SqlitePool>,
    AuthUser(_account): AuthUser,
    Path(team_id): Path<i64>,
) -> Result<Json<TeamResponse>> {
    let team = sqlx::query_as::<_, Team>("SELECT * FROM teams WHERE id = ?")
        .bind(team_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Team"))?;

    Ok(Json(team.into()))
}

/**
 * POST request to create a new team.
 */
pub async fn create_team(
    Extension(pool): Extension<SqlitePool>,
    auth: AuthUser,
    Json(payload): Json<TeamForm>,
) -> Result<(StatusCode, Json<TeamResponse>)> {
    auth.require_role(TEAM_ADMINS)?;
    check_coach(&pool, payload.coach_id).await?;

    let team = sqlx::query_as::<_, Team>(
        r#"
        INSERT INTO teams (age_group, gender, sport, coach_id)
        VALUES (?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(payload.age_group)
    .bind(payload.gender)
    .bind(payload.sport)
    .bind(payload.coach_id)
    .fetch_one(&pool)
    .await?;

    info!("Created the team {}", team.label());
    Ok((StatusCode::CREATED, Json(team.into())))
}

/**
 * PUT request to edit a team.
 */
pub async fn update_team(
    Extension(pool): Extension<SqlitePool>,
    auth: AuthUser,
    Path(team_id): Path<i64>,
    Json(payload): Json<TeamForm>,
) -> Result<Json<TeamResponse>> {
    auth.require_role(TEAM_ADMINS)?;
    check_coach(&pool, payload.coach_id).await?;

    let team = sqlx::query_as::<_, Team>(
        r#"
        UPDATE teams
        SET age_group = ?, gender = ?, sport = ?, coach_id = ?
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(payload.age_group)
    .bind(payload.gender)
    .bind(payload.sport)
    .bind(payload.coach_id)
    .bind(team_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Team"))?;

    info!("Updated the team {}", team.label());
    Ok(Json(team.into()))
}

/**
 * DELETE request to delete a team by id.
 */
pub async fn delete_team(
    Extension(pool): Extension<SqlitePool>,
    auth: AuthUser,
    Path(team_id): Path<i64>,
) -> Result<StatusCode> {
    auth.require_role(TEAM_ADMINS)?;
    info!("Deleting the team {}", team_id);

    let res = sqlx::query("DELETE FROM teams WHERE id = ?")
        .bind(team_id)
        .execute(&pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound("Team"));
    }
    Ok(StatusCode::NO_CONTENT)
}
