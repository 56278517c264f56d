use std::sync::Arc;

use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use sqlx::SqlitePool;
use tracing::{error, warn};

use crate::config::Config;
use crate::dto::account_dto::{Account, Claims, Role};
use crate::errors::{AppError, Result};

/// The signed-in account. Rejects with 401 when the bearer token is missing,
/// invalid, expired, or was issued before the last logout.
pub struct AuthUser(pub Account);

/// Like [`AuthUser`] but yields `None` when no `Authorization` header is sent.
pub struct MaybeAuthUser(pub Option<Account>);

impl AuthUser {
    /// 403 unless the account holds one of `roles`.
    pub fn require_role(&self, roles: &[Role]) -> Result<()> {
        if self.0.has_role(roles) {
            Ok(())
        } else {
            warn!("Account {} lacks any of {:?}", self.0.username, roles);
            Err(AppError::Forbidden)
        }
    }
}

pub fn issue_token(account: &Account, config: &Config) -> Result<String> {
    let claims = Claims {
        sub: account.id,
        ver: account.session_version,
        exp: (Utc::now() + chrono::Duration::hours(config.token_ttl_hours)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_ref()),
    )?;
    Ok(token)
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.strip_prefix("Bearer ").unwrap_or(""))
}

async fn authenticate(parts: &Parts, token: &str) -> Result<Account> {
    let (Some(pool), Some(config)) = (
        parts.extensions.get::<SqlitePool>(),
        parts.extensions.get::<Arc<Config>>(),
    ) else {
        error!("Auth extractor used on a router without pool and config extensions");
        return Err(AppError::Unauthorized("Authentication is unavailable"));
    };

    if token.is_empty() {
        return Err(AppError::Unauthorized("Missing or invalid Authorization header"));
    }

    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_ref()),
        &Validation::default(),
    )
    .map_err(|e| {
        warn!("Token decoding failed: {:?}", e);
        AppError::Unauthorized("Invalid token")
    })?
    .claims;

    let account = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = ?")
        .bind(claims.sub)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::Unauthorized("Account no longer exists"))?;

    if account.session_version != claims.ver {
        return Err(AppError::Unauthorized("Session has ended, please log in again"));
    }

    Ok(account)
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        let token = bearer_token(parts)
            .ok_or(AppError::Unauthorized("Missing or invalid Authorization header"))?;
        let account = authenticate(parts, token).await?;
        Ok(AuthUser(account))
    }
}

impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        match bearer_token(parts) {
            None => Ok(MaybeAuthUser(None)),
            Some(token) => Ok(MaybeAuthUser(Some(authenticate(parts, token).await?))),
        }
    }
}
