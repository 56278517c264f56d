use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    Coach,
    Manager,
    Chairman,
    Secretary,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Coach => "coach",
            Role::Manager => "manager",
            Role::Chairman => "chairman",
            Role::Secretary => "secretary",
        }
    }

    /// Chairman and secretary, who run the main pitch and the team list.
    pub fn is_officer(&self) -> bool {
        matches!(self, Role::Chairman | Role::Secretary)
    }

    /// Roles allowed to act on any booking and to approve or reject.
    pub fn is_privileged(&self) -> bool {
        matches!(self, Role::Manager | Role::Chairman | Role::Secretary)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Option<Role>,
    pub is_staff: bool,
    #[serde(skip_serializing)]
    pub session_version: i64,
    #[serde(skip_serializing)]
    pub reset_token: Option<String>,
    #[serde(skip_serializing)]
    pub reset_expires_at: Option<DateTime<Utc>>,
    pub date_joined: DateTime<Utc>,
}

impl Account {
    /// Full name when one is set, otherwise the username.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }

    pub fn has_role(&self, roles: &[Role]) -> bool {
        self.role.is_some_and(|r| roles.contains(&r))
    }

    pub fn is_privileged(&self) -> bool {
        self.role.is_some_and(|r| r.is_privileged())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: i64,
    pub ver: i64,
    pub exp: usize,
}

#[derive(Debug, Deserialize)]
pub struct RegisterAccount {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginAccount {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub account: Account,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfile {
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetConfirm {
    pub token: String,
    pub password: String,
    pub password_confirm: String,
}

#[derive(Debug, Deserialize)]
pub struct AssignRole {
    pub role: Option<Role>,
    pub is_staff: Option<bool>,
}
