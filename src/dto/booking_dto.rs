use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Approved,
    Rejected,
    Conflicting,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Approved => "approved",
            BookingStatus::Rejected => "rejected",
            BookingStatus::Conflicting => "conflicting",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the booking request reached the club.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum BookingMethod {
    Web,
    Phone,
    Email,
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Booking {
    pub id: i64,
    pub pitch_id: i64,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub created_by: Option<i64>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub method: BookingMethod,
    pub status: BookingStatus,
    pub submitted_at: DateTime<Utc>,
}

/// Booking joined with the name of its pitch, which drives both the
/// approval rules and the notification text.
#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct BookingView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub booking: Booking,
    pub pitch_name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BookingForm {
    pub pitch_id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub method: Option<BookingMethod>,
}
