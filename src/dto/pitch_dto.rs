use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Pitch {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub is_public: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreatePitch {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_public: bool,
}
