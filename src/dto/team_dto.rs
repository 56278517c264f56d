use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum AgeGroup {
    U7,
    U8,
    U9,
    U10,
    U11,
    U12,
    U13,
    U14,
    U15,
    U16,
    Minor,
    U21,
    Reserve,
    Senior,
}

impl AgeGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgeGroup::U7 => "U7",
            AgeGroup::U8 => "U8",
            AgeGroup::U9 => "U9",
            AgeGroup::U10 => "U10",
            AgeGroup::U11 => "U11",
            AgeGroup::U12 => "U12",
            AgeGroup::U13 => "U13",
            AgeGroup::U14 => "U14",
            AgeGroup::U15 => "U15",
            AgeGroup::U16 => "U16",
            AgeGroup::Minor => "Minor",
            AgeGroup::U21 => "U21",
            AgeGroup::Reserve => "Reserve",
            AgeGroup::Senior => "Senior",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Gender {
    Boys,
    Girls,
    Men,
    Women,
    Mixed,
}

impl Gender {
    pub fn label(&self) -> &'static str {
        match self {
            Gender::Boys => "Boys",
            Gender::Girls => "Girls",
            Gender::Men => "Men",
            Gender::Women => "Women",
            Gender::Mixed => "Mixed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Sport {
    Football,
    Hurling,
    Camogie,
}

impl Sport {
    pub fn label(&self) -> &'static str {
        match self {
            Sport::Football => "Football",
            Sport::Hurling => "Hurling",
            Sport::Camogie => "Camogie",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Team {
    pub id: i64,
    pub age_group: AgeGroup,
    pub gender: Gender,
    pub sport: Sport,
    pub coach_id: Option<i64>,
}

impl Team {
    /// e.g. "U12 Girls (Camogie)".
    pub fn label(&self) -> String {
        format!("{} {} ({})", self.age_group.as_str(), self.gender.label(), self.sport.label())
    }
}

#[derive(Debug, Serialize)]
pub struct TeamResponse {
    #[serde(flatten)]
    pub team: Team,
    pub label: String,
}

impl From<Team> for TeamResponse {
    fn from(team: Team) -> Self {
        let label = team.label();
        Self { team, label }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TeamForm {
    pub age_group: AgeGroup,
    pub gender: Gender,
    pub sport: Sport,
    pub coach_id: Option<i64>,
}
