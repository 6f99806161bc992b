// src/models/user.rs

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Portal a user belongs to. Stored in the 'users.role' column and carried in JWT claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Lecturer,
    Admin,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Lecturer => "lecturer",
            Self::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "student" => Ok(Self::Student),
            "lecturer" => Ok(Self::Lecturer),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Student fields loaded alongside mastery records.
/// Credentials live with the authentication service, not here.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct StudentSummary {
    pub id: i64,
    pub username: String,
    pub full_name: String,
}
