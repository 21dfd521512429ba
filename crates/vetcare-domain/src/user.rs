//! Staff accounts, roles, and the acting identity carried into services.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::common::*;

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Role {
    Administrator,
    Veterinarian,
    Receptionist,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Role::Administrator => "Administrator",
            Role::Veterinarian => "Veterinarian",
            Role::Receptionist => "Receptionist",
        };
        f.write_str(label)
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "administrator" | "admin" => Ok(Role::Administrator),
            "veterinarian" | "vet" => Ok(Role::Veterinarian),
            "receptionist" => Ok(Role::Receptionist),
            other => Err(DomainError::Validation(format!("unknown role `{}`", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub role: Role,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        full_name: impl Into<String>,
        role: Role,
        password: &str,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            email: email.into(),
            full_name: full_name.into(),
            password_hash: hash_password(password),
            role,
            active: true,
            created_at,
            last_login: None,
        }
    }

    pub fn set_password(&mut self, password: &str) {
        self.password_hash = hash_password(password);
    }

    pub fn verify_password(&self, password: &str) -> bool {
        verify_password(&self.password_hash, password)
    }

    pub fn is_active_admin(&self) -> bool {
        self.active && self.role == Role::Administrator
    }

    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.id,
            username: self.username.clone(),
            role: self.role,
        }
    }
}

impl Identifiable for User {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Displayable for User {
    fn display_label(&self) -> String {
        format!("{} ({})", self.username, self.role)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// The authenticated user on whose behalf an operation runs.
pub struct Actor {
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Administrator
    }
}

/// Salted SHA-256 digest stored as `salt$hex`.
pub fn hash_password(password: &str) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    format!("{}${}", salt, digest(&salt, password))
}

pub fn verify_password(stored: &str, candidate: &str) -> bool {
    match stored.split_once('$') {
        Some((salt, expected)) => digest(salt, candidate) == expected,
        None => false,
    }
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}
