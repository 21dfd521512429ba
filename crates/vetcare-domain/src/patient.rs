//! Owners and their pets.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::*;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Owner {
    pub id: Uuid,
    /// National identity or tax document; unique across owners.
    pub document_number: String,
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Owner {
    pub fn new(
        document_number: impl Into<String>,
        full_name: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_number: document_number.into(),
            full_name: full_name.into(),
            phone: None,
            email: None,
            address: None,
            active: true,
            created_at,
        }
    }

    pub fn matches(&self, term: &str) -> bool {
        let needle = term.trim().to_lowercase();
        needle.is_empty()
            || self.full_name.to_lowercase().contains(&needle)
            || self.document_number.to_lowercase().contains(&needle)
            || self
                .phone
                .as_deref()
                .is_some_and(|phone| phone.contains(&needle))
    }
}

impl Identifiable for Owner {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl NamedEntity for Owner {
    fn name(&self) -> &str {
        &self.full_name
    }
}

impl Displayable for Owner {
    fn display_label(&self) -> String {
        format!("{} ({})", self.full_name, self.document_number)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Sex {
    Male,
    Female,
    #[default]
    Unknown,
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Sex::Male => "Male",
            Sex::Female => "Female",
            Sex::Unknown => "Not specified",
        };
        f.write_str(label)
    }
}

impl FromStr for Sex {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "m" | "male" => Ok(Sex::Male),
            "f" | "female" => Ok(Sex::Female),
            "" | "unknown" => Ok(Sex::Unknown),
            other => Err(DomainError::Validation(format!("unknown sex `{}`", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pet {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub species_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub breed: Option<String>,
    #[serde(default)]
    pub sex: Sex,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub weight_kg: Option<Decimal>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub active: bool,
}

impl Pet {
    pub fn new(owner_id: Uuid, species_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            species_id,
            name: name.into(),
            breed: None,
            sex: Sex::Unknown,
            birth_date: None,
            weight_kg: None,
            color: None,
            notes: None,
            active: true,
        }
    }

    /// Completed years of age on `today`.
    pub fn age_years(&self, today: NaiveDate) -> Option<i32> {
        let born = self.birth_date?;
        let mut years = today.year() - born.year();
        if (today.month(), today.day()) < (born.month(), born.day()) {
            years -= 1;
        }
        Some(years.max(0))
    }

    /// Age in whole days on `today`.
    pub fn age_days(&self, today: NaiveDate) -> Option<i64> {
        self.birth_date.map(|born| (today - born).num_days().max(0))
    }

    /// Approximate age text using 365-day years and 30-day months.
    pub fn age_text(&self, today: NaiveDate) -> String {
        let Some(days) = self.age_days(today) else {
            return "Not specified".into();
        };
        let years = days / 365;
        let months = (days % 365) / 30;
        if years > 0 {
            format!("{} year(s), {} month(s)", years, months)
        } else if months > 0 {
            format!("{} month(s)", months)
        } else {
            format!("{} day(s)", days)
        }
    }
}

impl Identifiable for Pet {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl NamedEntity for Pet {
    fn name(&self) -> &str {
        &self.name
    }
}
