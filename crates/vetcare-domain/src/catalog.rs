//! Reference catalogs the clinic bills and schedules against.

use std::{fmt, str::FromStr};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::*;

/// Interval applied to vaccines registered without one.
pub const DEFAULT_VACCINE_INTERVAL_DAYS: u32 = 365;
/// Longest dose interval the catalog accepts (about a century).
pub const MAX_VACCINE_INTERVAL_DAYS: u32 = 36_500;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Species {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub active: bool,
}

impl Species {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            active: true,
        }
    }
}

impl Identifiable for Species {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl NamedEntity for Species {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Vaccine catalog entry; drives dose intervals for the scheduler.
pub struct Vaccine {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub interval_days: u32,
    /// `None` means the vaccine applies to every species.
    #[serde(default)]
    pub species_id: Option<Uuid>,
    pub doses_required: u32,
    #[serde(default)]
    pub min_age_days: Option<u32>,
    pub active: bool,
}

impl Vaccine {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            interval_days: DEFAULT_VACCINE_INTERVAL_DAYS,
            species_id: None,
            doses_required: 1,
            min_age_days: None,
            active: true,
        }
    }

    pub fn with_interval(mut self, days: u32) -> Self {
        self.interval_days = days;
        self
    }

    pub fn for_species(mut self, species_id: Option<Uuid>) -> Self {
        self.species_id = species_id;
        self
    }

    pub fn with_doses(mut self, doses: u32) -> Self {
        self.doses_required = doses.max(1);
        self
    }

    /// Interval used to compute the next dose; zero means none.
    pub fn dose_interval(&self) -> Option<u32> {
        (self.interval_days > 0).then_some(self.interval_days)
    }

    pub fn applies_to(&self, species_id: Uuid) -> bool {
        self.species_id.map_or(true, |id| id == species_id)
    }

    /// Human-readable interval, coarsened to years or months when possible.
    pub fn interval_text(&self) -> String {
        let days = self.interval_days;
        if days >= 365 {
            format!("Every {} year(s)", days / 365)
        } else if days >= 30 {
            format!("Every {} month(s)", days / 30)
        } else {
            format!("Every {} day(s)", days)
        }
    }
}

impl Identifiable for Vaccine {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl NamedEntity for Vaccine {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum ServiceCategory {
    #[default]
    Consultation,
    Vaccination,
    Surgery,
    Laboratory,
    Grooming,
    Pharmacy,
    Other,
}

impl fmt::Display for ServiceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ServiceCategory::Consultation => "Consultation",
            ServiceCategory::Vaccination => "Vaccination",
            ServiceCategory::Surgery => "Surgery",
            ServiceCategory::Laboratory => "Laboratory",
            ServiceCategory::Grooming => "Grooming",
            ServiceCategory::Pharmacy => "Pharmacy",
            ServiceCategory::Other => "Other",
        };
        f.write_str(label)
    }
}

impl FromStr for ServiceCategory {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "consultation" => Ok(ServiceCategory::Consultation),
            "vaccination" => Ok(ServiceCategory::Vaccination),
            "surgery" => Ok(ServiceCategory::Surgery),
            "laboratory" => Ok(ServiceCategory::Laboratory),
            "grooming" => Ok(ServiceCategory::Grooming),
            "pharmacy" => Ok(ServiceCategory::Pharmacy),
            "other" => Ok(ServiceCategory::Other),
            other => Err(DomainError::Validation(format!(
                "unknown service category `{}`",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Billable service offered by the clinic.
pub struct Service {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub category: ServiceCategory,
    pub price: Decimal,
    pub active: bool,
}

impl Service {
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        category: ServiceCategory,
        price: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            code: code.into(),
            name: name.into(),
            description: None,
            category,
            price: round_money(price),
            active: true,
        }
    }

    /// Catalog code for the `sequence`-th service, e.g. `SRV-0007`.
    pub fn code_for(sequence: u32) -> String {
        format!("SRV-{:04}", sequence)
    }

    /// Sequence number encoded in a generated code.
    pub fn code_sequence(code: &str) -> Option<u32> {
        code.strip_prefix("SRV-")?.parse().ok()
    }
}

impl Identifiable for Service {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl NamedEntity for Service {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Displayable for Service {
    fn display_label(&self) -> String {
        format!("{} {}", self.code, self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Veterinarian {
    pub id: Uuid,
    pub full_name: String,
    /// Professional license ("colegiatura") number.
    pub license_number: String,
    #[serde(default)]
    pub specialty: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    pub active: bool,
}

impl Veterinarian {
    pub fn new(full_name: impl Into<String>, license_number: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            full_name: full_name.into(),
            license_number: license_number.into(),
            specialty: None,
            phone: None,
            email: None,
            user_id: None,
            active: true,
        }
    }
}

impl Identifiable for Veterinarian {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl NamedEntity for Veterinarian {
    fn name(&self) -> &str {
        &self.full_name
    }
}
