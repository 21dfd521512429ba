//! Consultation and treatment records, and the billable lines they produce.

use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::*;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum ConsultationStatus {
    #[default]
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl ConsultationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ConsultationStatus::Completed | ConsultationStatus::Cancelled
        )
    }

    pub fn can_transition_to(self, next: ConsultationStatus) -> bool {
        use ConsultationStatus::*;
        matches!(
            (self, next),
            (Scheduled, InProgress)
                | (Scheduled, Completed)
                | (Scheduled, Cancelled)
                | (InProgress, Completed)
                | (InProgress, Cancelled)
        )
    }
}

impl fmt::Display for ConsultationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConsultationStatus::Scheduled => "Scheduled",
            ConsultationStatus::InProgress => "In Progress",
            ConsultationStatus::Completed => "Completed",
            ConsultationStatus::Cancelled => "Cancelled",
        };
        f.write_str(label)
    }
}

impl FromStr for ConsultationStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized: String = value
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "scheduled" => Ok(ConsultationStatus::Scheduled),
            "inprogress" => Ok(ConsultationStatus::InProgress),
            "completed" => Ok(ConsultationStatus::Completed),
            "cancelled" | "canceled" => Ok(ConsultationStatus::Cancelled),
            _ => Err(DomainError::Validation(format!(
                "unknown consultation status `{}`",
                value.trim()
            ))),
        }
    }
}

impl StatusColored for ConsultationStatus {
    fn status_color(&self) -> DisplayColor {
        match self {
            ConsultationStatus::Scheduled => DisplayColor::Info,
            ConsultationStatus::InProgress => DisplayColor::Warning,
            ConsultationStatus::Completed => DisplayColor::Success,
            ConsultationStatus::Cancelled => DisplayColor::Danger,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
/// Clinical findings recorded during or after a visit.
pub struct Findings {
    pub diagnosis: Option<String>,
    pub weight_kg: Option<Decimal>,
    pub temperature_c: Option<Decimal>,
    pub cost: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// A medical visit for a pet with a veterinarian.
pub struct Consultation {
    pub id: Uuid,
    pub pet_id: Uuid,
    pub veterinarian_id: Uuid,
    pub scheduled_at: NaiveDateTime,
    pub reason: String,
    #[serde(default)]
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub weight_kg: Option<Decimal>,
    #[serde(default)]
    pub temperature_c: Option<Decimal>,
    #[serde(default)]
    pub cost: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub status: ConsultationStatus,
    #[serde(default)]
    pub registered_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Consultation {
    pub fn new(
        pet_id: Uuid,
        veterinarian_id: Uuid,
        scheduled_at: NaiveDateTime,
        reason: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            pet_id,
            veterinarian_id,
            scheduled_at,
            reason: reason.into(),
            diagnosis: None,
            weight_kg: None,
            temperature_c: None,
            cost: None,
            notes: None,
            status: ConsultationStatus::Scheduled,
            registered_by: None,
            created_at,
        }
    }

    pub fn registered_by(mut self, user_id: Uuid) -> Self {
        self.registered_by = Some(user_id);
        self
    }

    pub fn date(&self) -> NaiveDate {
        self.scheduled_at.date()
    }

    pub fn transition_to(&mut self, next: ConsultationStatus) -> Result<(), DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::Precondition(format!(
                "consultation cannot move from {} to {}",
                self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), DomainError> {
        self.transition_to(ConsultationStatus::InProgress)
    }

    pub fn complete(&mut self) -> Result<(), DomainError> {
        self.transition_to(ConsultationStatus::Completed)
    }

    pub fn cancel(&mut self) -> Result<(), DomainError> {
        self.transition_to(ConsultationStatus::Cancelled)
    }

    /// Stores clinical findings; fields left `None` keep their value.
    pub fn record_findings(&mut self, findings: Findings) -> Result<(), DomainError> {
        if self.status == ConsultationStatus::Cancelled {
            return Err(DomainError::Precondition(
                "cannot record findings on a cancelled consultation".into(),
            ));
        }
        for (label, value) in [
            ("weight", findings.weight_kg),
            ("temperature", findings.temperature_c),
            ("cost", findings.cost),
        ] {
            if value.is_some_and(|v| v < Decimal::ZERO) {
                return Err(DomainError::Validation(format!("{} cannot be negative", label)));
            }
        }
        if let Some(diagnosis) = clean_text(findings.diagnosis) {
            self.diagnosis = Some(diagnosis);
        }
        if let Some(notes) = clean_text(findings.notes) {
            self.notes = Some(notes);
        }
        self.weight_kg = findings.weight_kg.or(self.weight_kg);
        self.temperature_c = findings.temperature_c.or(self.temperature_c);
        self.cost = findings.cost.map(round_money).or(self.cost);
        Ok(())
    }

    /// Cost worth billing, if any.
    pub fn billable_cost(&self) -> Option<Decimal> {
        self.cost.filter(|cost| *cost > Decimal::ZERO)
    }
}

impl Identifiable for Consultation {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Displayable for Consultation {
    fn display_label(&self) -> String {
        format!(
            "{} {} [{}]",
            self.scheduled_at.format("%Y-%m-%d %H:%M"),
            self.reason,
            self.status
        )
    }
}

impl StatusColored for Consultation {
    fn status_color(&self) -> DisplayColor {
        self.status.status_color()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum TreatmentStatus {
    #[default]
    Active,
    Completed,
    Suspended,
}

impl fmt::Display for TreatmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TreatmentStatus::Active => "Active",
            TreatmentStatus::Completed => "Completed",
            TreatmentStatus::Suspended => "Suspended",
        };
        f.write_str(label)
    }
}

impl FromStr for TreatmentStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(TreatmentStatus::Active),
            "completed" => Ok(TreatmentStatus::Completed),
            "suspended" => Ok(TreatmentStatus::Suspended),
            other => Err(DomainError::Validation(format!(
                "unknown treatment status `{}`",
                other
            ))),
        }
    }
}

impl StatusColored for TreatmentStatus {
    fn status_color(&self) -> DisplayColor {
        match self {
            TreatmentStatus::Active => DisplayColor::Primary,
            TreatmentStatus::Completed => DisplayColor::Success,
            TreatmentStatus::Suspended => DisplayColor::Warning,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// A prescribed remedy tied to a consultation.
pub struct Treatment {
    pub id: Uuid,
    pub consultation_id: Uuid,
    pub description: String,
    #[serde(default)]
    pub medication: Option<String>,
    #[serde(default)]
    pub dose: Option<String>,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default)]
    pub duration_days: Option<u32>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub cost: Option<Decimal>,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    pub status: TreatmentStatus,
}

impl Treatment {
    pub fn new(consultation_id: Uuid, description: impl Into<String>, start_date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            consultation_id,
            description: description.into(),
            medication: None,
            dose: None,
            frequency: None,
            duration_days: None,
            instructions: None,
            cost: None,
            start_date,
            end_date: None,
            status: TreatmentStatus::Active,
        }
    }

    pub fn with_cost(mut self, cost: Option<Decimal>) -> Self {
        self.cost = cost.map(round_money);
        self
    }

    pub fn complete(&mut self, on: NaiveDate) -> Result<(), DomainError> {
        self.ensure_active("complete")?;
        self.status = TreatmentStatus::Completed;
        self.end_date = Some(on);
        Ok(())
    }

    pub fn suspend(&mut self, on: NaiveDate) -> Result<(), DomainError> {
        self.ensure_active("suspend")?;
        self.status = TreatmentStatus::Suspended;
        self.end_date = Some(on);
        Ok(())
    }

    pub fn billable_cost(&self) -> Option<Decimal> {
        self.cost.filter(|cost| *cost > Decimal::ZERO)
    }

    fn ensure_active(&self, action: &str) -> Result<(), DomainError> {
        if self.status == TreatmentStatus::Active {
            Ok(())
        } else {
            Err(DomainError::Precondition(format!(
                "cannot {} a treatment that is {}",
                action, self.status
            )))
        }
    }
}

impl Identifiable for Treatment {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl StatusColored for Treatment {
    fn status_color(&self) -> DisplayColor {
        self.status.status_color()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Line destined for an invoice generated from a consultation.
pub struct BillableLine {
    pub description: String,
    pub unit_price: Decimal,
}

/// Lines for the consultation itself and each of its costed treatments.
pub fn billable_lines<'a>(
    consultation: &Consultation,
    treatments: impl IntoIterator<Item = &'a Treatment>,
) -> Vec<BillableLine> {
    let mut lines = Vec::new();
    if let Some(cost) = consultation.billable_cost() {
        lines.push(BillableLine {
            description: format!("Consultation: {}", consultation.reason),
            unit_price: cost,
        });
    }
    for treatment in treatments {
        if treatment.consultation_id != consultation.id {
            continue;
        }
        if let Some(cost) = treatment.billable_cost() {
            lines.push(BillableLine {
                description: format!("Treatment: {}", treatment.description),
                unit_price: cost,
            });
        }
    }
    lines
}
