//! Consultations (visits) and the treatments prescribed during them.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;
use vetcare_domain::{
    clean_text, round_money, Actor, ClinicRecords, Consultation, ConsultationStatus, Findings,
    InvoiceStatus, Treatment, TreatmentStatus,
};

use crate::{
    input::{FieldError, FieldErrorKind, FormInput},
    CoreError, CoreResult,
};

#[derive(Debug, Clone, PartialEq)]
pub struct ConsultationInput {
    pub pet_id: Uuid,
    pub veterinarian_id: Uuid,
    pub scheduled_at: NaiveDateTime,
    pub reason: String,
}

impl TryFrom<&FormInput> for ConsultationInput {
    type Error = FieldError;

    fn try_from(form: &FormInput) -> Result<Self, Self::Error> {
        let scheduled_at = match (form.raw("date"), form.raw("time")) {
            (Some(day), Some(time)) => {
                NaiveDateTime::parse_from_str(&format!("{} {}", day, time), "%Y-%m-%d %H:%M")
                    .map_err(|_| FieldError::new("time", FieldErrorKind::InvalidDate))?
            }
            _ => form.datetime("scheduled_at")?,
        };
        Ok(Self {
            pet_id: form.id("pet_id")?,
            veterinarian_id: form.id("veterinarian_id")?,
            scheduled_at,
            reason: form.text("reason")?,
        })
    }
}

/// Findings recorded while attending a visit, plus the status it ends in.
#[derive(Debug, Clone, PartialEq)]
pub struct AttendInput {
    pub findings: Findings,
    pub status: ConsultationStatus,
}

impl TryFrom<&FormInput> for AttendInput {
    type Error = FieldError;

    fn try_from(form: &FormInput) -> Result<Self, Self::Error> {
        Ok(Self {
            findings: Findings {
                diagnosis: form.optional_text("diagnosis"),
                weight_kg: form.optional_decimal("weight_kg")?,
                temperature_c: form.optional_decimal("temperature_c")?,
                cost: form.optional_decimal("cost")?,
                notes: form.optional_text("notes"),
            },
            status: form
                .optional_choice("status")?
                .unwrap_or(ConsultationStatus::Completed),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreatmentInput {
    pub description: String,
    pub medication: Option<String>,
    pub dose: Option<String>,
    pub frequency: Option<String>,
    pub duration_days: Option<u32>,
    pub instructions: Option<String>,
    pub cost: Option<Decimal>,
    pub start_date: Option<NaiveDate>,
}

impl TryFrom<&FormInput> for TreatmentInput {
    type Error = FieldError;

    fn try_from(form: &FormInput) -> Result<Self, Self::Error> {
        Ok(Self {
            description: form.text("description")?,
            medication: form.optional_text("medication"),
            dose: form.optional_text("dose"),
            frequency: form.optional_text("frequency"),
            duration_days: form.optional_count("duration_days")?,
            instructions: form.optional_text("instructions"),
            cost: form.optional_decimal("cost")?,
            start_date: form.optional_date("start_date")?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsultationFilter {
    pub status: Option<ConsultationStatus>,
    pub day: Option<NaiveDate>,
    pub pet_id: Option<Uuid>,
    pub veterinarian_id: Option<Uuid>,
}

pub struct ConsultationService;

impl ConsultationService {
    pub fn schedule(
        records: &mut ClinicRecords,
        input: ConsultationInput,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> CoreResult<Uuid> {
        let pet = records
            .pet(input.pet_id)
            .ok_or_else(|| CoreError::not_found("pet", input.pet_id))?;
        if !pet.active {
            return Err(CoreError::Precondition(format!("pet {} is inactive", pet.name)));
        }
        let vet = records
            .veterinarian(input.veterinarian_id)
            .ok_or_else(|| CoreError::not_found("veterinarian", input.veterinarian_id))?;
        if !vet.active {
            return Err(CoreError::Precondition(format!(
                "veterinarian {} is inactive",
                vet.full_name
            )));
        }
        let reason = input.reason.trim();
        if reason.is_empty() {
            return Err(CoreError::Validation("a consultation needs a reason".into()));
        }

        let consultation = Consultation::new(
            input.pet_id,
            input.veterinarian_id,
            input.scheduled_at,
            reason,
            now,
        )
        .registered_by(actor.user_id);
        let id = consultation.id;
        records.consultations.push(consultation);
        Ok(id)
    }

    pub fn start(records: &mut ClinicRecords, id: Uuid) -> CoreResult<()> {
        Ok(Self::consultation_mut(records, id)?.start()?)
    }

    pub fn complete(records: &mut ClinicRecords, id: Uuid) -> CoreResult<()> {
        Ok(Self::consultation_mut(records, id)?.complete()?)
    }

    pub fn cancel(records: &mut ClinicRecords, id: Uuid) -> CoreResult<()> {
        if let Some(invoice) = records.invoice_for_consultation(id) {
            if invoice.status != InvoiceStatus::Voided {
                return Err(CoreError::Precondition(format!(
                    "consultation is billed on invoice {}; void it first",
                    invoice.number
                )));
            }
        }
        Ok(Self::consultation_mut(records, id)?.cancel()?)
    }

    pub fn record_findings(
        records: &mut ClinicRecords,
        id: Uuid,
        findings: Findings,
    ) -> CoreResult<()> {
        Ok(Self::consultation_mut(records, id)?.record_findings(findings)?)
    }

    /// Records findings and moves the visit to `input.status`.
    ///
    /// A measured weight also becomes the pet's current weight.
    pub fn attend(records: &mut ClinicRecords, id: Uuid, input: AttendInput) -> CoreResult<()> {
        let weight = input.findings.weight_kg;
        let consultation = Self::consultation_mut(records, id)?;
        consultation.record_findings(input.findings)?;
        if consultation.status != input.status {
            consultation.transition_to(input.status)?;
        }
        let pet_id = consultation.pet_id;
        if let (Some(weight), Some(pet)) = (weight, records.pet_mut(pet_id)) {
            pet.weight_kg = Some(weight);
        }
        Ok(())
    }

    /// Matching consultations, newest first.
    pub fn list<'a>(
        records: &'a ClinicRecords,
        filter: &ConsultationFilter,
    ) -> Vec<&'a Consultation> {
        let mut found: Vec<&Consultation> = records
            .consultations
            .iter()
            .filter(|c| filter.status.map_or(true, |status| c.status == status))
            .filter(|c| filter.day.map_or(true, |day| c.date() == day))
            .filter(|c| filter.pet_id.map_or(true, |pet| c.pet_id == pet))
            .filter(|c| filter.veterinarian_id.map_or(true, |vet| c.veterinarian_id == vet))
            .collect();
        found.sort_by(|a, b| b.scheduled_at.cmp(&a.scheduled_at));
        found
    }

    /// The day's agenda in chronological order.
    pub fn agenda(records: &ClinicRecords, day: NaiveDate) -> Vec<&Consultation> {
        let mut found: Vec<&Consultation> = records
            .consultations
            .iter()
            .filter(|c| c.date() == day)
            .collect();
        found.sort_by_key(|c| c.scheduled_at);
        found
    }

    pub fn add_treatment(
        records: &mut ClinicRecords,
        consultation_id: Uuid,
        input: TreatmentInput,
        today: NaiveDate,
    ) -> CoreResult<Uuid> {
        let consultation = Self::consultation(records, consultation_id)?;
        if consultation.status == ConsultationStatus::Cancelled {
            return Err(CoreError::Precondition(
                "cannot prescribe treatments on a cancelled consultation".into(),
            ));
        }
        let mut treatment = Treatment::new(consultation_id, "", input.start_date.unwrap_or(today));
        Self::apply_treatment_fields(&mut treatment, input)?;
        let id = treatment.id;
        records.treatments.push(treatment);
        Ok(id)
    }

    pub fn update_treatment(
        records: &mut ClinicRecords,
        treatment_id: Uuid,
        input: TreatmentInput,
    ) -> CoreResult<()> {
        let treatment = Self::treatment_mut(records, treatment_id)?;
        Self::apply_treatment_fields(treatment, input)
    }

    pub fn complete_treatment(
        records: &mut ClinicRecords,
        treatment_id: Uuid,
        today: NaiveDate,
    ) -> CoreResult<()> {
        Ok(Self::treatment_mut(records, treatment_id)?.complete(today)?)
    }

    pub fn suspend_treatment(
        records: &mut ClinicRecords,
        treatment_id: Uuid,
        today: NaiveDate,
    ) -> CoreResult<()> {
        Ok(Self::treatment_mut(records, treatment_id)?.suspend(today)?)
    }

    /// Deletes a treatment whose consultation has not been billed.
    pub fn remove_treatment(records: &mut ClinicRecords, treatment_id: Uuid) -> CoreResult<Treatment> {
        let consultation_id = records
            .treatment(treatment_id)
            .ok_or_else(|| CoreError::not_found("treatment", treatment_id))?
            .consultation_id;
        if let Some(invoice) = records.invoice_for_consultation(consultation_id) {
            return Err(CoreError::Precondition(format!(
                "treatment is already billed on invoice {}",
                invoice.number
            )));
        }
        let index = records
            .treatments
            .iter()
            .position(|treatment| treatment.id == treatment_id)
            .ok_or_else(|| CoreError::not_found("treatment", treatment_id))?;
        Ok(records.treatments.remove(index))
    }

    pub fn treatments(records: &ClinicRecords, status: Option<TreatmentStatus>) -> Vec<&Treatment> {
        let mut found: Vec<&Treatment> = records
            .treatments
            .iter()
            .filter(|treatment| status.map_or(true, |status| treatment.status == status))
            .collect();
        found.sort_by(|a, b| b.start_date.cmp(&a.start_date));
        found
    }

    fn apply_treatment_fields(treatment: &mut Treatment, input: TreatmentInput) -> CoreResult<()> {
        let description = input.description.trim();
        if description.is_empty() {
            return Err(CoreError::Validation("a treatment needs a description".into()));
        }
        if input.cost.is_some_and(|cost| cost < Decimal::ZERO) {
            return Err(CoreError::Validation("treatment cost cannot be negative".into()));
        }
        treatment.description = description.to_string();
        treatment.medication = clean_text(input.medication);
        treatment.dose = clean_text(input.dose);
        treatment.frequency = clean_text(input.frequency);
        treatment.duration_days = input.duration_days;
        treatment.instructions = clean_text(input.instructions);
        treatment.cost = input.cost.map(round_money);
        if let Some(start) = input.start_date {
            treatment.start_date = start;
        }
        Ok(())
    }

    fn consultation(records: &ClinicRecords, id: Uuid) -> CoreResult<&Consultation> {
        records
            .consultation(id)
            .ok_or_else(|| CoreError::not_found("consultation", id))
    }

    fn consultation_mut(records: &mut ClinicRecords, id: Uuid) -> CoreResult<&mut Consultation> {
        records
            .consultation_mut(id)
            .ok_or_else(|| CoreError::not_found("consultation", id))
    }

    fn treatment_mut(records: &mut ClinicRecords, id: Uuid) -> CoreResult<&mut Treatment> {
        records
            .treatment_mut(id)
            .ok_or_else(|| CoreError::not_found("treatment", id))
    }
}
