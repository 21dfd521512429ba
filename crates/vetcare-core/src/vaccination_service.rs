//! Vaccination scheduling, application and reminder queries.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use uuid::Uuid;
use vetcare_domain::{
    mark_overdue_all, Actor, ClinicRecords, ScheduledVaccination, VaccinationStatus,
    VaccineApplication,
};

use crate::{
    input::{FieldError, FormInput},
    CoreError, CoreResult,
};

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleVaccinationInput {
    pub pet_id: Uuid,
    pub vaccine_id: Uuid,
    pub scheduled_date: NaiveDate,
    pub dose_number: u32,
    pub notes: Option<String>,
}

impl TryFrom<&FormInput> for ScheduleVaccinationInput {
    type Error = FieldError;

    fn try_from(form: &FormInput) -> Result<Self, Self::Error> {
        Ok(Self {
            pet_id: form.id("pet_id")?,
            vaccine_id: form.id("vaccine_id")?,
            scheduled_date: form.date("scheduled_date")?,
            dose_number: form.quantity("dose_number")?,
            notes: form.optional_text("notes"),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyVaccinationInput {
    pub veterinarian_id: Option<Uuid>,
    pub batch: Option<String>,
    pub notes: Option<String>,
    /// Creates the Pending record for the next dose when the vaccine has an interval.
    pub schedule_next: bool,
}

impl TryFrom<&FormInput> for ApplyVaccinationInput {
    type Error = FieldError;

    fn try_from(form: &FormInput) -> Result<Self, Self::Error> {
        Ok(Self {
            veterinarian_id: form.optional_id("veterinarian_id")?,
            batch: form.optional_text("batch"),
            notes: form.optional_text("notes"),
            schedule_next: form.flag("schedule_next"),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedVaccination {
    pub next_due_date: Option<NaiveDate>,
    pub next_dose_id: Option<Uuid>,
}

/// Longest look-ahead accepted by `upcoming`.
pub const MAX_WINDOW_DAYS: i64 = 36_500;

pub struct VaccinationService;

impl VaccinationService {
    pub fn schedule(
        records: &mut ClinicRecords,
        input: ScheduleVaccinationInput,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> CoreResult<Uuid> {
        let pet = records
            .pet(input.pet_id)
            .ok_or_else(|| CoreError::not_found("pet", input.pet_id))?;
        if !pet.active {
            return Err(CoreError::Precondition(format!("pet {} is inactive", pet.name)));
        }
        let vaccine = records
            .vaccine(input.vaccine_id)
            .ok_or_else(|| CoreError::not_found("vaccine", input.vaccine_id))?;
        if !vaccine.active {
            return Err(CoreError::Precondition(format!(
                "vaccine {} is inactive",
                vaccine.name
            )));
        }
        if !vaccine.applies_to(pet.species_id) {
            return Err(CoreError::Validation(format!(
                "vaccine {} is not meant for the species of {}",
                vaccine.name, pet.name
            )));
        }

        let record = ScheduledVaccination::new(
            input.pet_id,
            input.vaccine_id,
            input.scheduled_date,
            input.dose_number,
            now,
        )
        .with_notes(input.notes)
        .registered_by(actor.user_id);
        let id = record.id;
        records.vaccinations.push(record);
        Ok(id)
    }

    /// Records the dose as applied today and optionally books the next one.
    pub fn apply(
        records: &mut ClinicRecords,
        vaccination_id: Uuid,
        input: ApplyVaccinationInput,
        now: DateTime<Utc>,
    ) -> CoreResult<AppliedVaccination> {
        if let Some(vet_id) = input.veterinarian_id {
            let vet = records
                .veterinarian(vet_id)
                .ok_or_else(|| CoreError::not_found("veterinarian", vet_id))?;
            if !vet.active {
                return Err(CoreError::Precondition(format!(
                    "veterinarian {} is inactive",
                    vet.full_name
                )));
            }
        }
        let vaccine_id = Self::record(records, vaccination_id)?.vaccine_id;
        let interval = records
            .vaccine(vaccine_id)
            .and_then(|vaccine| vaccine.dose_interval());

        let record = Self::record_mut(records, vaccination_id)?;
        let next_due_date = record.apply(
            VaccineApplication {
                veterinarian_id: input.veterinarian_id,
                batch: input.batch,
                notes: input.notes,
            },
            now.date_naive(),
            interval,
        )?;
        let next = if input.schedule_next {
            record.next_dose(now)?
        } else {
            None
        };

        let next_dose_id = next.map(|dose| {
            let id = dose.id;
            records.vaccinations.push(dose);
            id
        });
        Ok(AppliedVaccination {
            next_due_date,
            next_dose_id,
        })
    }

    pub fn cancel(records: &mut ClinicRecords, vaccination_id: Uuid) -> CoreResult<()> {
        Ok(Self::record_mut(records, vaccination_id)?.cancel()?)
    }

    pub fn mark_reminder_sent(records: &mut ClinicRecords, vaccination_id: Uuid) -> CoreResult<()> {
        let record = Self::record_mut(records, vaccination_id)?;
        if record.status.is_terminal() {
            return Err(CoreError::Precondition(format!(
                "no reminder is needed for a dose that is {}",
                record.status
            )));
        }
        record.mark_reminder_sent();
        Ok(())
    }

    /// Moves every late Pending dose to Overdue. Safe to run repeatedly.
    pub fn sweep_overdue(records: &mut ClinicRecords, today: NaiveDate) -> usize {
        mark_overdue_all(records.vaccinations.iter_mut(), today)
    }

    /// Pending doses inside the reminder window that were not reminded yet.
    pub fn reminders_due(
        records: &ClinicRecords,
        today: NaiveDate,
        window_days: i64,
    ) -> Vec<&ScheduledVaccination> {
        let mut due: Vec<&ScheduledVaccination> = records
            .vaccinations
            .iter()
            .filter(|record| record.needs_reminder_within(today, window_days))
            .collect();
        due.sort_by_key(|record| record.scheduled_date);
        due
    }

    /// Pending doses scheduled from today through `days` ahead.
    pub fn upcoming(
        records: &ClinicRecords,
        today: NaiveDate,
        days: i64,
    ) -> Vec<&ScheduledVaccination> {
        let until = today
            .checked_add_signed(Duration::days(days.clamp(0, MAX_WINDOW_DAYS)))
            .unwrap_or(NaiveDate::MAX);
        let mut found: Vec<&ScheduledVaccination> = records
            .vaccinations
            .iter()
            .filter(|record| record.status == VaccinationStatus::Pending)
            .filter(|record| record.scheduled_date >= today && record.scheduled_date <= until)
            .collect();
        found.sort_by_key(|record| record.scheduled_date);
        found
    }

    pub fn overdue(records: &ClinicRecords, today: NaiveDate) -> Vec<&ScheduledVaccination> {
        let mut found: Vec<&ScheduledVaccination> = records
            .vaccinations
            .iter()
            .filter(|record| record.is_late(today))
            .collect();
        found.sort_by_key(|record| record.scheduled_date);
        found
    }

    pub fn history_for_pet(
        records: &ClinicRecords,
        pet_id: Uuid,
    ) -> CoreResult<Vec<&ScheduledVaccination>> {
        if records.pet(pet_id).is_none() {
            return Err(CoreError::not_found("pet", pet_id));
        }
        let mut history: Vec<&ScheduledVaccination> = records.vaccinations_for(pet_id).collect();
        history.sort_by(|a, b| {
            b.scheduled_date
                .cmp(&a.scheduled_date)
                .then_with(|| b.dose_number.cmp(&a.dose_number))
        });
        Ok(history)
    }

    /// Calendar view: every dose scheduled within one month.
    pub fn in_month(
        records: &ClinicRecords,
        year: i32,
        month: u32,
    ) -> CoreResult<Vec<&ScheduledVaccination>> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| CoreError::Validation(format!("invalid month {}-{}", year, month)))?;
        let next_month = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or_else(|| CoreError::Validation(format!("invalid month {}-{}", year, month)))?;
        let mut found: Vec<&ScheduledVaccination> = records
            .vaccinations
            .iter()
            .filter(|record| record.scheduled_date >= first && record.scheduled_date < next_month)
            .collect();
        found.sort_by_key(|record| record.scheduled_date);
        Ok(found)
    }

    fn record(records: &ClinicRecords, id: Uuid) -> CoreResult<&ScheduledVaccination> {
        records
            .vaccination(id)
            .ok_or_else(|| CoreError::not_found("vaccination", id))
    }

    fn record_mut(records: &mut ClinicRecords, id: Uuid) -> CoreResult<&mut ScheduledVaccination> {
        records
            .vaccination_mut(id)
            .ok_or_else(|| CoreError::not_found("vaccination", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use vetcare_domain::{Owner, Pet, Role, Species, Vaccine};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(day: NaiveDate) -> DateTime<Utc> {
        Utc.from_utc_datetime(&day.and_hms_opt(12, 0, 0).unwrap())
    }

    fn actor() -> Actor {
        Actor {
            user_id: Uuid::new_v4(),
            username: "dr.vega".into(),
            role: Role::Veterinarian,
        }
    }

    struct Fixture {
        records: ClinicRecords,
        pet_id: Uuid,
        vaccine_id: Uuid,
    }

    fn fixture(interval_days: u32) -> Fixture {
        let mut records = ClinicRecords::new();
        let dog = Species::new("Dog");
        let owner = Owner::new("70001111", "Carlos Diaz", at(date(2024, 1, 1)));
        let pet = Pet::new(owner.id, dog.id, "Max");
        let vaccine = Vaccine::new("Rabies")
            .with_interval(interval_days)
            .for_species(Some(dog.id));
        let (pet_id, vaccine_id) = (pet.id, vaccine.id);
        records.species.push(dog);
        records.owners.push(owner);
        records.pets.push(pet);
        records.vaccines.push(vaccine);
        Fixture {
            records,
            pet_id,
            vaccine_id,
        }
    }

    fn schedule(fixture: &mut Fixture, on: NaiveDate) -> Uuid {
        VaccinationService::schedule(
            &mut fixture.records,
            ScheduleVaccinationInput {
                pet_id: fixture.pet_id,
                vaccine_id: fixture.vaccine_id,
                scheduled_date: on,
                dose_number: 1,
                notes: None,
            },
            &actor(),
            at(date(2023, 12, 20)),
        )
        .expect("schedule")
    }

    #[test]
    fn apply_books_the_next_dose_on_request() {
        let mut fixture = fixture(30);
        let id = schedule(&mut fixture, date(2024, 1, 1));
        let today = date(2024, 1, 3);

        let applied = VaccinationService::apply(
            &mut fixture.records,
            id,
            ApplyVaccinationInput {
                batch: Some("L-889".into()),
                schedule_next: true,
                ..ApplyVaccinationInput::default()
            },
            at(today),
        )
        .expect("apply");

        assert_eq!(applied.next_due_date, Some(date(2024, 2, 2)));
        let next_id = applied.next_dose_id.expect("next dose booked");
        let next = fixture.records.vaccination(next_id).unwrap();
        assert_eq!(next.dose_number, 2);
        assert_eq!(next.scheduled_date, date(2024, 2, 2));
        assert_eq!(next.status, VaccinationStatus::Pending);
        let applied_record = fixture.records.vaccination(id).unwrap();
        assert_eq!(applied_record.applied_on, Some(today));
        assert_eq!(applied_record.batch.as_deref(), Some("L-889"));
    }

    #[test]
    fn schedule_rejects_vaccines_for_other_species() {
        let mut fixture = fixture(365);
        let cat_vaccine = Vaccine::new("Feline triple").for_species(Some(Uuid::new_v4()));
        let cat_vaccine_id = cat_vaccine.id;
        fixture.records.vaccines.push(cat_vaccine);
        let err = VaccinationService::schedule(
            &mut fixture.records,
            ScheduleVaccinationInput {
                pet_id: fixture.pet_id,
                vaccine_id: cat_vaccine_id,
                scheduled_date: date(2024, 1, 1),
                dose_number: 1,
                notes: None,
            },
            &actor(),
            at(date(2024, 1, 1)),
        )
        .expect_err("wrong species");
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn sweep_is_idempotent_and_feeds_overdue_listing() {
        let mut fixture = fixture(365);
        schedule(&mut fixture, date(2024, 1, 1));
        schedule(&mut fixture, date(2024, 1, 20));
        let today = date(2024, 1, 10);

        assert_eq!(VaccinationService::sweep_overdue(&mut fixture.records, today), 1);
        let after_first: Vec<VaccinationStatus> =
            fixture.records.vaccinations.iter().map(|r| r.status).collect();
        assert_eq!(VaccinationService::sweep_overdue(&mut fixture.records, today), 0);
        let after_second: Vec<VaccinationStatus> =
            fixture.records.vaccinations.iter().map(|r| r.status).collect();
        assert_eq!(after_first, after_second);
        assert_eq!(VaccinationService::overdue(&fixture.records, today).len(), 1);
    }

    #[test]
    fn reminders_respect_window_and_sent_flag() {
        let mut fixture = fixture(365);
        let soon = schedule(&mut fixture, date(2024, 3, 5));
        schedule(&mut fixture, date(2024, 3, 30));
        let today = date(2024, 3, 1);

        let due = VaccinationService::reminders_due(&fixture.records, today, 7);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, soon);

        VaccinationService::mark_reminder_sent(&mut fixture.records, soon).expect("mark");
        assert!(VaccinationService::reminders_due(&fixture.records, today, 7).is_empty());
        assert_eq!(VaccinationService::upcoming(&fixture.records, today, 30).len(), 2);
    }

    #[test]
    fn history_and_calendar_views() {
        let mut fixture = fixture(365);
        schedule(&mut fixture, date(2024, 1, 31));
        schedule(&mut fixture, date(2024, 2, 1));
        let history =
            VaccinationService::history_for_pet(&fixture.records, fixture.pet_id).expect("history");
        assert_eq!(history[0].scheduled_date, date(2024, 2, 1));
        let january = VaccinationService::in_month(&fixture.records, 2024, 1).expect("month");
        assert_eq!(january.len(), 1);
        assert!(VaccinationService::in_month(&fixture.records, 2024, 13).is_err());
    }

    #[test]
    fn out_of_range_follow_up_rolls_back_to_a_validation_error() {
        let mut fixture = fixture(30);
        let id = VaccinationService::schedule(
            &mut fixture.records,
            ScheduleVaccinationInput {
                pet_id: fixture.pet_id,
                vaccine_id: fixture.vaccine_id,
                scheduled_date: date(2024, 1, 1),
                dose_number: u32::MAX,
                notes: None,
            },
            &actor(),
            at(date(2023, 12, 20)),
        )
        .expect("schedule");

        let err = VaccinationService::apply(
            &mut fixture.records,
            id,
            ApplyVaccinationInput {
                schedule_next: true,
                ..ApplyVaccinationInput::default()
            },
            at(date(2024, 1, 2)),
        )
        .expect_err("no dose after u32::MAX");
        assert!(matches!(err, CoreError::Validation(_)));
        assert_eq!(fixture.records.vaccinations.len(), 1);

        // Records loaded from disk are not bound by the catalog limit.
        fixture.records.vaccines[0].interval_days = u32::MAX;
        let second = schedule(&mut fixture, date(2024, 1, 5));
        let err = VaccinationService::apply(
            &mut fixture.records,
            second,
            ApplyVaccinationInput::default(),
            at(date(2024, 1, 5)),
        )
        .expect_err("interval overflows");
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn upcoming_window_is_clamped() {
        let mut fixture = fixture(365);
        schedule(&mut fixture, date(2024, 3, 5));
        let today = date(2024, 3, 1);
        assert_eq!(
            VaccinationService::upcoming(&fixture.records, today, i64::MAX).len(),
            1
        );
        assert!(VaccinationService::upcoming(&fixture.records, today, -5).is_empty());
    }

    #[test]
    fn cancelled_doses_cannot_be_applied() {
        let mut fixture = fixture(365);
        let id = schedule(&mut fixture, date(2024, 1, 1));
        VaccinationService::cancel(&mut fixture.records, id).expect("cancel");
        let err = VaccinationService::apply(
            &mut fixture.records,
            id,
            ApplyVaccinationInput::default(),
            at(date(2024, 1, 2)),
        )
        .expect_err("cancelled is terminal");
        assert!(matches!(err, CoreError::Precondition(_)));
    }
}
