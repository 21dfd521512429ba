//! Per-dose vaccination schedule entries and their lifecycle.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::*;

/// Days ahead of the due date during which a reminder should go out.
pub const REMINDER_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
/// Enumerates the lifecycle state of a scheduled dose.
pub enum VaccinationStatus {
    #[default]
    Pending,
    Applied,
    Overdue,
    Cancelled,
}

impl VaccinationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, VaccinationStatus::Applied | VaccinationStatus::Cancelled)
    }
}

impl fmt::Display for VaccinationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            VaccinationStatus::Pending => "Pending",
            VaccinationStatus::Applied => "Applied",
            VaccinationStatus::Overdue => "Overdue",
            VaccinationStatus::Cancelled => "Cancelled",
        };
        f.write_str(label)
    }
}

impl StatusColored for VaccinationStatus {
    fn status_color(&self) -> DisplayColor {
        match self {
            VaccinationStatus::Pending => DisplayColor::Warning,
            VaccinationStatus::Applied => DisplayColor::Success,
            VaccinationStatus::Overdue => DisplayColor::Danger,
            VaccinationStatus::Cancelled => DisplayColor::Secondary,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Details captured when a dose is administered.
pub struct VaccineApplication {
    pub veterinarian_id: Option<Uuid>,
    pub batch: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// One planned or administered dose for a pet.
pub struct ScheduledVaccination {
    pub id: Uuid,
    pub pet_id: Uuid,
    pub vaccine_id: Uuid,
    pub scheduled_date: NaiveDate,
    #[serde(default)]
    pub applied_on: Option<NaiveDate>,
    /// Advisory date for the following dose, computed on application.
    #[serde(default)]
    pub next_due_date: Option<NaiveDate>,
    pub dose_number: u32,
    pub status: VaccinationStatus,
    #[serde(default)]
    pub batch: Option<String>,
    #[serde(default)]
    pub veterinarian_id: Option<Uuid>,
    #[serde(default)]
    pub reminder_sent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub registered_by: Option<Uuid>,
    pub registered_at: DateTime<Utc>,
}

impl ScheduledVaccination {
    pub fn new(
        pet_id: Uuid,
        vaccine_id: Uuid,
        scheduled_date: NaiveDate,
        dose_number: u32,
        registered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            pet_id,
            vaccine_id,
            scheduled_date,
            applied_on: None,
            next_due_date: None,
            dose_number: dose_number.max(1),
            status: VaccinationStatus::Pending,
            batch: None,
            veterinarian_id: None,
            reminder_sent: false,
            notes: None,
            registered_by: None,
            registered_at,
        }
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = clean_text(notes);
        self
    }

    pub fn registered_by(mut self, user_id: Uuid) -> Self {
        self.registered_by = Some(user_id);
        self
    }

    /// Days between `today` and the scheduled date; only meaningful while Pending.
    ///
    /// Negative values mean the dose is late even if the overdue sweep has not run yet.
    pub fn days_until_due(&self, today: NaiveDate) -> Option<i64> {
        if self.status != VaccinationStatus::Pending {
            return None;
        }
        Some((self.scheduled_date - today).num_days())
    }

    pub fn needs_reminder(&self, today: NaiveDate) -> bool {
        self.needs_reminder_within(today, REMINDER_WINDOW_DAYS)
    }

    pub fn needs_reminder_within(&self, today: NaiveDate, window_days: i64) -> bool {
        if self.reminder_sent {
            return false;
        }
        matches!(self.days_until_due(today), Some(days) if (0..=window_days).contains(&days))
    }

    /// Marks the dose as administered on `today`.
    ///
    /// Returns the advisory next due date when the vaccine defines an interval.
    pub fn apply(
        &mut self,
        application: VaccineApplication,
        today: NaiveDate,
        interval_days: Option<u32>,
    ) -> Result<Option<NaiveDate>, DomainError> {
        match self.status {
            VaccinationStatus::Pending | VaccinationStatus::Overdue => {}
            status => {
                return Err(DomainError::Precondition(format!(
                    "cannot apply a dose that is already {}",
                    status
                )))
            }
        }
        let next_due_date = match interval_days.filter(|days| *days > 0) {
            Some(days) => Some(
                today
                    .checked_add_signed(Duration::days(i64::from(days)))
                    .ok_or_else(|| {
                        DomainError::Validation(format!(
                            "a {} day interval from {} is out of calendar range",
                            days, today
                        ))
                    })?,
            ),
            None => None,
        };
        self.status = VaccinationStatus::Applied;
        self.applied_on = Some(today);
        self.next_due_date = next_due_date;
        if application.veterinarian_id.is_some() {
            self.veterinarian_id = application.veterinarian_id;
        }
        if let Some(batch) = clean_text(application.batch) {
            self.batch = Some(batch);
        }
        if let Some(notes) = clean_text(application.notes) {
            self.notes = Some(notes);
        }
        Ok(self.next_due_date)
    }

    /// Builds the Pending record for the following dose, if one is due.
    pub fn next_dose(
        &self,
        registered_at: DateTime<Utc>,
    ) -> Result<Option<ScheduledVaccination>, DomainError> {
        if self.status != VaccinationStatus::Applied {
            return Ok(None);
        }
        let Some(due) = self.next_due_date else {
            return Ok(None);
        };
        let dose_number = self.dose_number.checked_add(1).ok_or_else(|| {
            DomainError::Validation(format!("dose number {} has no successor", self.dose_number))
        })?;
        let mut next =
            ScheduledVaccination::new(self.pet_id, self.vaccine_id, due, dose_number, registered_at);
        next.registered_by = self.registered_by;
        Ok(Some(next))
    }

    pub fn cancel(&mut self) -> Result<(), DomainError> {
        if self.status.is_terminal() {
            return Err(DomainError::Precondition(format!(
                "cannot cancel a dose that is already {}",
                self.status
            )));
        }
        self.status = VaccinationStatus::Cancelled;
        Ok(())
    }

    /// Moves a late Pending dose to Overdue. Returns whether the state changed.
    pub fn mark_overdue(&mut self, today: NaiveDate) -> bool {
        if self.status == VaccinationStatus::Pending && self.scheduled_date < today {
            self.status = VaccinationStatus::Overdue;
            true
        } else {
            false
        }
    }

    pub fn mark_reminder_sent(&mut self) {
        self.reminder_sent = true;
    }

    /// Pending with a past date, or already swept to Overdue.
    pub fn is_late(&self, today: NaiveDate) -> bool {
        match self.status {
            VaccinationStatus::Overdue => true,
            VaccinationStatus::Pending => self.scheduled_date < today,
            _ => false,
        }
    }
}

impl Identifiable for ScheduledVaccination {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Displayable for ScheduledVaccination {
    fn display_label(&self) -> String {
        format!(
            "dose {} on {} [{}]",
            self.dose_number, self.scheduled_date, self.status
        )
    }
}

impl StatusColored for ScheduledVaccination {
    fn status_color(&self) -> DisplayColor {
        self.status.status_color()
    }
}

/// Sweeps every late Pending dose to Overdue; returns how many changed.
pub fn mark_overdue_all<'a>(
    records: impl IntoIterator<Item = &'a mut ScheduledVaccination>,
    today: NaiveDate,
) -> usize {
    records
        .into_iter()
        .map(|record| record.mark_overdue(today))
        .filter(|changed| *changed)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dose(scheduled: NaiveDate) -> ScheduledVaccination {
        let at = Utc.with_ymd_and_hms(2023, 12, 1, 9, 0, 0).unwrap();
        ScheduledVaccination::new(Uuid::new_v4(), Uuid::new_v4(), scheduled, 1, at)
    }

    #[test]
    fn apply_computes_next_due_from_application_date() {
        let mut record = dose(date(2024, 1, 1));
        let today = date(2024, 1, 3);
        let next = record
            .apply(VaccineApplication::default(), today, Some(30))
            .expect("apply");
        assert_eq!(record.status, VaccinationStatus::Applied);
        assert_eq!(record.applied_on, Some(today));
        assert_eq!(next, Some(date(2024, 2, 2)));

        let follow_up = record
            .next_dose(Utc.with_ymd_and_hms(2024, 1, 3, 9, 0, 0).unwrap())
            .expect("next dose")
            .expect("interval set");
        assert_eq!(follow_up.dose_number, 2);
        assert_eq!(follow_up.scheduled_date, date(2024, 2, 2));
        assert_eq!(follow_up.status, VaccinationStatus::Pending);
    }

    #[test]
    fn apply_without_interval_leaves_next_due_empty() {
        let mut record = dose(date(2024, 1, 1));
        let next = record
            .apply(VaccineApplication::default(), date(2024, 1, 1), None)
            .expect("apply");
        assert_eq!(next, None);
        assert!(record.next_dose(Utc::now()).expect("no overflow").is_none());
    }

    #[test]
    fn interval_past_calendar_range_is_rejected_without_applying() {
        let mut record = dose(date(2024, 1, 1));
        let err = record
            .apply(VaccineApplication::default(), date(2024, 1, 3), Some(4_000_000_000))
            .expect_err("interval overflows the calendar");
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(record.status, VaccinationStatus::Pending);
        assert_eq!(record.applied_on, None);
    }

    #[test]
    fn last_representable_dose_has_no_successor() {
        let at = Utc.with_ymd_and_hms(2023, 12, 1, 9, 0, 0).unwrap();
        let mut record =
            ScheduledVaccination::new(Uuid::new_v4(), Uuid::new_v4(), date(2024, 1, 1), u32::MAX, at);
        record
            .apply(VaccineApplication::default(), date(2024, 1, 1), Some(30))
            .expect("apply");
        assert!(matches!(
            record.next_dose(at),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn overdue_dose_can_still_be_applied() {
        let mut record = dose(date(2024, 1, 1));
        assert!(record.mark_overdue(date(2024, 1, 5)));
        record
            .apply(
                VaccineApplication {
                    batch: Some(" LOT-77 ".into()),
                    ..Default::default()
                },
                date(2024, 1, 6),
                Some(365),
            )
            .expect("apply overdue dose");
        assert_eq!(record.batch.as_deref(), Some("LOT-77"));
    }

    #[test]
    fn terminal_states_reject_apply_and_cancel() {
        let mut record = dose(date(2024, 1, 1));
        record.cancel().expect("cancel pending");
        assert!(matches!(
            record.apply(VaccineApplication::default(), date(2024, 1, 1), None),
            Err(DomainError::Precondition(_))
        ));
        assert!(record.cancel().is_err());
    }

    #[test]
    fn reminder_window_is_inclusive() {
        let today = date(2024, 5, 1);
        assert!(dose(date(2024, 5, 1)).needs_reminder(today));
        assert!(dose(date(2024, 5, 8)).needs_reminder(today));
        assert!(!dose(date(2024, 5, 9)).needs_reminder(today));
        assert!(!dose(date(2024, 4, 30)).needs_reminder(today));

        let mut reminded = dose(date(2024, 5, 3));
        reminded.mark_reminder_sent();
        assert!(!reminded.needs_reminder(today));
    }

    #[test]
    fn days_until_due_only_for_pending() {
        let today = date(2024, 5, 10);
        let mut record = dose(date(2024, 5, 1));
        assert_eq!(record.days_until_due(today), Some(-9));
        record.mark_overdue(today);
        assert_eq!(record.days_until_due(today), None);
    }

    #[test]
    fn sweep_is_idempotent() {
        let today = date(2024, 6, 1);
        let mut records = vec![
            dose(date(2024, 5, 1)),
            dose(date(2024, 6, 1)),
            dose(date(2024, 7, 1)),
        ];
        records[2].cancel().expect("cancel");

        assert_eq!(mark_overdue_all(records.iter_mut(), today), 1);
        let after_first: Vec<_> = records.iter().map(|r| r.status).collect();
        assert_eq!(mark_overdue_all(records.iter_mut(), today), 0);
        let after_second: Vec<_> = records.iter().map(|r| r.status).collect();
        assert_eq!(after_first, after_second);
        assert_eq!(after_first[0], VaccinationStatus::Overdue);
        assert_eq!(after_first[1], VaccinationStatus::Pending);
    }
}
