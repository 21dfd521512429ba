//! Read-only aggregations over clinic activity.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;
use vetcare_domain::{
    ClinicRecords, ConsultationStatus, ScheduledVaccination, VaccinationStatus,
};

use crate::{CoreError, CoreResult, VaccinationService};

/// Inclusive date range used by the period reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportPeriod {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl ReportPeriod {
    pub fn new(from: NaiveDate, to: NaiveDate) -> CoreResult<Self> {
        if from > to {
            return Err(CoreError::Validation(format!(
                "report period starts after it ends ({} > {})",
                from, to
            )));
        }
        Ok(Self { from, to })
    }

    /// The `days` days ending on `today`.
    pub fn trailing(today: NaiveDate, days: u32) -> Self {
        Self {
            from: today
                .checked_sub_signed(chrono::Duration::days(i64::from(days)))
                .unwrap_or(NaiveDate::MIN),
            to: today,
        }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        day >= self.from && day <= self.to
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsultationPeriodReport {
    pub period: ReportPeriod,
    pub total: usize,
    pub completed: usize,
    pub cancelled: usize,
    /// Sum of completed consultation costs.
    pub revenue: Decimal,
    pub per_day: BTreeMap<NaiveDate, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VetProductivity {
    pub veterinarian_id: Uuid,
    pub veterinarian_name: String,
    pub completed: usize,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamedCount {
    pub name: String,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct VaccinationSummary<'a> {
    pub upcoming: Vec<&'a ScheduledVaccination>,
    pub overdue: Vec<&'a ScheduledVaccination>,
    pub applied_this_month: usize,
    pub applied_per_vaccine: Vec<NamedCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpeciesReport {
    pub consultations_per_species: Vec<NamedCount>,
    pub active_pets_per_species: Vec<NamedCount>,
}

pub struct ReportService;

impl ReportService {
    pub fn consultations_in_period(
        records: &ClinicRecords,
        period: ReportPeriod,
    ) -> ConsultationPeriodReport {
        let mut report = ConsultationPeriodReport {
            period,
            total: 0,
            completed: 0,
            cancelled: 0,
            revenue: Decimal::ZERO,
            per_day: BTreeMap::new(),
        };
        for consultation in records.consultations_between(period.from, period.to) {
            report.total += 1;
            *report.per_day.entry(consultation.date()).or_insert(0) += 1;
            match consultation.status {
                ConsultationStatus::Completed => {
                    report.completed += 1;
                    report.revenue += consultation.cost.unwrap_or_default();
                }
                ConsultationStatus::Cancelled => report.cancelled += 1,
                _ => {}
            }
        }
        report
    }

    /// Completed consultations and their revenue per veterinarian, busiest first.
    pub fn vet_productivity(records: &ClinicRecords, period: ReportPeriod) -> Vec<VetProductivity> {
        let mut by_vet: HashMap<Uuid, (usize, Decimal)> = HashMap::new();
        for consultation in records
            .consultations_between(period.from, period.to)
            .filter(|c| c.status == ConsultationStatus::Completed)
        {
            let entry = by_vet
                .entry(consultation.veterinarian_id)
                .or_insert((0, Decimal::ZERO));
            entry.0 += 1;
            entry.1 += consultation.cost.unwrap_or_default();
        }
        let mut rows: Vec<VetProductivity> = by_vet
            .into_iter()
            .map(|(veterinarian_id, (completed, revenue))| VetProductivity {
                veterinarian_id,
                veterinarian_name: records
                    .veterinarian(veterinarian_id)
                    .map(|vet| vet.full_name.clone())
                    .unwrap_or_else(|| "Unknown".into()),
                completed,
                revenue,
            })
            .collect();
        rows.sort_by(|a, b| {
            b.completed
                .cmp(&a.completed)
                .then_with(|| a.veterinarian_name.cmp(&b.veterinarian_name))
        });
        rows
    }

    pub fn vaccination_summary(
        records: &ClinicRecords,
        today: NaiveDate,
        window_days: i64,
    ) -> VaccinationSummary<'_> {
        let applied: Vec<&ScheduledVaccination> = records
            .vaccinations
            .iter()
            .filter(|record| record.status == VaccinationStatus::Applied)
            .collect();
        let applied_this_month = applied
            .iter()
            .filter_map(|record| record.applied_on)
            .filter(|day| day.year() == today.year() && day.month() == today.month())
            .count();
        let applied_per_vaccine = ranked(applied.iter().map(|record| {
            records
                .vaccine(record.vaccine_id)
                .map(|vaccine| vaccine.name.clone())
                .unwrap_or_else(|| "Unknown".into())
        }));

        VaccinationSummary {
            upcoming: VaccinationService::upcoming(records, today, window_days),
            overdue: VaccinationService::overdue(records, today),
            applied_this_month,
            applied_per_vaccine,
        }
    }

    /// Most common treatment descriptions, grouped case-insensitively.
    pub fn frequent_treatments(records: &ClinicRecords, limit: usize) -> Vec<NamedCount> {
        let mut rows = ranked(
            records
                .treatments
                .iter()
                .map(|treatment| treatment.description.trim().to_string()),
        );
        rows.truncate(limit);
        rows
    }

    pub fn frequent_medications(records: &ClinicRecords, limit: usize) -> Vec<NamedCount> {
        let mut rows = ranked(
            records
                .treatments
                .iter()
                .filter_map(|treatment| treatment.medication.as_deref())
                .map(|medication| medication.trim().to_string()),
        );
        rows.truncate(limit);
        rows
    }

    /// Consultations in the period and active pets, both grouped by species.
    pub fn species_attended(records: &ClinicRecords, period: ReportPeriod) -> SpeciesReport {
        let species_name = |species_id: Uuid| {
            records
                .species_entry(species_id)
                .map(|species| species.name.clone())
                .unwrap_or_else(|| "Unknown".into())
        };
        let consultations_per_species = ranked(
            records
                .consultations_between(period.from, period.to)
                .filter_map(|consultation| records.pet(consultation.pet_id))
                .map(|pet| species_name(pet.species_id)),
        );
        let active_pets_per_species = ranked(
            records
                .pets
                .iter()
                .filter(|pet| pet.active)
                .map(|pet| species_name(pet.species_id)),
        );
        SpeciesReport {
            consultations_per_species,
            active_pets_per_species,
        }
    }
}

/// Groups names ignoring case, keeping the first spelling seen, largest groups first.
fn ranked(names: impl Iterator<Item = String>) -> Vec<NamedCount> {
    let mut groups: Vec<NamedCount> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for name in names.filter(|name| !name.is_empty()) {
        let key = name.to_lowercase();
        match index.get(&key) {
            Some(&slot) => groups[slot].total += 1,
            None => {
                index.insert(key, groups.len());
                groups.push(NamedCount { name, total: 1 });
            }
        }
    }
    groups.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.name.cmp(&b.name)));
    groups
}
