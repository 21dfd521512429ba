use std::{
    collections::{HashMap, HashSet},
    path::PathBuf,
    sync::RwLock,
};

use rust_decimal::Decimal;
use vetcare_domain::ClinicRecords;

use crate::CoreError;

/// Describes a persisted backup artifact for the clinic records.
#[derive(Debug, Clone)]
pub struct BackupInfo {
    pub id: String,
    pub created_at: String,
    pub path: Option<PathBuf>,
}

/// Abstraction over persistence backends capable of storing the clinic records.
///
/// `commit` must be atomic: either the full snapshot becomes visible or
/// nothing does. Backends reject a commit with [`CoreError::Conflict`] when
/// the stored revision no longer equals `expected_revision`.
pub trait ClinicStorage: Send + Sync {
    fn load(&self) -> Result<ClinicRecords, CoreError>;
    fn commit(&self, records: &ClinicRecords, expected_revision: u64) -> Result<(), CoreError>;
    fn backup(&self, note: Option<&str>) -> Result<BackupInfo, CoreError>;
    fn list_backups(&self) -> Result<Vec<BackupInfo>, CoreError>;
    fn restore_backup(&self, backup: &BackupInfo) -> Result<ClinicRecords, CoreError>;
}

/// Volatile backend used by tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    current: RwLock<ClinicRecords>,
    backups: RwLock<Vec<(BackupInfo, ClinicRecords)>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::with_records(ClinicRecords::new())
    }

    pub fn with_records(records: ClinicRecords) -> Self {
        Self {
            current: RwLock::new(records),
            backups: RwLock::new(Vec::new()),
        }
    }
}

fn poisoned() -> CoreError {
    CoreError::Storage("in-memory store lock poisoned".into())
}

impl ClinicStorage for MemoryStorage {
    fn load(&self) -> Result<ClinicRecords, CoreError> {
        Ok(self.current.read().map_err(|_| poisoned())?.clone())
    }

    fn commit(&self, records: &ClinicRecords, expected_revision: u64) -> Result<(), CoreError> {
        let mut current = self.current.write().map_err(|_| poisoned())?;
        if current.revision != expected_revision {
            return Err(CoreError::Conflict(format!(
                "records changed concurrently (expected revision {}, found {})",
                expected_revision, current.revision
            )));
        }
        *current = records.clone();
        Ok(())
    }

    fn backup(&self, note: Option<&str>) -> Result<BackupInfo, CoreError> {
        let snapshot = self.load()?;
        let mut backups = self.backups.write().map_err(|_| poisoned())?;
        let mut id = format!("memory_{}", backups.len() + 1);
        if let Some(note) = note.map(str::trim).filter(|note| !note.is_empty()) {
            id.push('_');
            id.push_str(note);
        }
        let info = BackupInfo {
            id: id.clone(),
            created_at: snapshot
                .updated_at
                .map(|at| at.to_rfc3339())
                .unwrap_or_default(),
            path: None,
        };
        backups.push((info.clone(), snapshot));
        Ok(info)
    }

    fn list_backups(&self) -> Result<Vec<BackupInfo>, CoreError> {
        let backups = self.backups.read().map_err(|_| poisoned())?;
        Ok(backups.iter().rev().map(|(info, _)| info.clone()).collect())
    }

    fn restore_backup(&self, backup: &BackupInfo) -> Result<ClinicRecords, CoreError> {
        let snapshot = {
            let backups = self.backups.read().map_err(|_| poisoned())?;
            backups
                .iter()
                .find(|(info, _)| info.id == backup.id)
                .map(|(_, records)| records.clone())
                .ok_or_else(|| CoreError::Storage(format!("backup `{}` not found", backup.id)))?
        };
        let mut current = self.current.write().map_err(|_| poisoned())?;
        let mut restored = snapshot;
        restored.revision = current.revision + 1;
        *current = restored.clone();
        Ok(restored)
    }
}

/// Reports natural-key collisions that must never be committed.
pub fn unique_key_conflicts(records: &ClinicRecords) -> Vec<String> {
    let mut conflicts = Vec::new();
    duplicates(
        "invoice number",
        records.invoices.iter().map(|invoice| invoice.number.as_str()),
        &mut conflicts,
    );
    duplicates(
        "owner document",
        records.owners.iter().map(|owner| owner.document_number.as_str()),
        &mut conflicts,
    );
    duplicates(
        "veterinarian license",
        records.veterinarians.iter().map(|vet| vet.license_number.as_str()),
        &mut conflicts,
    );
    duplicates(
        "service code",
        records.services.iter().map(|service| service.code.as_str()),
        &mut conflicts,
    );
    duplicates(
        "species name",
        records.species.iter().map(|species| species.name.as_str()),
        &mut conflicts,
    );
    duplicates(
        "username",
        records.users.iter().map(|user| user.username.as_str()),
        &mut conflicts,
    );
    duplicates(
        "user email",
        records.users.iter().map(|user| user.email.as_str()),
        &mut conflicts,
    );
    let billed_consultations: Vec<String> = records
        .invoices
        .iter()
        .filter_map(|invoice| invoice.consultation_id)
        .map(|id| id.to_string())
        .collect();
    duplicates(
        "consultation invoice",
        billed_consultations.iter().map(String::as_str),
        &mut conflicts,
    );
    conflicts
}

fn duplicates<'a>(label: &str, keys: impl Iterator<Item = &'a str>, out: &mut Vec<String>) {
    let mut seen: HashMap<String, usize> = HashMap::new();
    for key in keys {
        let normalized = key.trim().to_lowercase();
        if normalized.is_empty() {
            continue;
        }
        *seen.entry(normalized).or_default() += 1;
    }
    let mut repeated: Vec<_> = seen.into_iter().filter(|(_, count)| *count > 1).collect();
    repeated.sort();
    for (key, _) in repeated {
        out.push(format!("duplicate {} `{}`", label, key));
    }
}

/// Detects dangling references within a records snapshot.
pub fn record_warnings(records: &ClinicRecords) -> Vec<String> {
    let owner_ids: HashSet<_> = records.owners.iter().map(|o| o.id).collect();
    let pet_ids: HashSet<_> = records.pets.iter().map(|p| p.id).collect();
    let vaccine_ids: HashSet<_> = records.vaccines.iter().map(|v| v.id).collect();
    let vet_ids: HashSet<_> = records.veterinarians.iter().map(|v| v.id).collect();
    let consultation_ids: HashSet<_> = records.consultations.iter().map(|c| c.id).collect();
    let mut warnings = Vec::new();

    for pet in &records.pets {
        if !owner_ids.contains(&pet.owner_id) {
            warnings.push(format!("pet {} references unknown owner {}", pet.id, pet.owner_id));
        }
    }
    for consultation in &records.consultations {
        if !pet_ids.contains(&consultation.pet_id) {
            warnings.push(format!(
                "consultation {} references unknown pet {}",
                consultation.id, consultation.pet_id
            ));
        }
        if !vet_ids.contains(&consultation.veterinarian_id) {
            warnings.push(format!(
                "consultation {} references unknown veterinarian {}",
                consultation.id, consultation.veterinarian_id
            ));
        }
    }
    for treatment in &records.treatments {
        if !consultation_ids.contains(&treatment.consultation_id) {
            warnings.push(format!(
                "treatment {} references missing consultation {}",
                treatment.id, treatment.consultation_id
            ));
        }
    }
    for record in &records.vaccinations {
        if !pet_ids.contains(&record.pet_id) {
            warnings.push(format!(
                "vaccination {} references unknown pet {}",
                record.id, record.pet_id
            ));
        }
        if !vaccine_ids.contains(&record.vaccine_id) {
            warnings.push(format!(
                "vaccination {} references unknown vaccine {}",
                record.id, record.vaccine_id
            ));
        }
    }
    for invoice in &records.invoices {
        if !owner_ids.contains(&invoice.owner_id) {
            warnings.push(format!(
                "invoice {} references unknown owner {}",
                invoice.number, invoice.owner_id
            ));
        }
        let line_sum: Decimal = invoice.items.iter().map(|i| i.subtotal).sum();
        if line_sum != invoice.subtotal {
            warnings.push(format!(
                "invoice {} subtotal {} disagrees with its lines {}",
                invoice.number, invoice.subtotal, line_sum
            ));
        }
    }
    if records.active_admin_count() == 0 && !records.users.is_empty() {
        warnings.push("no active administrator account".into());
    }
    warnings
}
