//! The persisted record set of one clinic.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    catalog::{Service, Species, Vaccine, Veterinarian},
    consultation::{Consultation, Treatment},
    invoice::Invoice,
    patient::{Owner, Pet},
    user::User,
    vaccination::ScheduledVaccination,
};

pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Every record the clinic owns, versioned by `revision` for optimistic commits.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClinicRecords {
    #[serde(default = "ClinicRecords::schema_version_default")]
    pub schema_version: u32,
    #[serde(default)]
    pub revision: u64,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub owners: Vec<Owner>,
    #[serde(default)]
    pub pets: Vec<Pet>,
    #[serde(default)]
    pub species: Vec<Species>,
    #[serde(default)]
    pub veterinarians: Vec<Veterinarian>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub services: Vec<Service>,
    #[serde(default)]
    pub vaccines: Vec<Vaccine>,
    #[serde(default)]
    pub consultations: Vec<Consultation>,
    #[serde(default)]
    pub treatments: Vec<Treatment>,
    #[serde(default)]
    pub vaccinations: Vec<ScheduledVaccination>,
    #[serde(default)]
    pub invoices: Vec<Invoice>,
}

macro_rules! record_lookup {
    ($get:ident, $get_mut:ident, $field:ident, $ty:ty) => {
        pub fn $get(&self, id: Uuid) -> Option<&$ty> {
            self.$field.iter().find(|record| record.id == id)
        }

        pub fn $get_mut(&mut self, id: Uuid) -> Option<&mut $ty> {
            self.$field.iter_mut().find(|record| record.id == id)
        }
    };
}

impl ClinicRecords {
    pub fn new() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            ..Default::default()
        }
    }

    fn schema_version_default() -> u32 {
        CURRENT_SCHEMA_VERSION
    }

    /// Marks the record set as modified at `at`.
    pub fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_at = Some(at);
    }

    record_lookup!(owner, owner_mut, owners, Owner);
    record_lookup!(pet, pet_mut, pets, Pet);
    record_lookup!(species_entry, species_entry_mut, species, Species);
    record_lookup!(veterinarian, veterinarian_mut, veterinarians, Veterinarian);
    record_lookup!(user, user_mut, users, User);
    record_lookup!(service, service_mut, services, Service);
    record_lookup!(vaccine, vaccine_mut, vaccines, Vaccine);
    record_lookup!(consultation, consultation_mut, consultations, Consultation);
    record_lookup!(treatment, treatment_mut, treatments, Treatment);
    record_lookup!(vaccination, vaccination_mut, vaccinations, ScheduledVaccination);
    record_lookup!(invoice, invoice_mut, invoices, Invoice);

    pub fn invoice_by_number(&self, number: &str) -> Option<&Invoice> {
        let number = number.trim();
        self.invoices
            .iter()
            .find(|invoice| invoice.number.eq_ignore_ascii_case(number))
    }

    pub fn invoice_for_consultation(&self, consultation_id: Uuid) -> Option<&Invoice> {
        self.invoices
            .iter()
            .find(|invoice| invoice.consultation_id == Some(consultation_id))
    }

    pub fn user_by_username(&self, username: &str) -> Option<&User> {
        let username = username.trim();
        self.users
            .iter()
            .find(|user| user.username.eq_ignore_ascii_case(username))
    }

    pub fn pets_of(&self, owner_id: Uuid) -> impl Iterator<Item = &Pet> {
        self.pets.iter().filter(move |pet| pet.owner_id == owner_id)
    }

    pub fn treatments_for(&self, consultation_id: Uuid) -> impl Iterator<Item = &Treatment> {
        self.treatments
            .iter()
            .filter(move |treatment| treatment.consultation_id == consultation_id)
    }

    pub fn vaccinations_for(&self, pet_id: Uuid) -> impl Iterator<Item = &ScheduledVaccination> {
        self.vaccinations
            .iter()
            .filter(move |record| record.pet_id == pet_id)
    }

    pub fn consultations_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> impl Iterator<Item = &Consultation> {
        self.consultations.iter().filter(move |consultation| {
            let day = consultation.date();
            day >= from && day <= to
        })
    }

    pub fn active_admin_count(&self) -> usize {
        self.users.iter().filter(|user| user.is_active_admin()).count()
    }
}
