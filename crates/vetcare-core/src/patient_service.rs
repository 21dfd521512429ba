//! Owners and their pets.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;
use vetcare_domain::{clean_text, round_money, ClinicRecords, Owner, Pet, Sex};

use crate::{
    input::{FieldError, FormInput},
    CoreError, CoreResult,
};

/// Minimum length for the quick-search lookups used by pickers.
pub const MIN_SEARCH_LEN: usize = 2;
pub const QUICK_SEARCH_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct OwnerInput {
    pub document_number: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

impl OwnerInput {
    pub fn new(document_number: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            document_number: document_number.into(),
            full_name: full_name.into(),
            phone: None,
            email: None,
            address: None,
        }
    }
}

impl TryFrom<&FormInput> for OwnerInput {
    type Error = FieldError;

    fn try_from(form: &FormInput) -> Result<Self, Self::Error> {
        Ok(Self {
            document_number: form.text("document_number")?,
            full_name: form.text("full_name")?,
            phone: form.optional_text("phone"),
            email: form.optional_email("email")?,
            address: form.optional_text("address"),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PetInput {
    pub owner_id: Uuid,
    pub species_id: Uuid,
    pub name: String,
    pub breed: Option<String>,
    pub sex: Sex,
    pub birth_date: Option<NaiveDate>,
    pub weight_kg: Option<Decimal>,
    pub color: Option<String>,
    pub notes: Option<String>,
}

impl PetInput {
    pub fn new(owner_id: Uuid, species_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            owner_id,
            species_id,
            name: name.into(),
            breed: None,
            sex: Sex::Unknown,
            birth_date: None,
            weight_kg: None,
            color: None,
            notes: None,
        }
    }
}

impl TryFrom<&FormInput> for PetInput {
    type Error = FieldError;

    fn try_from(form: &FormInput) -> Result<Self, Self::Error> {
        Ok(Self {
            owner_id: form.id("owner_id")?,
            species_id: form.id("species_id")?,
            name: form.text("name")?,
            breed: form.optional_text("breed"),
            sex: form.optional_choice("sex")?.unwrap_or_default(),
            birth_date: form.optional_date("birth_date")?,
            weight_kg: form.optional_decimal("weight_kg")?,
            color: form.optional_text("color"),
            notes: form.optional_text("notes"),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PetFilter {
    pub text: Option<String>,
    pub species_id: Option<Uuid>,
    pub owner_id: Option<Uuid>,
}

impl TryFrom<&FormInput> for PetFilter {
    type Error = FieldError;

    fn try_from(form: &FormInput) -> Result<Self, Self::Error> {
        Ok(Self {
            text: form.optional_text("q"),
            species_id: form.optional_id("species_id")?,
            owner_id: form.optional_id("owner_id")?,
        })
    }
}

pub struct PatientService;

impl PatientService {
    // Owners

    pub fn create_owner(
        records: &mut ClinicRecords,
        input: OwnerInput,
        now: DateTime<Utc>,
    ) -> CoreResult<Uuid> {
        let (document, full_name) = Self::validate_owner(records, None, &input)?;
        let mut owner = Owner::new(document, full_name, now);
        owner.phone = clean_text(input.phone);
        owner.email = clean_text(input.email);
        owner.address = clean_text(input.address);
        let id = owner.id;
        records.owners.push(owner);
        Ok(id)
    }

    pub fn update_owner(
        records: &mut ClinicRecords,
        owner_id: Uuid,
        input: OwnerInput,
    ) -> CoreResult<()> {
        let (document, full_name) = Self::validate_owner(records, Some(owner_id), &input)?;
        let owner = records
            .owner_mut(owner_id)
            .ok_or_else(|| CoreError::not_found("owner", owner_id))?;
        owner.document_number = document;
        owner.full_name = full_name;
        owner.phone = clean_text(input.phone);
        owner.email = clean_text(input.email);
        owner.address = clean_text(input.address);
        Ok(())
    }

    /// Deactivating an owner also deactivates their pets. Reactivation leaves pets as they are.
    pub fn set_owner_active(
        records: &mut ClinicRecords,
        owner_id: Uuid,
        active: bool,
    ) -> CoreResult<()> {
        records
            .owner_mut(owner_id)
            .ok_or_else(|| CoreError::not_found("owner", owner_id))?
            .active = active;
        if !active {
            records
                .pets
                .iter_mut()
                .filter(|pet| pet.owner_id == owner_id)
                .for_each(|pet| pet.active = false);
        }
        Ok(())
    }

    /// Active owners matching name, document or phone, sorted by name.
    pub fn search_owners<'a>(records: &'a ClinicRecords, term: &str) -> Vec<&'a Owner> {
        let mut owners: Vec<&Owner> = records
            .owners
            .iter()
            .filter(|owner| owner.active && owner.matches(term))
            .collect();
        owners.sort_by_key(|owner| owner.full_name.to_lowercase());
        owners
    }

    /// Picker lookup: empty below [`MIN_SEARCH_LEN`] characters, capped at [`QUICK_SEARCH_LIMIT`].
    pub fn quick_search_owners<'a>(records: &'a ClinicRecords, term: &str) -> Vec<&'a Owner> {
        if term.trim().chars().count() < MIN_SEARCH_LEN {
            return Vec::new();
        }
        let mut owners = Self::search_owners(records, term);
        owners.truncate(QUICK_SEARCH_LIMIT);
        owners
    }

    pub fn find_owner_by_document<'a>(
        records: &'a ClinicRecords,
        document_number: &str,
    ) -> Option<&'a Owner> {
        let document = document_number.trim();
        records
            .owners
            .iter()
            .find(|owner| owner.document_number.eq_ignore_ascii_case(document))
    }

    // Pets

    pub fn create_pet(records: &mut ClinicRecords, input: PetInput) -> CoreResult<Uuid> {
        let name = Self::validate_pet(records, &input)?;
        let mut pet = Pet::new(input.owner_id, input.species_id, name);
        Self::apply_pet_fields(&mut pet, input);
        let id = pet.id;
        records.pets.push(pet);
        Ok(id)
    }

    /// Replaces every editable field, including a transfer to another active owner.
    pub fn update_pet(records: &mut ClinicRecords, pet_id: Uuid, input: PetInput) -> CoreResult<()> {
        records
            .pet(pet_id)
            .ok_or_else(|| CoreError::not_found("pet", pet_id))?;
        let name = Self::validate_pet(records, &input)?;
        let pet = records
            .pet_mut(pet_id)
            .ok_or_else(|| CoreError::not_found("pet", pet_id))?;
        pet.owner_id = input.owner_id;
        pet.species_id = input.species_id;
        pet.name = name;
        Self::apply_pet_fields(pet, input);
        Ok(())
    }

    pub fn set_pet_active(records: &mut ClinicRecords, pet_id: Uuid, active: bool) -> CoreResult<()> {
        if active {
            let owner_id = records
                .pet(pet_id)
                .ok_or_else(|| CoreError::not_found("pet", pet_id))?
                .owner_id;
            let owner_active = records.owner(owner_id).is_some_and(|owner| owner.active);
            if !owner_active {
                return Err(CoreError::Precondition(
                    "cannot reactivate a pet whose owner is inactive".into(),
                ));
            }
        }
        records
            .pet_mut(pet_id)
            .ok_or_else(|| CoreError::not_found("pet", pet_id))?
            .active = active;
        Ok(())
    }

    /// Active pets filtered by name, species and owner, sorted by name.
    pub fn search_pets<'a>(records: &'a ClinicRecords, filter: &PetFilter) -> Vec<&'a Pet> {
        let needle = filter
            .text
            .as_deref()
            .map(|text| text.trim().to_lowercase())
            .unwrap_or_default();
        let mut pets: Vec<&Pet> = records
            .pets
            .iter()
            .filter(|pet| pet.active)
            .filter(|pet| filter.species_id.map_or(true, |id| pet.species_id == id))
            .filter(|pet| filter.owner_id.map_or(true, |id| pet.owner_id == id))
            .filter(|pet| needle.is_empty() || pet.name.to_lowercase().contains(&needle))
            .collect();
        pets.sort_by_key(|pet| pet.name.to_lowercase());
        pets
    }

    pub fn quick_search_pets<'a>(records: &'a ClinicRecords, term: &str) -> Vec<&'a Pet> {
        if term.trim().chars().count() < MIN_SEARCH_LEN {
            return Vec::new();
        }
        let filter = PetFilter {
            text: Some(term.to_string()),
            ..PetFilter::default()
        };
        let mut pets = Self::search_pets(records, &filter);
        pets.truncate(QUICK_SEARCH_LIMIT);
        pets
    }

    /// Active pets of one owner.
    pub fn pets_of_owner(records: &ClinicRecords, owner_id: Uuid) -> Vec<&Pet> {
        let mut pets: Vec<&Pet> = records.pets_of(owner_id).filter(|pet| pet.active).collect();
        pets.sort_by_key(|pet| pet.name.to_lowercase());
        pets
    }

    fn validate_owner(
        records: &ClinicRecords,
        exclude: Option<Uuid>,
        input: &OwnerInput,
    ) -> CoreResult<(String, String)> {
        let document = input.document_number.trim().to_string();
        if document.is_empty() {
            return Err(CoreError::Validation("document number is required".into()));
        }
        let full_name = input.full_name.trim().to_string();
        if full_name.is_empty() {
            return Err(CoreError::Validation("owner name is required".into()));
        }
        let taken = records.owners.iter().any(|owner| {
            Some(owner.id) != exclude && owner.document_number.eq_ignore_ascii_case(&document)
        });
        if taken {
            return Err(CoreError::Conflict(format!(
                "an owner with document `{}` already exists",
                document
            )));
        }
        Ok((document, full_name))
    }

    fn validate_pet(records: &ClinicRecords, input: &PetInput) -> CoreResult<String> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(CoreError::Validation("pet name is required".into()));
        }
        let owner = records
            .owner(input.owner_id)
            .ok_or_else(|| CoreError::not_found("owner", input.owner_id))?;
        if !owner.active {
            return Err(CoreError::Precondition(format!(
                "owner {} is inactive",
                owner.full_name
            )));
        }
        records
            .species_entry(input.species_id)
            .ok_or_else(|| CoreError::not_found("species", input.species_id))?;
        if let Some(weight) = input.weight_kg {
            if weight <= Decimal::ZERO {
                return Err(CoreError::Validation("weight must be positive".into()));
            }
        }
        Ok(name)
    }

    fn apply_pet_fields(pet: &mut Pet, input: PetInput) {
        pet.breed = clean_text(input.breed);
        pet.sex = input.sex;
        pet.birth_date = input.birth_date;
        pet.weight_kg = input.weight_kg.map(round_money);
        pet.color = clean_text(input.color);
        pet.notes = clean_text(input.notes);
    }
}
