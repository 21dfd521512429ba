//! Reference catalogs: species, vaccines, billable services and veterinarians.

use rust_decimal::Decimal;
use uuid::Uuid;
use vetcare_domain::{
    clean_text, round_money, ClinicRecords, Service, ServiceCategory, Species, Vaccine,
    Veterinarian, DEFAULT_VACCINE_INTERVAL_DAYS, MAX_VACCINE_INTERVAL_DAYS,
};

use crate::{
    input::{FieldError, FormInput},
    CoreError, CoreResult,
};

#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesInput {
    pub name: String,
    pub description: Option<String>,
}

impl TryFrom<&FormInput> for SpeciesInput {
    type Error = FieldError;

    fn try_from(form: &FormInput) -> Result<Self, Self::Error> {
        Ok(Self {
            name: form.text("name")?,
            description: form.optional_text("description"),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VaccineInput {
    pub name: String,
    pub description: Option<String>,
    pub interval_days: u32,
    pub species_id: Option<Uuid>,
    pub doses_required: u32,
    pub min_age_days: Option<u32>,
}

impl VaccineInput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            interval_days: DEFAULT_VACCINE_INTERVAL_DAYS,
            species_id: None,
            doses_required: 1,
            min_age_days: None,
        }
    }
}

impl TryFrom<&FormInput> for VaccineInput {
    type Error = FieldError;

    fn try_from(form: &FormInput) -> Result<Self, Self::Error> {
        Ok(Self {
            name: form.text("name")?,
            description: form.optional_text("description"),
            interval_days: form.count("interval_days", DEFAULT_VACCINE_INTERVAL_DAYS)?,
            species_id: form.optional_id("species_id")?,
            doses_required: form.quantity("doses_required")?,
            min_age_days: form.optional_count("min_age_days")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceInput {
    /// Generated as `SRV-nnnn` when absent.
    pub code: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub category: ServiceCategory,
    pub price: Decimal,
}

impl ServiceInput {
    pub fn new(name: impl Into<String>, category: ServiceCategory, price: Decimal) -> Self {
        Self {
            code: None,
            name: name.into(),
            description: None,
            category,
            price,
        }
    }
}

impl TryFrom<&FormInput> for ServiceInput {
    type Error = FieldError;

    fn try_from(form: &FormInput) -> Result<Self, Self::Error> {
        Ok(Self {
            code: form.optional_text("code").map(|code| code.to_uppercase()),
            name: form.text("name")?,
            description: form.optional_text("description"),
            category: form
                .optional_choice("category")?
                .unwrap_or(ServiceCategory::Other),
            price: form.decimal_or("price", Decimal::ZERO)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceFilter {
    pub text: Option<String>,
    pub category: Option<ServiceCategory>,
    pub include_inactive: bool,
}

impl TryFrom<&FormInput> for ServiceFilter {
    type Error = FieldError;

    fn try_from(form: &FormInput) -> Result<Self, Self::Error> {
        Ok(Self {
            text: form.optional_text("q"),
            category: form.optional_choice("category")?,
            include_inactive: form.flag("include_inactive"),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VeterinarianInput {
    pub full_name: String,
    pub license_number: String,
    pub specialty: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub user_id: Option<Uuid>,
}

impl VeterinarianInput {
    pub fn new(full_name: impl Into<String>, license_number: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            license_number: license_number.into(),
            specialty: None,
            phone: None,
            email: None,
            user_id: None,
        }
    }
}

impl TryFrom<&FormInput> for VeterinarianInput {
    type Error = FieldError;

    fn try_from(form: &FormInput) -> Result<Self, Self::Error> {
        Ok(Self {
            full_name: form.text("full_name")?,
            license_number: form.text("license_number")?,
            specialty: form.optional_text("specialty"),
            phone: form.optional_text("phone"),
            email: form.optional_email("email")?,
            user_id: form.optional_id("user_id")?,
        })
    }
}

pub struct CatalogService;

impl CatalogService {
    // Species

    pub fn create_species(records: &mut ClinicRecords, input: SpeciesInput) -> CoreResult<Uuid> {
        let name = validate_name(&input.name, "species")?;
        Self::ensure_species_name_free(records, None, &name)?;
        let mut species = Species::new(name);
        species.description = clean_text(input.description);
        let id = species.id;
        records.species.push(species);
        Ok(id)
    }

    pub fn update_species(
        records: &mut ClinicRecords,
        species_id: Uuid,
        input: SpeciesInput,
    ) -> CoreResult<()> {
        let name = validate_name(&input.name, "species")?;
        Self::ensure_species_name_free(records, Some(species_id), &name)?;
        let species = records
            .species_entry_mut(species_id)
            .ok_or_else(|| CoreError::not_found("species", species_id))?;
        species.name = name;
        species.description = clean_text(input.description);
        Ok(())
    }

    pub fn set_species_active(
        records: &mut ClinicRecords,
        species_id: Uuid,
        active: bool,
    ) -> CoreResult<()> {
        records
            .species_entry_mut(species_id)
            .ok_or_else(|| CoreError::not_found("species", species_id))?
            .active = active;
        Ok(())
    }

    /// Active species sorted by name.
    pub fn active_species(records: &ClinicRecords) -> Vec<&Species> {
        let mut species: Vec<&Species> = records.species.iter().filter(|s| s.active).collect();
        species.sort_by_key(|s| s.name.to_lowercase());
        species
    }

    // Vaccines

    pub fn create_vaccine(records: &mut ClinicRecords, input: VaccineInput) -> CoreResult<Uuid> {
        let name = validate_name(&input.name, "vaccine")?;
        validate_interval(input.interval_days)?;
        Self::ensure_species_exists(records, input.species_id)?;
        let mut vaccine = Vaccine::new(name)
            .with_interval(input.interval_days)
            .for_species(input.species_id)
            .with_doses(input.doses_required);
        vaccine.description = clean_text(input.description);
        vaccine.min_age_days = input.min_age_days;
        let id = vaccine.id;
        records.vaccines.push(vaccine);
        Ok(id)
    }

    pub fn update_vaccine(
        records: &mut ClinicRecords,
        vaccine_id: Uuid,
        input: VaccineInput,
    ) -> CoreResult<()> {
        let name = validate_name(&input.name, "vaccine")?;
        validate_interval(input.interval_days)?;
        Self::ensure_species_exists(records, input.species_id)?;
        let vaccine = records
            .vaccine_mut(vaccine_id)
            .ok_or_else(|| CoreError::not_found("vaccine", vaccine_id))?;
        vaccine.name = name;
        vaccine.description = clean_text(input.description);
        vaccine.interval_days = input.interval_days;
        vaccine.species_id = input.species_id;
        vaccine.doses_required = input.doses_required.max(1);
        vaccine.min_age_days = input.min_age_days;
        Ok(())
    }

    pub fn set_vaccine_active(
        records: &mut ClinicRecords,
        vaccine_id: Uuid,
        active: bool,
    ) -> CoreResult<()> {
        records
            .vaccine_mut(vaccine_id)
            .ok_or_else(|| CoreError::not_found("vaccine", vaccine_id))?
            .active = active;
        Ok(())
    }

    /// Active vaccines usable for the species, including unrestricted ones.
    pub fn vaccines_for_species(records: &ClinicRecords, species_id: Uuid) -> Vec<&Vaccine> {
        let mut vaccines: Vec<&Vaccine> = records
            .vaccines
            .iter()
            .filter(|vaccine| vaccine.active && vaccine.applies_to(species_id))
            .collect();
        vaccines.sort_by_key(|vaccine| vaccine.name.to_lowercase());
        vaccines
    }

    // Services

    /// Next free `SRV-nnnn` code, one past the highest sequence in use.
    pub fn next_service_code(records: &ClinicRecords) -> String {
        let highest = records
            .services
            .iter()
            .filter_map(|service| Service::code_sequence(&service.code))
            .max()
            .unwrap_or(0);
        Service::code_for(highest + 1)
    }

    pub fn create_service(records: &mut ClinicRecords, input: ServiceInput) -> CoreResult<Uuid> {
        let name = validate_name(&input.name, "service")?;
        validate_price(input.price)?;
        let code = match input.code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => {
                let code = code.to_uppercase();
                Self::ensure_service_code_free(records, None, &code)?;
                code
            }
            _ => Self::next_service_code(records),
        };
        let mut service = Service::new(code, name, input.category, input.price);
        service.description = clean_text(input.description);
        let id = service.id;
        records.services.push(service);
        Ok(id)
    }

    /// Updates name, category, price and description. A blank code keeps the current one.
    pub fn update_service(
        records: &mut ClinicRecords,
        service_id: Uuid,
        input: ServiceInput,
    ) -> CoreResult<()> {
        let name = validate_name(&input.name, "service")?;
        validate_price(input.price)?;
        let code = match input.code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => {
                let code = code.to_uppercase();
                Self::ensure_service_code_free(records, Some(service_id), &code)?;
                Some(code)
            }
            _ => None,
        };
        let service = records
            .service_mut(service_id)
            .ok_or_else(|| CoreError::not_found("service", service_id))?;
        if let Some(code) = code {
            service.code = code;
        }
        service.name = name;
        service.description = clean_text(input.description);
        service.category = input.category;
        service.price = round_money(input.price);
        Ok(())
    }

    pub fn set_service_active(
        records: &mut ClinicRecords,
        service_id: Uuid,
        active: bool,
    ) -> CoreResult<()> {
        records
            .service_mut(service_id)
            .ok_or_else(|| CoreError::not_found("service", service_id))?
            .active = active;
        Ok(())
    }

    /// Matches the text against code, name and description, sorted by category then name.
    pub fn search_services<'a>(
        records: &'a ClinicRecords,
        filter: &ServiceFilter,
    ) -> Vec<&'a Service> {
        let needle = filter
            .text
            .as_deref()
            .map(|text| text.trim().to_lowercase())
            .unwrap_or_default();
        let mut services: Vec<&Service> = records
            .services
            .iter()
            .filter(|service| filter.include_inactive || service.active)
            .filter(|service| filter.category.map_or(true, |c| service.category == c))
            .filter(|service| {
                needle.is_empty()
                    || service.code.to_lowercase().contains(&needle)
                    || service.name.to_lowercase().contains(&needle)
                    || service
                        .description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(&needle))
            })
            .collect();
        services.sort_by(|a, b| {
            (a.category.to_string(), a.name.to_lowercase())
                .cmp(&(b.category.to_string(), b.name.to_lowercase()))
        });
        services
    }

    // Veterinarians

    pub fn create_veterinarian(
        records: &mut ClinicRecords,
        input: VeterinarianInput,
    ) -> CoreResult<Uuid> {
        let (full_name, license) = Self::validate_veterinarian(records, None, &input)?;
        let mut vet = Veterinarian::new(full_name, license);
        vet.specialty = clean_text(input.specialty);
        vet.phone = clean_text(input.phone);
        vet.email = clean_text(input.email);
        vet.user_id = input.user_id;
        let id = vet.id;
        records.veterinarians.push(vet);
        Ok(id)
    }

    pub fn update_veterinarian(
        records: &mut ClinicRecords,
        veterinarian_id: Uuid,
        input: VeterinarianInput,
    ) -> CoreResult<()> {
        let (full_name, license) =
            Self::validate_veterinarian(records, Some(veterinarian_id), &input)?;
        let vet = records
            .veterinarian_mut(veterinarian_id)
            .ok_or_else(|| CoreError::not_found("veterinarian", veterinarian_id))?;
        vet.full_name = full_name;
        vet.license_number = license;
        vet.specialty = clean_text(input.specialty);
        vet.phone = clean_text(input.phone);
        vet.email = clean_text(input.email);
        vet.user_id = input.user_id;
        Ok(())
    }

    pub fn set_veterinarian_active(
        records: &mut ClinicRecords,
        veterinarian_id: Uuid,
        active: bool,
    ) -> CoreResult<()> {
        records
            .veterinarian_mut(veterinarian_id)
            .ok_or_else(|| CoreError::not_found("veterinarian", veterinarian_id))?
            .active = active;
        Ok(())
    }

    pub fn active_veterinarians(records: &ClinicRecords) -> Vec<&Veterinarian> {
        let mut vets: Vec<&Veterinarian> =
            records.veterinarians.iter().filter(|vet| vet.active).collect();
        vets.sort_by_key(|vet| vet.full_name.to_lowercase());
        vets
    }

    fn validate_veterinarian(
        records: &ClinicRecords,
        exclude: Option<Uuid>,
        input: &VeterinarianInput,
    ) -> CoreResult<(String, String)> {
        let full_name = validate_name(&input.full_name, "veterinarian")?;
        let license = input.license_number.trim().to_string();
        if license.is_empty() {
            return Err(CoreError::Validation("license number is required".into()));
        }
        let taken = records
            .veterinarians
            .iter()
            .any(|vet| Some(vet.id) != exclude && vet.license_number.eq_ignore_ascii_case(&license));
        if taken {
            return Err(CoreError::Conflict(format!(
                "license `{}` is already registered",
                license
            )));
        }
        if let Some(user_id) = input.user_id {
            records
                .user(user_id)
                .ok_or_else(|| CoreError::not_found("user", user_id))?;
            let linked_elsewhere = records
                .veterinarians
                .iter()
                .any(|vet| Some(vet.id) != exclude && vet.user_id == Some(user_id));
            if linked_elsewhere {
                return Err(CoreError::Conflict(
                    "user is already linked to another veterinarian".into(),
                ));
            }
        }
        Ok((full_name, license))
    }

    fn ensure_species_name_free(
        records: &ClinicRecords,
        exclude: Option<Uuid>,
        name: &str,
    ) -> CoreResult<()> {
        let lowered = name.to_lowercase();
        let taken = records
            .species
            .iter()
            .any(|s| Some(s.id) != exclude && s.name.to_lowercase() == lowered);
        if taken {
            return Err(CoreError::Conflict(format!("species `{}` already exists", name)));
        }
        Ok(())
    }

    fn ensure_species_exists(records: &ClinicRecords, species_id: Option<Uuid>) -> CoreResult<()> {
        if let Some(id) = species_id {
            records
                .species_entry(id)
                .ok_or_else(|| CoreError::not_found("species", id))?;
        }
        Ok(())
    }

    fn ensure_service_code_free(
        records: &ClinicRecords,
        exclude: Option<Uuid>,
        code: &str,
    ) -> CoreResult<()> {
        let taken = records
            .services
            .iter()
            .any(|s| Some(s.id) != exclude && s.code.eq_ignore_ascii_case(code));
        if taken {
            return Err(CoreError::Conflict(format!(
                "service code `{}` is already in use",
                code
            )));
        }
        Ok(())
    }
}

fn validate_name(name: &str, what: &str) -> CoreResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation(format!("{} name is required", what)));
    }
    Ok(trimmed.to_string())
}

fn validate_interval(days: u32) -> CoreResult<()> {
    if days > MAX_VACCINE_INTERVAL_DAYS {
        return Err(CoreError::Validation(format!(
            "dose interval cannot exceed {} days",
            MAX_VACCINE_INTERVAL_DAYS
        )));
    }
    Ok(())
}

fn validate_price(price: Decimal) -> CoreResult<()> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(CoreError::Validation("price cannot be negative".into()));
    }
    Ok(())
}
