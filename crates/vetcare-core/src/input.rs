//! Typed input-validation boundary.
//!
//! Raw form values arrive as strings. Every conversion returns a tagged
//! [`FieldError`] naming the field and the failure instead of silently
//! falling back to a default. Service input structs implement
//! `TryFrom<&FormInput>` on top of these getters.

use std::{collections::HashMap, fmt, str::FromStr};

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldErrorKind {
    Missing,
    NotANumber,
    Negative,
    OutOfRange { min: i64, max: i64 },
    InvalidDate,
    InvalidId,
    InvalidChoice(String),
    InvalidEmail,
    TooShort { min: usize },
    Mismatch { other: String },
}

impl fmt::Display for FieldErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldErrorKind::Missing => f.write_str("is required"),
            FieldErrorKind::NotANumber => f.write_str("must be a number"),
            FieldErrorKind::Negative => f.write_str("cannot be negative"),
            FieldErrorKind::OutOfRange { min, max } => {
                write!(f, "must be between {} and {}", min, max)
            }
            FieldErrorKind::InvalidDate => f.write_str("is not a valid date"),
            FieldErrorKind::InvalidId => f.write_str("is not a valid identifier"),
            FieldErrorKind::InvalidChoice(reason) => write!(f, "is not a valid option ({})", reason),
            FieldErrorKind::InvalidEmail => f.write_str("is not a valid email address"),
            FieldErrorKind::TooShort { min } => write!(f, "must have at least {} characters", min),
            FieldErrorKind::Mismatch { other } => write!(f, "does not match {}", other),
        }
    }
}

/// A single rejected form field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field} {kind}")]
pub struct FieldError {
    pub field: String,
    pub kind: FieldErrorKind,
}

impl FieldError {
    pub fn new(field: &str, kind: FieldErrorKind) -> Self {
        Self {
            field: field.to_string(),
            kind,
        }
    }
}

pub type FieldResult<T> = Result<T, FieldError>;

/// Raw field values as submitted by the presentation layer.
#[derive(Debug, Clone, Default)]
pub struct FormInput {
    fields: HashMap<String, String>,
}

impl FormInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }

    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.fields.insert(name.to_string(), value.into());
    }

    /// Trimmed value; blank input counts as absent.
    pub fn raw(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    pub fn text(&self, name: &str) -> FieldResult<String> {
        self.raw(name)
            .map(str::to_string)
            .ok_or_else(|| FieldError::new(name, FieldErrorKind::Missing))
    }

    pub fn optional_text(&self, name: &str) -> Option<String> {
        self.raw(name).map(str::to_string)
    }

    /// Non-negative decimal; accepts `,` as the decimal separator.
    pub fn decimal(&self, name: &str) -> FieldResult<Decimal> {
        self.optional_decimal(name)?
            .ok_or_else(|| FieldError::new(name, FieldErrorKind::Missing))
    }

    pub fn decimal_or(&self, name: &str, default: Decimal) -> FieldResult<Decimal> {
        Ok(self.optional_decimal(name)?.unwrap_or(default))
    }

    pub fn optional_decimal(&self, name: &str) -> FieldResult<Option<Decimal>> {
        let Some(raw) = self.raw(name) else {
            return Ok(None);
        };
        let value = Decimal::from_str(&raw.replace(',', "."))
            .map_err(|_| FieldError::new(name, FieldErrorKind::NotANumber))?;
        if value < Decimal::ZERO {
            return Err(FieldError::new(name, FieldErrorKind::Negative));
        }
        Ok(Some(value))
    }

    /// Whole non-negative count, `default` when absent.
    pub fn count(&self, name: &str, default: u32) -> FieldResult<u32> {
        Ok(self.optional_count(name)?.unwrap_or(default))
    }

    pub fn optional_count(&self, name: &str) -> FieldResult<Option<u32>> {
        let Some(raw) = self.raw(name) else {
            return Ok(None);
        };
        let value: i64 = raw
            .parse()
            .map_err(|_| FieldError::new(name, FieldErrorKind::NotANumber))?;
        if value < 0 {
            return Err(FieldError::new(name, FieldErrorKind::Negative));
        }
        u32::try_from(value).map(Some).map_err(|_| {
            FieldError::new(
                name,
                FieldErrorKind::OutOfRange {
                    min: 0,
                    max: i64::from(u32::MAX),
                },
            )
        })
    }

    /// Line quantity: defaults to 1, zero is out of range.
    pub fn quantity(&self, name: &str) -> FieldResult<u32> {
        let value = self.count(name, 1)?;
        if value == 0 {
            return Err(FieldError::new(
                name,
                FieldErrorKind::OutOfRange {
                    min: 1,
                    max: i64::from(u32::MAX),
                },
            ));
        }
        Ok(value)
    }

    pub fn date(&self, name: &str) -> FieldResult<NaiveDate> {
        self.optional_date(name)?
            .ok_or_else(|| FieldError::new(name, FieldErrorKind::Missing))
    }

    pub fn optional_date(&self, name: &str) -> FieldResult<Option<NaiveDate>> {
        self.raw(name)
            .map(|raw| {
                NaiveDate::parse_from_str(raw, DATE_FORMAT)
                    .map_err(|_| FieldError::new(name, FieldErrorKind::InvalidDate))
            })
            .transpose()
    }

    pub fn datetime(&self, name: &str) -> FieldResult<NaiveDateTime> {
        let raw = self
            .raw(name)
            .ok_or_else(|| FieldError::new(name, FieldErrorKind::Missing))?;
        DATETIME_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
            .ok_or_else(|| FieldError::new(name, FieldErrorKind::InvalidDate))
    }

    pub fn id(&self, name: &str) -> FieldResult<Uuid> {
        self.optional_id(name)?
            .ok_or_else(|| FieldError::new(name, FieldErrorKind::Missing))
    }

    pub fn optional_id(&self, name: &str) -> FieldResult<Option<Uuid>> {
        self.raw(name)
            .map(|raw| {
                Uuid::parse_str(raw).map_err(|_| FieldError::new(name, FieldErrorKind::InvalidId))
            })
            .transpose()
    }

    /// Checkbox semantics: absent means `false`.
    pub fn flag(&self, name: &str) -> bool {
        matches!(
            self.raw(name).map(str::to_ascii_lowercase).as_deref(),
            Some("1" | "true" | "on" | "yes")
        )
    }

    pub fn choice<T>(&self, name: &str) -> FieldResult<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.optional_choice(name)?
            .ok_or_else(|| FieldError::new(name, FieldErrorKind::Missing))
    }

    pub fn optional_choice<T>(&self, name: &str) -> FieldResult<Option<T>>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.raw(name)
            .map(|raw| {
                raw.parse::<T>().map_err(|err| {
                    FieldError::new(name, FieldErrorKind::InvalidChoice(err.to_string()))
                })
            })
            .transpose()
    }

    pub fn email(&self, name: &str) -> FieldResult<String> {
        let raw = self.text(name)?;
        if is_plausible_email(&raw) {
            Ok(raw.to_lowercase())
        } else {
            Err(FieldError::new(name, FieldErrorKind::InvalidEmail))
        }
    }

    pub fn optional_email(&self, name: &str) -> FieldResult<Option<String>> {
        match self.raw(name) {
            None => Ok(None),
            Some(_) => self.email(name).map(Some),
        }
    }

    pub fn secret(&self, name: &str, min_len: usize) -> FieldResult<String> {
        let value = self
            .fields
            .get(name)
            .filter(|value| !value.is_empty())
            .cloned()
            .ok_or_else(|| FieldError::new(name, FieldErrorKind::Missing))?;
        if value.chars().count() < min_len {
            return Err(FieldError::new(name, FieldErrorKind::TooShort { min: min_len }));
        }
        Ok(value)
    }
}

fn is_plausible_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        && !value.chars().any(char::is_whitespace)
}
