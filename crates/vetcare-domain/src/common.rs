//! Shared traits, money helpers, and display enums for clinic records.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Exposes a stable identifier for entities stored in the clinic records.
pub trait Identifiable {
    fn id(&self) -> Uuid;
}

/// Provides read-only access to an entity's display name.
pub trait NamedEntity {
    fn name(&self) -> &str;
}

/// Converts an entity into a user-facing display label.
pub trait Displayable {
    fn display_label(&self) -> String;
}

/// Maps a lifecycle state onto the presentation palette.
pub trait StatusColored {
    fn status_color(&self) -> DisplayColor;
}

/// Errors raised by domain state machines and computations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Precondition(String),
    #[error("{0} not found")]
    NotFound(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
/// Semantic colors understood by the presentation layer.
pub enum DisplayColor {
    Primary,
    Secondary,
    Success,
    Info,
    Warning,
    Danger,
}

impl fmt::Display for DisplayColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DisplayColor::Primary => "primary",
            DisplayColor::Secondary => "secondary",
            DisplayColor::Success => "success",
            DisplayColor::Info => "info",
            DisplayColor::Warning => "warning",
            DisplayColor::Danger => "danger",
        };
        f.write_str(label)
    }
}

/// Number of decimal places kept for monetary amounts.
pub const MONEY_SCALE: u32 = 2;

/// Rounds an amount to currency precision.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp(MONEY_SCALE)
}

/// Converts a whole percentage (e.g. `18`) into a rate (`0.18`).
pub fn percent_to_rate(percent: u32) -> Decimal {
    Decimal::new(i64::from(percent), 2)
}

/// Formats an amount with its currency symbol, e.g. `S/ 147.50`.
pub fn format_money(symbol: &str, value: Decimal) -> String {
    let rounded = round_money(value);
    format!("{} {:.2}", symbol, rounded)
}

/// Trims optional free text, collapsing blank input to `None`.
pub fn clean_text(value: Option<String>) -> Option<String> {
    value.and_then(|raw| {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
