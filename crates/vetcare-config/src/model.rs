use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::ConfigError;

const DEFAULT_FOLDER: &str = "VetCare";

/// Clinic-wide settings persisted as `config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "Config::default_clinic_name")]
    pub clinic_name: String,
    pub locale: String,
    pub currency: String,
    #[serde(default = "Config::default_currency_symbol")]
    pub currency_symbol: String,
    /// Whole percentage applied as sales tax on invoices.
    #[serde(default = "Config::default_tax_percent")]
    pub tax_percent: u32,
    #[serde(default = "Config::default_window_days")]
    pub reminder_window_days: u32,
    #[serde(default = "Config::default_window_days")]
    pub upcoming_window_days: u32,
    #[serde(default = "Config::default_report_days")]
    pub report_default_days: u32,
    #[serde(default = "Config::default_backup_retention")]
    pub backup_retention: usize,
    #[serde(default = "Config::default_ui_color_enabled")]
    pub ui_color_enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Directory holding `clinic.json`. Defaults to `data/` under the clinic home.
    pub data_root: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Directory holding clinic backups. Defaults to `backups/` under the clinic home.
    pub backup_root: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            clinic_name: Self::default_clinic_name(),
            locale: "es-PE".into(),
            currency: "PEN".into(),
            currency_symbol: Self::default_currency_symbol(),
            tax_percent: Self::default_tax_percent(),
            reminder_window_days: Self::default_window_days(),
            upcoming_window_days: Self::default_window_days(),
            report_default_days: Self::default_report_days(),
            backup_retention: Self::default_backup_retention(),
            ui_color_enabled: Self::default_ui_color_enabled(),
            data_root: None,
            backup_root: None,
        }
    }
}

impl Config {
    pub fn default_clinic_name() -> String {
        "Veterinary Clinic".into()
    }

    pub fn default_currency_symbol() -> String {
        "S/".into()
    }

    pub fn default_tax_percent() -> u32 {
        18
    }

    pub fn default_window_days() -> u32 {
        7
    }

    pub fn default_report_days() -> u32 {
        30
    }

    pub fn default_backup_retention() -> usize {
        5
    }

    pub fn default_ui_color_enabled() -> bool {
        true
    }

    /// Rejects settings the services cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tax_percent > 100 {
            return Err(ConfigError::Invalid {
                field: "tax_percent",
                reason: format!("{} is above 100", self.tax_percent),
            });
        }
        if self.currency_symbol.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "currency_symbol",
                reason: "must not be blank".into(),
            });
        }
        if self.backup_retention == 0 {
            return Err(ConfigError::Invalid {
                field: "backup_retention",
                reason: "keep at least one backup".into(),
            });
        }
        Ok(())
    }

    /// Configured `data_root`, else `data/` under `base`.
    pub fn resolve_data_root(&self, base: &Path) -> PathBuf {
        self.data_root
            .clone()
            .unwrap_or_else(|| base.join("data"))
    }

    pub fn resolve_backup_root(&self, base: &Path) -> PathBuf {
        self.backup_root
            .clone()
            .unwrap_or_else(|| base.join("backups"))
    }
}

/// `~/Documents/VetCare`, falling back to the home directory, then `.`.
pub fn default_home() -> PathBuf {
    dirs::document_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_FOLDER)
}
