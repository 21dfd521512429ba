//! vetcare-config
//!
//! Clinic settings model and its on-disk persistence.

pub mod error;
pub mod manager;
pub mod model;

pub use error::ConfigError;
pub use manager::ConfigManager;
pub use model::{default_home, Config};
