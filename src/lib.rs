#![doc(test(attr(deny(warnings))))]

//! VetCare wires the clinic services, JSON persistence and configuration
//! into one application and ships the `vetcare_cli` maintenance binary.

pub mod app;
pub mod cli;
pub mod errors;
pub mod utils;

pub use app::ClinicApp;
pub use errors::{VetcareError, VetcareResult};

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup info log.
pub fn init() {
    INIT_TRACING.call_once(|| {
        utils::init_tracing();
        tracing::info!("VetCare tracing initialized.");
    });
}

#[cfg(test)]
mod tests {
    #[test]
    fn init_does_not_panic() {
        super::init();
        super::init();
    }
}
