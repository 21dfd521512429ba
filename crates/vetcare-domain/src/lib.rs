//! vetcare-domain
//!
//! Pure domain models for the clinic (invoices, vaccination schedules,
//! consultations, catalogs, patients, users) and the computations that
//! belong to them. No I/O, no storage, no terminal output.

pub mod catalog;
pub mod clinic;
pub mod common;
pub mod consultation;
pub mod invoice;
pub mod patient;
pub mod user;
pub mod vaccination;

pub use catalog::*;
pub use clinic::*;
pub use common::*;
pub use consultation::*;
pub use invoice::*;
pub use patient::*;
pub use user::*;
pub use vaccination::*;
