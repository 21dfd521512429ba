//! vetcare-core
//!
//! Business services for the clinic: billing, vaccination scheduling,
//! consultations, users, catalogs, and reports.
//! Depends on vetcare-domain. Services operate on an in-memory
//! [`ClinicRecords`](vetcare_domain::ClinicRecords) snapshot; persistence is
//! reached only through the [`storage::ClinicStorage`] trait and the
//! [`store::RecordStore`] unit of work.

pub mod billing_service;
pub mod catalog_service;
pub mod consultation_service;
pub mod error;
pub mod identity;
pub mod input;
pub mod patient_service;
pub mod report_service;
pub mod storage;
pub mod store;
pub mod time;
pub mod user_service;
pub mod vaccination_service;
pub mod view;

pub use billing_service::*;
pub use catalog_service::*;
pub use consultation_service::*;
pub use error::{CoreError, CoreResult};
pub use identity::{IdentityProvider, SessionIdentity};
pub use patient_service::*;
pub use report_service::*;
pub use store::RecordStore;
pub use time::{Clock, FixedClock, SystemClock};
pub use user_service::*;
pub use vaccination_service::*;
