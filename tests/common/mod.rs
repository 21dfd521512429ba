#![allow(dead_code)]

use std::{path::PathBuf, sync::Arc, sync::Mutex};

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use tempfile::TempDir;
use vetcare::ClinicApp;
use vetcare_core::{FixedClock, NewUserInput};
use vetcare_domain::Role;

/// Holds TempDir guards so temporary folders live for the duration of the test run.
static TEST_DIRS: Lazy<Mutex<Vec<TempDir>>> = Lazy::new(|| Mutex::new(Vec::new()));

pub const ADMIN_PASSWORD: &str = "secret1";

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 14).expect("valid date")
}

/// Creates an isolated clinic home directory.
pub fn temp_home() -> PathBuf {
    let temp = TempDir::new().expect("create temp dir");
    let base = temp.path().to_path_buf();
    TEST_DIRS.lock().expect("lock temp dir registry").push(temp);
    base
}

pub fn open_clinic(home: &PathBuf) -> ClinicApp {
    ClinicApp::open_with_clock(home.clone(), Arc::new(FixedClock::on(today())))
        .expect("open clinic")
}

/// Fresh clinic with the bootstrap administrator signed in.
pub fn admin_clinic() -> (ClinicApp, PathBuf) {
    let home = temp_home();
    let app = open_clinic(&home);
    app.register_user(NewUserInput::new(
        "admin",
        "admin@clinic.test",
        "Clinic Admin",
        ADMIN_PASSWORD,
        Role::Administrator,
    ))
    .expect("bootstrap admin");
    app.sign_in("admin", ADMIN_PASSWORD).expect("sign in");
    (app, home)
}
