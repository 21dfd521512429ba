use std::{collections::HashSet, fs, sync::Arc, thread};

use chrono::Utc;
use tempfile::tempdir;
use uuid::Uuid;
use vetcare_core::{
    storage::ClinicStorage, BillingService, CatalogService, NewInvoiceInput, RecordStore,
    SpeciesInput, SystemClock,
};
use vetcare_domain::{percent_to_rate, Actor, ClinicRecords, Owner, Role};
use vetcare_storage_json::{JsonClinicStorage, StoragePaths};

fn storage_in(dir: &std::path::Path) -> JsonClinicStorage {
    JsonClinicStorage::new(StoragePaths::under(dir)).expect("create storage")
}

fn with_owner(document: &str) -> ClinicRecords {
    let mut records = ClinicRecords::new();
    records.owners.push(Owner::new(document, "Maria Lopez", Utc::now()));
    records
}

#[test]
fn missing_file_loads_as_empty_clinic() {
    let dir = tempdir().expect("tempdir");
    let storage = storage_in(dir.path());

    let records = storage.load().expect("load");
    assert_eq!(records.revision, 0);
    assert!(records.owners.is_empty());
    assert!(!storage.clinic_path().exists());
}

#[test]
fn commit_writes_file_and_leaves_no_temp_behind() {
    let dir = tempdir().expect("tempdir");
    let storage = storage_in(dir.path());

    let mut records = with_owner("40001234");
    records.revision = 1;
    storage.commit(&records, 0).expect("commit");

    let loaded = storage.load().expect("load");
    assert_eq!(loaded.revision, 1);
    assert_eq!(loaded.owners[0].document_number, "40001234");

    let leftovers: Vec<_> = fs::read_dir(&storage.paths().data_root)
        .expect("read dir")
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn stale_revision_is_rejected_as_conflict() {
    let dir = tempdir().expect("tempdir");
    let storage = storage_in(dir.path());

    let mut first = with_owner("1");
    first.revision = 1;
    storage.commit(&first, 0).expect("first commit");

    let mut stale = with_owner("2");
    stale.revision = 1;
    let err = storage.commit(&stale, 0).expect_err("stale commit");
    assert!(err.is_conflict());
    assert_eq!(storage.load().expect("load").owners[0].document_number, "1");
}

#[test]
fn backups_restore_and_bump_revision() {
    let dir = tempdir().expect("tempdir");
    let storage = storage_in(dir.path());

    let mut original = with_owner("1");
    original.revision = 1;
    storage.commit(&original, 0).expect("commit");
    let info = storage.backup(Some("Before cleanup")).expect("backup");
    assert!(info.id.starts_with("clinic_"));
    assert!(info.id.ends_with("_before-cleanup.json"));

    let mut changed = ClinicRecords::new();
    changed.revision = 2;
    storage.commit(&changed, 1).expect("second commit");

    let backups = storage.list_backups().expect("list");
    assert!(backups.iter().any(|entry| entry.id == info.id));

    let restored = storage.restore_backup(&info).expect("restore");
    assert_eq!(restored.revision, 3);
    assert_eq!(restored.owners.len(), 1);
    assert_eq!(storage.load().expect("load").revision, 3);
}

#[test]
fn backups_are_pruned_to_retention() {
    let dir = tempdir().expect("tempdir");
    let storage =
        JsonClinicStorage::with_retention(StoragePaths::under(dir.path()), 2).expect("storage");

    for note in ["one", "two", "three", "four"] {
        storage.backup(Some(note)).expect("backup");
    }

    let backups = storage.list_backups().expect("list");
    assert_eq!(backups.len(), 2);
    assert!(backups[0].id.ends_with("_four.json"));
    assert!(backups[1].id.ends_with("_three.json"));
    assert_eq!(storage.list_backup_metadata().expect("metadata").len(), 2);
}

#[test]
fn record_store_round_trips_through_json_file() {
    let dir = tempdir().expect("tempdir");
    let backend = Arc::new(storage_in(dir.path()));
    let store = RecordStore::new(backend.clone(), Arc::new(SystemClock));

    store
        .transaction(|records| {
            CatalogService::create_species(
                records,
                SpeciesInput {
                    name: "Dog".into(),
                    description: None,
                },
            )
        })
        .expect("create species");

    let reopened = storage_in(dir.path());
    let records = reopened.load().expect("reload");
    assert_eq!(records.revision, 1);
    assert_eq!(records.species[0].name, "Dog");
    assert!(records.updated_at.is_some());
}

#[test]
fn corrupt_file_surfaces_as_serialization_error() {
    let dir = tempdir().expect("tempdir");
    let storage = storage_in(dir.path());
    fs::write(storage.clinic_path(), "{ not json").expect("write");

    let err = storage.load().expect_err("corrupt");
    assert!(err.is_persistence());
}

#[test]
fn deleted_backups_disappear_from_the_listing() {
    let dir = tempdir().expect("tempdir");
    let storage = storage_in(dir.path());
    let keep = storage.backup(Some("keep")).expect("backup");
    let drop = storage.backup(Some("drop")).expect("backup");

    storage.delete_backup(&drop.id).expect("delete");
    storage.delete_backup("clinic_19990101_000000.json").expect("missing is ignored");

    let ids: Vec<String> = storage
        .list_backups()
        .expect("list")
        .into_iter()
        .map(|entry| entry.id)
        .collect();
    assert_eq!(ids, vec![keep.id]);
}

#[test]
fn two_storages_on_one_directory_never_lose_or_duplicate_commits() {
    let dir = tempdir().expect("tempdir");
    let seed = RecordStore::new(Arc::new(storage_in(dir.path())), Arc::new(SystemClock));
    let owner = Owner::new("40001234", "Maria Lopez", Utc::now());
    let owner_id = owner.id;
    seed.transaction(|records| {
        records.owners.push(owner.clone());
        Ok(())
    })
    .expect("seed owner");

    let actor = Arc::new(Actor {
        user_id: Uuid::new_v4(),
        username: "front".into(),
        role: Role::Receptionist,
    });
    let per_writer = 15;
    let handles: Vec<_> = (0..2)
        .map(|_| {
            // Each writer owns its backend, as a second process would.
            let store = RecordStore::new(Arc::new(storage_in(dir.path())), Arc::new(SystemClock))
                .with_attempts(50);
            let actor = Arc::clone(&actor);
            thread::spawn(move || {
                (0..per_writer)
                    .map(|_| {
                        store.transaction(|records| {
                            BillingService::create_invoice(
                                records,
                                NewInvoiceInput::for_owner(owner_id),
                                percent_to_rate(18),
                                &actor,
                                Utc::now(),
                            )
                        })
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut reported = 0;
    for handle in handles {
        for result in handle.join().expect("writer thread") {
            result.expect("every commit is reported as it happened");
            reported += 1;
        }
    }

    let storage = storage_in(dir.path());
    let records = storage.load().expect("load");
    assert_eq!(records.invoices.len(), reported);
    assert_eq!(records.revision, 1 + reported as u64);
    let numbers: HashSet<&str> = records.invoices.iter().map(|i| i.number.as_str()).collect();
    assert_eq!(numbers.len(), reported);
    assert!(!storage.lock_path().exists());
    let leftovers = fs::read_dir(&storage.paths().data_root)
        .expect("read dir")
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
        .count();
    assert_eq!(leftovers, 0);
}

#[test]
fn commit_waits_out_a_lock_held_by_another_storage() {
    let dir = tempdir().expect("tempdir");
    let first = storage_in(dir.path());
    let second = storage_in(dir.path());
    fs::write(first.lock_path(), "4242").expect("foreign lock");

    let release = {
        let lock = first.lock_path();
        thread::spawn(move || {
            thread::sleep(std::time::Duration::from_millis(50));
            fs::remove_file(lock).expect("release");
        })
    };
    let mut records = with_owner("1");
    records.revision = 1;
    second.commit(&records, 0).expect("commit after release");
    release.join().expect("release thread");
    assert_eq!(first.load().expect("load").revision, 1);
}
