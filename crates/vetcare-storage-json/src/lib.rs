use std::{
    cmp::Reverse,
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    sync::Mutex,
    thread,
    time::{Duration, SystemTime},
};

use chrono::{DateTime, NaiveDateTime, Utc};
use tempfile::Builder;
use tracing::{debug, info, warn};
use vetcare_core::{
    storage::{BackupInfo, ClinicStorage},
    CoreError,
};
use vetcare_domain::ClinicRecords;

pub const CLINIC_FILE_NAME: &str = "clinic.json";
const FILE_EXTENSION: &str = "json";
const BACKUP_PREFIX: &str = "clinic";
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const TMP_SUFFIX: &str = ".tmp";
pub const LOCK_FILE_NAME: &str = "clinic.lock";
const LOCK_ATTEMPTS: u32 = 400;
const LOCK_RETRY_DELAY: Duration = Duration::from_millis(5);
/// A lock file older than this is treated as left behind by a crashed writer.
const STALE_LOCK_AGE: Duration = Duration::from_secs(30);
pub const DEFAULT_RETENTION: usize = 5;

/// Directories used by the JSON backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    pub data_root: PathBuf,
    pub backup_root: PathBuf,
}

impl StoragePaths {
    /// `data/` and `backups/` under one base directory.
    pub fn under(base: &Path) -> Self {
        Self {
            data_root: base.join("data"),
            backup_root: base.join("backups"),
        }
    }
}

/// Filesystem-backed persistence: one JSON document for the whole clinic,
/// replaced atomically on every commit, plus rotating backups.
///
/// Writers are serialized by a mutex inside the process and by an exclusive
/// `clinic.lock` file across processes sharing the same data root.
pub struct JsonClinicStorage {
    paths: StoragePaths,
    retention: usize,
    write_lock: Mutex<()>,
}

impl JsonClinicStorage {
    pub fn new(paths: StoragePaths) -> Result<Self, CoreError> {
        Self::with_retention(paths, DEFAULT_RETENTION)
    }

    pub fn with_retention(paths: StoragePaths, retention: usize) -> Result<Self, CoreError> {
        fs::create_dir_all(&paths.data_root)?;
        fs::create_dir_all(&paths.backup_root)?;
        Ok(Self {
            paths,
            retention: retention.max(1),
            write_lock: Mutex::new(()),
        })
    }

    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    pub fn clinic_path(&self) -> PathBuf {
        self.paths.data_root.join(CLINIC_FILE_NAME)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.paths.data_root.join(LOCK_FILE_NAME)
    }

    pub fn backup_path(&self, backup_id: &str) -> PathBuf {
        self.paths.backup_root.join(backup_id)
    }

    pub fn list_backup_metadata(&self) -> Result<Vec<BackupMetadata>, CoreError> {
        let mut rows = Vec::new();
        for entry in self.list_backups()? {
            let Some(path) = entry.path else {
                continue;
            };
            let size_bytes = fs::metadata(&path).map(|meta| meta.len()).unwrap_or(0);
            rows.push(BackupMetadata {
                created_at: parse_backup_timestamp(&entry.id),
                name: entry.id,
                size_bytes,
                path,
            });
        }
        rows.sort_by_key(|meta| Reverse(meta.created_at));
        Ok(rows)
    }

    pub fn delete_backup(&self, backup_id: &str) -> Result<(), CoreError> {
        let path = self.backup_path(backup_id);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn lock(&self) -> Result<WriteLock<'_>, CoreError> {
        let local = self
            .write_lock
            .lock()
            .map_err(|_| CoreError::Storage("clinic file lock poisoned".into()))?;
        fs::create_dir_all(&self.paths.data_root)?;
        let file = LockFile::acquire(self.lock_path())?;
        Ok(WriteLock {
            _file: file,
            _local: local,
        })
    }

    fn stored_revision(&self) -> Result<u64, CoreError> {
        Ok(load_records_from_path(&self.clinic_path())?
            .map(|records| records.revision)
            .unwrap_or(0))
    }

    /// `clinic_<timestamp>[-n][_note].json`; `-n` orders backups taken within the same second.
    fn next_backup_path(&self, note: Option<&str>) -> Result<PathBuf, CoreError> {
        let now = Utc::now();
        let timestamp = now.format(BACKUP_TIMESTAMP_FORMAT).to_string();
        let same_second = format!("{}_{}", BACKUP_PREFIX, timestamp);
        let taken = self
            .list_backups()?
            .iter()
            .filter(|info| info.id.starts_with(&same_second))
            .filter_map(|info| backup_order(&info.id))
            .map(|(_, sequence)| sequence)
            .max();
        let sequence = match taken {
            Some(highest) => format!("-{}", highest + 1),
            None => String::new(),
        };
        let label = sanitize_backup_note(note)
            .map(|label| format!("_{}", label))
            .unwrap_or_default();
        Ok(self.paths.backup_root.join(format!(
            "{}_{}{}{}.{}",
            BACKUP_PREFIX, timestamp, sequence, label, FILE_EXTENSION
        )))
    }

    fn prune_backups(&self) -> Result<(), CoreError> {
        let entries = self.list_backups()?;
        for entry in entries.into_iter().skip(self.retention) {
            if let Some(path) = entry.path {
                debug!(backup = %entry.id, "pruning old backup");
                let _ = fs::remove_file(path);
            }
        }
        Ok(())
    }
}

impl ClinicStorage for JsonClinicStorage {
    /// A missing file is an empty clinic at revision 0.
    fn load(&self) -> Result<ClinicRecords, CoreError> {
        Ok(load_records_from_path(&self.clinic_path())?.unwrap_or_else(ClinicRecords::new))
    }

    fn commit(&self, records: &ClinicRecords, expected_revision: u64) -> Result<(), CoreError> {
        let _guard = self.lock()?;
        let stored = self.stored_revision()?;
        if stored != expected_revision {
            return Err(CoreError::Conflict(format!(
                "clinic file changed concurrently (expected revision {}, found {})",
                expected_revision, stored
            )));
        }
        save_records_to_path(records, &self.clinic_path())
    }

    fn backup(&self, note: Option<&str>) -> Result<BackupInfo, CoreError> {
        let _guard = self.lock()?;
        let records = self.load()?;
        let path = self.next_backup_path(note)?;
        write_atomic(&path, &serialize_records(&records)?)?;
        let id = file_name(&path);
        info!(backup = %id, revision = records.revision, "created clinic backup");
        self.prune_backups()?;
        Ok(BackupInfo {
            created_at: parse_backup_timestamp(&id)
                .map(|at| at.to_rfc3339())
                .unwrap_or_default(),
            id,
            path: Some(path),
        })
    }

    /// Newest first.
    fn list_backups(&self) -> Result<Vec<BackupInfo>, CoreError> {
        let dir = &self.paths.backup_root;
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file()
                || path.extension().and_then(|ext| ext.to_str()) != Some(FILE_EXTENSION)
            {
                continue;
            }
            let id = file_name(&path);
            let Some(created) = parse_backup_timestamp(&id) else {
                continue;
            };
            entries.push(BackupInfo {
                id,
                created_at: created.to_rfc3339(),
                path: Some(path),
            });
        }
        entries.sort_by_key(|info| Reverse(backup_order(&info.id)));
        Ok(entries)
    }

    /// Replaces the live file with the backup and bumps the revision past the current one.
    fn restore_backup(&self, backup: &BackupInfo) -> Result<ClinicRecords, CoreError> {
        let _guard = self.lock()?;
        let source = backup
            .path
            .clone()
            .unwrap_or_else(|| self.backup_path(&backup.id));
        let mut restored = load_records_from_path(&source)?
            .ok_or_else(|| CoreError::Storage(format!("backup `{}` not found", backup.id)))?;
        restored.revision = self.stored_revision()? + 1;
        save_records_to_path(&restored, &self.clinic_path())?;
        info!(backup = %backup.id, revision = restored.revision, "restored clinic backup");
        Ok(restored)
    }
}

/// Writes the records to a uniquely named temp file next to `path` and
/// renames it into place.
pub fn save_records_to_path(records: &ClinicRecords, path: &Path) -> Result<(), CoreError> {
    write_atomic(path, &serialize_records(records)?)
}

/// Loads records from disk; `Ok(None)` when the file does not exist.
pub fn load_records_from_path(path: &Path) -> Result<Option<ClinicRecords>, CoreError> {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let records =
        serde_json::from_str(&data).map_err(|err| CoreError::Serde(err.to_string()))?;
    Ok(Some(records))
}

#[derive(Debug, Clone)]
pub struct BackupMetadata {
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
    pub size_bytes: u64,
    pub path: PathBuf,
}

fn sanitize_backup_note(note: Option<&str>) -> Option<String> {
    let raw = note?.trim();
    if raw.is_empty() {
        return None;
    }
    let mut sanitized = String::new();
    let mut last_dash = false;
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            sanitized.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if (ch.is_whitespace() || matches!(ch, '-' | '.' | '_'))
            && !sanitized.is_empty()
            && !last_dash
        {
            sanitized.push('-');
            last_dash = true;
        }
    }
    let trimmed = sanitized.trim_matches('-').to_string();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Reads the timestamp out of `clinic_YYYYmmdd_HHMMSS[-n][_note].json`.
fn parse_backup_timestamp(name: &str) -> Option<DateTime<Utc>> {
    backup_order(name).map(|(created, _)| created)
}

/// Timestamp plus same-second sequence, used to order backups.
fn backup_order(name: &str) -> Option<(DateTime<Utc>, u32)> {
    let stem = name.strip_suffix(&format!(".{}", FILE_EXTENSION))?;
    let mut segments = stem.split('_');
    if segments.next()? != BACKUP_PREFIX {
        return None;
    }
    let date = segments.next()?;
    let time_segment = segments.next()?;
    let (time, sequence) = match time_segment.split_once('-') {
        Some((time, sequence)) => (time, sequence.parse().ok()?),
        None => (time_segment, 1),
    };
    if !is_digits(date, 8) || !is_digits(time, 6) {
        return None;
    }
    let created = NaiveDateTime::parse_from_str(&format!("{}{}", date, time), "%Y%m%d%H%M%S")
        .ok()?
        .and_utc();
    Some((created, sequence))
}

fn is_digits(value: &str, len: usize) -> bool {
    value.len() == len && value.chars().all(|c| c.is_ascii_digit())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
        .to_string()
}

fn write_atomic(path: &Path, data: &str) -> Result<(), CoreError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut tmp = Builder::new()
        .prefix(&format!(".{}", file_name(path)))
        .suffix(TMP_SUFFIX)
        .tempfile_in(dir)?;
    tmp.write_all(data.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|err| CoreError::from(err.error))?;
    Ok(())
}

/// Both halves of the writer lock; released in reverse order on drop.
struct WriteLock<'a> {
    _file: LockFile,
    _local: std::sync::MutexGuard<'a, ()>,
}

/// Exclusive lock file, created with `create_new` and removed on drop.
struct LockFile {
    path: PathBuf,
}

impl LockFile {
    /// Waits briefly for another writer; reports persistent contention as a conflict.
    fn acquire(path: PathBuf) -> Result<Self, CoreError> {
        for _ in 0..LOCK_ATTEMPTS {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    let _ = writeln!(file, "{}", std::process::id());
                    return Ok(Self { path });
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    if is_stale(&path) {
                        warn!(lock = %path.display(), "removing stale clinic lock");
                        let _ = fs::remove_file(&path);
                        continue;
                    }
                    thread::sleep(LOCK_RETRY_DELAY);
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(CoreError::Conflict(format!(
            "clinic data is locked by another writer ({})",
            path.display()
        )))
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn is_stale(path: &Path) -> bool {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .map_or(false, |age| age > STALE_LOCK_AGE)
}

fn serialize_records(records: &ClinicRecords) -> Result<String, CoreError> {
    serde_json::to_string_pretty(records).map_err(|err| CoreError::Serde(err.to_string()))
}
