//! Unit-of-work boundary over a [`ClinicStorage`] backend.
//!
//! A transaction loads a private copy of the records, lets the caller mutate
//! it, checks natural-key uniqueness, and commits the whole snapshot with an
//! optimistic revision check. Any error before the commit discards the copy,
//! so partial changes are never visible. Writers inside one process are
//! serialized by a mutex; a revision conflict with another writer re-runs
//! the closure against fresh data after a short jittered pause, up to a
//! bounded number of attempts.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

use tracing::{debug, warn};
use uuid::Uuid;
use vetcare_domain::ClinicRecords;

use crate::{
    storage::{unique_key_conflicts, ClinicStorage},
    Clock, CoreError, CoreResult,
};

pub const DEFAULT_COMMIT_ATTEMPTS: usize = 10;
const RETRY_BASE_DELAY_MS: u64 = 2;

pub struct RecordStore {
    backend: Arc<dyn ClinicStorage>,
    clock: Arc<dyn Clock>,
    write_lock: Mutex<()>,
    attempts: usize,
}

impl RecordStore {
    pub fn new(backend: Arc<dyn ClinicStorage>, clock: Arc<dyn Clock>) -> Self {
        Self {
            backend,
            clock,
            write_lock: Mutex::new(()),
            attempts: DEFAULT_COMMIT_ATTEMPTS,
        }
    }

    pub fn with_attempts(mut self, attempts: usize) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub fn backend(&self) -> &dyn ClinicStorage {
        self.backend.as_ref()
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Loads the latest committed snapshot.
    pub fn snapshot(&self) -> CoreResult<ClinicRecords> {
        self.backend.load()
    }

    /// Runs a read-only query against the latest committed snapshot.
    pub fn read<T>(&self, query: impl FnOnce(&ClinicRecords) -> T) -> CoreResult<T> {
        let records = self.backend.load()?;
        Ok(query(&records))
    }

    /// Applies `work` atomically. `work` may run more than once on conflicts.
    pub fn transaction<T, F>(&self, mut work: F) -> CoreResult<T>
    where
        F: FnMut(&mut ClinicRecords) -> CoreResult<T>,
    {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| CoreError::Storage("record store lock poisoned".into()))?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut draft = self.backend.load()?;
            let base_revision = draft.revision;
            let known: HashSet<String> = unique_key_conflicts(&draft).into_iter().collect();

            let output = work(&mut draft)?;

            let introduced: Vec<String> = unique_key_conflicts(&draft)
                .into_iter()
                .filter(|conflict| !known.contains(conflict))
                .collect();
            if !introduced.is_empty() {
                return Err(CoreError::Conflict(introduced.join("; ")));
            }

            draft.revision = base_revision + 1;
            draft.touch(self.clock.now());
            match self.backend.commit(&draft, base_revision) {
                Ok(()) => {
                    debug!(revision = draft.revision, "committed clinic records");
                    return Ok(output);
                }
                Err(err) if err.is_conflict() && attempt < self.attempts => {
                    warn!(attempt, error = %err, "commit conflict, retrying unit of work");
                    thread::sleep(retry_delay(attempt));
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Random pause below an exponentially growing ceiling (2ms, 4ms, ... 128ms).
fn retry_delay(attempt: usize) -> Duration {
    let ceiling = RETRY_BASE_DELAY_MS << attempt.min(6);
    let jitter = (Uuid::new_v4().as_u128() % u128::from(ceiling)) as u64;
    Duration::from_millis(jitter + 1)
}
