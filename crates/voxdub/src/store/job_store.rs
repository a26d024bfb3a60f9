//! Dual-tier job store: an in-memory map in front of the `jobs` table.
//!
//! Memory is authoritative for every cached id. Creation and terminal
//! transitions are written through to SQLite before the call returns;
//! intermediate progress is marked dirty and flushed lazily by
//! [`JobStore::flush_pending`].

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use serde::Serialize;

use crate::db::job_repo;
use crate::db::{Database, DatabaseError};
use crate::error::JobError;
use crate::job::{format_timestamp, JobRecord, JobStatus, JobUpdate};

pub const INTERRUPTED_MESSAGE: &str = "Processing interrupted by server restart";

/// How many historical records are pulled into memory at startup.
const WARM_UP_LIMIT: usize = 100;

/// Job totals by lifecycle bucket, from the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobCounts {
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
}

pub struct JobStore {
    db: RwLock<Option<Database>>,
    cache: RwLock<HashMap<String, JobRecord>>,
    dirty: Mutex<HashSet<String>>,
    /// Serializes writes to the table so an older snapshot never lands
    /// after a newer one.
    persist_lock: Mutex<()>,
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl JobStore {
    /// Creates a memory-only store.
    pub fn new() -> Self {
        Self {
            db: RwLock::new(None),
            cache: RwLock::new(HashMap::new()),
            dirty: Mutex::new(HashSet::new()),
            persist_lock: Mutex::new(()),
        }
    }

    /// Creates a store backed by `db`.
    pub fn with_database(db: Database) -> Self {
        Self {
            db: RwLock::new(Some(db)),
            ..Self::new()
        }
    }

    /// Gets a cloned database handle if available.
    pub fn get_database(&self) -> Option<Database> {
        let guard = match self.db.read() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Job store DB lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        guard.clone()
    }

    fn read_cache(&self) -> RwLockReadGuard<'_, HashMap<String, JobRecord>> {
        match self.cache.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job store cache lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_cache(&self) -> RwLockWriteGuard<'_, HashMap<String, JobRecord>> {
        match self.cache.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job store cache lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn dirty_set(&self) -> MutexGuard<'_, HashSet<String>> {
        match self.dirty.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job store dirty set lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Stores a freshly created record in both tiers.
    pub fn put(&self, record: JobRecord) -> Result<(), JobError> {
        if self.read_cache().contains_key(&record.id) {
            return Err(JobError::InvalidTransition {
                id: record.id.clone(),
                reason: "job already exists".to_string(),
            });
        }
        if let Some(db) = self.get_database() {
            job_repo::insert(&db, &record.to_row())?;
        }
        log::debug!("Stored job {} ({})", record.id, record.filename);
        self.write_cache().insert(record.id.clone(), record);
        Ok(())
    }

    /// Returns a record, filling the cache from the table on a miss.
    pub fn get(&self, id: &str) -> Result<JobRecord, JobError> {
        if let Some(record) = self.read_cache().get(id) {
            return Ok(record.clone());
        }

        let db = self
            .get_database()
            .ok_or_else(|| JobError::NotFound(id.to_string()))?;
        let row = job_repo::find_by_id(&db, id)?.ok_or_else(|| JobError::NotFound(id.to_string()))?;

        log::debug!("Cache miss for job {}, loaded from database", id);
        let mut cache = self.write_cache();
        // Another reader may have filled the slot meanwhile; keep theirs.
        let record = cache
            .entry(id.to_string())
            .or_insert_with(|| JobRecord::from_row(row));
        Ok(record.clone())
    }

    /// Applies a partial update and returns the resulting record.
    ///
    /// Terminal results are flushed before returning. If that flush fails
    /// the in-memory record still holds the new state and the id stays
    /// queued for the next [`flush_pending`](Self::flush_pending).
    pub fn update(&self, id: &str, update: JobUpdate) -> Result<JobRecord, JobError> {
        self.get(id)?;

        let record = {
            let mut cache = self.write_cache();
            let record = cache
                .get_mut(id)
                .ok_or_else(|| JobError::NotFound(id.to_string()))?;
            record.apply(update)?;
            record.clone()
        };

        let Some(db) = self.get_database() else {
            return Ok(record);
        };
        self.dirty_set().insert(id.to_string());

        if record.status.is_terminal() {
            if let Err(e) = self.persist_latest(&db, id) {
                log::error!("Failed to persist terminal state of job {}: {}", id, e);
                return Err(e.into());
            }
        }
        Ok(record)
    }

    /// Writes the current cached state of `id` to the table.
    fn persist_latest(&self, db: &Database, id: &str) -> Result<(), DatabaseError> {
        let _guard = match self.persist_lock.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };

        // Clear the flag before the snapshot so a racing update re-marks it.
        self.dirty_set().remove(id);
        let Some(row) = self.read_cache().get(id).map(JobRecord::to_row) else {
            return Ok(());
        };

        if let Err(e) = job_repo::upsert(db, &row) {
            self.dirty_set().insert(id.to_string());
            return Err(e);
        }
        Ok(())
    }

    /// Writes every dirty record to the table. Returns how many were written.
    pub fn flush_pending(&self) -> usize {
        let Some(db) = self.get_database() else {
            return 0;
        };
        let ids: Vec<String> = self.dirty_set().iter().cloned().collect();

        let mut flushed = 0;
        for id in ids {
            match self.persist_latest(&db, &id) {
                Ok(()) => flushed += 1,
                Err(e) => log::error!("Failed to flush job {}: {}", id, e),
            }
        }
        if flushed > 0 {
            log::debug!("Flushed {} pending job record(s)", flushed);
        }
        flushed
    }

    /// Runs `f` on tokio's blocking pool so SQLite I/O stays off the
    /// async workers.
    async fn off_runtime<T, F>(self: &Arc<Self>, f: F) -> Result<T, JobError>
    where
        F: FnOnce(&JobStore) -> Result<T, JobError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(self);
        tokio::task::spawn_blocking(move || f(&store)).await?
    }

    /// [`put`](Self::put) from async code.
    pub async fn put_async(self: &Arc<Self>, record: JobRecord) -> Result<(), JobError> {
        self.off_runtime(move |store| store.put(record)).await
    }

    /// [`update`](Self::update) from async code. Terminal updates write
    /// through to SQLite, so they must not run on a runtime worker.
    pub async fn update_async(
        self: &Arc<Self>,
        id: &str,
        update: JobUpdate,
    ) -> Result<JobRecord, JobError> {
        let id = id.to_string();
        self.off_runtime(move |store| store.update(&id, update)).await
    }

    /// [`list_recent`](Self::list_recent) from async code.
    pub async fn list_recent_async(self: &Arc<Self>, limit: usize) -> Vec<JobRecord> {
        match self.off_runtime(move |store| Ok(store.list_recent(limit))).await {
            Ok(jobs) => jobs,
            Err(e) => {
                log::error!("Failed to list recent jobs: {}", e);
                Vec::new()
            }
        }
    }

    /// Number of records changed in memory but not yet written.
    pub fn pending_count(&self) -> usize {
        self.dirty_set().len()
    }

    /// Returns up to `limit` records, newest first.
    pub fn list_recent(&self, limit: usize) -> Vec<JobRecord> {
        if let Some(db) = self.get_database() {
            self.flush_pending();
            match job_repo::list_recent(&db, limit) {
                Ok(rows) => {
                    let cache = self.read_cache();
                    return rows
                        .into_iter()
                        .map(|row| match cache.get(&row.id) {
                            Some(cached) => cached.clone(),
                            None => JobRecord::from_row(row),
                        })
                        .collect();
                }
                Err(e) => log::error!("Failed to list jobs from database: {}", e),
            }
        }

        let mut jobs: Vec<JobRecord> = self.read_cache().values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs.truncate(limit);
        jobs
    }

    /// Removes finished records created more than `max_age` ago from both
    /// tiers and returns them. Jobs still in flight are left alone.
    pub fn delete_older_than(&self, max_age: chrono::Duration) -> Result<Vec<JobRecord>, JobError> {
        let cutoff = Utc::now() - max_age;

        let mut candidates: HashMap<String, JobRecord> = self
            .read_cache()
            .values()
            .filter(|r| r.created_at < cutoff)
            .map(|r| (r.id.clone(), r.clone()))
            .collect();

        let db = self.get_database();
        if let Some(ref db) = db {
            for row in job_repo::find_created_before(db, &format_timestamp(cutoff))? {
                candidates
                    .entry(row.id.clone())
                    .or_insert_with(|| JobRecord::from_row(row));
            }
        }

        let mut removed = Vec::new();
        for (id, record) in candidates {
            if !record.status.is_terminal() {
                log::debug!("Keeping expired job {} while it is {}", id, record.status);
                continue;
            }
            if let Some(ref db) = db {
                job_repo::delete(db, &id)?;
            }
            self.write_cache().remove(&id);
            self.dirty_set().remove(&id);
            removed.push(record);
        }

        if !removed.is_empty() {
            log::info!("Removed {} expired job record(s)", removed.len());
        }
        Ok(removed)
    }

    /// Warms the cache from the table at startup.
    ///
    /// Records left mid-pipeline by a previous process are marked failed,
    /// since nothing will resume them. Returns the number of records loaded.
    pub fn load_from_database(&self) -> Result<usize, JobError> {
        let Some(db) = self.get_database() else {
            return Ok(0);
        };

        let mut loaded = 0;
        for row in job_repo::find_unfinished(&db)? {
            let stored_status = row.status.clone();
            let mut record = JobRecord::from_row(row);
            // Unrecognized statuses come back already failed.
            if !record.status.is_terminal() {
                record.apply(JobUpdate::failed(INTERRUPTED_MESSAGE))?;
            }
            job_repo::upsert(&db, &record.to_row())?;
            log::warn!(
                "Job {} was {} when the server stopped, marked as error",
                record.id,
                stored_status
            );
            self.write_cache().insert(record.id.clone(), record);
            loaded += 1;
        }

        let recent = job_repo::list_recent(&db, WARM_UP_LIMIT)?;
        let mut cache = self.write_cache();
        for row in recent {
            if !cache.contains_key(&row.id) {
                cache.insert(row.id.clone(), JobRecord::from_row(row));
                loaded += 1;
            }
        }

        log::info!("Loaded {} job(s) from database", loaded);
        Ok(loaded)
    }

    pub fn counts(&self) -> JobCounts {
        let mut counts = JobCounts::default();
        for record in self.read_cache().values() {
            match record.status {
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Error => counts.failed += 1,
                _ => counts.active += 1,
            }
        }
        counts
    }
}
