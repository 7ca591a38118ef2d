//! redb-based print queue
//!
//! Single source of truth for print jobs. Every mutation is one write
//! transaction, and redb serializes write transactions, so a status check
//! and the change it guards can never interleave with another writer.
//!
//! A job is committed as `PENDING` before any device I/O happens.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction};
use thiserror::Error;
use tokio::sync::Notify;

use super::device::{DeviceError, DeviceErrorCode};
use super::job::{JobStatus, NewPrintJob, PrintJob, QueueStats};
use crate::utils::now_millis;

/// Jobs table: key = job id, value = JSON
const JOBS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("print_jobs");

/// Pending index: (device, seq) -> job id. Holds exactly the PENDING jobs.
const PENDING_TABLE: TableDefinition<(&str, u64), &str> = TableDefinition::new("pending_jobs");

/// Monotonic enqueue counter
const SEQUENCE_TABLE: TableDefinition<&str, u64> = TableDefinition::new("job_sequence");
const SEQUENCE_KEY: &str = "next";

const DEFAULT_MAX_ATTEMPTS: u32 = 5;

#[derive(Debug, Error)]
pub enum QueueStoreError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Print job not found: {0}")]
    JobNotFound(String),

    #[error("Print job {id}: cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: JobStatus,
        to: JobStatus,
    },
}

pub type QueueResult<T> = Result<T, QueueStoreError>;

/// Durable print queue
#[derive(Clone)]
pub struct PrintQueueStore {
    db: Arc<Database>,
    max_attempts: u32,
    job_available: Arc<Notify>,
}

impl PrintQueueStore {
    /// Open or create database
    pub fn open(path: impl AsRef<Path>) -> QueueResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> QueueResult<Self> {
        let db =
            Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> QueueResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(JOBS_TABLE)?;
            let _ = write_txn.open_table(PENDING_TABLE)?;
            let _ = write_txn.open_table(SEQUENCE_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self {
            db: Arc::new(db),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            job_available: Arc::new(Notify::new()),
        })
    }

    /// Attempts after which a failed job stays `FAILED`
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Signalled whenever a job becomes `PENDING`
    pub fn job_available(&self) -> Arc<Notify> {
        self.job_available.clone()
    }

    // ========== Enqueue ==========

    /// Persist a new `PENDING` job
    pub fn enqueue(&self, new_job: NewPrintJob) -> QueueResult<PrintJob> {
        let now = now_millis();
        let txn = self.db.begin_write()?;
        let job = {
            let mut seq_table = txn.open_table(SEQUENCE_TABLE)?;
            let seq = seq_table.get(SEQUENCE_KEY)?.map(|g| g.value()).unwrap_or(0) + 1;
            seq_table.insert(SEQUENCE_KEY, seq)?;

            let job = PrintJob {
                id: uuid::Uuid::new_v4().to_string(),
                seq,
                order_id: new_job.order_id,
                template_id: new_job.template_id,
                target_kind: new_job.target_kind,
                device: new_job.device,
                payload: new_job.payload,
                status: JobStatus::Pending,
                attempts: 0,
                protocol_errors: 0,
                last_error: None,
                next_attempt_at: now,
                created_at: now,
                updated_at: now,
            };
            Self::write_job(&txn, &job)?;
            let mut pending = txn.open_table(PENDING_TABLE)?;
            pending.insert((job.device.as_str(), job.seq), job.id.as_str())?;
            job
        };
        txn.commit()?;

        tracing::debug!(job_id = %job.id, device = %job.device, seq = job.seq, "Print job enqueued");
        self.job_available.notify_waiters();
        Ok(job)
    }

    // ========== Queries ==========

    pub fn get_job(&self, id: &str) -> QueueResult<Option<PrintJob>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(JOBS_TABLE)?;

        match table.get(id)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Oldest `PENDING` job of `device` whose backoff has expired
    ///
    /// Jobs still backing off are skipped, not waited on.
    pub fn next_pending(&self, device: &str, now: i64) -> QueueResult<Option<PrintJob>> {
        let read_txn = self.db.begin_read()?;
        let pending = read_txn.open_table(PENDING_TABLE)?;
        let jobs = read_txn.open_table(JOBS_TABLE)?;

        for result in pending.range((device, 0u64)..=(device, u64::MAX))? {
            let (_, id) = result?;
            if let Some(guard) = jobs.get(id.value())? {
                let job: PrintJob = serde_json::from_slice(guard.value())?;
                if job.is_ready(now) {
                    return Ok(Some(job));
                }
            }
        }
        Ok(None)
    }

    /// Earliest `next_attempt_at` among the device's pending jobs
    pub fn next_ready_at(&self, device: &str) -> QueueResult<Option<i64>> {
        Ok(self
            .list_pending(Some(device))?
            .iter()
            .map(|job| job.next_attempt_at)
            .min())
    }

    /// Pending jobs in enqueue order, optionally for one device
    pub fn list_pending(&self, device: Option<&str>) -> QueueResult<Vec<PrintJob>> {
        let read_txn = self.db.begin_read()?;
        let pending = read_txn.open_table(PENDING_TABLE)?;
        let jobs = read_txn.open_table(JOBS_TABLE)?;

        let mut result = Vec::new();
        let iter = match device {
            Some(device) => pending.range((device, 0u64)..=(device, u64::MAX))?,
            None => pending.iter()?,
        };
        for entry in iter {
            let (_, id) = entry?;
            if let Some(guard) = jobs.get(id.value())? {
                result.push(serde_json::from_slice::<PrintJob>(guard.value())?);
            }
        }
        result.sort_by_key(|job| job.seq);
        Ok(result)
    }

    /// All jobs in enqueue order, optionally filtered by status
    pub fn list_jobs(&self, status: Option<JobStatus>) -> QueueResult<Vec<PrintJob>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(JOBS_TABLE)?;

        let mut jobs = Vec::new();
        for result in table.iter()? {
            let (_, guard) = result?;
            let job: PrintJob = serde_json::from_slice(guard.value())?;
            if status.is_none_or(|s| job.status == s) {
                jobs.push(job);
            }
        }
        jobs.sort_by_key(|job| job.seq);
        Ok(jobs)
    }

    pub fn stats(&self) -> QueueResult<QueueStats> {
        let mut stats = QueueStats::default();
        for job in self.list_jobs(None)? {
            match job.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Printing => stats.printing += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
                JobStatus::Cancelled => stats.cancelled += 1,
            }
        }
        Ok(stats)
    }

    // ========== Transitions ==========

    /// Claim a job for printing
    ///
    /// Fails with `InvalidTransition` unless the job is `PENDING`, so two
    /// workers can never both claim it.
    pub fn mark_printing(&self, id: &str) -> QueueResult<PrintJob> {
        self.transition(id, |job| {
            step(job, JobStatus::Printing)?;
            job.attempts += 1;
            Ok(())
        })
    }

    pub fn mark_completed(&self, id: &str) -> QueueResult<PrintJob> {
        self.transition(id, |job| {
            step(job, JobStatus::Completed)?;
            job.last_error = None;
            Ok(())
        })
    }

    /// Record a failed delivery attempt
    ///
    /// Below the attempt cap the job goes back to `PENDING`, claimable again
    /// after `retry_delay`. At the cap, or with no delay given, it stays
    /// `FAILED`.
    pub fn mark_failed(
        &self,
        id: &str,
        error: &DeviceError,
        retry_delay: Option<Duration>,
    ) -> QueueResult<PrintJob> {
        let max_attempts = self.max_attempts;
        self.transition(id, |job| {
            step(job, JobStatus::Failed)?;
            job.last_error = Some(error.to_string());
            if error.code == DeviceErrorCode::Protocol {
                job.protocol_errors += 1;
            }
            if let Some(delay) = retry_delay
                && job.attempts < max_attempts
            {
                step(job, JobStatus::Pending)?;
                job.next_attempt_at = now_millis() + delay.as_millis() as i64;
            }
            Ok(())
        })
    }

    /// Cancel a job that no worker has claimed yet
    pub fn cancel(&self, id: &str) -> QueueResult<PrintJob> {
        self.transition(id, |job| step(job, JobStatus::Cancelled))
    }

    /// Operator retry of a terminally failed job; the attempt budget restarts
    pub fn retry(&self, id: &str) -> QueueResult<PrintJob> {
        self.transition(id, |job| {
            step(job, JobStatus::Pending)?;
            job.attempts = 0;
            job.protocol_errors = 0;
            job.next_attempt_at = now_millis();
            Ok(())
        })
    }

    /// Crash recovery: jobs left `PRINTING` by a previous process become
    /// `PENDING` again. A duplicate printout is preferred over a lost one.
    ///
    /// The interrupted attempt is not charged against the attempt cap.
    pub fn requeue_interrupted(&self, device: Option<&str>) -> QueueResult<Vec<String>> {
        let interrupted: Vec<String> = self
            .list_jobs(Some(JobStatus::Printing))?
            .into_iter()
            .filter(|job| device.is_none_or(|d| job.device == d))
            .map(|job| job.id)
            .collect();

        let mut requeued = Vec::with_capacity(interrupted.len());
        for id in interrupted {
            let result = self.transition(&id, |job| {
                step(job, JobStatus::Failed)?;
                step(job, JobStatus::Pending)?;
                job.attempts = job.attempts.saturating_sub(1);
                job.last_error = Some("interrupted while printing".to_string());
                job.next_attempt_at = now_millis();
                Ok(())
            });
            match result {
                Ok(job) => {
                    tracing::warn!(job_id = %job.id, device = %job.device, "Requeued interrupted print job");
                    requeued.push(job.id);
                }
                // Another worker got there first
                Err(QueueStoreError::InvalidTransition { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(requeued)
    }

    /// Delete `COMPLETED` and `CANCELLED` jobs last touched before
    /// `now - max_age` or earlier. Failed jobs stay for the operator.
    pub fn cleanup_finished(&self, max_age: Duration) -> QueueResult<usize> {
        let cutoff = now_millis() - max_age.as_millis() as i64;
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(JOBS_TABLE)?;
            let mut expired = Vec::new();
            for result in table.iter()? {
                let (key, guard) = result?;
                let job: PrintJob = serde_json::from_slice(guard.value())?;
                if matches!(job.status, JobStatus::Completed | JobStatus::Cancelled)
                    && job.updated_at <= cutoff
                {
                    expired.push(key.value().to_string());
                }
            }
            for id in &expired {
                table.remove(id.as_str())?;
            }
            expired.len()
        };
        txn.commit()?;

        if removed > 0 {
            tracing::info!(removed, "Cleaned up finished print jobs");
        }
        Ok(removed)
    }

    // ========== Internal ==========

    /// Load, mutate and store one job in a single write transaction,
    /// keeping the pending index in sync with the status.
    fn transition(
        &self,
        id: &str,
        f: impl FnOnce(&mut PrintJob) -> QueueResult<()>,
    ) -> QueueResult<PrintJob> {
        let txn = self.db.begin_write()?;
        let (job, before) = {
            let bytes = {
                let table = txn.open_table(JOBS_TABLE)?;
                let value = table
                    .get(id)?
                    .ok_or_else(|| QueueStoreError::JobNotFound(id.to_string()))?;
                value.value().to_vec()
            };
            let mut job: PrintJob = serde_json::from_slice(&bytes)?;
            let before = job.status;
            f(&mut job)?;
            job.updated_at = now_millis();
            Self::write_job(&txn, &job)?;

            let mut pending = txn.open_table(PENDING_TABLE)?;
            if before == JobStatus::Pending && job.status != JobStatus::Pending {
                pending.remove((job.device.as_str(), job.seq))?;
            } else if before != JobStatus::Pending && job.status == JobStatus::Pending {
                pending.insert((job.device.as_str(), job.seq), job.id.as_str())?;
            }
            (job, before)
        };
        txn.commit()?;

        tracing::debug!(job_id = %job.id, from = %before, to = %job.status, "Print job transition");
        if job.status == JobStatus::Pending {
            self.job_available.notify_waiters();
        }
        Ok(job)
    }

    fn write_job(txn: &WriteTransaction, job: &PrintJob) -> QueueResult<()> {
        let mut table = txn.open_table(JOBS_TABLE)?;
        let value = serde_json::to_vec(job)?;
        table.insert(job.id.as_str(), value.as_slice())?;
        Ok(())
    }
}

/// Apply one state machine step, rejecting anything off the diagram
fn step(job: &mut PrintJob, next: JobStatus) -> QueueResult<()> {
    if !job.status.can_transition_to(next) {
        return Err(QueueStoreError::InvalidTransition {
            id: job.id.clone(),
            from: job.status,
            to: next,
        });
    }
    job.status = next;
    Ok(())
}
