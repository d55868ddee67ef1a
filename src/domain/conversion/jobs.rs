//! Volatile, process-local tracking of in-flight and finished conversions.
//!
//! Entries live for a fixed TTL from creation and are reaped at the start of
//! a later submission regardless of status. Callers must poll promptly or
//! lose visibility into the outcome; the conversion itself is unaffected.

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// How long a job entry stays visible to pollers
const JOB_TTL_SECONDS: i64 = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversionJob {
    pub status: JobStatus,
    pub progress: u8,
    pub current_chunk: usize,
    pub total_chunks: usize,
    pub error: Option<String>,
    pub result_id: Option<String>,
    #[serde(skip)]
    pub created_at: DateTime<Utc>,
}

impl ConversionJob {
    fn new() -> Self {
        Self {
            status: JobStatus::Processing,
            progress: 0,
            current_chunk: 0,
            total_chunks: 0,
            error: None,
            result_id: None,
            created_at: Utc::now(),
        }
    }

    fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.created_at > ttl
    }
}

/// Concurrency-safe job map: one writer per entry (the job's own worker),
/// any number of polling readers.
pub struct JobRegistry {
    jobs: RwLock<HashMap<Uuid, ConversionJob>>,
    ttl: Duration,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            ttl: Duration::seconds(JOB_TTL_SECONDS),
        }
    }

    /// Register a freshly submitted job in `processing` state.
    pub fn create(&self, job_id: Uuid) {
        self.jobs.write().insert(job_id, ConversionJob::new());
    }

    /// Snapshot of the current job fields, if the entry still exists.
    pub fn snapshot(&self, job_id: &Uuid) -> Option<ConversionJob> {
        self.jobs.read().get(job_id).cloned()
    }

    /// Record chunk progress reported by the worker.
    pub fn update_progress(&self, job_id: Uuid, current_chunk: usize, total_chunks: usize) {
        let mut jobs = self.jobs.write();
        if let Some(job) = jobs.get_mut(&job_id) {
            job.current_chunk = current_chunk;
            job.total_chunks = total_chunks;
            job.progress = if total_chunks == 0 {
                0
            } else {
                ((current_chunk as f64 / total_chunks as f64) * 100.0) as u8
            };
        }
    }

    /// Transition a job to `completed`. Terminal; later transitions are
    /// ignored.
    pub fn complete(&self, job_id: Uuid, result_id: &str) {
        let mut jobs = self.jobs.write();
        if let Some(job) = jobs.get_mut(&job_id) {
            if job.status == JobStatus::Processing {
                job.status = JobStatus::Completed;
                job.result_id = Some(result_id.to_string());
                job.progress = 100;
            }
        }
    }

    /// Transition a job to `failed` with a human-readable message. Terminal.
    pub fn fail(&self, job_id: Uuid, message: String) {
        let mut jobs = self.jobs.write();
        if let Some(job) = jobs.get_mut(&job_id) {
            if job.status == JobStatus::Processing {
                job.status = JobStatus::Failed;
                job.error = Some(message);
            }
        }
    }

    /// Drop entries older than the TTL, whatever their status. Called at the
    /// start of each submission.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut jobs = self.jobs.write();
        let before = jobs.len();
        jobs.retain(|_, job| !job.is_expired(now, self.ttl));
        before - jobs.len()
    }

    #[cfg(test)]
    fn backdate(&self, job_id: Uuid, age: Duration) {
        let mut jobs = self.jobs.write();
        if let Some(job) = jobs.get_mut(&job_id) {
            job.created_at = Utc::now() - age;
        }
    }
}
