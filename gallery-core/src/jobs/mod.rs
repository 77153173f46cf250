//! Durable job queues for the two external collaborators the core merely
//! submits work to and reads status back from: AI captioning and settings
//! updates. Modeled as `enqueueOrAttach(fingerprint) -> jobId` at the queue
//! abstraction (spec §9 redesign note) rather than scanning existing jobs
//! in the caller, so deduplication is a property of the queue, not of every
//! call site that happens to enqueue a caption job.

use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::{GalleryError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Waiting,
    Active,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, serde::Deserialize)]
pub struct JobRecord<T> {
    pub id: String,
    pub fingerprint: String,
    pub payload: T,
    pub status: JobStatus,
    pub attempts: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, initial_backoff_secs: 5 }
    }
}

/// A named durable queue backed by Redis hashes (job records, keyed by id)
/// plus a fingerprint index (`queue:<name>:fp:<fingerprint> -> job id`) for
/// deduplication.
#[derive(Clone)]
pub struct JobQueue {
    conn: redis::aio::ConnectionManager,
    name: &'static str,
    pub retry: RetryPolicy,
}

impl JobQueue {
    pub fn new(conn: redis::aio::ConnectionManager, name: &'static str, retry: RetryPolicy) -> Self {
        Self { conn, name, retry }
    }

    fn fp_key(&self, fingerprint: &str) -> String {
        format!("queue:{}:fp:{}", self.name, fingerprint)
    }

    fn job_key(&self, id: &str) -> String {
        format!("queue:{}:job:{}", self.name, id)
    }

    /// Enqueues `payload` unless an active/waiting job with the same
    /// `fingerprint` already exists, in which case that job's id is
    /// returned instead (the captioning dedup rule).
    pub async fn enqueue_or_attach<T: Serialize + DeserializeOwned + Clone>(
        &self,
        fingerprint: &str,
        payload: T,
    ) -> Result<String> {
        let mut conn = self.conn.clone();
        let fp_key = self.fp_key(fingerprint);

        if let Some(existing_id) = conn
            .get::<_, Option<String>>(&fp_key)
            .await
            .map_err(|e| GalleryError::Cache(format!("queue lookup failed: {e}")))?
        {
            if let Some(record) = self.get::<T>(&existing_id).await? {
                if matches!(record.status, JobStatus::Waiting | JobStatus::Active) {
                    return Ok(existing_id);
                }
            }
        }

        let id = Uuid::new_v4().to_string();
        let record = JobRecord {
            id: id.clone(),
            fingerprint: fingerprint.to_string(),
            payload,
            status: JobStatus::Waiting,
            attempts: 0,
        };
        let json = serde_json::to_string(&record)
            .map_err(|e| GalleryError::Cache(format!("failed to serialize job: {e}")))?;
        let _: () = conn
            .set(self.job_key(&id), json)
            .await
            .map_err(|e| GalleryError::Cache(format!("failed to store job: {e}")))?;
        let _: () = conn
            .set(&fp_key, &id)
            .await
            .map_err(|e| GalleryError::Cache(format!("failed to index job fingerprint: {e}")))?;
        info!(queue = self.name, job_id = %id, fingerprint, "enqueued job");
        Ok(id)
    }

    pub async fn get<T: DeserializeOwned>(&self, id: &str) -> Result<Option<JobRecord<T>>> {
        let mut conn = self.conn.clone();
        let json: Option<String> = conn
            .get(self.job_key(id))
            .await
            .map_err(|e| GalleryError::Cache(format!("queue lookup failed: {e}")))?;
        match json {
            Some(j) => Ok(Some(
                serde_json::from_str(&j)
                    .map_err(|e| GalleryError::Cache(format!("failed to deserialize job: {e}")))?,
            )),
            None => Ok(None),
        }
    }

    pub async fn set_status<T: Serialize + DeserializeOwned>(&self, id: &str, status: JobStatus) -> Result<()> {
        if let Some(mut record) = self.get::<T>(id).await? {
            record.status = status;
            let mut conn = self.conn.clone();
            let json = serde_json::to_string(&record)
                .map_err(|e| GalleryError::Cache(format!("failed to serialize job: {e}")))?;
            let _: () = conn
                .set(self.job_key(id), json)
                .await
                .map_err(|e| GalleryError::Cache(format!("failed to update job: {e}")))?;
        }
        Ok(())
    }

    pub fn backoff_for_attempt(&self, attempt: u32) -> std::time::Duration {
        std::time::Duration::from_secs(self.retry.initial_backoff_secs.saturating_mul(1 << attempt.min(16)))
    }
}

pub fn caption_fingerprint(image_path: &str) -> String {
    image_path.to_string()
}
