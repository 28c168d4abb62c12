//! In-memory job store.
//!
//! Durable persistence is an external collaborator behind the narrow
//! [`JobStore`] trait; this default implementation keeps jobs in process
//! memory for the polling endpoint.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use docmill_core::{ConversionJob, Error, JobStore, Result};

/// Process-local job store backed by a `HashMap`.
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<Uuid, ConversionJob>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    /// Number of jobs currently held.
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, job: &ConversionJob) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(Error::Internal(format!(
                "job {} already exists",
                job.id
            )));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn update(&self, job: &ConversionJob) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        if !jobs.contains_key(&job.id) {
            return Err(Error::Internal(format!("job {} does not exist", job.id)));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<ConversionJob>> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }
}
