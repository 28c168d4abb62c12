//! Conversion orchestration: admission, the pipeline state machine, and
//! the synchronous/asynchronous execution paths.
//!
//! State machine per job: `submitted → admitted → classifying →
//! extracting → normalizing → chunking → completed`, with terminal
//! `failed` reachable from any non-terminal state. Pre-admission failures
//! (bad configuration, unsupported format, oversized payload, rate-limit
//! rejection) are returned to the caller directly — no job is created and
//! no quota is consumed by an unclassifiable request. Failures after
//! admission are recorded on the job, which becomes the terminal `failed`
//! state; there is no automatic retry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use docmill_core::defaults::{JOB_TIMEOUT_SECS, MAX_UPLOAD_BYTES};
use docmill_core::{
    classify, validate_upload, ApiKeyRecord, ConversionJob, ConversionOptions, ConversionOutput,
    DocumentKind, DocumentMeta, Error, ExtractOptions, JobState, JobStore, Result, Tokenizer,
};

use crate::chunker;
use crate::normalize::normalize;
use crate::ratelimit::{Admission, QuotaSnapshot, RateLimiter};
use crate::registry::ExtractorRegistry;
use crate::stats;

/// Orchestrator tunables.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Payload ceiling in bytes, enforced before classification.
    pub max_upload_bytes: u64,
    /// Overall per-job deadline in seconds.
    pub job_timeout_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: MAX_UPLOAD_BYTES,
            job_timeout_secs: JOB_TIMEOUT_SECS,
        }
    }
}

impl OrchestratorConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `MAX_UPLOAD_BYTES` | 100 MB | Payload size ceiling |
    /// | `JOB_TIMEOUT_SECS` | `300` | Per-job deadline |
    pub fn from_env() -> Self {
        let max_upload_bytes = std::env::var("MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(MAX_UPLOAD_BYTES);
        let job_timeout_secs = std::env::var("JOB_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(JOB_TIMEOUT_SECS)
            .max(1);
        Self {
            max_upload_bytes,
            job_timeout_secs,
        }
    }

    pub fn with_max_upload_bytes(mut self, bytes: u64) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    pub fn with_job_timeout(mut self, secs: u64) -> Self {
        self.job_timeout_secs = secs;
        self
    }
}

/// One conversion request, after the authentication collaborator resolved
/// the caller's key record.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub api_key: ApiKeyRecord,
    pub filename: String,
    pub declared_mime: String,
    pub data: Vec<u8>,
    pub options: ConversionOptions,
}

/// Composes classification, extraction, normalization, chunking, and
/// statistics into the two conversion paths, owning the job lifecycle and
/// error translation.
pub struct Orchestrator {
    registry: Arc<ExtractorRegistry>,
    store: Arc<dyn JobStore>,
    limiter: Arc<RateLimiter>,
    tokenizer: Arc<dyn Tokenizer>,
    config: OrchestratorConfig,
    /// Payload stash for submitted-but-not-yet-run async jobs. The job
    /// record itself never carries document bytes.
    payloads: Mutex<HashMap<Uuid, Vec<u8>>>,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<ExtractorRegistry>,
        store: Arc<dyn JobStore>,
        limiter: Arc<RateLimiter>,
        tokenizer: Arc<dyn Tokenizer>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            registry,
            store,
            limiter,
            tokenizer,
            config,
            payloads: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn registry(&self) -> &Arc<ExtractorRegistry> {
        &self.registry
    }

    /// Pre-admission checks, cheapest first: configuration, size ceiling,
    /// upload safety, classification — all pure and synchronous — then the
    /// atomic admission check. Ordering matters: an unclassifiable request
    /// must not consume quota.
    fn preflight(&self, req: &ConversionRequest) -> Result<(DocumentKind, QuotaSnapshot)> {
        req.options.validate()?;

        let size = req.data.len() as u64;
        if size > self.config.max_upload_bytes {
            return Err(Error::FileTooLarge {
                size,
                limit: self.config.max_upload_bytes,
            });
        }

        let safety = validate_upload(&req.filename, &req.data);
        if !safety.allowed {
            return Err(Error::UnsupportedFormat(
                safety
                    .block_reason
                    .unwrap_or_else(|| "blocked content".to_string()),
            ));
        }

        let kind = classify(&req.filename, &req.declared_mime, &req.data)?;

        match self.limiter.admit(&req.api_key, Utc::now()) {
            Admission::Allowed(snapshot) => Ok((kind, snapshot)),
            Admission::Rejected {
                retry_after_secs, ..
            } => Err(Error::RateLimitExceeded { retry_after_secs }),
        }
    }

    fn build_job(&self, req: &ConversionRequest, kind: DocumentKind) -> ConversionJob {
        ConversionJob::new(
            req.api_key.id.clone(),
            DocumentMeta {
                filename: req.filename.clone(),
                declared_mime: req.declared_mime.clone(),
                detected_kind: Some(kind),
                size_bytes: req.data.len() as u64,
            },
            req.options.clone(),
        )
    }

    /// Synchronous path: run the full chain inline and return the terminal
    /// job. Pre-admission failures are returned as errors without creating
    /// a job.
    pub async fn convert_sync(&self, req: ConversionRequest) -> Result<ConversionJob> {
        let (kind, _snapshot) = self.preflight(&req)?;
        let job = self.build_job(&req, kind);
        self.store.create(&job).await?;

        info!(
            job_id = %job.id,
            api_key_id = %job.api_key_id,
            document_kind = %kind,
            payload_bytes = job.document.size_bytes,
            "Conversion admitted (sync)"
        );

        Ok(self.execute(job, req.data).await)
    }

    /// Asynchronous path: persist the job as `submitted` and return it
    /// immediately. A worker later drives it through [`Orchestrator::run_job`].
    pub async fn submit(&self, req: ConversionRequest) -> Result<ConversionJob> {
        let (kind, _snapshot) = self.preflight(&req)?;
        let job = self.build_job(&req, kind);
        self.store.create(&job).await?;
        self.payloads
            .lock()
            .expect("payload stash mutex poisoned")
            .insert(job.id, req.data);

        info!(
            job_id = %job.id,
            api_key_id = %job.api_key_id,
            document_kind = %kind,
            "Conversion queued (async)"
        );

        Ok(job)
    }

    /// Run a previously submitted job to its terminal state.
    pub async fn run_job(&self, job_id: Uuid) -> Result<ConversionJob> {
        let job = self
            .store
            .get(job_id)
            .await?
            .ok_or_else(|| Error::Internal(format!("job {} not found", job_id)))?;

        if job.state.is_terminal() {
            return Ok(job);
        }

        let data = self
            .payloads
            .lock()
            .expect("payload stash mutex poisoned")
            .remove(&job_id);
        let data = match data {
            Some(data) => data,
            None => {
                let mut job = job;
                job.fail(&Error::Internal("job payload is missing".to_string()));
                self.store.update(&job).await?;
                return Ok(job);
            }
        };

        Ok(self.execute(job, data).await)
    }

    /// Drive one admitted job through the pipeline under the overall
    /// deadline, recording the terminal state.
    async fn execute(&self, mut job: ConversionJob, data: Vec<u8>) -> ConversionJob {
        job.started_at = Some(Utc::now());
        let deadline = Duration::from_secs(self.config.job_timeout_secs);
        let start = Instant::now();

        let outcome = tokio::time::timeout(deadline, self.run_pipeline(&mut job, &data)).await;

        match outcome {
            Ok(Ok(output)) => {
                info!(
                    job_id = %job.id,
                    page_count = output.stats.total_pages,
                    chunk_count = output.stats.total_chunks,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Conversion completed"
                );
                job.complete(output);
            }
            Ok(Err(e)) => {
                warn!(job_id = %job.id, error = %e, error_code = e.code(), "Conversion failed");
                job.fail(&e);
            }
            Err(_) => {
                let e = Error::Timeout {
                    deadline_secs: self.config.job_timeout_secs,
                };
                warn!(job_id = %job.id, error = %e, "Conversion timed out");
                job.fail(&e);
            }
        }

        if let Err(e) = self.store.update(&job).await {
            warn!(job_id = %job.id, error = %e, "Failed to persist terminal job state");
        }
        job
    }

    /// The conversion chain. Mutates the job's state at each stage
    /// boundary so the async path's polling endpoint observes progress.
    async fn run_pipeline(
        &self,
        job: &mut ConversionJob,
        data: &[u8],
    ) -> Result<ConversionOutput> {
        let start = Instant::now();

        self.transition(job, JobState::Admitted, 5).await?;
        self.transition(job, JobState::Classifying, 10).await?;
        let kind = job
            .document
            .detected_kind
            .ok_or_else(|| Error::Internal("job has no detected kind".to_string()))?;

        self.transition(job, JobState::Extracting, 25).await?;
        let extract_options = ExtractOptions {
            ocr_enabled: job.options.ocr_enabled,
            extract_tables: job.options.extract_tables,
        };
        let raw = self
            .registry
            .extract(kind, data, &job.document.filename, &extract_options)
            .await?;
        job.metadata = raw.metadata.clone();

        self.transition(job, JobState::Normalizing, 60).await?;
        let pages = normalize(raw, &job.options);
        debug!(job_id = %job.id, page_count = pages.len(), "Normalized");

        self.transition(job, JobState::Chunking, 80).await?;
        let chunks = chunker::chunk(&pages, &job.options, self.tokenizer.as_ref())?;

        let stats = stats::aggregate(&pages, &chunks, start.elapsed());
        Ok(ConversionOutput {
            pages,
            chunks,
            stats,
        })
    }

    async fn transition(&self, job: &mut ConversionJob, state: JobState, progress: i32) -> Result<()> {
        job.state = state;
        job.progress_percent = progress;
        self.store.update(job).await
    }
}
