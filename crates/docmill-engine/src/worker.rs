//! Conversion worker: a bounded pool draining the async-path job queue.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error, info};
use uuid::Uuid;

use docmill_core::defaults::{EVENT_BUS_CAPACITY, WORKER_MAX_CONCURRENT, WORKER_QUEUE_CAPACITY};
use docmill_core::{Error, JobState, Result};

use crate::orchestrator::Orchestrator;

/// Configuration for the conversion worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum number of concurrent conversion jobs.
    pub max_concurrent_jobs: usize,
    /// Capacity of the in-process job queue.
    pub queue_capacity: usize,
    /// Whether to enable job processing.
    pub enabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: WORKER_MAX_CONCURRENT,
            queue_capacity: WORKER_QUEUE_CAPACITY,
            enabled: true,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `WORKER_ENABLED` | `true` | Enable/disable async job processing |
    /// | `WORKER_MAX_CONCURRENT` | `4` | Max concurrent jobs |
    pub fn from_env() -> Self {
        let enabled = std::env::var("WORKER_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let max_concurrent_jobs = std::env::var("WORKER_MAX_CONCURRENT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(WORKER_MAX_CONCURRENT)
            .max(1);

        Self {
            max_concurrent_jobs,
            queue_capacity: WORKER_QUEUE_CAPACITY,
            enabled,
        }
    }

    /// Set maximum concurrent jobs.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent_jobs = max;
        self
    }

    /// Enable or disable job processing.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Event emitted by the conversion worker.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// A job was started.
    JobStarted { job_id: Uuid },
    /// A job reached the completed state.
    JobCompleted { job_id: Uuid },
    /// A job reached the failed state.
    JobFailed { job_id: Uuid, error: String },
    /// Worker started.
    WorkerStarted,
    /// Worker stopped.
    WorkerStopped,
}

/// Clonable handle for enqueueing submitted jobs.
#[derive(Clone)]
pub struct JobSubmitter {
    queue_tx: mpsc::Sender<Uuid>,
}

impl JobSubmitter {
    /// Enqueue a submitted job for background execution.
    pub async fn submit(&self, job_id: Uuid) -> Result<()> {
        self.queue_tx
            .send(job_id)
            .await
            .map_err(|_| Error::Internal("conversion worker is not running".to_string()))
    }
}

/// Handle for controlling a running worker.
pub struct WorkerHandle {
    submitter: JobSubmitter,
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<WorkerEvent>,
}

impl WorkerHandle {
    /// Get a clonable job submitter.
    pub fn submitter(&self) -> JobSubmitter {
        self.submitter.clone()
    }

    /// Signal the worker to shut down gracefully. In-flight jobs run to
    /// completion.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| Error::Internal("failed to send shutdown signal".to_string()))
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_rx.resubscribe()
    }
}

/// Worker that processes queued conversion jobs with bounded concurrency.
pub struct ConversionWorker {
    orchestrator: Arc<Orchestrator>,
    config: WorkerConfig,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl ConversionWorker {
    pub fn new(orchestrator: Arc<Orchestrator>, config: WorkerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self {
            orchestrator,
            config,
            event_tx,
        }
    }

    /// Start the worker loop and return a handle for control.
    pub fn start(self) -> WorkerHandle {
        let (queue_tx, queue_rx) = mpsc::channel(self.config.queue_capacity);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        tokio::spawn(async move {
            self.run(queue_rx, shutdown_rx).await;
        });

        WorkerHandle {
            submitter: JobSubmitter { queue_tx },
            shutdown_tx,
            event_rx,
        }
    }

    async fn run(&self, mut queue_rx: mpsc::Receiver<Uuid>, mut shutdown_rx: mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!("Conversion worker is disabled, not starting");
            return;
        }

        info!(
            max_concurrent = self.config.max_concurrent_jobs,
            "Conversion worker started"
        );
        let _ = self.event_tx.send(WorkerEvent::WorkerStarted);

        let mut tasks: JoinSet<()> = JoinSet::new();

        loop {
            // Respect the concurrency bound before claiming more work.
            while tasks.len() >= self.config.max_concurrent_jobs {
                if let Some(Err(e)) = tasks.join_next().await {
                    error!(error = ?e, "Conversion task panicked");
                }
            }

            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Conversion worker received shutdown signal");
                    break;
                }
                job_id = queue_rx.recv() => {
                    match job_id {
                        Some(job_id) => {
                            debug!(job_id = %job_id, "Claimed conversion job");
                            let orchestrator = self.orchestrator.clone();
                            let event_tx = self.event_tx.clone();
                            tasks.spawn(async move {
                                execute_job(orchestrator, job_id, event_tx).await;
                            });
                        }
                        None => break, // all submitters dropped
                    }
                }
            }
        }

        // Drain in-flight jobs before stopping.
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!(error = ?e, "Conversion task panicked");
            }
        }

        let _ = self.event_tx.send(WorkerEvent::WorkerStopped);
        info!("Conversion worker stopped");
    }
}

/// Execute a single claimed job and emit lifecycle events.
async fn execute_job(
    orchestrator: Arc<Orchestrator>,
    job_id: Uuid,
    event_tx: broadcast::Sender<WorkerEvent>,
) {
    let _ = event_tx.send(WorkerEvent::JobStarted { job_id });

    match orchestrator.run_job(job_id).await {
        Ok(job) if job.state == JobState::Completed => {
            let _ = event_tx.send(WorkerEvent::JobCompleted { job_id });
        }
        Ok(job) => {
            let error = job
                .error
                .map(|e| e.message)
                .unwrap_or_else(|| "unknown failure".to_string());
            let _ = event_tx.send(WorkerEvent::JobFailed { job_id, error });
        }
        Err(e) => {
            error!(job_id = %job_id, error = %e, "Job execution errored");
            let _ = event_tx.send(WorkerEvent::JobFailed {
                job_id,
                error: e.to_string(),
            });
        }
    }
}
