//! Job executor: polls the store, routes claimed jobs to handlers, applies
//! the retry/dead-letter policy.

use std::collections::HashMap;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use super::store::JobStore;
use super::types::{Job, JobResult, JobStatus};

/// Job handler function type.
pub type JobHandler = Box<dyn Fn(&Job) -> JobResult + Send + Sync>;

/// Executor configuration.
#[derive(Debug, Clone)]
pub struct JobExecutorConfig {
    /// How often to poll when the queue is empty
    pub poll_interval: Duration,
    /// Name for logging
    pub name: String,
}

impl Default for JobExecutorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            name: "job-executor".to_string(),
        }
    }
}

impl JobExecutorConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Handle to control a running executor.
#[derive(Debug)]
pub struct JobExecutorHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
    stats: Arc<Mutex<ExecutorStats>>,
}

impl JobExecutorHandle {
    /// Request graceful shutdown and wait for the worker thread.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }

    pub fn stats(&self) -> ExecutorStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

/// Executor runtime statistics.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ExecutorStats {
    pub jobs_processed: u64,
    pub jobs_succeeded: u64,
    pub jobs_retried: u64,
    pub jobs_dead_lettered: u64,
    pub uptime_secs: u64,
}

/// Background job executor.
///
/// Claims ready jobs from the store one at a time and runs the handler
/// registered for each job's kind. Handler results drive the lifecycle:
/// success completes the job, retry reschedules it per the job's policy
/// (dead-lettering when exhausted), discard dead-letters immediately.
pub struct JobExecutor<S: JobStore> {
    store: S,
    handlers: HashMap<String, JobHandler>,
}

impl<S: JobStore + 'static> JobExecutor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for a job kind.
    pub fn register_handler<F>(&mut self, kind: impl Into<String>, handler: F)
    where
        F: Fn(&Job) -> JobResult + Send + Sync + 'static,
    {
        self.handlers.insert(kind.into(), Box::new(handler));
    }

    /// Spawn the executor loop in a background thread.
    pub fn spawn(self, config: JobExecutorConfig) -> JobExecutorHandle
    where
        S: Send,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let stats = Arc::new(Mutex::new(ExecutorStats::default()));
        let stats_clone = stats.clone();

        let name = config.name.clone();
        let join = thread::Builder::new()
            .name(name)
            .spawn(move || executor_loop(self, config, shutdown_rx, stats_clone))
            .expect("failed to spawn job executor thread");

        JobExecutorHandle {
            shutdown: shutdown_tx,
            join: Some(join),
            stats,
        }
    }

    /// Execute a single already-claimed job (also used directly by tests).
    pub fn execute_one(&self, job: &mut Job) -> Result<(), String> {
        let handler = self
            .handlers
            .get(&job.kind)
            .ok_or_else(|| format!("no handler for job kind: {}", job.kind))?;

        match handler(job) {
            JobResult::Success => {
                job.mark_completed();
                self.store.update(job).map_err(|e| e.to_string())?;
                debug!(job_id = %job.id, "job completed");
                Ok(())
            }
            JobResult::Retry(error) => {
                job.mark_failed(error.clone());
                if matches!(job.status, JobStatus::DeadLettered { .. }) {
                    warn!(job_id = %job.id, error = %error, "retries exhausted, dead-lettering");
                    self.store
                        .dead_letter(job.clone(), error.clone())
                        .map_err(|e| e.to_string())?;
                } else {
                    self.store.update(job).map_err(|e| e.to_string())?;
                }
                Err(error)
            }
            JobResult::Discard(error) => {
                warn!(job_id = %job.id, error = %error, "unretriable job, dead-lettering");
                job.last_error = Some(error.clone());
                job.status = JobStatus::DeadLettered {
                    error: error.clone(),
                    attempts: job.attempt,
                };
                self.store
                    .dead_letter(job.clone(), error.clone())
                    .map_err(|e| e.to_string())?;
                Err(error)
            }
        }
    }
}

fn executor_loop<S: JobStore + 'static>(
    executor: JobExecutor<S>,
    config: JobExecutorConfig,
    shutdown_rx: mpsc::Receiver<()>,
    stats: Arc<Mutex<ExecutorStats>>,
) {
    info!(executor = %config.name, "job executor started");
    let start_time = Instant::now();

    loop {
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        if let Ok(mut s) = stats.lock() {
            s.uptime_secs = start_time.elapsed().as_secs();
        }

        match executor.store.claim_next() {
            Ok(Some(mut job)) => {
                debug!(executor = %config.name, job_id = %job.id, kind = %job.kind, "claimed job");

                let result = executor.execute_one(&mut job);

                if let Ok(mut s) = stats.lock() {
                    s.jobs_processed += 1;
                    match (&result, &job.status) {
                        (Ok(()), _) => s.jobs_succeeded += 1,
                        (Err(_), JobStatus::DeadLettered { .. }) => s.jobs_dead_lettered += 1,
                        (Err(_), _) => s.jobs_retried += 1,
                    }
                }

                if let Err(e) = result {
                    debug!(
                        executor = %config.name,
                        job_id = %job.id,
                        error = %e,
                        status = ?job.status,
                        "job execution failed"
                    );
                }
            }
            Ok(None) => thread::sleep(config.poll_interval),
            Err(e) => {
                error!(executor = %config.name, error = %e, "failed to claim job");
                thread::sleep(config.poll_interval);
            }
        }
    }

    info!(executor = %config.name, "job executor stopped");
}
