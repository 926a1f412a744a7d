//! Reply dispatcher — decouples the synchronous inbound handler from the
//! slow completion call.
//!
//! # Scheduling model
//!
//! A fixed pool of workers (default `2 × available parallelism + 1`) is
//! started once at startup. Each worker owns a bounded queue;
//! [`ReplyDispatcher::dispatch`] is non-blocking (`try_send`) and a full
//! queue surfaces as [`AppError::Dispatch`] instead of stalling the webhook
//! response.
//!
//! # Per-key serialization
//!
//! Jobs are sharded to workers by a hash of the user key, so two messages
//! from the same user always run on the same worker, in arrival order. The
//! read-modify-write on the session store therefore never races against
//! itself for a given key — concurrency exists only across users.
//!
//! # Failure policy
//!
//! A failed pipeline never writes a partial history (the write is skipped
//! wholesale) and always pushes an explicit failure notice to the user.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;
use std::thread;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::llm::CompletionClient;
use crate::push::PushChannel;
use crate::retry::{RetryPolicy, with_retry};
use crate::session::Sessions;

/// Pushed to the user when the pipeline fails terminally.
pub const FAILURE_NOTICE: &str = "抱歉，本次回复生成失败，请稍后重试~";

/// Everything a worker needs to run the reply pipeline.
pub struct PipelineCtx {
    pub sessions: Sessions,
    pub client: CompletionClient,
    pub push: PushChannel,
    pub retry: RetryPolicy,
}

struct Job {
    job_id: Uuid,
    user: String,
    content: String,
}

/// Default pool size: `2 × cores + 1`, matching an I/O-bound workload.
pub fn default_worker_count() -> usize {
    let cores = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    2 * cores + 1
}

// ── Dispatcher ────────────────────────────────────────────────────────────────

/// Cheap-to-clone handle that enqueues jobs onto the worker pool.
#[derive(Clone)]
pub struct ReplyDispatcher {
    shards: Vec<mpsc::Sender<Job>>,
}

/// Join handle for the worker pool — awaited during shutdown.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Wait for every worker to exit.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!("dispatch worker panicked: {e}");
            }
        }
    }
}

impl ReplyDispatcher {
    /// Spawn `workers` shard workers and return the dispatch handle plus the
    /// pool to join on shutdown. Workers run until `shutdown` is cancelled
    /// or all dispatcher clones are dropped.
    pub fn start(
        ctx: Arc<PipelineCtx>,
        workers: usize,
        queue_depth: usize,
        shutdown: CancellationToken,
    ) -> (Self, WorkerPool) {
        let workers = workers.max(1);
        let mut shards = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);

        for worker in 0..workers {
            let (tx, rx) = mpsc::channel::<Job>(queue_depth);
            shards.push(tx);
            handles.push(tokio::spawn(run_worker(
                worker,
                rx,
                ctx.clone(),
                shutdown.clone(),
            )));
        }

        info!(workers, queue_depth, "reply dispatcher started");
        (Self { shards }, WorkerPool { handles })
    }

    /// Enqueue a conversational message for background processing.
    ///
    /// Returns immediately; the synchronous caller never waits on the
    /// completion call. A full shard queue is a visible error.
    pub fn dispatch(&self, user: &str, content: String) -> Result<(), AppError> {
        let shard = shard_for(user, self.shards.len());
        let job = Job {
            job_id: Uuid::new_v4(),
            user: user.to_string(),
            content,
        };
        debug!(job_id = %job.job_id, %user, shard, "dispatching reply job");
        self.shards[shard].try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(job) => {
                AppError::Dispatch(format!("worker queue full, dropping message from {}", job.user))
            }
            mpsc::error::TrySendError::Closed(_) => {
                AppError::Dispatch("dispatcher is shut down".to_string())
            }
        })
    }
}

fn shard_for(user: &str, shards: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    user.hash(&mut hasher);
    (hasher.finish() % shards as u64) as usize
}

// ── Worker loop ───────────────────────────────────────────────────────────────

async fn run_worker(
    worker: usize,
    mut rx: mpsc::Receiver<Job>,
    ctx: Arc<PipelineCtx>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                debug!(worker, "dispatch worker shutting down");
                break;
            }

            job = rx.recv() => {
                match job {
                    Some(job) => run_pipeline(&ctx, job).await,
                    None => {
                        debug!(worker, "dispatch queue closed");
                        break;
                    }
                }
            }
        }
    }
}

/// One full reply pipeline: load → append user → complete → trim → append
/// assistant → write back → push.
async fn run_pipeline(ctx: &PipelineCtx, job: Job) {
    match generate_reply(ctx, &job).await {
        Ok(reply) => {
            if let Err(e) = ctx.push.push(&job.user, &reply).await {
                warn!(job_id = %job.job_id, user = %job.user, error = %e, "reply push failed");
            }
        }
        Err(e) => {
            warn!(job_id = %job.job_id, user = %job.user, error = %e, "reply pipeline failed");
            if let Err(e) = ctx.push.push(&job.user, FAILURE_NOTICE).await {
                warn!(job_id = %job.job_id, user = %job.user, error = %e, "failure notice push failed");
            }
        }
    }
}

async fn generate_reply(ctx: &PipelineCtx, job: &Job) -> Result<String, AppError> {
    let mut history = ctx.sessions.history(&job.user)?;
    history.push_user(job.content.clone());
    debug!(job_id = %job.job_id, turns = history.len(), "history loaded");

    // On completion failure nothing is written back: the history in the
    // store still ends at the previous assistant turn.
    let reply = with_retry(&ctx.retry, || ctx.client.complete(history.turns(), &job.user))
        .await
        .map_err(|e| AppError::Completion(e.to_string()))?;

    // Surrounding whitespace is upstream formatting, not conversation
    // content; every backend's reply is normalised here, once.
    let reply = reply.trim().to_string();

    history.push_assistant(reply.clone());
    ctx.sessions.set_history(&job.user, &history)?;
    debug!(job_id = %job.job_id, turns = history.len(), "history written back");

    Ok(reply)
}
