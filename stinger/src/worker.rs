//! A thin worker runtime: blocks on the wakeup marker, leases jobs through
//! the facade and reports results back, retrying while attempts remain.

use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::error::QueueError;
use crate::job::{Job, KeepPolicy};
use crate::queue::Queue;
use crate::queue_keys::QueueKeys;
use crate::scripts::move_to_active::{MoveToActiveArgs, MoveToActiveReturn};
use crate::scripts::move_to_finished::MoveToFinishedArgs;
use crate::scripts::retry_job::RetryJobArgs;

/// A processor receives the decoded payload and returns the value recorded
/// on completion, or the reason recorded on failure.
pub type ProcessFn<Data> = fn(Data) -> Result<String, String>;

#[derive(Debug, Clone)]
pub struct WorkerOpts {
    pub concurrency: usize,
    pub lock_duration_ms: u64,
    pub attempts: u32,
    pub keep_completed: KeepPolicy,
    pub keep_failed: KeepPolicy,
}

impl Default for WorkerOpts {
    fn default() -> Self {
        WorkerOpts {
            concurrency: 1,
            lock_duration_ms: 10_000,
            attempts: 3,
            keep_completed: KeepPolicy::All,
            keep_failed: KeepPolicy::All,
        }
    }
}

enum TaskRunnerEvent {
    Freed,
}

struct TaskRunner {
    queue: Queue,
    opts: WorkerOpts,
    sender: tokio::sync::mpsc::Sender<TaskRunnerEvent>,
}

impl TaskRunner {
    fn run<Data: DeserializeOwned + Send + 'static>(self, process_fn: ProcessFn<Data>) {
        tokio::spawn(async move {
            let token = Uuid::new_v4().to_string();
            let lease = MoveToActiveArgs {
                token: token.clone(),
                lock_duration: self.opts.lock_duration_ms,
                limiter: None,
                name: None,
            };

            loop {
                match self.queue.move_to_active::<Data>(&lease).await {
                    Ok(MoveToActiveReturn::Job(job)) => {
                        self.process(job, process_fn, &token).await;
                    }
                    Ok(_) => break,
                    Err(err) => {
                        error!(error = %err, "failed to lease a job");
                        break;
                    }
                }
            }

            let _ = self.sender.send(TaskRunnerEvent::Freed).await;
        });
    }

    async fn process<Data>(&self, job: Job<Data>, process_fn: ProcessFn<Data>, token: &str) {
        let finish = MoveToFinishedArgs {
            token: token.to_string(),
            keep_jobs: self.opts.keep_completed.to_keep_jobs(),
            lock_duration: self.opts.lock_duration_ms,
            attempts: self.opts.attempts,
            max_metrics_size: None,
            limiter: None,
            fields_to_update: None,
        };

        let job_id = job.id.clone();
        let attempts_made = job.attempts_made;

        let outcome = match process_fn(job.data) {
            Ok(value) => {
                debug!(job_id = %job_id, "job completed");
                self.queue
                    .move_to_completed::<serde_json::Value>(&job_id, &value, false, &finish)
                    .await
                    .map(|_| ())
            }
            Err(reason) if attempts_made + 1 < self.opts.attempts => {
                info!(job_id = %job_id, reason = %reason, "job failed, retrying");
                self.queue
                    .retry(&RetryJobArgs {
                        job_id: job_id.clone(),
                        token: token.to_string(),
                        order: Default::default(),
                        fields_to_update: None,
                    })
                    .await
            }
            Err(reason) => {
                info!(job_id = %job_id, reason = %reason, "job failed permanently");
                let finish = MoveToFinishedArgs {
                    keep_jobs: self.opts.keep_failed.to_keep_jobs(),
                    ..finish
                };
                self.queue
                    .move_to_failed::<serde_json::Value>(&job_id, &reason, false, &finish)
                    .await
                    .map(|_| ())
            }
        };

        if let Err(err) = outcome {
            error!(job_id = %job_id, error = %err, "failed to settle job");
        }
    }
}

pub struct Worker<Data: DeserializeOwned + Send + 'static> {
    queue: Queue,
    marker_connection: redis::aio::Connection,
    opts: WorkerOpts,
    active_tasks: usize,
    receiver: tokio::sync::mpsc::Receiver<TaskRunnerEvent>,
    sender: tokio::sync::mpsc::Sender<TaskRunnerEvent>,
    process_fn: ProcessFn<Data>,
}

impl<Data> Worker<Data>
where
    Data: DeserializeOwned + Send + 'static,
{
    pub async fn new(
        queue_name: &str,
        redis_url: &str,
        opts: WorkerOpts,
        process_fn: ProcessFn<Data>,
    ) -> Result<Self, QueueError> {
        let queue = Queue::new(queue_name, redis_url).await?;
        // blocking pops need their own connection; the shared manager
        // multiplexes and must never stall
        let marker_connection = redis::Client::open(redis_url)?
            .get_async_connection()
            .await?;
        let (sender, receiver) = tokio::sync::mpsc::channel(opts.concurrency.max(1));

        Ok(Worker {
            queue,
            marker_connection,
            opts,
            active_tasks: 0,
            receiver,
            sender,
            process_fn,
        })
    }

    pub async fn run(&mut self) -> Result<(), QueueError> {
        let marker_key = QueueKeys::Marker.with_prefix(self.queue.prefix());
        info!(queue = self.queue.name(), "worker started");

        loop {
            while self.active_tasks >= self.opts.concurrency {
                if let Some(TaskRunnerEvent::Freed) = self.receiver.recv().await {
                    self.active_tasks -= 1;
                }
            }

            // the marker is the signal that work may be available
            let popped: Option<(String, String, f64)> = self
                .marker_connection
                .bzpopmin(&marker_key, 5.0)
                .await?;

            if popped.is_some() {
                let runner = TaskRunner {
                    queue: self.queue.clone(),
                    opts: self.opts.clone(),
                    sender: self.sender.clone(),
                };
                self.active_tasks += 1;
                runner.run(self.process_fn);
            }
        }
    }
}
