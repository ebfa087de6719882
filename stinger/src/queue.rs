//! Client-side orchestration: one facade method per atomic script.
//!
//! The facade serializes job payloads, packs options, assembles the key
//! array each script expects and translates negative return codes into
//! typed errors. It holds no locks; every mutation happens inside a single
//! server-side script.

use redis::aio::ConnectionManager;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{QueueError, ScriptFailure};
use crate::job::{JobOpts, JobState};
use crate::queue_keys::QueueKeys;
use crate::scripts::add_delayed_job::AddDelayedJob;
use crate::scripts::add_standard_job::{AddArgs, AddReturn, AddStandardJob};
use crate::scripts::get_counts::GetCounts;
use crate::scripts::move_to_active::{MoveToActive, MoveToActiveArgs, MoveToActiveReturn};
use crate::scripts::move_to_finished::{
    FinishedTarget, MoveToFinished, MoveToFinishedArgs, MoveToFinishedReturn,
};
use crate::scripts::retry_job::{RetryJob, RetryJobArgs, RetryJobReturn};

/// Per-queue configuration.
#[derive(Debug, Clone)]
pub struct QueueOpts {
    /// Namespace root; keys live under `<prefix>:<queueName>:`.
    pub prefix: String,
    /// Approximate cap on the events stream, written to `meta`.
    pub max_len_events: u64,
}

impl Default for QueueOpts {
    fn default() -> Self {
        QueueOpts {
            prefix: "sq".to_string(),
            max_len_events: 10_000,
        }
    }
}

#[derive(Clone, Copy)]
struct Scripts {
    add_standard: AddStandardJob,
    add_delayed: AddDelayedJob,
    move_to_active: MoveToActive,
    move_to_finished: MoveToFinished,
    retry: RetryJob,
    get_counts: GetCounts,
}

impl Scripts {
    fn new() -> Self {
        Scripts {
            add_standard: AddStandardJob::new(),
            add_delayed: AddDelayedJob::new(),
            move_to_active: MoveToActive::new(),
            move_to_finished: MoveToFinished::new(),
            retry: RetryJob::new(),
            get_counts: GetCounts::new(),
        }
    }
}

/// A handle on one queue's key namespace.
#[derive(Clone)]
pub struct Queue {
    name: String,
    prefix: String,
    connection: ConnectionManager,
    scripts: Scripts,
}

impl Queue {
    pub async fn new(queue_name: &str, redis_url: &str) -> Result<Self, QueueError> {
        Self::with_opts(queue_name, redis_url, QueueOpts::default()).await
    }

    pub async fn with_opts(
        queue_name: &str,
        redis_url: &str,
        opts: QueueOpts,
    ) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url)?;
        let mut connection = client.get_tokio_connection_manager().await?;

        let prefix = format!("{}:{}:", opts.prefix, queue_name);

        redis::cmd("HSET")
            .arg(QueueKeys::Meta.with_prefix(&prefix))
            .arg("opts.maxLenEvents")
            .arg(opts.max_len_events)
            .query_async::<_, ()>(&mut connection)
            .await?;

        debug!(queue = queue_name, prefix = %prefix, "queue handle ready");

        Ok(Queue {
            name: queue_name.to_string(),
            prefix,
            connection,
            scripts: Scripts::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The job-hash prefix; a jobId appended yields the body key.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Adds a job, dispatching on `opts.delay`.
    pub async fn add<Data: Serialize>(
        &self,
        name: &str,
        data: &Data,
        opts: &JobOpts,
    ) -> Result<AddReturn, QueueError> {
        self.add_job(None, name, data, opts).await
    }

    /// Adds a job under a caller-chosen id. Re-adding an existing id yields
    /// [`AddReturn::AlreadyExists`] and a `duplicated` event, not an error.
    pub async fn add_with_id<Data: Serialize>(
        &self,
        job_id: &str,
        name: &str,
        data: &Data,
        opts: &JobOpts,
    ) -> Result<AddReturn, QueueError> {
        self.add_job(Some(job_id), name, data, opts).await
    }

    async fn add_job<Data: Serialize>(
        &self,
        job_id: Option<&str>,
        name: &str,
        data: &Data,
        opts: &JobOpts,
    ) -> Result<AddReturn, QueueError> {
        if opts.delay > 0 {
            self.add_delayed(job_id, name, data, opts).await
        } else {
            self.add_standard(job_id, name, data, opts).await
        }
    }

    pub async fn add_standard<Data: Serialize>(
        &self,
        job_id: Option<&str>,
        name: &str,
        data: &Data,
        opts: &JobOpts,
    ) -> Result<AddReturn, QueueError> {
        let mut connection = self.connection.clone();
        let args = AddArgs {
            job_id,
            name,
            data: serde_json::to_string(data)?,
            repeat_job_key: None,
            opts,
        };
        debug!(queue = %self.name, job = name, "add standard job");
        self.scripts
            .add_standard
            .run(&self.prefix, &mut connection, args)
            .await
    }

    pub async fn add_delayed<Data: Serialize>(
        &self,
        job_id: Option<&str>,
        name: &str,
        data: &Data,
        opts: &JobOpts,
    ) -> Result<AddReturn, QueueError> {
        let mut connection = self.connection.clone();
        let args = AddArgs {
            job_id,
            name,
            data: serde_json::to_string(data)?,
            repeat_job_key: None,
            opts,
        };
        debug!(queue = %self.name, job = name, delay = opts.delay, "add delayed job");
        self.scripts
            .add_delayed
            .run(&self.prefix, &mut connection, args)
            .await
    }

    /// Leases the next ready job for the caller's token.
    pub async fn move_to_active<Data: DeserializeOwned>(
        &self,
        args: &MoveToActiveArgs,
    ) -> Result<MoveToActiveReturn<Data>, QueueError> {
        let mut connection = self.connection.clone();
        self.scripts
            .move_to_active
            .run(&self.prefix, &mut connection, args)
            .await
    }

    /// Completes an active job. With `fetch_next` the reply carries the next
    /// lease, saving a round trip.
    pub async fn move_to_completed<Data: DeserializeOwned>(
        &self,
        job_id: &str,
        return_value: &str,
        fetch_next: bool,
        args: &MoveToFinishedArgs,
    ) -> Result<Option<MoveToActiveReturn<Data>>, QueueError> {
        self.move_to_finished(
            job_id,
            return_value,
            FinishedTarget::Completed,
            fetch_next,
            args,
            "move_to_completed",
        )
        .await
    }

    /// Fails an active job.
    pub async fn move_to_failed<Data: DeserializeOwned>(
        &self,
        job_id: &str,
        failed_reason: &str,
        fetch_next: bool,
        args: &MoveToFinishedArgs,
    ) -> Result<Option<MoveToActiveReturn<Data>>, QueueError> {
        self.move_to_finished(
            job_id,
            failed_reason,
            FinishedTarget::Failed,
            fetch_next,
            args,
            "move_to_failed",
        )
        .await
    }

    async fn move_to_finished<Data: DeserializeOwned>(
        &self,
        job_id: &str,
        message: &str,
        target: FinishedTarget,
        fetch_next: bool,
        args: &MoveToFinishedArgs,
        operation: &'static str,
    ) -> Result<Option<MoveToActiveReturn<Data>>, QueueError> {
        let mut connection = self.connection.clone();
        let ret = self
            .scripts
            .move_to_finished
            .run(
                &self.prefix,
                &mut connection,
                job_id,
                message,
                target,
                fetch_next,
                args,
            )
            .await?;

        match ret {
            MoveToFinishedReturn::Ok => Ok(None),
            MoveToFinishedReturn::Next(next) => Ok(Some(next)),
            MoveToFinishedReturn::Failure(failure) => {
                Err(self.script_failure(failure, job_id, operation))
            }
        }
    }

    /// Puts a failed-but-retryable job back into the ready set.
    pub async fn retry(&self, args: &RetryJobArgs) -> Result<(), QueueError> {
        let mut connection = self.connection.clone();
        let ret = self
            .scripts
            .retry
            .run(&self.prefix, &mut connection, args)
            .await?;

        match ret {
            RetryJobReturn::Ok => Ok(()),
            RetryJobReturn::Failure(failure) => {
                Err(self.script_failure(failure, &args.job_id, "retry"))
            }
        }
    }

    /// Job counts per state, parallel to `states`.
    pub async fn get_counts(&self, states: &[JobState]) -> Result<Vec<u64>, QueueError> {
        let mut connection = self.connection.clone();
        self.scripts
            .get_counts
            .run(&self.prefix, &mut connection, states)
            .await
    }

    fn script_failure(
        &self,
        failure: ScriptFailure,
        job_id: &str,
        operation: &'static str,
    ) -> QueueError {
        warn!(
            queue = %self.name,
            job_id,
            operation,
            code = failure.code(),
            "script reported a failure"
        );
        QueueError::Script {
            failure,
            job_id: job_id.to_string(),
            operation,
        }
    }
}
