//! Redis-backed job queue built on atomic server-side scripts.
//!
//! All authoritative state lives in Redis under a `<prefix>:<queueName>:`
//! namespace; every lifecycle transition (add, lease, complete, fail,
//! retry) is one Lua script executing atomically against that key set, so
//! concurrent producers and workers need no client-side coordination.
//!
//! Scripts are assembled at first use from modular fragments by the
//! [`scripts::loader`] preprocessor, cached process-wide and invoked by
//! SHA. The [`Queue`] facade packs arguments, picks the script and
//! translates its return codes; the optional [`Worker`] drives the lease
//! loop against a user processor.

pub(crate) mod codec;
pub mod error;
pub mod job;
pub mod queue;
pub mod queue_keys;
pub mod scripts;
pub mod worker;

pub use error::{QueueError, ScriptFailure, ScriptLoaderError};
pub use job::{
    DeduplicationOpts, Job, JobOpts, JobOrder, JobState, KeepJobs, KeepPolicy, RateLimiterOpts,
};
pub use queue::{Queue, QueueOpts};
pub use queue_keys::QueueKeys;
pub use scripts::add_standard_job::AddReturn;
pub use scripts::move_to_active::{MoveToActiveArgs, MoveToActiveReturn};
pub use scripts::move_to_finished::{FinishedTarget, MoveToFinishedArgs};
pub use scripts::retry_job::RetryJobArgs;
pub use worker::{Worker, WorkerOpts};
