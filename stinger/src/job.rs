use serde::{Deserialize, Serialize};

/// A leased job as read back from its body hash.
#[derive(Debug, Clone)]
pub struct Job<Data> {
    pub id: String,
    pub name: String,
    pub data: Data,
    pub opts: String,
    pub timestamp: u64,
    pub delay: u64,
    pub priority: u32,
    pub processed_on: u64,
    pub finished_on: Option<u64>,
    pub attempts_started: u32,
    pub attempts_made: u32,
    pub return_value: Option<String>,
    pub failed_reason: Option<String>,
}

pub struct JobBuilder<Data> {
    id: String,
    name: String,
    data: Option<Data>,
    opts: String,
    timestamp: u64,
    delay: u64,
    priority: u32,
    processed_on: u64,
    finished_on: Option<u64>,
    attempts_started: u32,
    attempts_made: u32,
    return_value: Option<String>,
    failed_reason: Option<String>,
}

impl<Data> JobBuilder<Data> {
    pub fn new() -> Self {
        JobBuilder {
            id: String::new(),
            name: String::new(),
            data: None,
            opts: String::new(),
            timestamp: 0,
            delay: 0,
            priority: 0,
            processed_on: 0,
            finished_on: None,
            attempts_started: 0,
            attempts_made: 0,
            return_value: None,
            failed_reason: None,
        }
    }

    pub fn id(mut self, id: String) -> Self {
        self.id = id;
        self
    }

    pub fn name(mut self, name: String) -> Self {
        self.name = name;
        self
    }

    pub fn data(mut self, data: Data) -> Self {
        self.data = Some(data);
        self
    }

    pub fn opts(mut self, opts: String) -> Self {
        self.opts = opts;
        self
    }

    pub fn timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn delay(mut self, delay: u64) -> Self {
        self.delay = delay;
        self
    }

    pub fn priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn processed_on(mut self, processed_on: u64) -> Self {
        self.processed_on = processed_on;
        self
    }

    pub fn finished_on(mut self, finished_on: u64) -> Self {
        self.finished_on = Some(finished_on);
        self
    }

    pub fn attempts_started(mut self, ats: u32) -> Self {
        self.attempts_started = ats;
        self
    }

    pub fn attempts_made(mut self, atm: u32) -> Self {
        self.attempts_made = atm;
        self
    }

    pub fn return_value(mut self, value: String) -> Self {
        self.return_value = Some(value);
        self
    }

    pub fn failed_reason(mut self, reason: String) -> Self {
        self.failed_reason = Some(reason);
        self
    }

    /// Panics when `data` was never set; the job hash always carries it.
    pub fn build(self) -> Job<Data> {
        Job {
            id: self.id,
            name: self.name,
            data: self.data.expect("job body is missing its data field"),
            opts: self.opts,
            timestamp: self.timestamp,
            delay: self.delay,
            priority: self.priority,
            processed_on: self.processed_on,
            finished_on: self.finished_on,
            attempts_started: self.attempts_started,
            attempts_made: self.attempts_made,
            return_value: self.return_value,
            failed_reason: self.failed_reason,
        }
    }
}

impl<Data> Default for JobBuilder<Data> {
    fn default() -> Self {
        Self::new()
    }
}

/// Push-side ordering for list-backed states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobOrder {
    #[default]
    Fifo,
    Lifo,
}

/// Deduplication descriptor: concurrent adds sharing an id collapse onto a
/// single surviving job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeduplicationOpts {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
    #[serde(default)]
    pub replace: bool,
    #[serde(default)]
    pub extend: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimiterOpts {
    pub max: u32,
    /// Budget window in milliseconds.
    #[serde(default = "default_limiter_duration")]
    pub duration: u64,
}

fn default_limiter_duration() -> u64 {
    1000
}

/// Retention policy for finished jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeepPolicy {
    /// Keep every finished job.
    #[default]
    All,
    /// Delete the job and its auxiliary keys on finish.
    Remove,
    /// Keep at most this many finished jobs.
    Count(u32),
    /// Keep at most `count` jobs no older than `age_secs`.
    CountAndAge { count: u32, age_secs: u64 },
}

impl KeepPolicy {
    pub fn to_keep_jobs(self) -> KeepJobs {
        match self {
            KeepPolicy::All => KeepJobs { count: -1, age: None },
            KeepPolicy::Remove => KeepJobs { count: 0, age: None },
            KeepPolicy::Count(count) => KeepJobs {
                count: count as i64,
                age: None,
            },
            KeepPolicy::CountAndAge { count, age_secs } => KeepJobs {
                count: count as i64,
                age: Some(age_secs),
            },
        }
    }
}

/// Wire shape of a retention policy: `count == 0` removes, `-1` keeps all.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct KeepJobs {
    pub count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u64>,
}

/// The closed option set recognized on add.
#[derive(Debug, Clone)]
pub struct JobOpts {
    pub delay: u64,
    pub priority: u32,
    pub order: JobOrder,
    pub remove_on_complete: KeepPolicy,
    pub remove_on_fail: KeepPolicy,
    pub attempts: u32,
    pub stack_trace_limit: u32,
    pub de: Option<DeduplicationOpts>,
    pub limiter: Option<RateLimiterOpts>,
}

impl Default for JobOpts {
    fn default() -> Self {
        JobOpts {
            delay: 0,
            priority: 0,
            order: JobOrder::Fifo,
            remove_on_complete: KeepPolicy::All,
            remove_on_fail: KeepPolicy::All,
            attempts: 3,
            stack_trace_limit: 10,
            de: None,
            limiter: None,
        }
    }
}

impl JobOpts {
    pub(crate) fn to_packed(&self) -> PackedOpts<'_> {
        PackedOpts {
            delay: self.delay,
            priority: self.priority,
            lifo: self.order == JobOrder::Lifo,
            attempts: self.attempts,
            stack_trace_limit: self.stack_trace_limit,
            remove_on_complete: self.remove_on_complete.to_keep_jobs(),
            remove_on_fail: self.remove_on_fail.to_keep_jobs(),
            de: self.de.as_ref(),
            limiter: self.limiter.as_ref(),
        }
    }
}

/// The byte-for-byte option map the scripts unpack with `cmsgpack.unpack`;
/// also what `storeJob` persists under the `opts` hash field.
#[derive(Debug, Serialize)]
pub(crate) struct PackedOpts<'a> {
    pub delay: u64,
    pub priority: u32,
    pub lifo: bool,
    pub attempts: u32,
    #[serde(rename = "stackTraceLimit")]
    pub stack_trace_limit: u32,
    #[serde(rename = "removeOnComplete")]
    pub remove_on_complete: KeepJobs,
    #[serde(rename = "removeOnFail")]
    pub remove_on_fail: KeepJobs,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub de: Option<&'a DeduplicationOpts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limiter: Option<&'a RateLimiterOpts>,
}

/// Job states that can be counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Wait,
    Paused,
    Active,
    Delayed,
    Prioritized,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Wait => "wait",
            JobState::Paused => "paused",
            JobState::Active => "active",
            JobState::Delayed => "delayed",
            JobState::Prioritized => "prioritized",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }
}
