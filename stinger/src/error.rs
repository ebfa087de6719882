use thiserror::Error;

/// The closed set of failure codes the atomic scripts return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptFailure {
    /// `-1`: the job hash does not exist.
    MissingJob,
    /// `-2`: no lock is recorded for the job.
    MissingLock,
    /// `-3`: the job is not in the active set.
    NotInActiveSet,
    /// `-6`: the lock is owned by another token.
    LockMismatch,
}

impl ScriptFailure {
    pub fn code(&self) -> i64 {
        match self {
            ScriptFailure::MissingJob => -1,
            ScriptFailure::MissingLock => -2,
            ScriptFailure::NotInActiveSet => -3,
            ScriptFailure::LockMismatch => -6,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            -1 => Some(ScriptFailure::MissingJob),
            -2 => Some(ScriptFailure::MissingLock),
            -3 => Some(ScriptFailure::NotInActiveSet),
            -6 => Some(ScriptFailure::LockMismatch),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("{operation} failed for job {job_id}: {failure:?}")]
    Script {
        failure: ScriptFailure,
        job_id: String,
        operation: &'static str,
    },

    #[error("no script registered under the name {0}")]
    UnknownScript(String),

    #[error("script {name} could not be loaded on the server: {source}")]
    ScriptLoad {
        name: &'static str,
        source: redis::RedisError,
    },

    #[error(transparent)]
    Loader(#[from] ScriptLoaderError),

    #[error("argument packing failed: {0}")]
    Pack(#[from] rmp_serde::encode::Error),

    #[error("job data serialization failed: {0}")]
    Data(#[from] serde_json::Error),

    #[error(transparent)]
    Redis(#[from] redis::RedisError),
}

/// Errors raised while assembling executable scripts from their fragments.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScriptLoaderError {
    #[error("circular include of \"{reference}\" (include path: {stack})")]
    CircularDependency { reference: String, stack: String },

    #[error("include \"{reference}\" not found at {in_file}:{line}:{column}")]
    IncludeNotFound {
        reference: String,
        in_file: String,
        line: usize,
        column: usize,
    },

    #[error("script name must end with .lua, got {0}")]
    InvalidName(String),

    #[error("io error: {0}")]
    IoError(String),
}
