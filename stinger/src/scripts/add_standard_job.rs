use redis::aio::ConnectionManager;
use redis::{FromRedisValue, Value};

use crate::codec;
use crate::error::QueueError;
use crate::generate_script_struct;
use crate::job::JobOpts;
use crate::queue_keys::QueueKeys;
use crate::scripts::now_millis;

generate_script_struct!(AddStandardJob, "addStandardJob");

/// Inputs shared by the add scripts.
#[derive(Debug)]
pub struct AddArgs<'a> {
    /// Custom job id; allocated from the `id` counter when absent.
    pub job_id: Option<&'a str>,
    pub name: &'a str,
    /// Opaque, already-serialized JSON payload.
    pub data: String,
    pub repeat_job_key: Option<&'a str>,
    pub opts: &'a JobOpts,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddReturn {
    /// The id under which the job was stored, or the id of the existing
    /// owner when the add was deduplicated.
    Id(String),
    /// A job with the caller's custom id already exists (`-1`).
    AlreadyExists,
}

impl FromRedisValue for AddReturn {
    fn from_redis_value(v: &Value) -> redis::RedisResult<Self> {
        match v {
            Value::Data(bytes) => Ok(AddReturn::Id(
                String::from_utf8(bytes.to_vec()).map_err(|_| {
                    redis::RedisError::from((
                        redis::ErrorKind::TypeError,
                        "job id is not valid utf-8",
                    ))
                })?,
            )),
            Value::Int(-1) => Ok(AddReturn::AlreadyExists),
            _ => Err(redis::RedisError::from((
                redis::ErrorKind::TypeError,
                "Unknown return value",
            ))),
        }
    }
}

pub(crate) fn deduplication_key(prefix: &str, opts: &JobOpts) -> String {
    opts.de
        .as_ref()
        .map(|de| format!("{}de:{}", prefix, de.id))
        .unwrap_or_default()
}

impl AddStandardJob {
    pub async fn run(
        &self,
        prefix: &str,
        connection: &mut ConnectionManager,
        args: AddArgs<'_>,
    ) -> Result<AddReturn, QueueError> {
        let mut invocation = self.0.script.prepare_invoke();

        for key in [
            QueueKeys::Wait,
            QueueKeys::Paused,
            QueueKeys::Meta,
            QueueKeys::Id,
            QueueKeys::Prioritized,
            QueueKeys::Delayed,
            QueueKeys::Active,
            QueueKeys::Events,
            QueueKeys::Marker,
            QueueKeys::Pc,
        ] {
            invocation.key(key.with_prefix(prefix));
        }

        let packed_args = codec::pack(&(
            prefix,
            args.job_id.unwrap_or(""),
            args.name,
            now_millis(),
            args.repeat_job_key.unwrap_or(""),
            deduplication_key(prefix, args.opts),
        ))?;

        let res = invocation
            .arg(packed_args)
            .arg(args.data)
            .arg(codec::pack(&args.opts.to_packed())?)
            .invoke_async(connection)
            .await
            .map_err(|e| super::script_error("addStandardJob", e))?;

        Ok(res)
    }
}
