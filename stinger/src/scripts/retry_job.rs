use std::collections::HashMap;

use redis::aio::ConnectionManager;
use redis::{FromRedisValue, Value};
use serde::Serialize;

use crate::codec;
use crate::error::{QueueError, ScriptFailure};
use crate::generate_script_struct;
use crate::job::JobOrder;
use crate::queue_keys::QueueKeys;
use crate::scripts::now_millis;

generate_script_struct!(RetryJob, "retryJob");

#[derive(Debug, Clone)]
pub struct RetryJobArgs {
    pub job_id: String,
    pub token: String,
    pub order: JobOrder,
    pub fields_to_update: Option<HashMap<String, String>>,
}

#[derive(Serialize)]
struct PackedRetryOpts<'a> {
    #[serde(rename = "fieldsToUpdate", skip_serializing_if = "Option::is_none")]
    fields_to_update: Option<&'a HashMap<String, String>>,
}

#[derive(Debug)]
pub enum RetryJobReturn {
    Ok,
    Failure(ScriptFailure),
}

impl FromRedisValue for RetryJobReturn {
    fn from_redis_value(v: &Value) -> redis::RedisResult<Self> {
        match v {
            Value::Int(0) => Ok(RetryJobReturn::Ok),
            Value::Int(code) => ScriptFailure::from_code(*code)
                .map(RetryJobReturn::Failure)
                .ok_or_else(|| {
                    redis::RedisError::from((
                        redis::ErrorKind::TypeError,
                        "Unknown return value",
                    ))
                }),
            _ => Err(redis::RedisError::from((
                redis::ErrorKind::TypeError,
                "Unknown return value",
            ))),
        }
    }
}

impl RetryJob {
    pub async fn run(
        &self,
        prefix: &str,
        connection: &mut ConnectionManager,
        args: &RetryJobArgs,
    ) -> Result<RetryJobReturn, QueueError> {
        let mut invocation = self.0.script.prepare_invoke();

        for key in [
            QueueKeys::Active,
            QueueKeys::Wait,
            QueueKeys::Paused,
            QueueKeys::Custom(args.job_id.clone()),
            QueueKeys::Meta,
            QueueKeys::Events,
            QueueKeys::Delayed,
            QueueKeys::Prioritized,
            QueueKeys::Pc,
            QueueKeys::Marker,
            QueueKeys::Stalled,
        ] {
            invocation.key(key.with_prefix(prefix));
        }

        let push_cmd = match args.order {
            JobOrder::Fifo => "LPUSH",
            JobOrder::Lifo => "RPUSH",
        };

        let res = invocation
            .arg(prefix)
            .arg(now_millis().to_string())
            .arg(push_cmd)
            .arg(&args.job_id)
            .arg(&args.token)
            .arg(codec::pack(&PackedRetryOpts {
                fields_to_update: args.fields_to_update.as_ref(),
            })?)
            .invoke_async(connection)
            .await
            .map_err(|e| super::script_error("retryJob", e))?;

        Ok(res)
    }
}
