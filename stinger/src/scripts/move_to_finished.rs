use std::collections::HashMap;

use redis::aio::ConnectionManager;
use redis::{FromRedisValue, Value};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec;
use crate::error::{QueueError, ScriptFailure};
use crate::generate_script_struct;
use crate::job::{KeepJobs, RateLimiterOpts};
use crate::queue_keys::QueueKeys;
use crate::scripts::move_to_active::MoveToActiveReturn;
use crate::scripts::now_millis;

generate_script_struct!(MoveToFinished, "moveToFinished");

/// Which history set a finished job lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishedTarget {
    Completed,
    Failed,
}

impl FinishedTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinishedTarget::Completed => "completed",
            FinishedTarget::Failed => "failed",
        }
    }

    /// Hash field the finish message is written under.
    pub fn property(&self) -> &'static str {
        match self {
            FinishedTarget::Completed => "returnvalue",
            FinishedTarget::Failed => "failedReason",
        }
    }

    fn key(&self) -> QueueKeys {
        match self {
            FinishedTarget::Completed => QueueKeys::Completed,
            FinishedTarget::Failed => QueueKeys::Failed,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MoveToFinishedArgs {
    pub token: String,
    #[serde(rename = "keepJobs")]
    pub keep_jobs: KeepJobs,
    #[serde(rename = "lockDuration")]
    pub lock_duration: u64,
    pub attempts: u32,
    #[serde(rename = "maxMetricsSize", skip_serializing_if = "Option::is_none")]
    pub max_metrics_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limiter: Option<RateLimiterOpts>,
    #[serde(rename = "fieldsToUpdate", skip_serializing_if = "Option::is_none")]
    pub fields_to_update: Option<HashMap<String, String>>,
}

/// Raw reply: either a status code or the nested lease tuple.
#[derive(Debug)]
pub enum MoveToFinishedReturn<Data> {
    Ok,
    Next(MoveToActiveReturn<Data>),
    Failure(ScriptFailure),
}

impl<Data: DeserializeOwned> FromRedisValue for MoveToFinishedReturn<Data> {
    fn from_redis_value(v: &Value) -> redis::RedisResult<Self> {
        match v {
            Value::Int(0) => Ok(MoveToFinishedReturn::Ok),
            Value::Int(code) => ScriptFailure::from_code(*code)
                .map(MoveToFinishedReturn::Failure)
                .ok_or_else(|| {
                    redis::RedisError::from((
                        redis::ErrorKind::TypeError,
                        "Unknown return value",
                    ))
                }),
            Value::Bulk(_) => Ok(MoveToFinishedReturn::Next(
                MoveToActiveReturn::from_redis_value(v)?,
            )),
            _ => Err(redis::RedisError::from((
                redis::ErrorKind::TypeError,
                "Unknown return value",
            ))),
        }
    }
}

impl MoveToFinished {
    #[allow(clippy::too_many_arguments)]
    pub async fn run<Data: DeserializeOwned>(
        &self,
        prefix: &str,
        connection: &mut ConnectionManager,
        job_id: &str,
        message: &str,
        target: FinishedTarget,
        fetch_next: bool,
        args: &MoveToFinishedArgs,
    ) -> Result<MoveToFinishedReturn<Data>, QueueError> {
        let mut invocation = self.0.script.prepare_invoke();

        for key in [
            QueueKeys::Wait,
            QueueKeys::Active,
            QueueKeys::Prioritized,
            QueueKeys::Events,
            QueueKeys::Stalled,
            QueueKeys::Limiter,
            QueueKeys::Delayed,
            QueueKeys::Paused,
            QueueKeys::Meta,
            QueueKeys::Pc,
            target.key(),
            QueueKeys::Custom(job_id.to_string()),
            QueueKeys::Metrics,
            QueueKeys::Marker,
        ] {
            invocation.key(key.with_prefix(prefix));
        }

        let res = invocation
            .arg(job_id)
            .arg(now_millis().to_string())
            .arg(target.property())
            .arg(message)
            .arg(target.as_str())
            .arg(if fetch_next { "1" } else { "0" })
            .arg(prefix)
            .arg(codec::pack(args)?)
            .invoke_async(connection)
            .await
            .map_err(|e| super::script_error("moveToFinished", e))?;

        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(v: Value) -> MoveToFinishedReturn<serde_json::Value> {
        FromRedisValue::from_redis_value(&v).unwrap()
    }

    #[test]
    fn decodes_status_codes() {
        assert!(matches!(decode(Value::Int(0)), MoveToFinishedReturn::Ok));
        assert!(matches!(
            decode(Value::Int(-1)),
            MoveToFinishedReturn::Failure(ScriptFailure::MissingJob)
        ));
        assert!(matches!(
            decode(Value::Int(-2)),
            MoveToFinishedReturn::Failure(ScriptFailure::MissingLock)
        ));
        assert!(matches!(
            decode(Value::Int(-3)),
            MoveToFinishedReturn::Failure(ScriptFailure::NotInActiveSet)
        ));
        assert!(matches!(
            decode(Value::Int(-6)),
            MoveToFinishedReturn::Failure(ScriptFailure::LockMismatch)
        ));

        let unknown: redis::RedisResult<MoveToFinishedReturn<serde_json::Value>> =
            FromRedisValue::from_redis_value(&Value::Int(-4));
        assert!(unknown.is_err());
    }

    #[test]
    fn decodes_the_nested_lease_tuple() {
        let v = Value::Bulk(vec![Value::Int(0), Value::Int(0), Value::Int(0), Value::Int(0)]);
        assert!(matches!(
            decode(v),
            MoveToFinishedReturn::Next(MoveToActiveReturn::None)
        ));
    }

    #[test]
    fn target_wire_names() {
        assert_eq!(FinishedTarget::Completed.property(), "returnvalue");
        assert_eq!(FinishedTarget::Failed.property(), "failedReason");
        assert_eq!(FinishedTarget::Failed.as_str(), "failed");
    }
}
