use redis::aio::ConnectionManager;
use redis::{FromRedisValue, Value};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec;
use crate::error::QueueError;
use crate::generate_script_struct;
use crate::job::{Job, RateLimiterOpts};
use crate::queue_keys::QueueKeys;
use crate::scripts::now_millis;

generate_script_struct!(MoveToActive, "moveToActive");

#[derive(Debug, Clone, Serialize)]
pub struct MoveToActiveArgs {
    pub token: String,
    #[serde(rename = "lockDuration")]
    pub lock_duration: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limiter: Option<RateLimiterOpts>,
    /// Worker name, recorded for observability only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// The 4-slot reply: `{body, jobId, rateLimitTtl, nextDelayedTimestamp}`.
#[derive(Debug)]
pub enum MoveToActiveReturn<Data> {
    /// A job was leased and locked for the caller's token.
    Job(Job<Data>),
    /// The rate-limit budget is exhausted for this many milliseconds.
    RateLimited { expire_in_ms: u64 },
    /// Nothing ready now; the next delayed job ripens at this timestamp.
    NextDelayed { timestamp: u64 },
    /// Nothing to lease (empty, paused or maxed).
    None,
}

impl<Data: DeserializeOwned> FromRedisValue for MoveToActiveReturn<Data> {
    fn from_redis_value(v: &Value) -> redis::RedisResult<Self> {
        match *v {
            Value::Bulk(ref items) => match items.as_slice() {
                [Value::Int(0), Value::Int(0), Value::Int(0), Value::Int(0)] => {
                    Ok(MoveToActiveReturn::None)
                }
                [Value::Int(0), Value::Int(0), Value::Int(ttl), Value::Int(0)] => {
                    Ok(MoveToActiveReturn::RateLimited {
                        expire_in_ms: *ttl as u64,
                    })
                }
                [Value::Int(0), Value::Int(0), Value::Int(0), Value::Int(timestamp)] => {
                    Ok(MoveToActiveReturn::NextDelayed {
                        timestamp: *timestamp as u64,
                    })
                }
                [Value::Bulk(raw_job), Value::Data(job_id), Value::Int(_), Value::Int(_)] => {
                    let job_id = String::from_utf8(job_id.to_vec()).map_err(|_| {
                        redis::RedisError::from((
                            redis::ErrorKind::TypeError,
                            "job id is not valid utf-8",
                        ))
                    })?;
                    Ok(MoveToActiveReturn::Job(codec::job_from_kv_pairs(
                        job_id, raw_job,
                    )?))
                }
                _ => Err(redis::RedisError::from((
                    redis::ErrorKind::TypeError,
                    "Invalid response type",
                ))),
            },
            _ => Err(redis::RedisError::from((
                redis::ErrorKind::TypeError,
                "Invalid response type",
            ))),
        }
    }
}

impl MoveToActive {
    pub async fn run<Data: DeserializeOwned>(
        &self,
        prefix: &str,
        connection: &mut ConnectionManager,
        args: &MoveToActiveArgs,
    ) -> Result<MoveToActiveReturn<Data>, QueueError> {
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
            QueueKeys::Marker,
        ] {
            invocation.key(key.with_prefix(prefix));
        }

        let res = invocation
            .arg(prefix)
            .arg(now_millis().to_string())
            .arg(codec::pack(args)?)
            .invoke_async(connection)
            .await
            .map_err(|e| super::script_error("moveToActive", e))?;

        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(s: &str) -> Value {
        Value::Data(s.as_bytes().to_vec())
    }

    #[test]
    fn decodes_the_empty_reply() {
        let v = Value::Bulk(vec![Value::Int(0), Value::Int(0), Value::Int(0), Value::Int(0)]);
        let ret: MoveToActiveReturn<serde_json::Value> = FromRedisValue::from_redis_value(&v).unwrap();
        assert!(matches!(ret, MoveToActiveReturn::None));
    }

    #[test]
    fn decodes_a_rate_limited_reply() {
        let v = Value::Bulk(vec![Value::Int(0), Value::Int(0), Value::Int(742), Value::Int(0)]);
        let ret: MoveToActiveReturn<serde_json::Value> = FromRedisValue::from_redis_value(&v).unwrap();
        assert!(matches!(
            ret,
            MoveToActiveReturn::RateLimited { expire_in_ms: 742 }
        ));
    }

    #[test]
    fn decodes_a_next_delayed_reply() {
        let v = Value::Bulk(vec![
            Value::Int(0),
            Value::Int(0),
            Value::Int(0),
            Value::Int(1700000000100),
        ]);
        let ret: MoveToActiveReturn<serde_json::Value> = FromRedisValue::from_redis_value(&v).unwrap();
        assert!(matches!(
            ret,
            MoveToActiveReturn::NextDelayed {
                timestamp: 1700000000100
            }
        ));
    }

    #[test]
    fn decodes_a_leased_job() {
        let v = Value::Bulk(vec![
            Value::Bulk(vec![
                data("name"),
                data("T"),
                data("data"),
                data("{\"n\":2}"),
                data("timestamp"),
                data("1700000000000"),
                data("priority"),
                data("0"),
            ]),
            data("3"),
            Value::Int(0),
            Value::Int(0),
        ]);
        let ret: MoveToActiveReturn<serde_json::Value> = FromRedisValue::from_redis_value(&v).unwrap();
        match ret {
            MoveToActiveReturn::Job(job) => {
                assert_eq!(job.id, "3");
                assert_eq!(job.name, "T");
                assert_eq!(job.data["n"], 2);
            }
            other => panic!("expected a job, got {:?}", other),
        }
    }

    #[test]
    fn rejects_malformed_replies() {
        let v = Value::Bulk(vec![Value::Int(1)]);
        let ret: redis::RedisResult<MoveToActiveReturn<serde_json::Value>> =
            FromRedisValue::from_redis_value(&v);
        assert!(ret.is_err());
    }
}
