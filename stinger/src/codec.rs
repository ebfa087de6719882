//! Wire packing for compound script arguments and decoding of script
//! return tuples.
//!
//! Compound `ARGV` slots are msgpack (`rmp_serde::to_vec_named`), matching
//! the `cmsgpack.unpack` calls on the server side. Job bodies come back as
//! flat field/value arrays from `HGETALL`.

use redis::{from_redis_value, ErrorKind, RedisResult, Value};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::QueueError;
use crate::job::{Job, JobBuilder};

pub(crate) fn pack<T: Serialize>(value: &T) -> Result<Vec<u8>, QueueError> {
    Ok(rmp_serde::to_vec_named(value)?)
}

fn type_error(detail: &'static str) -> redis::RedisError {
    redis::RedisError::from((ErrorKind::TypeError, detail))
}

fn utf8(v: &Value) -> RedisResult<String> {
    from_redis_value(v)
}

fn parsed<N: std::str::FromStr>(v: &Value, field: &'static str) -> RedisResult<N> {
    utf8(v)?
        .parse::<N>()
        .map_err(|_| type_error(field))
}

/// Decodes the `HGETALL` field/value array of a job hash into a [`Job`].
pub(crate) fn job_from_kv_pairs<Data: DeserializeOwned>(
    job_id: String,
    pairs: &[Value],
) -> RedisResult<Job<Data>> {
    let mut builder: JobBuilder<Data> = JobBuilder::new().id(job_id);
    let mut has_data = false;

    for slice in pairs.chunks(2) {
        let [field, value] = slice else {
            return Err(type_error("job hash reply has an odd number of entries"));
        };
        let field = utf8(field)?;

        builder = match field.as_str() {
            "name" => builder.name(utf8(value)?),
            "data" => {
                has_data = true;
                let raw: Vec<u8> = from_redis_value(value)?;
                builder.data(
                    serde_json::from_slice(&raw)
                        .map_err(|_| type_error("job data is not the expected JSON shape"))?,
                )
            }
            "opts" => builder.opts(utf8(value)?),
            "timestamp" => builder.timestamp(parsed(value, "timestamp")?),
            "delay" => builder.delay(parsed(value, "delay")?),
            "priority" => builder.priority(parsed(value, "priority")?),
            "processedOn" => builder.processed_on(parsed(value, "processedOn")?),
            "finishedOn" => builder.finished_on(parsed(value, "finishedOn")?),
            "ats" => builder.attempts_started(parsed(value, "ats")?),
            "atm" => builder.attempts_made(parsed(value, "atm")?),
            "returnvalue" => builder.return_value(utf8(value)?),
            "failedReason" => builder.failed_reason(utf8(value)?),
            // unknown fields (rjk, deid, ...) ride along in the hash only
            _ => builder,
        };
    }

    if !has_data {
        return Err(type_error("job hash reply is missing the data field"));
    }

    Ok(builder.build())
}
