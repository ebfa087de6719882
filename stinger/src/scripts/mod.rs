use std::time::SystemTime;

pub mod add_delayed_job;
pub mod add_standard_job;
pub mod get_counts;
pub mod loader;
pub mod macros;
pub mod move_to_active;
pub mod move_to_finished;
pub mod registry;
pub mod retry_job;

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}

/// A `NOSCRIPT` reply surviving the registry's transparent reload means the
/// server cannot hold the script; everything else passes through.
pub(crate) fn script_error(name: &'static str, err: redis::RedisError) -> crate::error::QueueError {
    if err.kind() == redis::ErrorKind::NoScriptError {
        crate::error::QueueError::ScriptLoad { name, source: err }
    } else {
        crate::error::QueueError::Redis(err)
    }
}
