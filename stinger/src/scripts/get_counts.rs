use redis::aio::ConnectionManager;

use crate::error::QueueError;
use crate::generate_script_struct;
use crate::job::JobState;

generate_script_struct!(GetCounts, "getCounts");

impl GetCounts {
    pub async fn run(
        &self,
        prefix: &str,
        connection: &mut ConnectionManager,
        states: &[JobState],
    ) -> Result<Vec<u64>, QueueError> {
        let mut invocation = self.0.script.prepare_invoke();
        invocation.key(prefix);

        for state in states {
            invocation.arg(state.as_str());
        }

        let counts = invocation
            .invoke_async(connection)
            .await
            .map_err(|e| super::script_error("getCounts", e))?;
        Ok(counts)
    }
}
