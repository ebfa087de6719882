use redis::aio::ConnectionManager;

use crate::codec;
use crate::error::QueueError;
use crate::generate_script_struct;
use crate::queue_keys::QueueKeys;
use crate::scripts::add_standard_job::{deduplication_key, AddArgs, AddReturn};
use crate::scripts::now_millis;

generate_script_struct!(AddDelayedJob, "addDelayedJob");

impl AddDelayedJob {
    pub async fn run(
        &self,
        prefix: &str,
        connection: &mut ConnectionManager,
        args: AddArgs<'_>,
    ) -> Result<AddReturn, QueueError> {
        let mut invocation = self.0.script.prepare_invoke();

        for key in [
            QueueKeys::Marker,
            QueueKeys::Meta,
            QueueKeys::Id,
            QueueKeys::Delayed,
            QueueKeys::Events,
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
            .map_err(|e| super::script_error("addDelayedJob", e))?;

        Ok(res)
    }
}
