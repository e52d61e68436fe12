//! Staging checkpoint with bounded retry (spec §4.6 step 2: "essential —
//! the graph engine's attach-extension opens a fresh session that cannot
//! see uncommitted staging WAL"), grounded on the checkpoint-retry loop in
//! `core/lib/storage/src/data_restore/mod.rs`.

use std::time::Duration;

use graphnode_basic_types::{Error, GraphId};
use graphnode_staging_store::StagingConnectionPool;
use tracing::warn;

const MAX_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Runs `CHECKPOINT` against the staging database for `graph_id`, retrying
/// up to [`MAX_ATTEMPTS`] times with a fixed one-second backoff between
/// attempts (spec §5: "checkpoint retry budget is 3 attempts with 1-second
/// backoff and a hard fail after").
pub async fn checkpoint_staging(pool: &StagingConnectionPool, graph_id: &GraphId) -> Result<(), Error> {
    let mut last_err = None;
    for attempt in 1..=MAX_ATTEMPTS {
        let conn = pool.get_connection(graph_id).await?;
        match conn.execute_batch("CHECKPOINT") {
            Ok(()) => return Ok(()),
            Err(e) => {
                warn!(graph_id = %graph_id, attempt, "staging checkpoint failed: {e}");
                last_err = Some(e.to_string());
                drop(conn);
                if attempt < MAX_ATTEMPTS {
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
            }
        }
    }
    Err(Error::CheckpointFailed {
        attempts: MAX_ATTEMPTS,
        source: last_err.unwrap_or_default(),
    })
}
