//! Worker liveness heartbeat.
//!
//! Publishes a timestamped key with a TTL on a fixed interval, so the
//! backend can tell live workers from dead ones: a worker that stops
//! beating has its key expire on its own. Pure scheduling; no business
//! logic.

use std::time::Duration;

use chrono::Utc;
use redis::AsyncCommands;
use tokio_util::sync::CancellationToken;

use kgraph_core::task_names::heartbeat_key;

/// Delay before retrying after a failed connection or publish.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Publish heartbeats until the cancellation token is triggered.
///
/// The key TTL is twice the publish interval: one missed beat keeps the
/// worker visible, two let the key expire.
pub async fn run(
    client: redis::Client,
    worker_id: &str,
    interval: Duration,
    cancel: CancellationToken,
) {
    let key = heartbeat_key(worker_id);
    let ttl_secs = interval.as_secs() * 2;

    loop {
        let mut conn = match client.get_multiplexed_async_connection().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::error!(error = %e, "Heartbeat connection failed");
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(RECONNECT_DELAY) => continue,
                }
            }
        };

        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Heartbeat stopped");
                    return;
                }
                _ = ticker.tick() => {
                    let published: Result<(), redis::RedisError> =
                        conn.set_ex(&key, Utc::now().to_rfc3339(), ttl_secs).await;
                    match published {
                        Ok(()) => tracing::debug!(key = %key, "Heartbeat sent"),
                        Err(e) => {
                            tracing::error!(error = %e, "Heartbeat publish failed, reconnecting");
                            break;
                        }
                    }
                }
            }
        }
    }
}
