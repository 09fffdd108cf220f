//! Queue consumption loop.
//!
//! Pops task messages from the broker, invokes the [`TaskHandler`] once
//! per message on a blocking executor thread, and stores the boolean
//! outcome in the result backend. Broker connectivity faults are handled
//! here (logged, backed off, reconnected) and never reach the handler.

use std::sync::Arc;
use std::time::Duration;

use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio_util::sync::CancellationToken;

use kgraph_core::task_names::{result_key, TASK_INFER_FLOWS};

use crate::envelope::{TaskEnvelope, TaskMeta};
use crate::{BrokerConfig, BrokerError, TaskHandler};

/// Blocking-pop timeout. Bounds how long cancellation can go unobserved.
const POLL_TIMEOUT_SECS: f64 = 5.0;

/// Delay before reconnecting after a broker error.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// How long result records are kept before expiring (24 hours).
const RESULT_EXPIRY_SECS: u64 = 86_400;

/// A single consumer loop: one synchronous task executor fed from the
/// broker.
///
/// Jobs within one consumer are strictly sequential; the loop awaits each
/// outcome before popping again. Run several consumers for parallelism --
/// no ordering holds across them.
pub struct QueueConsumer {
    client: redis::Client,
    queues: Vec<String>,
    handler: Arc<dyn TaskHandler>,
}

impl QueueConsumer {
    /// Create a consumer for the configured queues.
    pub fn new(config: &BrokerConfig, handler: Arc<dyn TaskHandler>) -> Result<Self, BrokerError> {
        let client = redis::Client::open(config.redis_url())?;
        Ok(Self {
            client,
            queues: config.consume_queues(),
            handler,
        })
    }

    /// Run the consume loop until the cancellation token is triggered.
    ///
    /// Broker errors never terminate the loop; it backs off and
    /// reconnects. An in-flight job always runs to completion before the
    /// next pop, and before shutdown is honoured.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(queues = ?self.queues, "Queue consumer started");

        loop {
            let mut conn = match self.client.get_multiplexed_async_connection().await {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::error!(error = %e, "Broker connection failed");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(RECONNECT_DELAY) => continue,
                    }
                }
            };
            tracing::debug!("Broker connection established");

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!("Queue consumer shutting down");
                        return;
                    }
                    popped = Self::pop_next(&mut conn, &self.queues) => {
                        match popped {
                            Ok(Some(raw)) => self.process_message(&mut conn, &raw).await,
                            Ok(None) => {
                                // Poll timeout; loop to observe cancellation.
                            }
                            Err(e) => {
                                tracing::error!(error = %e, "Queue poll failed, reconnecting");
                                break;
                            }
                        }
                    }
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(RECONNECT_DELAY) => {}
            }
        }
    }

    /// Blocking-pop the next raw message from the consume queues.
    async fn pop_next(
        conn: &mut MultiplexedConnection,
        queues: &[String],
    ) -> Result<Option<String>, redis::RedisError> {
        let popped: Option<(String, String)> = conn.brpop(queues, POLL_TIMEOUT_SECS).await?;
        Ok(popped.map(|(_queue, raw)| raw))
    }

    /// Decode, dispatch, and report one message.
    async fn process_message(&self, conn: &mut MultiplexedConnection, raw: &str) {
        let envelope: TaskEnvelope = match serde_json::from_str(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                // No id to correlate a result with; transport-level discard.
                tracing::warn!(error = %e, raw, "Discarding undecodable message");
                return;
            }
        };
        let TaskEnvelope { id, task, payload } = envelope;

        if task != TASK_INFER_FLOWS {
            tracing::warn!(task = %task, task_id = %id, "Discarding message for unregistered task");
            return;
        }

        tracing::debug!(task_id = %id, task = %task, "Task received");

        let handler = Arc::clone(&self.handler);
        let completed = match tokio::task::spawn_blocking(move || handler.handle(&payload)).await {
            Ok(completed) => completed,
            Err(e) => {
                // The handler is itself a fault boundary; reaching this arm
                // means the executor thread died before returning.
                tracing::error!(task_id = %id, error = %e, "Task executor terminated abnormally");
                false
            }
        };

        if let Err(e) = Self::store_result(conn, &id, completed).await {
            tracing::error!(task_id = %id, error = %e, "Failed to store task result");
        }
    }

    /// Write the outcome to the result backend, keyed by task id.
    async fn store_result(
        conn: &mut MultiplexedConnection,
        task_id: &str,
        completed: bool,
    ) -> Result<(), BrokerError> {
        let meta = TaskMeta::new(task_id, completed);
        let json = serde_json::to_string(&meta)?;
        let _: () = conn
            .set_ex(result_key(task_id), json, RESULT_EXPIRY_SECS)
            .await?;
        tracing::debug!(task_id, completed, "Task result stored");
        Ok(())
    }
}
