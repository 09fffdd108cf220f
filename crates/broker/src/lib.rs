//! Queue Client for the kgraph flow-inference worker.
//!
//! Connects to the Redis broker, consumes task messages, invokes the task
//! handler once per message, and reports boolean outcomes to the result
//! backend. All broker-side retry, backoff, and reconnection semantics
//! live here; the handler never sees a transport fault.

pub mod config;
pub mod consumer;
pub mod envelope;
pub mod heartbeat;

pub use config::BrokerConfig;
pub use consumer::QueueConsumer;

/// Errors from the broker integration layer.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// Broker connectivity or protocol failure.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A result record could not be serialized.
    #[error("result serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Synchronous task handler invoked once per consumed message.
///
/// The handler is a hard fault boundary: it receives the raw job payload
/// and must convert every failure mode into the boolean outcome. `true`
/// marks success, `false` marks logical task failure.
pub trait TaskHandler: Send + Sync + 'static {
    /// Handle one job payload to completion.
    fn handle(&self, payload: &serde_json::Value) -> bool;
}
