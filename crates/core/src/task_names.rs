//! Well-known task, queue, and key name constants.
//!
//! These are the canonical names shared between the producer side (the API
//! that enqueues flow-inference jobs) and this worker. Changing any of them
//! is a wire-protocol change.

/// Logical name of the flow-inference task.
///
/// Used as the routing discriminator in incoming task envelopes; messages
/// carrying any other task name are not handled by this worker.
pub const TASK_INFER_FLOWS: &str = "knowledgegraph.task.infer_flows";

/// Fixed queue the flow-inference task is routed to.
pub const QUEUE_INFER_FLOW_REQUESTS: &str = "infer_flow_requests";

/// Key prefix under which task results are stored in the result backend.
pub const RESULT_KEY_PREFIX: &str = "celery-task-meta-";

/// Result backend key for a task id.
pub fn result_key(task_id: &str) -> String {
    format!("{RESULT_KEY_PREFIX}{task_id}")
}

/// Liveness key for a worker id. Expires on its own when the worker stops
/// heartbeating.
pub fn heartbeat_key(worker_id: &str) -> String {
    format!("kgraph:worker:{worker_id}:heartbeat")
}
