//! Wire types for task messages and result records.

use serde::{Deserialize, Serialize};

/// An incoming task message popped from a queue.
///
/// Only `id` and `task` are typed here. The remaining fields are captured
/// untouched as the raw job payload, so a wrong-typed field reaches the
/// handler's validation step instead of failing envelope decode.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskEnvelope {
    /// Broker-assigned job identifier; keys the result record.
    pub id: String,
    /// Logical task name used for routing.
    pub task: String,
    /// Raw job payload: every field other than `id` and `task`.
    #[serde(flatten)]
    pub payload: serde_json::Value,
}

/// Terminal task state reported to the result backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskStatus {
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "FAILURE")]
    Failure,
}

/// Result record stored in the result backend, keyed by task id.
#[derive(Debug, Clone, Serialize)]
pub struct TaskMeta {
    pub task_id: String,
    pub status: TaskStatus,
    pub result: bool,
}

impl TaskMeta {
    /// Build the result record for a terminated task.
    pub fn new(task_id: impl Into<String>, completed: bool) -> Self {
        Self {
            task_id: task_id.into(),
            status: if completed {
                TaskStatus::Success
            } else {
                TaskStatus::Failure
            },
            result: completed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_splits_routing_fields_from_payload() {
        let envelope: TaskEnvelope = serde_json::from_value(json!({
            "id": "t-1",
            "task": "knowledgegraph.task.infer_flows",
            "project_id": 42,
            "directory": "/repo/src",
            "user_id": "u-1",
        }))
        .unwrap();

        assert_eq!(envelope.id, "t-1");
        assert_eq!(envelope.task, "knowledgegraph.task.infer_flows");
        assert_eq!(envelope.payload["project_id"], 42);
        assert_eq!(envelope.payload["directory"], "/repo/src");
        assert_eq!(envelope.payload["user_id"], "u-1");
    }

    #[test]
    fn envelope_tolerates_wrong_typed_payload_fields() {
        // Decoding must not fail on a malformed payload; validation happens
        // later in the handler.
        let envelope: TaskEnvelope = serde_json::from_value(json!({
            "id": "t-2",
            "task": "knowledgegraph.task.infer_flows",
            "project_id": "abc",
            "directory": 13,
        }))
        .unwrap();

        assert_eq!(envelope.payload["project_id"], "abc");
        assert_eq!(envelope.payload["directory"], 13);
    }

    #[test]
    fn envelope_without_id_fails_to_decode() {
        let result: Result<TaskEnvelope, _> = serde_json::from_value(json!({
            "task": "knowledgegraph.task.infer_flows",
            "project_id": 42,
        }));

        assert!(result.is_err());
    }

    #[test]
    fn success_meta_wire_shape() {
        let meta = TaskMeta::new("t-3", true);
        let value = serde_json::to_value(&meta).unwrap();

        assert_eq!(
            value,
            json!({"task_id": "t-3", "status": "SUCCESS", "result": true})
        );
    }

    #[test]
    fn failure_meta_wire_shape() {
        let meta = TaskMeta::new("t-4", false);
        let value = serde_json::to_value(&meta).unwrap();

        assert_eq!(
            value,
            json!({"task_id": "t-4", "status": "FAILURE", "result": false})
        );
    }
}
