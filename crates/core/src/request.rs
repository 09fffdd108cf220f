//! Typed flow-inference job request and payload validation.
//!
//! A raw job payload arrives as untyped JSON; [`FlowInferenceRequest::parse`]
//! is the single place it is turned into a typed request. Anything the
//! parser rejects never reaches the execution bridge.

use serde_json::Value;

/// Errors produced while validating a raw job payload.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// The payload is not a JSON object.
    #[error("payload must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    /// A required field is absent.
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    /// `project_id` is present but not coercible to a positive integer.
    #[error("`project_id` must be a positive integer, got {0}")]
    InvalidProjectId(String),

    /// A string field is present but empty or of the wrong type.
    #[error("`{0}` must be a non-empty string")]
    InvalidField(&'static str),
}

/// A validated flow-inference job.
///
/// Constructed once per incoming message via [`parse`](Self::parse) and
/// immutable afterwards. The worker never persists it; it is discarded as
/// soon as the job terminates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowInferenceRequest {
    pub project_id: i64,
    pub directory: String,
    pub user_id: String,
}

impl FlowInferenceRequest {
    /// Parse and validate a raw job payload.
    ///
    /// Rules:
    /// - `project_id` must be a positive integer; a JSON integer or a
    ///   decimal string (`"42"`) is accepted, anything else is rejected.
    /// - `directory` and `user_id` must be non-empty strings.
    pub fn parse(payload: &Value) -> Result<Self, ValidationError> {
        let fields = payload
            .as_object()
            .ok_or(ValidationError::NotAnObject(json_type_name(payload)))?;

        let raw_id = fields
            .get("project_id")
            .ok_or(ValidationError::MissingField("project_id"))?;
        let project_id = coerce_project_id(raw_id)
            .ok_or_else(|| ValidationError::InvalidProjectId(raw_id.to_string()))?;

        let directory = require_string(fields, "directory")?;
        let user_id = require_string(fields, "user_id")?;

        Ok(Self {
            project_id,
            directory,
            user_id,
        })
    }
}

/// Coerce a JSON value into a positive integer project id.
///
/// Accepts an integer or a decimal string. Floats, non-numeric strings, and
/// every other JSON type are rejected, as are zero and negative values.
fn coerce_project_id(value: &Value) -> Option<i64> {
    let id = match value {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    (id > 0).then_some(id)
}

/// Extract a required non-empty string field.
fn require_string(
    fields: &serde_json::Map<String, Value>,
    name: &'static str,
) -> Result<String, ValidationError> {
    let value = fields.get(name).ok_or(ValidationError::MissingField(name))?;
    match value.as_str() {
        Some(s) if !s.is_empty() => Ok(s.to_string()),
        _ => Err(ValidationError::InvalidField(name)),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
