//! REST client for the flow-analysis engine.
//!
//! Wraps the engine's HTTP API (inference submission) using [`reqwest`].
//! One request per job: the call returns when the engine has finished the
//! run or failed it.

use async_trait::async_trait;

use kgraph_core::analyzer::FlowAnalyzer;

/// HTTP client for the flow-analysis engine.
pub struct FlowApiClient {
    client: reqwest::Client,
    api_url: String,
}

/// Errors from the flow-analysis REST layer.
#[derive(Debug, thiserror::Error)]
pub enum FlowApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The engine returned a non-2xx status code.
    #[error("analysis engine error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

impl FlowApiClient {
    /// Create a new client for the analysis engine.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://flow-engine:8000`.
    ///
    /// No request deadline is applied: an inference run takes as long as
    /// it takes, and the caller blocks until the engine responds or the
    /// transport fails.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into(),
        }
    }

    /// Create a client reusing an existing [`reqwest::Client`]
    /// (useful for connection pooling across services).
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
        }
    }

    /// Run one inference and wait for it to finish.
    ///
    /// Sends `POST /analysis/infer-flows` with the job fields as JSON.
    async fn infer_flows(
        &self,
        project_id: i64,
        directory: &str,
        user_id: &str,
    ) -> Result<(), FlowApiError> {
        let body = serde_json::json!({
            "project_id": project_id,
            "directory": directory,
            "user_id": user_id,
        });

        tracing::debug!(project_id, directory, user_id, "Submitting inference run");

        let response = self
            .client
            .post(format!("{}/analysis/infer-flows", self.api_url))
            .json(&body)
            .send()
            .await?;

        Self::check_status(response).await
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), FlowApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(FlowApiError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl FlowAnalyzer for FlowApiClient {
    async fn understand(
        &self,
        project_id: i64,
        directory: &str,
        user_id: &str,
    ) -> anyhow::Result<()> {
        self.infer_flows(project_id, directory, user_id).await?;
        Ok(())
    }
}
