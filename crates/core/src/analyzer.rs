//! Seam for the external flow-analysis capability.

use async_trait::async_trait;

/// Asynchronous flow-analysis capability.
///
/// The worker owns none of the analysis internals; it drives exactly one
/// [`understand`](Self::understand) call per job and observes only success
/// or failure. Implementations must be shareable across executor threads.
#[async_trait]
pub trait FlowAnalyzer: Send + Sync + 'static {
    /// Run flow inference over a project directory on behalf of a user.
    async fn understand(
        &self,
        project_id: i64,
        directory: &str,
        user_id: &str,
    ) -> anyhow::Result<()>;
}
