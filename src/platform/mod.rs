pub mod github;

use async_trait::async_trait;

use crate::error::Result;

/// External action invoker.
///
/// The orchestrator fires automation through this trait and returns without
/// waiting; completion is observed later, asynchronously, through webhook
/// events on the reconciliation path.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Trigger `workflow_id` in the named automation repository with a
    /// free-form input map.
    async fn dispatch_workflow(
        &self,
        repo: &str,
        workflow_id: &str,
        inputs: serde_json::Value,
    ) -> Result<()>;
}
