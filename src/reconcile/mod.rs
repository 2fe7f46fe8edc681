pub mod correlate;
pub mod normalize;
pub mod pull_request;
pub mod workflow_run;

use crate::error::Result;
use crate::server::AppState;
use crate::webhook::events::InboundEvent;

/// Entry point for the queue consumer: route one inbound event to its
/// handler. An `Err` here means the store was unavailable and the event
/// should be redelivered; everything else (unknown sources, uncorrelated
/// events, stale writes) resolves to `Ok` and is dropped.
pub async fn handle_event(state: &AppState, event: InboundEvent) -> Result<()> {
    match event {
        InboundEvent::WorkflowRun(e) => {
            workflow_run::handle(&state.config.automation, state.store.as_ref(), e).await
        }
        InboundEvent::PullRequest(e) => {
            pull_request::handle(&state.config.automation, state.store.as_ref(), e).await
        }
        // Filtered at the webhook edge; harmless if one slips through
        InboundEvent::Ping | InboundEvent::Unsupported(_) => Ok(()),
    }
}
