use crate::config::AutomationConfig;
use crate::error::Result;
use crate::reconcile::correlate::{self, SourceRule};
use crate::reconcile::normalize::normalize_status;
use crate::status::guard;
use crate::status::model::{BranchScope, Status};
use crate::status::overall;
use crate::status::store::{StatusStore, StepUpdate};
use crate::webhook::events::WorkflowRunEvent;

/// Reconcile one `workflow_run` event against the status store.
///
/// Events arrive at-least-once and out of order; everything here funnels
/// through the ordering guard, so handling is idempotent and commutative.
pub async fn handle(
    automation: &AutomationConfig,
    store: &dyn StatusStore,
    event: WorkflowRunEvent,
) -> Result<()> {
    let source = event.repository.name.clone();

    tracing::info!(
        source = %source,
        branch = %event.workflow_run.head_branch,
        sha = %event.workflow_run.head_sha,
        action = %event.action,
        "Processing workflow_run event"
    );

    let Some(rule) = automation.rule_for(&source) else {
        tracing::debug!(source = %source, "No correlation rule for source repository; ignoring event");
        return Ok(());
    };

    let status = normalize_status(&event.action, event.workflow_run.conclusion.as_deref());

    if rule.bulk_on_default_branch
        && event.action == "completed"
        && event.workflow_run.head_branch == automation.default_branch
    {
        return handle_bulk_completion(store, rule, &event, status).await;
    }

    let Some(target) =
        correlate::resolve(store, rule, &event.workflow_run, &automation.default_branch).await?
    else {
        tracing::debug!(
            source = %source,
            run = %event.workflow_run.name,
            sha = %event.workflow_run.head_sha,
            "Event does not correlate to a tracked process; ignoring"
        );
        return Ok(());
    };

    let mut update = StepUpdate::status(status);
    if let Some(scope) = target.branch {
        update = update.with_run(scope, event.workflow_run.summary());
    }

    guard::apply_step_status(store, &target.repository_name, target.step, update).await?;
    overall::refresh_overall(store, &target.repository_name).await?;

    Ok(())
}

/// A completed run of the infra automation on the default branch covers
/// every service it knows about, regardless of which commit triggered it, so
/// the outcome fans out to each tracked record's step. Each record is still
/// written through its own guard: steps already terminal stay put.
async fn handle_bulk_completion(
    store: &dyn StatusStore,
    rule: &SourceRule,
    event: &WorkflowRunEvent,
    status: Status,
) -> Result<()> {
    let update = StepUpdate::status(status)
        .with_run(BranchScope::Main, event.workflow_run.summary());

    let updated = store
        .update_step_guarded_all(rule.step, &guard::dont_overwrite(status), update)
        .await?;

    tracing::info!(
        step = %rule.step,
        status = %status,
        count = updated.len(),
        "Bulk-updated step across tracked processes"
    );

    for repository_name in updated {
        overall::refresh_overall(store, &repository_name).await?;
    }

    Ok(())
}
