pub mod plan;

pub use plan::{action_plan, ActionSpec, RequestContext};

use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::platform::Dispatcher;
use crate::status::guard;
use crate::status::model::{ProcessKind, ProcessRecord, Status};
use crate::status::overall;
use crate::status::store::{InsertOutcome, StatusStore, StepUpdate};

/// Start a provisioning process: create the tracking record, then fire the
/// kind's ordered external actions.
///
/// The only step that aborts the whole process is the initial uniqueness
/// check. A dispatch failure is recorded against its step and orchestration
/// carries on; the aggregate status reflects the partial failure. Nothing
/// here waits for the automation to finish; completion arrives later through
/// the reconciliation path.
pub async fn start_process(
    config: &AppConfig,
    store: &dyn StatusStore,
    dispatcher: &dyn Dispatcher,
    kind: ProcessKind,
    repository_name: &str,
    ctx: RequestContext,
) -> Result<ProcessRecord> {
    let record = ProcessRecord::new(kind, repository_name, ctx.team.clone(), ctx.zone);

    if store.insert_if_absent(record).await? == InsertOutcome::AlreadyExists {
        return Err(AppError::AlreadyInProgress(repository_name.to_string()));
    }

    tracing::info!(
        repository = repository_name,
        kind = ?kind,
        team = %ctx.team.name,
        "Starting provisioning process"
    );

    for action in action_plan(config, kind, repository_name, &ctx) {
        match dispatcher
            .dispatch_workflow(&action.repo, &action.workflow_id, action.inputs.clone())
            .await
        {
            Ok(()) => {
                guard::apply_step_status(
                    store,
                    repository_name,
                    action.step,
                    StepUpdate::status(Status::Requested),
                )
                .await?;
            }
            Err(e) => {
                tracing::error!(
                    repository = repository_name,
                    step = %action.step,
                    error = %e,
                    "Dispatch failed; continuing with remaining actions"
                );
                guard::apply_step_status(
                    store,
                    repository_name,
                    action.step,
                    StepUpdate::status(Status::Failure).with_detail(&e.to_string()),
                )
                .await?;
            }
        }
    }

    overall::refresh_overall(store, repository_name).await?;

    store
        .get(repository_name)
        .await?
        .ok_or_else(|| AppError::Store("record missing after creation".to_string()))
}
