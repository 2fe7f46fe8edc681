use crate::error::Result;
use crate::status::model::{Status, StepKey};
use crate::status::store::{StatusStore, StepUpdate, UpdateOutcome};

/// Statuses that must not be overwritten by `new_status`: every value that is
/// not strictly before it in the ordering. Terminal states exclude each other
/// (and themselves), so the first terminal state recorded for a step wins.
pub fn dont_overwrite(new_status: Status) -> Vec<Status> {
    Status::ALL
        .into_iter()
        .filter(|current| current.rank() >= new_status.rank())
        .collect()
}

/// Apply a step status through the ordering guard.
///
/// Statuses only ever progress forward (requested -> in-progress ->
/// success/failure). Events can arrive out of order or more than once; a
/// write whose guard does not match is stale and correctly discarded. Stale
/// is a normal outcome, never an error.
pub async fn apply_step_status(
    store: &dyn StatusStore,
    repository_name: &str,
    step: StepKey,
    update: StepUpdate,
) -> Result<UpdateOutcome> {
    let new_status = update.status;
    let exclude = dont_overwrite(new_status);

    let outcome = store
        .update_step_guarded(repository_name, step, &exclude, update)
        .await?;

    match outcome {
        UpdateOutcome::Updated => {
            tracing::info!(
                repository = repository_name,
                step = %step,
                status = %new_status,
                "Recorded step status"
            );
        }
        UpdateOutcome::Stale => {
            tracing::warn!(
                repository = repository_name,
                step = %step,
                status = %new_status,
                "Not recording step status; current status is further along. \
                 The update likely arrived out of order"
            );
        }
    }

    Ok(outcome)
}
