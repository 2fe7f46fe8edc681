use crate::error::Result;
use crate::status::model::{ProcessRecord, Status};
use crate::status::store::StatusStore;

/// Derive the overall process status from the per-step statuses.
///
/// Success only when every required step succeeded; failure as soon as any
/// required step failed; in-progress otherwise, which covers not-requested,
/// requested, and mixed partial completion.
pub fn compute_overall(record: &ProcessRecord) -> Status {
    let step_statuses = record
        .kind
        .required_steps()
        .iter()
        .map(|key| record.steps.get(key).map(|s| s.status));

    if step_statuses
        .clone()
        .all(|s| s == Some(Status::Success))
    {
        return Status::Success;
    }

    if step_statuses
        .clone()
        .any(|s| s == Some(Status::Failure))
    {
        return Status::Failure;
    }

    Status::InProgress
}

/// Recompute and write the overall status projection. Unlike step writes this
/// is unconditional: the projection always follows the current step states.
pub async fn refresh_overall(store: &dyn StatusStore, repository_name: &str) -> Result<()> {
    let Some(record) = store.get(repository_name).await? else {
        return Ok(());
    };

    let overall = compute_overall(&record);
    store.set_overall(repository_name, overall).await?;

    tracing::debug!(
        repository = repository_name,
        status = %overall,
        "Refreshed overall status"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::model::{ProcessKind, StepKey, TeamRef, Zone};

    fn record_with(kind: ProcessKind, statuses: &[(StepKey, Status)]) -> ProcessRecord {
        let mut record = ProcessRecord::new(
            kind,
            "my-service",
            TeamRef {
                team_id: "team-1".to_string(),
                name: "Platform".to_string(),
            },
            Zone::Public,
        );
        for (step, status) in statuses {
            record.steps.get_mut(step).unwrap().status = *status;
        }
        record
    }

    #[test]
    fn test_microservice_all_success() {
        let record = record_with(
            ProcessKind::Microservice,
            &[
                (StepKey::Repository, Status::Success),
                (StepKey::AppConfig, Status::Success),
                (StepKey::NginxUpstream, Status::Success),
                (StepKey::Infra, Status::Success),
                (StepKey::EgressProxy, Status::Success),
            ],
        );
        assert_eq!(compute_overall(&record), Status::Success);
    }

    #[test]
    fn test_microservice_single_failure_fails_overall() {
        let record = record_with(
            ProcessKind::Microservice,
            &[
                (StepKey::Repository, Status::Success),
                (StepKey::AppConfig, Status::Success),
                (StepKey::NginxUpstream, Status::Failure),
                (StepKey::Infra, Status::Success),
                (StepKey::EgressProxy, Status::Success),
            ],
        );
        assert_eq!(compute_overall(&record), Status::Failure);
    }

    #[test]
    fn test_microservice_partial_completion_is_in_progress() {
        let record = record_with(
            ProcessKind::Microservice,
            &[
                (StepKey::Repository, Status::Success),
                (StepKey::AppConfig, Status::InProgress),
            ],
        );
        assert_eq!(compute_overall(&record), Status::InProgress);
    }

    #[test]
    fn test_bare_repository_follows_single_step() {
        for status in [Status::Success, Status::Failure, Status::InProgress] {
            let record = record_with(
                ProcessKind::BareRepository,
                &[(StepKey::Repository, status)],
            );
            assert_eq!(compute_overall(&record), status);
        }
    }

    #[test]
    fn test_missing_required_step_is_in_progress() {
        // A record that somehow lost a required step never reports success
        let mut record = record_with(
            ProcessKind::Microservice,
            &[
                (StepKey::Repository, Status::Success),
                (StepKey::AppConfig, Status::Success),
                (StepKey::NginxUpstream, Status::Success),
                (StepKey::Infra, Status::Success),
                (StepKey::EgressProxy, Status::Success),
            ],
        );
        record.steps.remove(&StepKey::EgressProxy);
        assert_eq!(compute_overall(&record), Status::InProgress);
    }

    #[tokio::test]
    async fn test_refresh_overall_writes_projection() {
        use crate::status::store::{InMemoryStatusStore, StatusStore, StepUpdate};

        let store = InMemoryStatusStore::new();
        store
            .insert_if_absent(record_with(
                ProcessKind::BareRepository,
                &[(StepKey::Repository, Status::NotRequested)],
            ))
            .await
            .unwrap();

        store
            .update_step_guarded(
                "my-service",
                StepKey::Repository,
                &[],
                StepUpdate::status(Status::Success),
            )
            .await
            .unwrap();
        refresh_overall(&store, "my-service").await.unwrap();

        let record = store.get("my-service").await.unwrap().unwrap();
        assert_eq!(record.status, Status::Success);
    }

    #[tokio::test]
    async fn test_refresh_overall_unknown_record_is_noop() {
        use crate::status::store::InMemoryStatusStore;

        let store = InMemoryStatusStore::new();
        assert!(refresh_overall(&store, "nope").await.is_ok());
    }
}
