use crate::config::AutomationConfig;
use crate::error::Result;
use crate::reconcile::correlate::{CorrelationStrategy, SourceRule};
use crate::status::guard;
use crate::status::model::{ProcessRecord, Status};
use crate::status::overall;
use crate::status::store::{StatusStore, StepUpdate};
use crate::webhook::events::PullRequestEvent;

/// Exclusion set for pull request metadata writes. Unlike status
/// progressions these may re-apply at the same rank (a merged PR lands on a
/// step the raised PR already moved to in-progress), so only a settled step
/// blocks them.
const KEEP_TERMINAL: &[Status] = &[Status::Success, Status::Failure];

/// Reconcile one `pull_request` event.
///
/// Config-generator automation works through a raised-then-merged pull
/// request: the raised PR is attached to the process it belongs to, and the
/// merge commit recorded on merge is what lets commit-hash correlation match
/// the default-branch workflow runs that follow.
pub async fn handle(
    automation: &AutomationConfig,
    store: &dyn StatusStore,
    event: PullRequestEvent,
) -> Result<()> {
    let source = event.repository.name.clone();

    let Some(rule) = automation.rule_for(&source) else {
        tracing::debug!(source = %source, "No correlation rule for source repository; ignoring event");
        return Ok(());
    };

    // Only the raised-then-merged sources track per-step pull requests
    if rule.strategy != CorrelationStrategy::CommitHash {
        tracing::debug!(source = %source, "Source does not raise pull requests; ignoring event");
        return Ok(());
    }

    match event.action.as_str() {
        "opened" | "reopened" => handle_raised(store, rule, &event).await,
        "closed" => handle_closed(store, rule, &event).await,
        _ => Ok(()),
    }
}

/// Match a pull request to its process: by the PR number recorded when it
/// was raised, falling back to the head branch convention when the raised
/// event was missed.
async fn correlate_pr(
    store: &dyn StatusStore,
    rule: &SourceRule,
    event: &PullRequestEvent,
) -> Result<Option<ProcessRecord>> {
    if let Some(record) = store
        .find_by_pr_number(rule.step, event.pull_request.number)
        .await?
    {
        return Ok(Some(record));
    }
    store.get(&event.pull_request.head.branch).await
}

/// Attach a freshly raised pull request to the process its head branch
/// names. This is what makes the later `closed` event matchable by number.
async fn handle_raised(
    store: &dyn StatusStore,
    rule: &SourceRule,
    event: &PullRequestEvent,
) -> Result<()> {
    let Some(record) = store.get(&event.pull_request.head.branch).await? else {
        tracing::debug!(
            source = %rule.repo,
            pr = event.pull_request.number,
            branch = %event.pull_request.head.branch,
            "Pull request does not correlate to a tracked process; ignoring"
        );
        return Ok(());
    };
    let repository_name = record.repository_name;

    tracing::info!(
        repository = %repository_name,
        step = %rule.step,
        pr = event.pull_request.number,
        "Automation raised its pull request"
    );

    let update =
        StepUpdate::status(Status::InProgress).with_pr(event.pull_request.summary());
    store
        .update_step_guarded(&repository_name, rule.step, KEEP_TERMINAL, update)
        .await?;
    overall::refresh_overall(store, &repository_name).await?;

    Ok(())
}

async fn handle_closed(
    store: &dyn StatusStore,
    rule: &SourceRule,
    event: &PullRequestEvent,
) -> Result<()> {
    let number = event.pull_request.number;
    let Some(record) = correlate_pr(store, rule, event).await? else {
        tracing::debug!(
            source = %rule.repo,
            pr = number,
            "Pull request does not correlate to a tracked process; ignoring"
        );
        return Ok(());
    };
    let repository_name = record.repository_name;

    if event.pull_request.merged {
        tracing::info!(
            repository = %repository_name,
            step = %rule.step,
            pr = number,
            "Pull request merged; work continues on the default branch"
        );
        let mut update =
            StepUpdate::status(Status::InProgress).with_pr(event.pull_request.summary());
        if let Some(sha) = &event.pull_request.merge_commit_sha {
            update = update.with_merged_sha(sha);
        }
        store
            .update_step_guarded(&repository_name, rule.step, KEEP_TERMINAL, update)
            .await?;
    } else {
        tracing::info!(
            repository = %repository_name,
            step = %rule.step,
            pr = number,
            "Pull request closed without merging"
        );
        guard::apply_step_status(
            store,
            &repository_name,
            rule.step,
            StepUpdate::status(Status::Failure).with_detail("pull request closed without merging"),
        )
        .await?;
    }

    overall::refresh_overall(store, &repository_name).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::model::{ProcessKind, StepKey, TeamRef, Zone};
    use crate::status::store::InMemoryStatusStore;
    use crate::webhook::events::{PrHead, PullRequestPayload, RepositoryPayload};

    fn event(
        source: &str,
        action: &str,
        number: u64,
        merged: bool,
        sha: Option<&str>,
        head_branch: &str,
    ) -> PullRequestEvent {
        PullRequestEvent {
            action: action.to_string(),
            pull_request: PullRequestPayload {
                number,
                html_url: format!("https://github.com/acme/{source}/pull/{number}"),
                merged,
                merge_commit_sha: sha.map(str::to_string),
                head: PrHead {
                    branch: head_branch.to_string(),
                },
            },
            repository: RepositoryPayload {
                name: source.to_string(),
            },
        }
    }

    async fn store_with_process(name: &str) -> InMemoryStatusStore {
        let store = InMemoryStatusStore::new();
        store
            .insert_if_absent(ProcessRecord::new(
                ProcessKind::Microservice,
                name,
                TeamRef {
                    team_id: "team-1".to_string(),
                    name: "Platform".to_string(),
                },
                Zone::Public,
            ))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_raised_pr_is_attached_to_its_process() {
        let store = store_with_process("svc-a").await;
        let event = event("platform-app-config", "opened", 7, false, None, "svc-a");

        handle(&AutomationConfig::default(), &store, event)
            .await
            .unwrap();

        let step = &store.get("svc-a").await.unwrap().unwrap().steps[&StepKey::AppConfig];
        assert_eq!(step.status, Status::InProgress);
        assert_eq!(step.pr.as_ref().unwrap().number, 7);
    }

    #[tokio::test]
    async fn test_merged_pr_records_merge_commit() {
        let store = store_with_process("svc-a").await;
        let automation = AutomationConfig::default();

        handle(
            &automation,
            &store,
            event("platform-app-config", "opened", 7, false, None, "svc-a"),
        )
        .await
        .unwrap();
        handle(
            &automation,
            &store,
            event("platform-app-config", "closed", 7, true, Some("def456"), "svc-a"),
        )
        .await
        .unwrap();

        let step = &store.get("svc-a").await.unwrap().unwrap().steps[&StepKey::AppConfig];
        assert_eq!(step.status, Status::InProgress);
        assert_eq!(step.merged_sha.as_deref(), Some("def456"));

        // the recorded sha now correlates default-branch workflow runs
        let found = store
            .find_by_merged_sha(StepKey::AppConfig, "def456")
            .await
            .unwrap();
        assert_eq!(found.unwrap().repository_name, "svc-a");
    }

    #[tokio::test]
    async fn test_merged_pr_correlates_by_head_branch_when_raise_was_missed() {
        let store = store_with_process("svc-a").await;

        // no opened event was ever delivered
        let event = event("platform-app-config", "closed", 7, true, Some("def456"), "svc-a");
        handle(&AutomationConfig::default(), &store, event)
            .await
            .unwrap();

        let step = &store.get("svc-a").await.unwrap().unwrap().steps[&StepKey::AppConfig];
        assert_eq!(step.merged_sha.as_deref(), Some("def456"));
        assert_eq!(step.pr.as_ref().unwrap().number, 7);
    }

    #[tokio::test]
    async fn test_pr_closed_without_merge_fails_the_step() {
        let store = store_with_process("svc-a").await;
        let automation = AutomationConfig::default();

        handle(
            &automation,
            &store,
            event("platform-app-config", "opened", 7, false, None, "svc-a"),
        )
        .await
        .unwrap();
        handle(
            &automation,
            &store,
            event("platform-app-config", "closed", 7, false, None, "svc-a"),
        )
        .await
        .unwrap();

        let record = store.get("svc-a").await.unwrap().unwrap();
        let step = &record.steps[&StepKey::AppConfig];
        assert_eq!(step.status, Status::Failure);
        assert!(step.detail.as_deref().unwrap().contains("without merging"));
        assert_eq!(record.status, Status::Failure);
    }

    #[tokio::test]
    async fn test_raised_pr_does_not_disturb_a_settled_step() {
        let store = store_with_process("svc-a").await;
        store
            .update_step_guarded(
                "svc-a",
                StepKey::AppConfig,
                &[],
                StepUpdate::status(Status::Failure),
            )
            .await
            .unwrap();

        let event = event("platform-app-config", "opened", 7, false, None, "svc-a");
        handle(&AutomationConfig::default(), &store, event)
            .await
            .unwrap();

        let step = &store.get("svc-a").await.unwrap().unwrap().steps[&StepKey::AppConfig];
        assert_eq!(step.status, Status::Failure);
        assert!(step.pr.is_none());
    }

    #[tokio::test]
    async fn test_unmatched_pr_is_noop() {
        let store = store_with_process("svc-a").await;
        let before = store.get("svc-a").await.unwrap().unwrap();

        let event = event("platform-app-config", "closed", 99, true, Some("zzz"), "other-svc");
        handle(&AutomationConfig::default(), &store, event)
            .await
            .unwrap();

        assert_eq!(store.get("svc-a").await.unwrap().unwrap(), before);
    }

    #[tokio::test]
    async fn test_irrelevant_actions_are_ignored() {
        let store = store_with_process("svc-a").await;
        let before = store.get("svc-a").await.unwrap().unwrap();

        let event = event("platform-app-config", "synchronize", 7, false, None, "svc-a");
        handle(&AutomationConfig::default(), &store, event)
            .await
            .unwrap();

        assert_eq!(store.get("svc-a").await.unwrap().unwrap(), before);
    }

    #[tokio::test]
    async fn test_direct_name_source_pr_is_ignored() {
        let store = store_with_process("svc-a").await;
        let before = store.get("svc-a").await.unwrap().unwrap();

        let event = event("platform-create-workflows", "closed", 7, true, Some("abc"), "svc-a");
        handle(&AutomationConfig::default(), &store, event)
            .await
            .unwrap();

        assert_eq!(store.get("svc-a").await.unwrap().unwrap(), before);
    }
}
