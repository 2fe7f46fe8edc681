use serde::Deserialize;

use crate::error::Result;
use crate::status::model::{BranchScope, StepKey};
use crate::status::store::StatusStore;
use crate::webhook::events::WorkflowRunPayload;

/// How events from one automation repository are matched to a tracked
/// process. Selected per source repository via configuration, so new
/// automation sources are added without code changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CorrelationStrategy {
    /// The run name IS the process identifier; used by the repository
    /// creation automation.
    DirectName,
    /// Same direct-name correlation, for single-purpose automation triggered
    /// via workflow dispatch; run metadata is recorded per branch.
    TriggeredWorkflow,
    /// Match the run's head commit against the merge commit recorded for the
    /// step; used by automation whose work is observed through a raised and
    /// later merged pull request.
    CommitHash,
}

/// Configured mapping from one automation source repository to its
/// correlation strategy and the step it reports on.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceRule {
    pub repo: String,
    pub step: StepKey,
    pub strategy: CorrelationStrategy,
    /// When true, a completed run on the default branch fans out to every
    /// tracked record's step instead of correlating to a single process.
    #[serde(default)]
    pub bulk_on_default_branch: bool,
}

/// A resolved (process, step) target for an inbound event.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTarget {
    pub repository_name: String,
    pub step: StepKey,
    pub branch: Option<BranchScope>,
}

pub fn branch_scope(head_branch: &str, default_branch: &str) -> BranchScope {
    if head_branch == default_branch {
        BranchScope::Main
    } else {
        BranchScope::Pr
    }
}

/// Resolve a workflow run to the process and step it reports on.
///
/// `None` means no tracked process correlates; that is a normal outcome for
/// late or irrelevant automation events, never an error.
pub async fn resolve(
    store: &dyn StatusStore,
    rule: &SourceRule,
    run: &WorkflowRunPayload,
    default_branch: &str,
) -> Result<Option<ResolvedTarget>> {
    match rule.strategy {
        CorrelationStrategy::DirectName => {
            let Some(record) = store.get(&run.name).await? else {
                return Ok(None);
            };
            Ok(Some(ResolvedTarget {
                repository_name: record.repository_name,
                step: rule.step,
                branch: None,
            }))
        }
        CorrelationStrategy::TriggeredWorkflow => {
            let Some(record) = store.get(&run.name).await? else {
                return Ok(None);
            };
            Ok(Some(ResolvedTarget {
                repository_name: record.repository_name,
                step: rule.step,
                branch: Some(branch_scope(&run.head_branch, default_branch)),
            }))
        }
        CorrelationStrategy::CommitHash => {
            let Some(record) = store.find_by_merged_sha(rule.step, &run.head_sha).await? else {
                return Ok(None);
            };
            Ok(Some(ResolvedTarget {
                repository_name: record.repository_name,
                step: rule.step,
                branch: Some(branch_scope(&run.head_branch, default_branch)),
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::model::{ProcessKind, ProcessRecord, Status, TeamRef, Zone};
    use crate::status::store::{InMemoryStatusStore, StepUpdate};

    fn rule(strategy: CorrelationStrategy, step: StepKey) -> SourceRule {
        SourceRule {
            repo: "platform-automation".to_string(),
            step,
            strategy,
            bulk_on_default_branch: false,
        }
    }

    fn run(name: &str, head_branch: &str, head_sha: &str) -> WorkflowRunPayload {
        WorkflowRunPayload {
            name: name.to_string(),
            id: 1,
            head_branch: head_branch.to_string(),
            head_sha: head_sha.to_string(),
            conclusion: None,
            html_url: "https://github.com/acme/automation/actions/runs/1".to_string(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            path: String::new(),
        }
    }

    async fn tracked_store(name: &str) -> InMemoryStatusStore {
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
    async fn test_direct_name_resolves_tracked_process() {
        let store = tracked_store("svc-a").await;
        let rule = rule(CorrelationStrategy::DirectName, StepKey::Repository);

        let target = resolve(&store, &rule, &run("svc-a", "main", "abc"), "main")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(target.repository_name, "svc-a");
        assert_eq!(target.step, StepKey::Repository);
        assert!(target.branch.is_none());
    }

    #[tokio::test]
    async fn test_direct_name_untracked_is_none() {
        let store = tracked_store("svc-a").await;
        let rule = rule(CorrelationStrategy::DirectName, StepKey::Repository);

        let target = resolve(&store, &rule, &run("other-svc", "main", "abc"), "main")
            .await
            .unwrap();
        assert!(target.is_none());
    }

    #[tokio::test]
    async fn test_triggered_workflow_scopes_by_branch() {
        let store = tracked_store("svc-a").await;
        let rule = rule(CorrelationStrategy::TriggeredWorkflow, StepKey::EgressProxy);

        let target = resolve(&store, &rule, &run("svc-a", "main", "abc"), "main")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(target.branch, Some(BranchScope::Main));

        let target = resolve(&store, &rule, &run("svc-a", "feature", "abc"), "main")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(target.branch, Some(BranchScope::Pr));
    }

    #[tokio::test]
    async fn test_commit_hash_resolves_via_merged_sha() {
        let store = tracked_store("svc-a").await;
        store
            .update_step_guarded(
                "svc-a",
                StepKey::AppConfig,
                &[],
                StepUpdate::status(Status::InProgress).with_merged_sha("abc123"),
            )
            .await
            .unwrap();
        let rule = rule(CorrelationStrategy::CommitHash, StepKey::AppConfig);

        // run name is the automation's own workflow name here, not a process id
        let target = resolve(&store, &rule, &run("deploy", "main", "abc123"), "main")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(target.repository_name, "svc-a");
        assert_eq!(target.branch, Some(BranchScope::Main));

        let target = resolve(&store, &rule, &run("deploy", "main", "unknown"), "main")
            .await
            .unwrap();
        assert!(target.is_none());
    }
}
