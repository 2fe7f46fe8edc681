use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Step and process status lattice:
/// `not-requested < requested < in-progress < {success, failure}`.
///
/// `success` and `failure` are both terminal and incomparable with each
/// other; whichever is recorded first for a step is permanent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    #[default]
    NotRequested,
    Requested,
    InProgress,
    Success,
    Failure,
}

impl Status {
    pub const ALL: [Status; 5] = [
        Status::NotRequested,
        Status::Requested,
        Status::InProgress,
        Status::Success,
        Status::Failure,
    ];

    /// Position in the forward-only ordering. The two terminal states share
    /// the top rank so neither is strictly before the other.
    pub fn rank(self) -> u8 {
        match self {
            Status::NotRequested => 0,
            Status::Requested => 1,
            Status::InProgress => 2,
            Status::Success | Status::Failure => 3,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Success | Status::Failure)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::NotRequested => "not-requested",
            Status::Requested => "requested",
            Status::InProgress => "in-progress",
            Status::Success => "success",
            Status::Failure => "failure",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What is being provisioned. The required step set is a pure function of
/// the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessKind {
    BareRepository,
    Microservice,
    EnvTestSuite,
    PerfTestSuite,
    SmokeTestSuite,
}

impl ProcessKind {
    pub fn required_steps(self) -> &'static [StepKey] {
        match self {
            ProcessKind::BareRepository => &[StepKey::Repository],
            ProcessKind::Microservice => &[
                StepKey::Repository,
                StepKey::AppConfig,
                StepKey::NginxUpstream,
                StepKey::Infra,
                StepKey::EgressProxy,
            ],
            ProcessKind::EnvTestSuite
            | ProcessKind::PerfTestSuite
            | ProcessKind::SmokeTestSuite => {
                &[StepKey::Repository, StepKey::Infra, StepKey::EgressProxy]
            }
        }
    }
}

/// One externally-executed provisioning step within a process.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum StepKey {
    Repository,
    AppConfig,
    NginxUpstream,
    Infra,
    EgressProxy,
}

impl StepKey {
    pub fn as_str(self) -> &'static str {
        match self {
            StepKey::Repository => "repository",
            StepKey::AppConfig => "app-config",
            StepKey::NginxUpstream => "nginx-upstream",
            StepKey::Infra => "infra",
            StepKey::EgressProxy => "egress-proxy",
        }
    }
}

impl std::fmt::Display for StepKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a workflow run reported against the pull request branch or the
/// default branch after merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchScope {
    Pr,
    Main,
}

/// Network zone a service is deployed into, derived from its template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Zone {
    Public,
    Protected,
}

/// The team that requested the process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRef {
    pub team_id: String,
    pub name: String,
}

/// Trimmed `workflow_run` payload stored against a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRunSummary {
    pub name: String,
    pub id: u64,
    pub html_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub path: String,
}

/// Trimmed pull request payload stored against a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequestSummary {
    pub number: u64,
    pub html_url: String,
}

/// Per-step progress plus correlated metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepState {
    pub status: Status,
    /// Pull request raised by the orchestration action, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr: Option<PullRequestSummary>,
    /// Merge commit of that pull request; the commit-hash correlation key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged_sha: Option<String>,
    /// Workflow run observed on the pull request branch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_run: Option<WorkflowRunSummary>,
    /// Workflow run observed on the default branch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_run: Option<WorkflowRunSummary>,
    /// Diagnostic detail from the most recent failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// One tracked provisioning request, keyed by the target repository name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub repository_name: String,
    pub kind: ProcessKind,
    /// Derived overall status; a projection of the step statuses.
    pub status: Status,
    pub started: DateTime<Utc>,
    pub team: TeamRef,
    pub zone: Zone,
    pub steps: BTreeMap<StepKey, StepState>,
}

impl ProcessRecord {
    /// A fresh record with every required step initialized to not-requested.
    pub fn new(kind: ProcessKind, repository_name: &str, team: TeamRef, zone: Zone) -> Self {
        let steps = kind
            .required_steps()
            .iter()
            .map(|step| (*step, StepState::default()))
            .collect();

        Self {
            repository_name: repository_name.to_string(),
            kind,
            status: Status::InProgress,
            started: Utc::now(),
            team,
            zone,
            steps,
        }
    }
}
