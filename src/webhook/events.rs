use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::status::model::{PullRequestSummary, WorkflowRunSummary};

/// Inbound event parsed from the payload based on the X-GitHub-Event header.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    WorkflowRun(WorkflowRunEvent),
    PullRequest(PullRequestEvent),
    Ping,
    Unsupported(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowRunEvent {
    pub action: String,
    pub workflow_run: WorkflowRunPayload,
    pub repository: RepositoryPayload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowRunPayload {
    /// By convention our dispatch inputs set the run name to the repository
    /// being provisioned, which is what direct-name correlation relies on.
    pub name: String,
    pub id: u64,
    pub head_branch: String,
    pub head_sha: String,
    pub conclusion: Option<String>,
    pub html_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub path: String,
}

impl WorkflowRunPayload {
    /// Trim the run down to the fields worth storing against a step.
    pub fn summary(&self) -> WorkflowRunSummary {
        WorkflowRunSummary {
            name: self.name.clone(),
            id: self.id,
            html_url: self.html_url.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            path: self.path.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestEvent {
    pub action: String,
    pub pull_request: PullRequestPayload,
    pub repository: RepositoryPayload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestPayload {
    pub number: u64,
    pub html_url: String,
    #[serde(default)]
    pub merged: bool,
    pub merge_commit_sha: Option<String>,
    pub head: PrHead,
}

/// Head branch of the pull request. Automation raises its config PR from a
/// branch named after the service being provisioned, so the head branch is
/// also a correlation key.
#[derive(Debug, Clone, Deserialize)]
pub struct PrHead {
    #[serde(rename = "ref")]
    pub branch: String,
}

impl PullRequestPayload {
    /// Trim the pull request down to the fields worth storing against a step.
    pub fn summary(&self) -> PullRequestSummary {
        PullRequestSummary {
            number: self.number,
            html_url: self.html_url.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryPayload {
    pub name: String,
}

impl InboundEvent {
    pub fn parse(event_type: &str, payload: &[u8]) -> Result<Self, serde_json::Error> {
        match event_type {
            "workflow_run" => {
                let event: WorkflowRunEvent = serde_json::from_slice(payload)?;
                Ok(InboundEvent::WorkflowRun(event))
            }
            "pull_request" => {
                let event: PullRequestEvent = serde_json::from_slice(payload)?;
                Ok(InboundEvent::PullRequest(event))
            }
            "ping" => Ok(InboundEvent::Ping),
            other => Ok(InboundEvent::Unsupported(other.to_string())),
        }
    }

    pub fn description(&self) -> String {
        match self {
            InboundEvent::WorkflowRun(e) => format!(
                "workflow_run {} from {} ({}/{})",
                e.action, e.repository.name, e.workflow_run.head_branch, e.workflow_run.head_sha
            ),
            InboundEvent::PullRequest(e) => format!(
                "pull_request {} #{} from {}",
                e.action, e.pull_request.number, e.repository.name
            ),
            InboundEvent::Ping => "ping".to_string(),
            InboundEvent::Unsupported(t) => format!("unsupported ({t})"),
        }
    }
}
