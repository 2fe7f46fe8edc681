use serde_json::json;

use crate::config::AppConfig;
use crate::status::model::{ProcessKind, StepKey, TeamRef, Zone};

/// Caller-supplied context for a provisioning request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub team: TeamRef,
    /// GitHub team granted access to the created repository.
    pub github_team: String,
    pub service_template: Option<String>,
    pub zone: Zone,
}

/// One external action to dispatch: which automation repository, which
/// workflow file, and its inputs.
#[derive(Debug, Clone)]
pub struct ActionSpec {
    pub step: StepKey,
    pub repo: String,
    pub workflow_id: String,
    pub inputs: serde_json::Value,
}

/// The ordered action list for a kind: repository creation first, then the
/// configuration-generation actions for each remaining required step.
pub fn action_plan(
    config: &AppConfig,
    kind: ProcessKind,
    repository_name: &str,
    ctx: &RequestContext,
) -> Vec<ActionSpec> {
    let mut actions = Vec::new();

    for step in kind.required_steps() {
        let Some(repo) = config.automation.repo_for_step(*step) else {
            tracing::warn!(
                step = %step,
                "No automation repository configured for step; skipping dispatch"
            );
            continue;
        };

        let spec = match step {
            StepKey::Repository => ActionSpec {
                step: *step,
                repo: repo.to_string(),
                workflow_id: repository_workflow(config, kind).to_string(),
                inputs: json!({
                    "repositoryName": repository_name,
                    "serviceTypeTemplate": ctx.service_template,
                    "team": ctx.github_team,
                }),
            },
            StepKey::AppConfig
            | StepKey::NginxUpstream
            | StepKey::Infra
            | StepKey::EgressProxy => ActionSpec {
                step: *step,
                repo: repo.to_string(),
                workflow_id: config.workflows.create_service.clone(),
                inputs: json!({
                    "service": repository_name,
                    "zone": ctx.zone,
                    "team": ctx.github_team,
                }),
            },
        };

        actions.push(spec);
    }

    actions
}

fn repository_workflow(config: &AppConfig, kind: ProcessKind) -> &str {
    match kind {
        ProcessKind::Microservice => &config.workflows.create_microservice,
        ProcessKind::BareRepository => &config.workflows.create_repository,
        ProcessKind::EnvTestSuite => &config.workflows.create_env_test_suite,
        ProcessKind::PerfTestSuite => &config.workflows.create_perf_test_suite,
        ProcessKind::SmokeTestSuite => &config.workflows.create_smoke_test_suite,
    }
}

/// Minimal config for exercising plans and orchestration in tests.
#[cfg(test)]
pub(crate) fn test_config() -> AppConfig {
    use crate::config::{AutomationConfig, GitHubConfig, ServerConfig, WorkflowsConfig};

    AppConfig {
        server: ServerConfig::default(),
        github: GitHubConfig {
            org: "acme".to_string(),
            app_id: 1,
            installation_id: 2,
            private_key_path: std::path::PathBuf::from("/dev/null"),
            webhook_secret: "shh".to_string(),
        },
        workflows: WorkflowsConfig::default(),
        automation: AutomationConfig::default(),
        templates: std::collections::HashMap::new(),
    }
}
