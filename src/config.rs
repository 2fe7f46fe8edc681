use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::reconcile::correlate::{CorrelationStrategy, SourceRule};
use crate::status::model::{StepKey, Zone};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub github: GitHubConfig,
    #[serde(default)]
    pub workflows: WorkflowsConfig,
    #[serde(default)]
    pub automation: AutomationConfig,
    /// Service template name -> deployment zone.
    #[serde(default = "default_templates")]
    pub templates: HashMap<String, Zone>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Deserialize, Clone)]
pub struct GitHubConfig {
    /// Organisation all automation repositories live in.
    pub org: String,
    pub app_id: u64,
    pub installation_id: u64,
    pub private_key_path: PathBuf,
    pub webhook_secret: String,
}

// Manual Debug impl to avoid leaking the webhook secret
impl std::fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("org", &self.org)
            .field("app_id", &self.app_id)
            .field("installation_id", &self.installation_id)
            .field("private_key_path", &self.private_key_path)
            .field("webhook_secret", &"[REDACTED]")
            .finish()
    }
}

/// Workflow files dispatched per provisioning action.
#[derive(Debug, Deserialize, Clone)]
pub struct WorkflowsConfig {
    #[serde(default = "default_create_microservice")]
    pub create_microservice: String,
    #[serde(default = "default_create_repository")]
    pub create_repository: String,
    #[serde(default = "default_create_env_test_suite")]
    pub create_env_test_suite: String,
    #[serde(default = "default_create_perf_test_suite")]
    pub create_perf_test_suite: String,
    #[serde(default = "default_create_smoke_test_suite")]
    pub create_smoke_test_suite: String,
    /// Workflow used by the single-purpose config-generator repositories.
    #[serde(default = "default_create_service")]
    pub create_service: String,
}

impl Default for WorkflowsConfig {
    fn default() -> Self {
        Self {
            create_microservice: default_create_microservice(),
            create_repository: default_create_repository(),
            create_env_test_suite: default_create_env_test_suite(),
            create_perf_test_suite: default_create_perf_test_suite(),
            create_smoke_test_suite: default_create_smoke_test_suite(),
            create_service: default_create_service(),
        }
    }
}

/// The automation repositories that report back via webhook events, and how
/// events from each are correlated to tracked processes.
#[derive(Debug, Deserialize, Clone)]
pub struct AutomationConfig {
    #[serde(default = "default_branch")]
    pub default_branch: String,
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceRule>,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            default_branch: default_branch(),
            sources: default_sources(),
        }
    }
}

impl AutomationConfig {
    pub fn rule_for(&self, source_repo: &str) -> Option<&SourceRule> {
        self.sources.iter().find(|rule| rule.repo == source_repo)
    }

    /// The automation repository responsible for a step, used as the
    /// dispatch target when orchestrating that step.
    pub fn repo_for_step(&self, step: StepKey) -> Option<&str> {
        self.sources
            .iter()
            .find(|rule| rule.step == step)
            .map(|rule| rule.repo.as_str())
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3009
}

fn default_create_microservice() -> String {
    "create_microservice.yml".to_string()
}

fn default_create_repository() -> String {
    "create_repository.yml".to_string()
}

fn default_create_env_test_suite() -> String {
    "create_env_test_suite.yml".to_string()
}

fn default_create_perf_test_suite() -> String {
    "create_perf_test_suite.yml".to_string()
}

fn default_create_smoke_test_suite() -> String {
    "create_smoke_test_suite.yml".to_string()
}

fn default_create_service() -> String {
    "create_service.yml".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_sources() -> Vec<SourceRule> {
    vec![
        SourceRule {
            repo: "platform-create-workflows".to_string(),
            step: StepKey::Repository,
            strategy: CorrelationStrategy::DirectName,
            bulk_on_default_branch: false,
        },
        SourceRule {
            repo: "platform-egress-proxy".to_string(),
            step: StepKey::EgressProxy,
            strategy: CorrelationStrategy::TriggeredWorkflow,
            bulk_on_default_branch: false,
        },
        SourceRule {
            repo: "platform-app-config".to_string(),
            step: StepKey::AppConfig,
            strategy: CorrelationStrategy::CommitHash,
            bulk_on_default_branch: false,
        },
        SourceRule {
            repo: "platform-nginx-upstreams".to_string(),
            step: StepKey::NginxUpstream,
            strategy: CorrelationStrategy::CommitHash,
            bulk_on_default_branch: false,
        },
        SourceRule {
            repo: "platform-svc-infra".to_string(),
            step: StepKey::Infra,
            strategy: CorrelationStrategy::CommitHash,
            bulk_on_default_branch: true,
        },
    ]
}

fn default_templates() -> HashMap<String, Zone> {
    HashMap::from([
        ("node-frontend".to_string(), Zone::Public),
        ("node-backend".to_string(), Zone::Protected),
        ("dotnet-backend".to_string(), Zone::Protected),
    ])
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Load from file if specified
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        } else {
            // Try default paths
            builder = builder.add_source(config::File::with_name("groundwork").required(false));
        }

        // Environment variable overrides with GROUNDWORK_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("GROUNDWORK")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))
    }

    pub fn webhook_secret(&self) -> &str {
        &self.github.webhook_secret
    }

    /// Zone for a service template, if the template is known.
    pub fn zone_for_template(&self, template: &str) -> Option<Zone> {
        self.templates.get(template).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn minimal_config() -> &'static str {
        r#"
[github]
org = "acme"
app_id = 12345
installation_id = 67890
private_key_path = "/etc/groundwork/app.pem"
webhook_secret = "shh"
"#
    }

    #[test]
    fn test_load_minimal_config_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("groundwork.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(minimal_config().as_bytes()).unwrap();

        let config = AppConfig::load(Some(path.to_str().unwrap())).unwrap();

        assert_eq!(config.server.port, 3009);
        assert_eq!(config.github.org, "acme");
        assert_eq!(config.automation.default_branch, "main");
        assert_eq!(config.automation.sources.len(), 5);
        assert_eq!(config.workflows.create_microservice, "create_microservice.yml");
    }

    #[test]
    fn test_rule_lookup_by_source_repo() {
        let automation = AutomationConfig::default();

        let rule = automation.rule_for("platform-svc-infra").unwrap();
        assert_eq!(rule.step, StepKey::Infra);
        assert!(rule.bulk_on_default_branch);

        assert!(automation.rule_for("unrelated-repo").is_none());
    }

    #[test]
    fn test_repo_for_step() {
        let automation = AutomationConfig::default();
        assert_eq!(
            automation.repo_for_step(StepKey::EgressProxy),
            Some("platform-egress-proxy")
        );
    }

    #[test]
    fn test_debug_redacts_webhook_secret() {
        let github = GitHubConfig {
            org: "acme".to_string(),
            app_id: 1,
            installation_id: 2,
            private_key_path: PathBuf::from("/dev/null"),
            webhook_secret: "super-secret".to_string(),
        };
        let debug = format!("{github:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("super-secret"));
    }
}
