use async_trait::async_trait;
use octocrab::Octocrab;
use tokio::sync::RwLock;

use crate::config::GitHubConfig;
use crate::error::{AppError, Result};
use crate::platform::Dispatcher;

use super::auth::generate_app_jwt;

/// Automation workflows are always dispatched from their default branch.
const DISPATCH_REF: &str = "main";

/// Dispatches provisioning workflows via the GitHub Actions API,
/// authenticated as a GitHub App installation.
pub struct GitHubDispatcher {
    config: GitHubConfig,
    /// Cached installation token and its expiry.
    token_cache: RwLock<Option<(String, chrono::DateTime<chrono::Utc>)>>,
}

impl GitHubDispatcher {
    pub fn new(config: &GitHubConfig) -> Result<Self> {
        // Validate the private key exists
        if !config.private_key_path.exists() {
            return Err(AppError::Config(format!(
                "GitHub App private key not found at: {}",
                config.private_key_path.display()
            )));
        }

        Ok(Self {
            config: config.clone(),
            token_cache: RwLock::new(None),
        })
    }

    /// Get an installation access token, refreshing when close to expiry.
    async fn access_token(&self) -> Result<String> {
        // Check cache
        {
            let cache = self.token_cache.read().await;
            if let Some((token, expiry)) = cache.as_ref() {
                if *expiry > chrono::Utc::now() + chrono::Duration::minutes(5) {
                    return Ok(token.clone());
                }
            }
        }

        // Generate new token
        let jwt = generate_app_jwt(self.config.app_id, &self.config.private_key_path)?;

        let client = Octocrab::builder()
            .personal_token(jwt)
            .build()
            .map_err(|e| AppError::Dispatch(format!("Failed to build JWT client: {e}")))?;

        let url = format!(
            "/app/installations/{}/access_tokens",
            self.config.installation_id
        );
        let response: serde_json::Value = client.post(&url, None::<&()>).await.map_err(|e| {
            AppError::Dispatch(format!("Failed to create installation token: {e}"))
        })?;

        let token = response["token"]
            .as_str()
            .ok_or_else(|| AppError::Dispatch("No token in response".to_string()))?
            .to_string();

        let expires_at = response["expires_at"]
            .as_str()
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .unwrap_or_else(|| chrono::Utc::now() + chrono::Duration::hours(1));

        // Cache the token
        let mut cache = self.token_cache.write().await;
        *cache = Some((token.clone(), expires_at));

        Ok(token)
    }
}

#[async_trait]
impl Dispatcher for GitHubDispatcher {
    async fn dispatch_workflow(
        &self,
        repo: &str,
        workflow_id: &str,
        inputs: serde_json::Value,
    ) -> Result<()> {
        let token = self.access_token().await?;

        let client = Octocrab::builder()
            .personal_token(token)
            .build()
            .map_err(|e| AppError::Dispatch(format!("Failed to build client: {e}")))?;

        let route = format!(
            "/repos/{}/{}/actions/workflows/{}/dispatches",
            self.config.org, repo, workflow_id
        );
        let body = serde_json::json!({
            "ref": DISPATCH_REF,
            "inputs": inputs,
        });

        // The dispatches endpoint returns 204 with an empty body
        let response = client._post(route, Some(&body)).await?;

        if !response.status().is_success() {
            return Err(AppError::Dispatch(format!(
                "Workflow dispatch for {repo}/{workflow_id} returned {}",
                response.status()
            )));
        }

        tracing::info!(
            repo = repo,
            workflow = workflow_id,
            "Dispatched provisioning workflow"
        );

        Ok(())
    }
}
