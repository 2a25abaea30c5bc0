use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub github: GitHubConfig,
    pub rerun: RerunConfig,
    pub jira: Option<JiraConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GitHubConfig {
    /// Personal access token. Used when no app credentials are configured.
    pub token: Option<String>,
    pub app: Option<GitHubAppConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GitHubAppConfig {
    pub id: u64,
    /// RSA private key in PEM format.
    pub private_key: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JiraConfig {
    /// Shared secret for webhook signature verification. When unset, webhook
    /// payloads are accepted without a signature.
    pub webhook_secret: Option<String>,
}

/// Repository coordinates and re-run selection settings, passed by reference
/// into the orchestrator.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RerunConfig {
    pub owner: String,
    pub repo: String,
    /// Regular expression selecting which check and job names are eligible
    /// for re-run. Matches everything when unset.
    #[serde(default)]
    pub check_pattern: Option<String>,
    #[serde(default)]
    pub granularity: RerunGranularity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RerunGranularity {
    /// Re-request the check suite behind each matching check run.
    CheckSuite,
    /// Re-run the completed workflow runs behind each matching check run.
    /// This is what actually makes the CI system execute new work; a
    /// check-suite re-request is a no-op for some integrations.
    #[default]
    WorkflowRun,
}
