use anyhow::{anyhow, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::errors::FlowError;
use crate::jira::JiraConnection;

/// Main configuration structure for itsm-flow
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ItsmFlowConfig {
    /// Jira Service Management site and service desk
    pub jsm: JsmConfig,
    /// GitHub repository the pipeline runs in
    pub github: GitHubConfig,
    /// Change workflow behaviour
    pub workflow: WorkflowConfig,
    /// Logging settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct JsmConfig {
    /// Service account email (JSM_USER)
    pub user: Option<String>,
    /// API token (JSM_TOKEN)
    pub token: Option<String>,
    /// Production site
    pub base_url: String,
    /// Site serving tickets whose key starts with `sandbox_prefix`
    pub sandbox_base_url: String,
    pub sandbox_prefix: String,
    /// Substring of the change service desk's project name
    pub project_name: String,
    /// Request type new change requests are filed under
    pub request_type: String,
    /// Fields a clone carries even when the portal screen hides them
    pub forced_clone_fields: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// GitHub API token (GITHUB_TOKEN)
    pub token: Option<String>,
    /// `owner/name` (GITHUB_REPOSITORY)
    pub repository: Option<String>,
    /// Branch whose closed pull requests are reconciled
    pub base_branch: String,
    /// Automation identity excluded from approvers
    pub bot_login: String,
    /// Tag of the release being deployed (GITHUB_REF_NAME)
    pub release_tag: Option<String>,
    /// Login that triggered the run (GITHUB_ACTOR)
    pub actor: Option<String>,
    /// Ticket-key prefixes recognised on PR labels, in priority order
    pub ticket_prefixes: Vec<String>,
    /// Step output file (GITHUB_OUTPUT)
    pub output_file: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub dry_run: bool,
    pub debug: bool,
    /// Days between planned start and planned end of a new request
    pub planned_window_days: i64,
    /// Per-request timeout when fetching proof of success
    pub proof_timeout_seconds: u64,
    /// Closed pull requests scanned when reconciling
    pub reconcile_scan_limit: u8,
    /// Pause after a cancellation before the next read
    pub settle_delay_seconds: u64,
    /// Resolution note written when a request completes
    pub completion_note: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Emit JSON log lines instead of the compact formatter
    pub json_logs: bool,
}

impl Default for JsmConfig {
    fn default() -> Self {
        Self {
            user: None,
            token: None,
            base_url: "https://xplortechnologies.atlassian.net".to_string(),
            sandbox_base_url: "https://xplortechnologies-sandbox-jsm.atlassian.net".to_string(),
            sandbox_prefix: "ITPOC".to_string(),
            project_name: "ITSM".to_string(),
            request_type: "Request a change".to_string(),
            forced_clone_fields: vec![
                "requesttype".to_string(),
                "changetype".to_string(),
                "team".to_string(),
                "affectedservicesportal".to_string(),
            ],
        }
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None, // Read from GITHUB_TOKEN
            repository: None,
            base_branch: "main".to_string(),
            bot_login: "github-actions[bot]".to_string(),
            release_tag: None,
            actor: None,
            ticket_prefixes: vec!["ITSM".to_string(), "ITPOC".to_string()],
            output_file: None,
        }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            debug: false,
            planned_window_days: 5,
            proof_timeout_seconds: 30,
            reconcile_scan_limit: 10,
            settle_delay_seconds: 10,
            completion_note: "Standard Change Template Approval".to_string(),
        }
    }
}

/// Parse a yes/no style flag value
pub fn parse_flag(value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Ok(true),
        "false" | "f" | "0" | "no" | "n" => Ok(false),
        other => Err(format!("Boolean value expected, got '{other}'")),
    }
}

impl ItsmFlowConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (itsm-flow.toml)
    /// 3. Environment variables (prefixed with ITSM_FLOW_)
    /// 4. The CI variables (JSM_*, GITHUB_*)
    pub fn load() -> Result<Self> {
        let env: HashMap<String, String> = std::env::vars().collect();
        Self::load_from(Path::new("itsm-flow.toml"), &env)
    }

    /// Same as [`ItsmFlowConfig::load`] with an explicit file and environment
    pub fn load_from(path: &Path, env: &HashMap<String, String>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if path.exists() {
            builder = builder.add_source(File::from(path.to_path_buf()));
        }

        builder = builder.add_source(
            Environment::with_prefix("ITSM_FLOW")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("jsm.forced_clone_fields")
                .with_list_parse_key("github.ticket_prefixes")
                .try_parsing(true)
                .source(Some(env.clone())),
        );

        let mut itsm_flow_config: ItsmFlowConfig = builder.build()?.try_deserialize()?;
        itsm_flow_config.apply_ci_env(env)?;
        Ok(itsm_flow_config)
    }

    /// Map the variables GitHub Actions and the workflow file provide
    fn apply_ci_env(&mut self, env: &HashMap<String, String>) -> Result<()> {
        let var = |name: &str| env.get(name).filter(|v| !v.is_empty()).cloned();

        if let Some(user) = var("JSM_USER") {
            self.jsm.user = Some(user);
        }
        if let Some(token) = var("JSM_TOKEN") {
            self.jsm.token = Some(token);
        }
        if let Some(url) = var("JSM_BASE_URL") {
            self.jsm.base_url = url;
        }
        if let Some(url) = var("JSM_SANDBOX_BASE_URL") {
            self.jsm.sandbox_base_url = url;
        }
        if let Some(debug) = var("JSM_DEBUG") {
            self.workflow.debug = parse_flag(&debug).map_err(|e| anyhow!("JSM_DEBUG: {e}"))?;
        }
        if let Some(dry_run) = var("JSM_DRY_RUN") {
            self.workflow.dry_run = parse_flag(&dry_run).map_err(|e| anyhow!("JSM_DRY_RUN: {e}"))?;
        }

        if let Some(token) = var("GITHUB_TOKEN") {
            self.github.token = Some(token);
        }
        if let Some(repository) = var("GITHUB_REPOSITORY") {
            self.github.repository = Some(repository);
        }
        if let Some(tag) = var("GITHUB_REF_NAME").or_else(|| var("GITHUB_REF")) {
            self.github.release_tag = Some(tag.trim_start_matches("refs/tags/").to_string());
        }
        if let Some(actor) = var("GITHUB_ACTOR") {
            self.github.actor = Some(actor);
        }
        if let Some(path) = var("GITHUB_OUTPUT") {
            self.github.output_file = Some(path);
        }
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::debug!("Loaded environment variables from .env file");
        }
        Ok(())
    }

    /// Whether `ticket_key` lives on the sandbox site
    pub fn is_sandbox_ticket(&self, ticket_key: &str) -> bool {
        ticket_key.split('-').next() == Some(self.jsm.sandbox_prefix.as_str())
    }

    /// Connection details for the site serving `ticket_key`; production when
    /// no key is known yet
    pub fn jira_connection_for(&self, ticket_key: Option<&str>) -> Result<JiraConnection, FlowError> {
        let (Some(user), Some(token)) = (self.jsm.user.as_ref(), self.jsm.token.as_ref()) else {
            return Err(FlowError::Config("JSM_USER and JSM_TOKEN are required.".to_string()));
        };

        let base_url = match ticket_key {
            Some(key) if self.is_sandbox_ticket(key) => &self.jsm.sandbox_base_url,
            _ => &self.jsm.base_url,
        };

        Ok(JiraConnection {
            base_url: base_url.clone(),
            user: user.clone(),
            token: token.clone(),
            project_name: self.jsm.project_name.clone(),
            request_type: self.jsm.request_type.clone(),
            forced_clone_fields: self.jsm.forced_clone_fields.clone(),
        })
    }
}
