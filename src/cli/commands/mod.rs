use std::path::Path;

use anyhow::Result;
use tracing::info;

use crate::config::ItsmFlowConfig;
use crate::errors::FlowError;
use crate::github::{write_step_outputs, CodeHost, GitHubClient, PullRequestRef};
use crate::jira::JiraClient;
use crate::workflows::WorkflowSettings;

use super::GlobalOptions;

pub mod can_assign;
pub mod cancel_older;
pub mod create;
pub mod deployed;
pub mod deploying;

pub use can_assign::CanAssignCommand;
pub use cancel_older::CancelOlderCommand;
pub use create::CreateCommand;
pub use deployed::DeployedCommand;
pub use deploying::DeployingCommand;

/// Resolved configuration plus the raw command-line options, shared by
/// every command
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub config: ItsmFlowConfig,
    pub options: GlobalOptions,
}

impl CommandContext {
    pub fn new(config: ItsmFlowConfig, options: GlobalOptions) -> Self {
        Self { config, options }
    }

    pub fn settings(&self) -> WorkflowSettings {
        WorkflowSettings::from_config(&self.config)
    }

    /// Mark the step as having run, for later workflow steps
    pub fn announce(&self) -> Result<()> {
        let output = self.config.github.output_file.as_deref().map(Path::new);
        write_step_outputs(output, &[("XPLOR_GH_JM", "True")])?;
        Ok(())
    }

    pub fn code_host(&self) -> Result<GitHubClient> {
        Ok(GitHubClient::new(
            self.config.github.token.as_deref(),
            self.config.github.repository.as_deref(),
        )?)
    }

    /// Tracker client for the site serving `ticket_key`
    pub async fn tickets_for(&self, ticket_key: Option<&str>) -> Result<JiraClient> {
        let connection = self.config.jira_connection_for(ticket_key)?;
        info!(base_url = %connection.base_url, "Connecting to Jira Service Management");
        Ok(JiraClient::connect(&connection).await?)
    }

    pub fn template_key(&self, command: &str) -> Result<&str, FlowError> {
        self.options
            .template_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| FlowError::MissingArgument(format!("--template-key is required for {command}")))
    }

    /// Placeholder pull request for a release published without one
    pub fn release_pr(&self, host: &dyn CodeHost) -> Result<PullRequestRef, FlowError> {
        let tag = self
            .config
            .github
            .release_tag
            .as_deref()
            .filter(|tag| !tag.is_empty())
            .ok_or_else(|| {
                FlowError::MissingArgument(
                    "GITHUB_REF_NAME (or GITHUB_REF) must name the release tag when no PR number is given".to_string(),
                )
            })?;
        let actor = self.config.github.actor.as_deref().unwrap_or_default();
        Ok(PullRequestRef::release(host.repository(), tag, actor))
    }

    /// Change request key and pull request for the deploy commands: the
    /// PR's ticket label, or `--template-key` for a release
    pub async fn locate_request(&self, host: &dyn CodeHost, command: &str) -> Result<(String, PullRequestRef)> {
        match self.options.pr_number {
            Some(number) => {
                let pr = PullRequestRef::fetch(host, number, &self.config.github.ticket_prefixes, false).await?;
                let key = pr
                    .issue_label()
                    .map(str::to_string)
                    .ok_or_else(|| FlowError::MissingArgument(format!("PR #{number} carries no ticket label")))?;
                Ok((key, pr))
            }
            None => {
                let key = self.template_key(command).map_err(|_| {
                    FlowError::MissingArgument(format!(
                        "TEMPLATE_KEY is required for {command} when PR_NUMBER is not available. \
                         For releases, provide the JSM issue key that was created for this release."
                    ))
                })?;
                Ok((key.to_string(), self.release_pr(host)?))
            }
        }
    }
}
