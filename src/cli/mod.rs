use clap::{Args, Parser, Subcommand};

use crate::config::{parse_flag, ItsmFlowConfig};

pub mod commands;

#[derive(Parser, Debug)]
#[command(name = "itsm-flow")]
#[command(about = "Drive Jira Service Management change requests from GitHub pipelines")]
#[command(long_about = "itsm-flow clones a change request from a template when a pull request is \
                       merged, moves it through Implementing and Completed as the deploy runs, and \
                       cancels older requests the new deploy supersedes.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub options: GlobalOptions,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Clone the template request for a merged pull request or a release
    CreateChangeRequest,
    /// Move the pull request's change request to Implementing
    MoveToDeploying,
    /// Attach proof of deployment and move the change request to Completed
    MoveToDeployed,
    /// Cancel pending requests superseded by the pull request's request
    CancelOlderPendingRequests,
    /// Check that the PR author can be assigned change requests
    CanPrAuthorBeAssigned,
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Commands::CreateChangeRequest => "create-change-request",
            Commands::MoveToDeploying => "move-to-deploying",
            Commands::MoveToDeployed => "move-to-deployed",
            Commands::CancelOlderPendingRequests => "cancel-older-pending-requests",
            Commands::CanPrAuthorBeAssigned => "can-pr-author-be-assigned",
        }
    }
}

/// Accepts `123` or `PR-123`
pub fn parse_pr_number(value: &str) -> Result<u64, String> {
    let digits = value.trim().strip_prefix("PR-").unwrap_or(value.trim());
    digits
        .parse()
        .map_err(|_| format!("'{value}' is not a pull request number"))
}

#[derive(Args, Debug, Clone, Default)]
pub struct GlobalOptions {
    /// GitHub pull request number to link with the issue
    #[arg(long, global = true, value_parser = parse_pr_number)]
    pub pr_number: Option<u64>,

    /// Template issue key to clone, or the created issue key for releases
    #[arg(long, global = true)]
    pub template_key: Option<String>,

    /// Email of the PR author
    #[arg(long, global = true)]
    pub pr_author_email: Option<String>,

    /// Emails of the PR approvers, added to the description header
    #[arg(long = "pr-approver-email", global = true)]
    pub pr_approver_emails: Vec<String>,

    /// Email of the user who triggered the run, set as reporter
    #[arg(long, global = true)]
    pub pr_actor_email: Option<String>,

    /// Proof of deployment, one `[-H "Key: value"]... url` per value or line
    #[arg(long = "proof-url-list", global = true)]
    pub proof_urls: Vec<String>,

    /// Jira/JSM API user
    #[arg(long, global = true)]
    pub jsm_user: Option<String>,

    /// Jira/JSM API token
    #[arg(long, global = true)]
    pub jsm_token: Option<String>,

    /// Log intended changes without making them
    #[arg(long, global = true, value_parser = parse_flag)]
    pub dry_run: Option<bool>,

    #[arg(long, global = true, value_parser = parse_flag)]
    pub debug: Option<bool>,

    /// Print errors instead of failing the pipeline step
    #[arg(long, global = true, value_parser = parse_flag)]
    pub graceful_exit: Option<bool>,
}

impl GlobalOptions {
    /// Command-line values take precedence over every other source
    pub fn apply_to(&self, config: &mut ItsmFlowConfig) {
        if let Some(user) = self.jsm_user.as_ref().filter(|u| !u.is_empty()) {
            config.jsm.user = Some(user.clone());
        }
        if let Some(token) = self.jsm_token.as_ref().filter(|t| !t.is_empty()) {
            config.jsm.token = Some(token.clone());
        }
        if let Some(dry_run) = self.dry_run {
            config.workflow.dry_run = dry_run;
        }
        if let Some(debug) = self.debug {
            config.workflow.debug = debug;
        }
    }

    pub fn graceful_exit(&self) -> bool {
        self.graceful_exit.unwrap_or(false)
    }
}
