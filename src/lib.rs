// itsm-flow library: change-request workflow for Jira Service Management,
// driven from GitHub pipelines. Exposed for the binary and for tests.

pub mod cli;
pub mod config;
pub mod errors;
pub mod github;
pub mod jira;
pub mod status;
pub mod telemetry;
pub mod workflows;

// Re-export key types for easy access
pub use config::ItsmFlowConfig;
pub use errors::FlowError;
pub use github::{CodeHost, GitHubClient, GitHubError, PullRequestRef};
pub use jira::{JiraClient, JiraError, TicketClient};
pub use status::{IssueResolution, IssueStatus, IssueTransition};
pub use telemetry::{create_workflow_span, generate_correlation_id, init_telemetry};
pub use workflows::{ChangeRequest, ChangeWorkflow, TransitionResult, WorkflowSettings};
