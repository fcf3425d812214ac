use thiserror::Error;

use crate::github::GitHubError;
use crate::jira::{JiraError, UnknownFieldError};
use crate::status::InvalidEnumValue;

/// Errors raised by the change-request workflow
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing argument: {0}")]
    MissingArgument(String),

    #[error(transparent)]
    InvalidEnumValue(#[from] InvalidEnumValue),

    #[error(transparent)]
    UnknownField(#[from] UnknownFieldError),

    #[error("Jira error: {0}")]
    Jira(#[from] JiraError),

    #[error("GitHub error: {0}")]
    GitHub(#[from] GitHubError),

    #[error("Template {template_key} cannot be cloned: {reason}")]
    InvalidTemplate { template_key: String, reason: String },

    #[error("Failed to clone request {template_key}: created issue has no key")]
    MissingIssueKey { template_key: String },

    #[error("Issue {issue_key} is '{actual}' after transition, expected '{expected}'")]
    UnexpectedStatus {
        issue_key: String,
        expected: String,
        actual: String,
    },

    #[error("No '{resolution}' resolution found in allowed values for issue {issue_key} to {transition}")]
    ResolutionNotFound {
        issue_key: String,
        transition: String,
        resolution: String,
    },

    #[error("No fields found in transition '{transition}' for issue {issue_key} to '{target}' status")]
    MissingTransitionFields {
        issue_key: String,
        transition: String,
        target: String,
    },

    #[error("Issue {issue_key} kept offering transitions to '{target}' after {hops} hops")]
    TransitionLoop {
        issue_key: String,
        target: String,
        hops: usize,
    },

    #[error("At least one of the proof urls must be reachable to be attached to issue {issue_key}")]
    NoProofReachable { issue_key: String },

    #[error("{0}")]
    InvalidProofLine(String),

    #[error("'{email}' not found in JSM users")]
    IdentityNotFound { email: String },

    #[error("'{email}' cannot be assigned issues in project {project_key}")]
    NotAssignable { email: String, project_key: String },
}
