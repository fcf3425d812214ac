//! Change-request workflow engine.
//!
//! Drives one change request through Awaiting Implementation, Implementing
//! and Completed (or Canceled) while keeping the pull request's labels in
//! step. The tracker is the only source of truth: every operation starts
//! from a fresh snapshot and is guarded by the request's current status, so
//! re-running a pipeline step is a no-op.

pub mod clone;
pub mod dry_run;
pub mod identity;
pub mod lifecycle;
pub mod proof;
pub mod reconcile;
pub mod request;
pub mod transitions;

#[cfg(test)]
mod mocks;

use std::path::PathBuf;
use std::time::Duration;

use crate::config::ItsmFlowConfig;
use crate::github::CodeHost;
use crate::jira::TicketClient;
use crate::status::IssueStatus;

pub use clone::{parse_value, CloneOptions, CloneOutcome};
pub use dry_run::DryRun;
pub use proof::{HttpProofFetcher, ProofBundle, ProofFetcher, ProofSpec};
pub use reconcile::ReconcileReport;
pub use request::ChangeRequest;
pub use transitions::{should_proceed, TransitionForm};

/// Upper bound on edges followed by one `transition_to` call
pub const MAX_TRANSITION_HOPS: usize = 8;

/// Outcome of a guarded lifecycle operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionResult {
    Applied {
        previous: IssueStatus,
        current: IssueStatus,
    },
    /// The status guard rejected the request; nothing changed
    Skipped { status: IssueStatus },
    /// Dry run: the intended effects were logged only
    DryRun,
}

impl TransitionResult {
    pub fn was_applied(&self) -> bool {
        matches!(self, TransitionResult::Applied { .. })
    }
}

#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub dry_run: DryRun,
    pub debug: bool,
    pub planned_window_days: i64,
    pub reconcile_scan_limit: u8,
    pub settle_delay: Duration,
    pub completion_note: String,
    pub base_branch: String,
    pub bot_login: String,
    pub ticket_prefixes: Vec<String>,
    pub max_transition_hops: usize,
    pub output_file: Option<PathBuf>,
}

impl WorkflowSettings {
    pub fn from_config(config: &ItsmFlowConfig) -> Self {
        Self {
            dry_run: DryRun::new(config.workflow.dry_run),
            debug: config.workflow.debug,
            planned_window_days: config.workflow.planned_window_days,
            reconcile_scan_limit: config.workflow.reconcile_scan_limit,
            settle_delay: Duration::from_secs(config.workflow.settle_delay_seconds),
            completion_note: config.workflow.completion_note.clone(),
            base_branch: config.github.base_branch.clone(),
            bot_login: config.github.bot_login.clone(),
            ticket_prefixes: config.github.ticket_prefixes.clone(),
            max_transition_hops: MAX_TRANSITION_HOPS,
            output_file: config.github.output_file.as_ref().map(PathBuf::from),
        }
    }
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self::from_config(&ItsmFlowConfig::default())
    }
}

/// Entry points for the five pipeline operations, bound to one tracker site
/// and one repository
pub struct ChangeWorkflow<'a> {
    tickets: &'a dyn TicketClient,
    host: &'a dyn CodeHost,
    settings: WorkflowSettings,
}

impl<'a> ChangeWorkflow<'a> {
    pub fn new(tickets: &'a dyn TicketClient, host: &'a dyn CodeHost, settings: WorkflowSettings) -> Self {
        Self {
            tickets,
            host,
            settings,
        }
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    pub fn dry_run(&self) -> DryRun {
        self.settings.dry_run
    }

    /// Fetch a request by key
    pub async fn request(&self, key: &str) -> Result<ChangeRequest, crate::errors::FlowError> {
        ChangeRequest::fetch(self.tickets, key).await
    }
}
