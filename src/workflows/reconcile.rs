//! Cancelling pending requests superseded by a newly completed one.
//!
//! Closed pull requests on the base branch are scanned newest first,
//! starting right after the pull request whose request just completed. Any
//! older pull request still pointing at a pending request of the same
//! ticket prefix has that request canceled. One whose request is gone,
//! already closed or already being implemented only gets its status label
//! corrected.

use tracing::{info, warn};

use super::request::ChangeRequest;
use super::{ChangeWorkflow, TransitionResult};
use crate::errors::FlowError;
use crate::github::{PullRequestRef, PullSnapshot};
use crate::status::IssueStatus;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Keys of requests canceled as superseded
    pub canceled: Vec<String>,
    /// Pull requests whose status label was corrected
    pub relabeled: Vec<(u64, IssueStatus)>,
    /// Pull requests inspected but left alone
    pub skipped: Vec<u64>,
    /// Pull requests whose reconciliation failed, with the error
    pub failed: Vec<(u64, String)>,
}

enum ItemOutcome {
    Canceled(String),
    Relabeled(IssueStatus),
    Untouched,
}

impl ChangeWorkflow<'_> {
    /// Cancel pending requests older than `completed` on the base branch
    pub async fn cancel_older_pending_requests(
        &self,
        completed: &ChangeRequest,
        pr: &PullRequestRef,
    ) -> Result<ReconcileReport, FlowError> {
        let mut report = ReconcileReport::default();
        let Some(number) = pr.number() else {
            info!(issue_key = %completed.key(), "No pull request history to reconcile for {}", pr.describe());
            return Ok(report);
        };
        let Some(prefix) = pr.issue_prefix() else {
            info!(pr_number = number, "PR #{number} has no ticket label; nothing to reconcile");
            return Ok(report);
        };
        info!(issue_key = %completed.key(), "Checking for older pending requests to cancel for {}", completed.key());

        let pulls = self
            .host
            .recent_closed_pulls(&self.settings.base_branch, self.settings.reconcile_scan_limit)
            .await?;
        let Some(position) = pulls.iter().position(|pull| pull.number == number) else {
            info!(pr_number = number, "PR #{number} is not among the recent closed pull requests");
            return Ok(report);
        };

        let wanted = format!("{prefix}-");
        for snapshot in &pulls[position + 1..] {
            let older = PullRequestRef::real(snapshot.clone(), &self.settings.ticket_prefixes);
            let eligible = older.issue_label().is_some_and(|label| label.starts_with(&wanted))
                && !older.issue_status().is_closed();
            if !eligible {
                continue;
            }

            match self.reconcile_one(completed, older, snapshot).await {
                Ok(ItemOutcome::Canceled(key)) => report.canceled.push(key),
                Ok(ItemOutcome::Relabeled(status)) => report.relabeled.push((snapshot.number, status)),
                Ok(ItemOutcome::Untouched) => report.skipped.push(snapshot.number),
                Err(e) => {
                    warn!(pr_number = snapshot.number, "Failed to reconcile PR #{}: {e}", snapshot.number);
                    report.failed.push((snapshot.number, e.to_string()));
                }
            }
        }
        Ok(report)
    }

    async fn reconcile_one(
        &self,
        completed: &ChangeRequest,
        mut older: PullRequestRef,
        snapshot: &PullSnapshot,
    ) -> Result<ItemOutcome, FlowError> {
        let label = older.issue_label().unwrap_or_default().to_string();
        let found = match ChangeRequest::fetch(self.tickets, &label).await {
            Ok(request) => Some(request),
            Err(e) => {
                info!(pr_number = snapshot.number, "It seems that {label} is not there anymore: {e}");
                None
            }
        };

        info!(
            "PENDING: PR#{}/{label}/{} - {}",
            snapshot.number,
            older.issue_status(),
            found
                .as_ref()
                .map(|request| format!("{}/{}", request.key(), request.status()))
                .unwrap_or_else(|| "missing".to_string())
        );

        if let Some(mut stale) = found.clone().filter(|request| request.status().is_pending()) {
            let note = format!("Superseded by {}", completed.key());
            match self.move_to_canceled(&mut stale, &mut older, &note).await? {
                TransitionResult::DryRun => {
                    // settle before the next lookup
                    if !self.settings.settle_delay.is_zero() {
                        tokio::time::sleep(self.settings.settle_delay).await;
                    }
                    return Ok(ItemOutcome::Canceled(stale.key().to_string()));
                }
                TransitionResult::Applied { .. } => {
                    let comment = format!(
                        "{} was automatically canceled due to the completion of this ticket",
                        stale.key()
                    );
                    self.tickets.add_comment(completed.key(), &comment).await?;
                    return Ok(ItemOutcome::Canceled(stale.key().to_string()));
                }
                // already underway; only the label is brought in line below
                TransitionResult::Skipped { .. } => {}
            }
        }

        let actual = found
            .map(|request| request.status())
            .unwrap_or(IssueStatus::Canceled);
        if actual == IssueStatus::Unknown {
            info!(pr_number = snapshot.number, "Status of {label} is not a known status; label left as is");
            return Ok(ItemOutcome::Untouched);
        }
        let reflected = older.issue_status();
        if reflected == actual {
            return Ok(ItemOutcome::Untouched);
        }
        if self
            .dry_run()
            .would(&[format!("change labels on PR #{} to '{actual}'", snapshot.number)])
        {
            return Ok(ItemOutcome::Relabeled(actual));
        }
        older.swap_status_label(self.host, reflected, actual).await?;
        Ok(ItemOutcome::Relabeled(actual))
    }
}
