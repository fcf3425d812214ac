use anyhow::Result;
use tracing::{info, warn};

use super::CommandContext;
use crate::errors::FlowError;
use crate::github::PullRequestRef;
use crate::workflows::ChangeWorkflow;

pub struct CancelOlderCommand {
    context: CommandContext,
}

impl CancelOlderCommand {
    pub fn new(context: CommandContext) -> Self {
        Self { context }
    }

    pub async fn execute(&self) -> Result<()> {
        let number = self.context.options.pr_number.ok_or_else(|| {
            FlowError::MissingArgument(
                "PR_NUMBER is required for cancel-older-pending-requests. Older pending requests are found \
                 through the PR's ticket label, which a release published without a PR does not have."
                    .to_string(),
            )
        })?;

        let host = self.context.code_host()?;
        let pr = PullRequestRef::fetch(&host, number, &self.context.config.github.ticket_prefixes, false).await?;
        let key = pr
            .issue_label()
            .map(str::to_string)
            .ok_or_else(|| FlowError::MissingArgument(format!("PR #{number} carries no ticket label")))?;

        let tickets = self.context.tickets_for(Some(&key)).await?;
        let workflow = ChangeWorkflow::new(&tickets, &host, self.context.settings());
        let completed = workflow.request(&key).await?;
        let report = workflow.cancel_older_pending_requests(&completed, &pr).await?;

        info!(
            issue_key = %key,
            canceled = ?report.canceled,
            relabeled = report.relabeled.len(),
            skipped = report.skipped.len(),
            "Reconciliation finished"
        );
        for (pr_number, reason) in &report.failed {
            warn!(pr_number = *pr_number, "Could not reconcile PR #{pr_number}: {reason}");
        }
        Ok(())
    }
}
