use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::proof::{collect_proof, ProofFetcher, ProofSpec};
use super::request::ChangeRequest;
use super::transitions::{attempt_transition, TransitionForm};
use super::{ChangeWorkflow, TransitionResult};
use crate::errors::FlowError;
use crate::github::PullRequestRef;
use crate::jira::TemporaryAttachment;
use crate::status::{IssueResolution, IssueStatus, IssueTransition};

impl ChangeWorkflow<'_> {
    /// Awaiting Implementation -> Implementing, when a deploy starts
    pub async fn move_to_implementing(
        &self,
        request: &mut ChangeRequest,
        pr: &mut PullRequestRef,
    ) -> Result<TransitionResult, FlowError> {
        let previous = request.status();
        if !attempt_transition(
            request,
            &[IssueStatus::AwaitingImplementation],
            &[IssueStatus::Implementing],
            "deploying",
        ) {
            return Ok(TransitionResult::Skipped { status: previous });
        }

        let target = IssueStatus::Implementing;
        if self.dry_run().would(&[
            format!("move issue {} to '{target}' state", request.key()),
            format!("update Actual_Start date on {}", request.key()),
            format!("change labels on {} to '{target}'", pr.describe()),
        ]) {
            return Ok(TransitionResult::DryRun);
        }

        self.transition_to(request, &[IssueTransition::Implement], target.as_str(), &TransitionForm::new())
            .await?;
        request.stamp(self.tickets, "Actual_Start", Utc::now()).await?;
        pr.swap_status_label(self.host, IssueStatus::AwaitingImplementation, target)
            .await?;

        Ok(TransitionResult::Applied {
            previous,
            current: request.status(),
        })
    }

    /// Implementing -> Completed, once the deploy is proven
    pub async fn move_to_completed(
        &self,
        request: &mut ChangeRequest,
        pr: &mut PullRequestRef,
        proof_text: &str,
        attachment: &TemporaryAttachment,
    ) -> Result<TransitionResult, FlowError> {
        let previous = request.status();
        if !attempt_transition(request, &[IssueStatus::Implementing], &[IssueStatus::Completed], "deployed") {
            return Ok(TransitionResult::Skipped { status: previous });
        }

        if self.dry_run().would(&[format!(
            "move issue {} to 'deployed' state with proof data: {proof_text}",
            request.key()
        )]) {
            return Ok(TransitionResult::DryRun);
        }

        // the tracker rejects these on the Complete screen, so set them first
        request
            .update(
                self.tickets,
                &[
                    ("Resolution_Notes", Value::String(self.settings.completion_note.clone())),
                    ("Proof_Of_Success", Value::String(proof_text.to_string())),
                ],
            )
            .await?;

        let target = IssueStatus::Completed;
        let form = TransitionForm::new()
            .resolution(IssueResolution::Successful)
            .field("Attachment", json!([attachment.temporary_attachment_id]));
        self.transition_to(request, &[IssueTransition::Complete], target.as_str(), &form)
            .await?;

        if request.status() != target {
            return Err(FlowError::UnexpectedStatus {
                issue_key: request.key().to_string(),
                expected: target.to_string(),
                actual: request.status_name().to_string(),
            });
        }

        request.stamp(self.tickets, "Actual_End", Utc::now()).await?;
        pr.swap_status_label(self.host, IssueStatus::Implementing, target)
            .await?;

        let latest = request
            .record()
            .attachments()
            .into_iter()
            .max_by_key(|attachment| attachment.created_at());
        if let Some(latest) = latest {
            request
                .append(self.tickets, "Proof_Of_Success", &format!("[^ {}]", latest.filename))
                .await?;
        }

        Ok(TransitionResult::Applied {
            previous,
            current: request.status(),
        })
    }

    /// Awaiting Implementation -> Canceled, recording why
    pub async fn move_to_canceled(
        &self,
        request: &mut ChangeRequest,
        pr: &mut PullRequestRef,
        resolution_notes: &str,
    ) -> Result<TransitionResult, FlowError> {
        let previous = request.status();
        if !attempt_transition(
            request,
            &[IssueStatus::AwaitingImplementation],
            &[IssueStatus::Canceled],
            "canceled",
        ) {
            return Ok(TransitionResult::Skipped { status: previous });
        }

        let target = IssueStatus::Canceled;
        if self.dry_run().would(&[
            format!("update resolution notes on {}", request.key()),
            format!("move issue {} to '{target}' state", request.key()),
            format!(
                "change labels on {} from '{}' to '{target}'",
                pr.describe(),
                pr.issue_status()
            ),
        ]) {
            return Ok(TransitionResult::DryRun);
        }

        request
            .update(
                self.tickets,
                &[("Resolution_Notes", Value::String(resolution_notes.to_string()))],
            )
            .await?;
        let form = TransitionForm::new().resolution(IssueResolution::Declined);
        self.transition_to(request, &[IssueTransition::MarkAsCanceled], target.as_str(), &form)
            .await?;

        let reflected = pr.issue_status();
        pr.swap_status_label(self.host, reflected, target).await?;

        Ok(TransitionResult::Applied {
            previous,
            current: request.status(),
        })
    }

    /// Full deploy-complete step: gather proof, complete the request, then
    /// cancel whatever it superseded. Reconciliation failures only warn.
    pub async fn move_to_deployed(
        &self,
        request: &mut ChangeRequest,
        pr: &mut PullRequestRef,
        specs: &[ProofSpec],
        fetcher: &dyn ProofFetcher,
    ) -> Result<TransitionResult, FlowError> {
        if !attempt_transition(request, &[IssueStatus::Implementing], &[IssueStatus::Completed], "deployed") {
            return Ok(TransitionResult::Skipped {
                status: request.status(),
            });
        }

        let bundle = collect_proof(fetcher, specs).await;
        let attachment = self.stage_proof(request, &bundle).await?;
        let result = self
            .move_to_completed(request, pr, &bundle.text(), &attachment)
            .await?;

        match self.cancel_older_pending_requests(request, pr).await {
            Ok(report) => info!(issue_key = %request.key(), canceled = report.canceled.len(), "Reconciled older requests"),
            Err(e) => warn!(issue_key = %request.key(), "Failed to cancel older pending requests: {e}"),
        }
        Ok(result)
    }
}
