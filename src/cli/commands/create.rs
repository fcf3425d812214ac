use anyhow::Result;
use tracing::info;

use super::CommandContext;
use crate::github::PullRequestRef;
use crate::workflows::{ChangeWorkflow, CloneOutcome};

pub struct CreateCommand {
    context: CommandContext,
}

impl CreateCommand {
    pub fn new(context: CommandContext) -> Self {
        Self { context }
    }

    pub async fn execute(&self) -> Result<()> {
        let options = &self.context.options;
        let template_key = self.context.template_key("create-change-request")?;
        let host = self.context.code_host()?;

        let mut pr = match options.pr_number {
            Some(number) => {
                PullRequestRef::fetch(&host, number, &self.context.config.github.ticket_prefixes, true).await?
            }
            None => {
                let release = self.context.release_pr(&host)?;
                info!("Creating JSM change request for {}", release.describe());
                release
            }
        };

        let tickets = self.context.tickets_for(Some(template_key)).await?;
        let workflow = ChangeWorkflow::new(&tickets, &host, self.context.settings());
        let clone_options = workflow
            .resolve_clone_identities(
                options.pr_actor_email.as_deref(),
                options.pr_author_email.as_deref(),
                &options.pr_approver_emails,
            )
            .await?;

        match workflow.clone_request_by_key(template_key, &mut pr, &clone_options).await? {
            CloneOutcome::Created(request) => {
                info!(issue_key = %request.key(), url = %request.browser_url(), "Change request ready");
            }
            CloneOutcome::DryRun => info!("Dry run finished, no request created"),
        }
        Ok(())
    }
}
