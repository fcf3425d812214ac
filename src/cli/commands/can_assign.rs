use anyhow::Result;

use super::CommandContext;
use crate::errors::FlowError;
use crate::jira::TicketClient;
use crate::workflows::ChangeWorkflow;

pub struct CanAssignCommand {
    context: CommandContext,
}

impl CanAssignCommand {
    pub fn new(context: CommandContext) -> Self {
        Self { context }
    }

    pub async fn execute(&self) -> Result<()> {
        let email = self
            .context
            .options
            .pr_author_email
            .as_deref()
            .filter(|email| !email.is_empty())
            .ok_or_else(|| {
                FlowError::MissingArgument("pr_author_email is required for can-pr-author-be-assigned".to_string())
            })?;

        let host = self.context.code_host()?;
        let tickets = self
            .context
            .tickets_for(self.context.options.template_key.as_deref())
            .await?;
        let workflow = ChangeWorkflow::new(&tickets, &host, self.context.settings());
        workflow.can_be_assigned(email).await?;

        println!(
            "Nice! pr_author_email '{email}' can be assigned issues in project {}",
            tickets.project_key()
        );
        Ok(())
    }
}
