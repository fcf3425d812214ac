use anyhow::Result;
use tracing::info;

use super::CommandContext;
use crate::workflows::ChangeWorkflow;

const COMMAND: &str = "move-to-deploying";

pub struct DeployingCommand {
    context: CommandContext,
}

impl DeployingCommand {
    pub fn new(context: CommandContext) -> Self {
        Self { context }
    }

    pub async fn execute(&self) -> Result<()> {
        let host = self.context.code_host()?;
        let (key, mut pr) = self.context.locate_request(&host, COMMAND).await?;

        let tickets = self.context.tickets_for(Some(&key)).await?;
        let workflow = ChangeWorkflow::new(&tickets, &host, self.context.settings());
        let mut request = workflow.request(&key).await?;
        let result = workflow.move_to_implementing(&mut request, &mut pr).await?;

        info!(issue_key = %key, result = ?result, "{COMMAND} finished");
        Ok(())
    }
}
