use std::time::Duration;

use anyhow::Result;
use tracing::info;

use super::CommandContext;
use crate::errors::FlowError;
use crate::workflows::proof::parse_proof_lines;
use crate::workflows::{ChangeWorkflow, HttpProofFetcher};

const COMMAND: &str = "move-to-deployed";

pub struct DeployedCommand {
    context: CommandContext,
}

impl DeployedCommand {
    pub fn new(context: CommandContext) -> Self {
        Self { context }
    }

    pub async fn execute(&self) -> Result<()> {
        // a single value may carry several newline-separated lines
        let lines: Vec<&str> = self
            .context
            .options
            .proof_urls
            .iter()
            .flat_map(|value| value.lines())
            .collect();
        let specs = parse_proof_lines(&lines)?;
        if specs.is_empty() {
            return Err(FlowError::MissingArgument(format!("--proof-url-list is required for {COMMAND}")).into());
        }

        let host = self.context.code_host()?;
        let (key, mut pr) = self.context.locate_request(&host, COMMAND).await?;

        let tickets = self.context.tickets_for(Some(&key)).await?;
        let workflow = ChangeWorkflow::new(&tickets, &host, self.context.settings());
        let fetcher = HttpProofFetcher::new(Duration::from_secs(
            self.context.config.workflow.proof_timeout_seconds,
        ))?;

        let mut request = workflow.request(&key).await?;
        let result = workflow
            .move_to_deployed(&mut request, &mut pr, &specs, &fetcher)
            .await?;

        info!(issue_key = %key, result = ?result, "{COMMAND} finished");
        Ok(())
    }
}
