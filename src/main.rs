use anyhow::Result;
use clap::Parser;
use tracing::{debug, error, Instrument};

use itsm_flow::cli::commands::{
    CanAssignCommand, CancelOlderCommand, CommandContext, CreateCommand, DeployedCommand, DeployingCommand,
};
use itsm_flow::cli::{Cli, Commands};
use itsm_flow::{create_workflow_span, generate_correlation_id, init_telemetry, ItsmFlowConfig};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let graceful_exit = cli.options.graceful_exit();

    match run(cli) {
        Err(e) if graceful_exit => {
            error!("{e:#}");
            println!("-------------- Exception occurred -----------");
            println!("{e:?}");
            println!("---------------------------------------------");
            println!("Graceful exit enabled, exiting with code 0");
            Ok(())
        }
        other => other,
    }
}

fn run(cli: Cli) -> Result<()> {
    ItsmFlowConfig::load_env_file()?;
    let mut config = ItsmFlowConfig::load()?;
    cli.options.apply_to(&mut config);
    init_telemetry(config.workflow.debug, config.observability.json_logs)?;

    let correlation_id = generate_correlation_id();
    let span = create_workflow_span(cli.command.name(), &correlation_id);
    debug!(
        command = cli.command.name(),
        dry_run = config.workflow.dry_run,
        repository = ?config.github.repository,
        "Starting"
    );

    let context = CommandContext::new(config, cli.options);
    tokio::runtime::Runtime::new()?.block_on(
        async {
            context.announce()?;
            match cli.command {
                Commands::CreateChangeRequest => CreateCommand::new(context).execute().await,
                Commands::MoveToDeploying => DeployingCommand::new(context).execute().await,
                Commands::MoveToDeployed => DeployedCommand::new(context).execute().await,
                Commands::CancelOlderPendingRequests => CancelOlderCommand::new(context).execute().await,
                Commands::CanPrAuthorBeAssigned => CanAssignCommand::new(context).execute().await,
            }
        }
        .instrument(span),
    )
}
