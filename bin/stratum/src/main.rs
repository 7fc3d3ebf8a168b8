//! stratum is a CLI tool to deploy the Stratum DEX protocol onto an EVM network.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;

use cli::Cli;
use stratum_deploy::{
    ArtifactSource, BuiltinArtifacts, ChainClient, HardhatArtifacts, Orchestrator,
    RpcChainClient, RunConfiguration, SimulatedChain,
    report::{DeploymentReport, left_state_on_chain, summary_table},
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let mut config = RunConfiguration::load(&cli.config)?;
    if let Some(artifacts) = &cli.artifacts {
        config.artifacts_dir = artifacts.clone();
    }

    if cli.plan {
        let chain = simulated_chain(&config);
        return if cli.dry_run {
            print_plan(&config, &chain, &BuiltinArtifacts)
        } else {
            let artifacts = HardhatArtifacts::open(&config.artifacts_dir)?;
            print_plan(&config, &chain, &artifacts)
        };
    }

    if cli.dry_run {
        tracing::info!("Dry run: deploying to an in-memory chain");
        let chain = simulated_chain(&config);
        return execute(&cli, &config, &chain, &BuiltinArtifacts).await;
    }

    let artifacts = HardhatArtifacts::open(&config.artifacts_dir)?;
    let client = RpcChainClient::connect(&config.network).await?;
    execute(&cli, &config, &client, &artifacts).await
}

fn simulated_chain(config: &RunConfiguration) -> SimulatedChain {
    match config.network.deployer {
        Some(deployer) => SimulatedChain::new(deployer, 31_337),
        None => SimulatedChain::default(),
    }
}

fn print_plan<C: ChainClient, A: ArtifactSource>(
    config: &RunConfiguration,
    client: &C,
    artifacts: &A,
) -> Result<()> {
    let plan = Orchestrator::new(config, client, artifacts).plan()?;
    let json = serde_json::to_string_pretty(&plan).context("Failed to serialize plan")?;
    println!("{json}");
    Ok(())
}

async fn execute<C: ChainClient, A: ArtifactSource>(
    cli: &Cli,
    config: &RunConfiguration,
    client: &C,
    artifacts: &A,
) -> Result<()> {
    let chain_id = client.chain_id().await.context("Failed to read chain id")?;
    let deployer = client.deployer();

    tracing::info!(
        chain_id,
        deployer = %deployer,
        config_path = %cli.config.display(),
        "Starting deployment run..."
    );

    let mut orchestrator = Orchestrator::new(config, client, artifacts);
    match orchestrator.run().await {
        Ok(run) => {
            println!("{}", summary_table(&run.registry));
            if let Some(path) = &cli.report {
                DeploymentReport::complete(config, chain_id, deployer, &run)?.save_to_file(path)?;
            }
            Ok(())
        }
        Err(failure) => {
            if left_state_on_chain(&failure) {
                println!("{}", summary_table(&failure.registry));
                tracing::warn!(
                    deployed = failure.registry.len(),
                    initialized = failure.receipts.len(),
                    "The run stopped part-way; running again deploys a fresh set of contracts"
                );
            }
            if let Some(path) = &cli.report {
                DeploymentReport::failed(config, chain_id, deployer, &failure)?
                    .save_to_file(path)?;
            }
            Err(failure.into())
        }
    }
}
