//! Binary entry point: parses [`ClusterConfig`], wires an in-memory
//! coordination store, and either runs the admin CLI or the rebalance loop.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;

use brooklin_assign::cli::{self, Command};
use brooklin_assign::config::{init_logging, ClusterConfig};
use brooklin_assign::manager::partition_metadata::StaticPartitionMetadataProvider;
use brooklin_assign::manager::ClusterEnv;
use brooklin_assign::model::GroupId;
use brooklin_assign::orchestrator::RebalanceOrchestrator;
use brooklin_assign::store::memory::InMemoryStore;
use brooklin_assign::store::CoordinationStore;

#[derive(Debug, Parser)]
#[command(
    name = "assignd",
    about = "Sticky partition assignment engine for a distributed stream-movement cluster"
)]
struct Cli {
    #[command(flatten)]
    config: ClusterConfig,

    #[command(subcommand)]
    command: TopCommand,
}

#[derive(Debug, Subcommand)]
enum TopCommand {
    /// Run the leader-side rebalance loop for the given groups until
    /// interrupted.
    Serve {
        #[arg(long, value_delimiter = ',')]
        groups: Vec<String>,
    },
    #[command(flatten)]
    Admin(Command),
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.config.log_level);

    // A real deployment wires a ZooKeeper-backed CoordinationStore here; the
    // in-memory store is the only backend this crate ships.
    let store: Arc<dyn CoordinationStore> = Arc::new(InMemoryStore::new());
    let partitions = StaticPartitionMetadataProvider::new();
    let env = ClusterEnv::new(store.clone(), cli.config.cluster_name.clone(), partitions);
    let orchestrator = RebalanceOrchestrator::new(env, store, cli.config.clone());

    match cli.command {
        TopCommand::Admin(command) => {
            let code = cli::run(&orchestrator, command).await;
            std::process::ExitCode::from(code as u8)
        }
        TopCommand::Serve { groups } => run_serve(orchestrator, groups).await,
    }
}

async fn run_serve(orchestrator: RebalanceOrchestrator, groups: Vec<String>) -> std::process::ExitCode {
    let cancel = CancellationToken::new();
    let debounce = orchestrator.config().debounce_interval();
    let orchestrator = Arc::new(orchestrator);

    let mut handles = Vec::with_capacity(groups.len());
    for group in groups {
        let orchestrator = orchestrator.clone();
        let cancel = cancel.child_token();
        let group = GroupId(group);
        handles.push(tokio::spawn(async move {
            loop {
                orchestrator.run_cycle_with_retry(&group, &cancel).await;
                tokio::select! {
                    _ = tokio::time::sleep(debounce) => {}
                    _ = cancel.cancelled() => break,
                }
            }
        }));
    }

    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received, draining rebalance tasks");
    cancel.cancel();
    for handle in handles {
        let _ = handle.await;
    }
    std::process::ExitCode::SUCCESS
}
