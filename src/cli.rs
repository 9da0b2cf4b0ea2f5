//! §4.8 admin CLI: CRUD over datastreams plus the PAUSE/RESUME/MOVE
//! operator commands, all routed through the same [`RebalanceOrchestrator`]
//! and [`crate::manager::ClusterEnv`] the rebalance loop uses.

use clap::{Args, Subcommand};

use crate::connection_string::ConnectionString;
use crate::error::Error;
use crate::model::{Datastream, DatastreamStatus, GroupId, OperatorTarget};
use crate::orchestrator::RebalanceOrchestrator;

pub const EXIT_OK: i32 = 0;
pub const EXIT_USAGE: i32 = 2;
pub const EXIT_STORE: i32 = 3;
pub const EXIT_VALIDATION: i32 = 4;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Register a new datastream.
    Create {
        name: String,
        connector_name: String,
        source_connection_string: String,
        destination_connection_string: String,
    },
    /// Print one datastream.
    Read { name: String },
    /// List every registered datastream.
    ReadAll,
    /// Update a datastream's connection strings.
    Update(UpdateArgs),
    /// Remove a datastream.
    Delete { name: String },
    /// Move a datastream (and its group) out of service.
    Pause {
        name: String,
        #[arg(long)]
        force: bool,
    },
    /// Bring a paused datastream back into service.
    Resume {
        name: String,
        #[arg(long)]
        force: bool,
    },
    /// Request that partitions be relocated onto a specific instance.
    Move {
        group: String,
        instance: String,
        #[arg(required = true)]
        partitions: Vec<String>,
    },
}

#[derive(Debug, Args)]
pub struct UpdateArgs {
    pub name: String,
    #[arg(long)]
    pub source_connection_string: Option<String>,
    #[arg(long)]
    pub destination_connection_string: Option<String>,
}

/// Runs `command` against `orchestrator`, printing results to stdout and
/// errors to stderr, and returns the process exit code.
pub async fn run(orchestrator: &RebalanceOrchestrator, command: Command) -> i32 {
    match dispatch(orchestrator, command).await {
        Ok(()) => EXIT_OK,
        Err(Error::Store(e)) => {
            eprintln!("store error: {e}");
            EXIT_STORE
        }
        Err(Error::Validation(msg)) => {
            eprintln!("validation error: {msg}");
            EXIT_VALIDATION
        }
        Err(Error::ConnectionString(e)) => {
            eprintln!("validation error: {e}");
            EXIT_VALIDATION
        }
        Err(Error::Assignment(e)) => {
            eprintln!("validation error: {e}");
            EXIT_VALIDATION
        }
        Err(e) => {
            eprintln!("error: {e}");
            EXIT_STORE
        }
    }
}

async fn dispatch(orchestrator: &RebalanceOrchestrator, command: Command) -> crate::Result<()> {
    let registry = &orchestrator.env().registry;
    match command {
        Command::Create {
            name,
            connector_name,
            source_connection_string,
            destination_connection_string,
        } => {
            ConnectionString::parse(&source_connection_string).map_err(Error::ConnectionString)?;
            ConnectionString::parse(&destination_connection_string).map_err(Error::ConnectionString)?;
            let mut ds = Datastream::new(name, connector_name);
            ds.source_connection_string = source_connection_string;
            ds.destination_connection_string = destination_connection_string;
            registry.create(&ds).await.map_err(Error::Store)?;
            println!("created datastream {}", ds.name);
            Ok(())
        }
        Command::Read { name } => {
            let ds = registry
                .get(&name)
                .await
                .map_err(Error::Store)?
                .ok_or_else(|| Error::Validation(format!("no datastream named {name}")))?;
            println!(
                "{}",
                serde_json::to_string_pretty(&ds)
                    .map_err(|e| Error::Validation(format!("serialisation failed: {e}")))?
            );
            Ok(())
        }
        Command::ReadAll => {
            for ds in registry.list_all().await.map_err(Error::Store)? {
                println!("{}\t{:?}", ds.name, ds.status);
            }
            Ok(())
        }
        Command::Update(UpdateArgs {
            name,
            source_connection_string,
            destination_connection_string,
        }) => {
            let mut ds = registry
                .get(&name)
                .await
                .map_err(Error::Store)?
                .ok_or_else(|| Error::Validation(format!("no datastream named {name}")))?;
            if let Some(s) = source_connection_string {
                ConnectionString::parse(&s).map_err(Error::ConnectionString)?;
                ds.source_connection_string = s;
            }
            if let Some(d) = destination_connection_string {
                ConnectionString::parse(&d).map_err(Error::ConnectionString)?;
                ds.destination_connection_string = d;
            }
            registry.create(&ds).await.map_err(Error::Store)?;
            Ok(())
        }
        Command::Delete { name } => registry.delete(&name).await.map_err(Error::Store),
        Command::Pause { name, force } => set_status(orchestrator, &name, DatastreamStatus::Paused, force).await,
        Command::Resume { name, force } => set_status(orchestrator, &name, DatastreamStatus::Ready, force).await,
        Command::Move {
            group,
            instance,
            partitions,
        } => {
            let group = GroupId(group);
            let mut target = OperatorTarget::new();
            for p in partitions {
                target.add(instance.clone(), p);
            }
            let outcome = orchestrator.run_move(&group, target).await?;
            if !outcome.dropped.is_empty() {
                println!(
                    "requested partitions not applied (no confirmed source task): {:?}",
                    outcome.dropped
                );
            }
            Ok(())
        }
    }
}

/// A PAUSE/RESUME is rejected unless the datastream is currently in the
/// opposite state, unless `force` is set — guards against accidentally
/// re-pausing an already-paused stream, per the operator commands section.
async fn set_status(
    orchestrator: &RebalanceOrchestrator,
    name: &str,
    target: DatastreamStatus,
    force: bool,
) -> crate::Result<()> {
    let registry = &orchestrator.env().registry;
    let mut ds = registry
        .get(name)
        .await
        .map_err(Error::Store)?
        .ok_or_else(|| Error::Validation(format!("no datastream named {name}")))?;
    let expected_current = match target {
        DatastreamStatus::Paused => DatastreamStatus::Ready,
        DatastreamStatus::Ready => DatastreamStatus::Paused,
        _ => ds.status,
    };
    if ds.status != expected_current && !force {
        return Err(Error::Validation(format!(
            "datastream {name} is {:?}, not {:?} (use --force to override)",
            ds.status, expected_current
        )));
    }
    ds.status = target;
    registry.create(&ds).await.map_err(Error::Store)
}
