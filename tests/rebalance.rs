//! End-to-end exercise of the rebalance orchestrator against the in-memory
//! coordination store: register instances, create a datastream, set a
//! partition snapshot, run a cycle, and confirm the committed assignment is
//! readable back from the store exactly as persisted.

use std::sync::Arc;

use brooklin_assign::config::ClusterConfig;
use brooklin_assign::manager::partition_metadata::StaticPartitionMetadataProvider;
use brooklin_assign::manager::ClusterEnv;
use brooklin_assign::model::{Datastream, DatastreamStatus, GroupId, OperatorTarget, PartitionSnapshot};
use brooklin_assign::orchestrator::RebalanceOrchestrator;
use brooklin_assign::store::memory::InMemoryStore;
use brooklin_assign::store::CoordinationStore;
use clap::Parser;
use tokio_util::sync::CancellationToken;

fn test_config() -> ClusterConfig {
    ClusterConfig::parse_from(["assignd", "--max-tasks", "2"])
}

async fn setup(cluster: &str) -> (Arc<dyn CoordinationStore>, ClusterEnv, Arc<StaticPartitionMetadataProvider>) {
    let store: Arc<dyn CoordinationStore> = Arc::new(InMemoryStore::new());
    let partitions = StaticPartitionMetadataProvider::new();
    let env = ClusterEnv::new(store.clone(), cluster, partitions.clone());
    (store, env, partitions)
}

#[tokio::test]
async fn fresh_group_is_spread_across_live_instances() {
    let (store, env, partitions) = setup("cluster1").await;

    let session = store.open_session().await.unwrap();
    store
        .create_ephemeral(session, "/cluster1/instances/instance1", "host1")
        .await
        .unwrap();
    store
        .create_ephemeral(session, "/cluster1/instances/instance2", "host2")
        .await
        .unwrap();

    let mut ds = Datastream::new("ds", "kafka");
    ds.status = DatastreamStatus::Ready;
    env.registry.create(&ds).await.unwrap();

    let group = GroupId("ds".to_string());
    partitions
        .set(PartitionSnapshot::new(
            group.clone(),
            ["t-0".to_string(), "t-1".to_string(), "t1-0".to_string(), "t1-1".to_string()],
        ))
        .await;

    let orchestrator = RebalanceOrchestrator::new(env, store.clone(), test_config());
    let cancel = CancellationToken::new();
    orchestrator.run_cycle(&group, &cancel).await.unwrap();

    let committed = orchestrator.read_current_assignment(&group).await.unwrap();
    let total_partitions: usize = committed
        .group_tasks(&group)
        .iter()
        .map(|(_, t)| t.partitions.len())
        .sum();
    assert_eq!(total_partitions, 4);
    assert_eq!(committed.task_count("instance1") + committed.task_count("instance2"), 2);

    // A second cycle with the same live set and snapshot should be close to a
    // no-op: task count for the group is unchanged.
    orchestrator.run_cycle(&group, &cancel).await.unwrap();
    let again = orchestrator.read_current_assignment(&group).await.unwrap();
    assert_eq!(again.group_tasks(&group).len(), committed.group_tasks(&group).len());
}

#[tokio::test]
async fn operator_move_relocates_confirmed_partitions_and_reports_dropped() {
    let (store, env, partitions) = setup("cluster2").await;

    let session = store.open_session().await.unwrap();
    store
        .create_ephemeral(session, "/cluster2/instances/instance1", "host1")
        .await
        .unwrap();
    store
        .create_ephemeral(session, "/cluster2/instances/instance2", "host2")
        .await
        .unwrap();

    let mut ds = Datastream::new("ds", "kafka");
    ds.status = DatastreamStatus::Ready;
    env.registry.create(&ds).await.unwrap();

    let group = GroupId("ds".to_string());
    let snapshot_partitions: Vec<String> = (0..5).map(|i| format!("t-{i}")).collect();
    partitions
        .set(PartitionSnapshot::new(group.clone(), snapshot_partitions.clone()))
        .await;

    let orchestrator = RebalanceOrchestrator::new(env, store.clone(), test_config());
    let cancel = CancellationToken::new();
    orchestrator.run_cycle(&group, &cancel).await.unwrap();

    let mut target = OperatorTarget::new();
    target.add("instance1", "t-0");
    target.add("instance1", "not-a-real-partition");

    let outcome = orchestrator.run_move(&group, target).await.unwrap();
    assert!(outcome.dropped.contains("not-a-real-partition"));

    let committed = orchestrator.read_current_assignment(&group).await.unwrap();
    let owns_t0 = committed
        .tasks_of("instance1")
        .any(|t| t.partitions.iter().any(|p| p == "t-0"));
    assert!(owns_t0);
}
