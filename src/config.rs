//! Layered configuration: defaults, then environment variables, then CLI
//! flags, following the teacher's opts-struct-with-env-fallback convention.

use std::time::Duration;

use clap::Parser;

#[derive(Debug, Clone, Parser)]
pub struct ClusterConfig {
    #[clap(long, env = "CLUSTER_NAME", default_value = "default")]
    pub cluster_name: String,

    #[clap(long, env = "COORDINATION_STORE_ENDPOINT", default_value = "memory://")]
    pub coordination_store_endpoint: String,

    #[clap(long, env = "SESSION_TIMEOUT_MS", default_value_t = 30_000)]
    pub session_timeout_ms: u64,

    #[clap(long, env = "CONNECTION_TIMEOUT_MS", default_value_t = 10_000)]
    pub connection_timeout_ms: u64,

    #[clap(long, env = "DEBOUNCE_INTERVAL_MS", default_value_t = 500)]
    pub debounce_interval_ms: u64,

    #[clap(long, env = "STORE_OP_TIMEOUT_MS", default_value_t = 60_000)]
    pub store_op_timeout_ms: u64,

    #[clap(long, env = "REBALANCE_DEADLINE_MS", default_value_t = 300_000)]
    pub rebalance_deadline_ms: u64,

    #[clap(long, env = "RETRY_BACKOFF_CAP_MS", default_value_t = 300_000)]
    pub retry_backoff_cap_ms: u64,

    #[clap(long, env = "IMBALANCE_THRESHOLD", default_value_t = 1)]
    pub imbalance_threshold: usize,

    /// Default per-group task count used when a datastream group does not
    /// set its own `numTasks`.
    #[clap(long, env = "MAX_TASKS", default_value_t = 1)]
    pub max_tasks: usize,

    #[clap(long, env = "MAX_PARTITIONS_PER_TASK")]
    pub max_partitions_per_task: Option<usize>,

    #[clap(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl ClusterConfig {
    pub fn store_op_timeout(&self) -> Duration {
        Duration::from_millis(self.store_op_timeout_ms)
    }

    pub fn rebalance_deadline(&self) -> Duration {
        Duration::from_millis(self.rebalance_deadline_ms)
    }

    pub fn retry_backoff_cap(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_cap_ms)
    }

    pub fn debounce_interval(&self) -> Duration {
        Duration::from_millis(self.debounce_interval_ms)
    }
}

/// Initialise the `tracing` subscriber once; safe to call more than once in
/// test setup, matching the ambient "idempotent and tolerant of re-entry"
/// convention.
pub fn init_logging(level: &str) {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_new(level)
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        tracing_subscriber::fmt().with_env_filter(filter).init();
    });
}
