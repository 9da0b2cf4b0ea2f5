//! The rebalance algorithms: sticky multicast (task-count placement),
//! sticky partition (partition-level assignment and operator moves), and
//! the invariant checks both end with.

mod checks;
mod multicast;
mod partition;

pub use multicast::{MulticastConfig, StickyMulticastStrategy};
pub use partition::{MoveOutcome, PartitionStrategyConfig, StickyPartitionStrategy};
