pub mod masker;
pub mod partition;

pub use masker::{partition_targets, ClusterTargets, TargetPartition};
pub use partition::ClusterPartition;
