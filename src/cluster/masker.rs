use crate::cluster::partition::ClusterPartition;
use crate::error::Result;

/// The batch positions that fall in one cluster, with their targets shifted
/// to be 0-based within the cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterTargets {
    /// Ascending batch positions.
    pub positions: Vec<usize>,
    /// `class_id - range.start` for each entry of `positions`.
    pub shifted_targets: Vec<usize>,
}

impl ClusterTargets {
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }
}

/// Per-cluster split of a batch of targets.
///
/// Every batch position appears in exactly one cluster's `positions`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPartition {
    pub clusters: Vec<ClusterTargets>,
    /// Ascending indices of the clusters with at least one position.
    pub active: Vec<usize>,
    pub batch_size: usize,
}

impl TargetPartition {
    /// Active tail clusters, i.e. `active` without the head.
    pub fn active_tails(&self) -> impl Iterator<Item = usize> + '_ {
        self.active.iter().copied().filter(|&c| c > 0)
    }
}

/// Splits `targets` by cluster. Fails on the first target outside
/// `[0, num_classes)`; no partial partition is returned.
pub fn partition_targets(partition: &ClusterPartition, targets: &[usize]) -> Result<TargetPartition> {
    let mut clusters = vec![ClusterTargets::default(); partition.num_clusters()];

    for (pos, &target) in targets.iter().enumerate() {
        let cluster = partition.cluster_of(target)?;
        let lo = partition.range(cluster).start;
        clusters[cluster].positions.push(pos);
        clusters[cluster].shifted_targets.push(target - lo);
    }

    let active = clusters
        .iter()
        .enumerate()
        .filter(|(_, c)| !c.is_empty())
        .map(|(i, _)| i)
        .collect();

    Ok(TargetPartition { clusters, active, batch_size: targets.len() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn partition() -> ClusterPartition {
        ClusterPartition::new(vec![5, 50, 100]).unwrap()
    }

    #[test]
    fn shifts_targets_within_cluster() {
        let split = partition_targets(&partition(), &[3, 7, 60, 0, 49]).unwrap();
        assert_eq!(split.clusters[0].positions, vec![0, 3]);
        assert_eq!(split.clusters[0].shifted_targets, vec![3, 0]);
        assert_eq!(split.clusters[1].positions, vec![1, 4]);
        assert_eq!(split.clusters[1].shifted_targets, vec![2, 44]);
        assert_eq!(split.clusters[2].positions, vec![2]);
        assert_eq!(split.clusters[2].shifted_targets, vec![10]);
        assert_eq!(split.active, vec![0, 1, 2]);
    }

    #[test]
    fn absent_clusters_are_inactive() {
        let split = partition_targets(&partition(), &[1, 2, 10]).unwrap();
        assert_eq!(split.active, vec![0, 1]);
        assert_eq!(split.active_tails().collect::<Vec<_>>(), vec![1]);
        assert!(split.clusters[2].is_empty());
    }

    #[test]
    fn out_of_range_target_fails() {
        let err = partition_targets(&partition(), &[1, 150]).unwrap_err();
        assert!(matches!(err, Error::InvalidTarget { target: 150, num_classes: 100 }));
    }

    #[test]
    fn empty_batch_has_no_active_clusters() {
        let split = partition_targets(&partition(), &[]).unwrap();
        assert!(split.active.is_empty());
        assert_eq!(split.batch_size, 0);
    }
}
