use serde::{Serialize, Deserialize};
use std::ops::Range;

use crate::error::{Error, Result};

/// Frequency clusters derived from an ascending cutoff list.
///
/// Cluster 0 (the head) covers `[0, cutoffs[0])`; tail cluster `i` covers
/// `[cutoffs[i-1], cutoffs[i])`. The last cutoff is the total class count, so
/// every class belongs to exactly one cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<usize>", into = "Vec<usize>")]
pub struct ClusterPartition {
    cutoffs: Vec<usize>,
}

impl ClusterPartition {
    pub fn new(cutoffs: Vec<usize>) -> Result<ClusterPartition> {
        if cutoffs.is_empty() {
            return Err(Error::Configuration("cutoffs must not be empty".into()));
        }
        if cutoffs[0] == 0 {
            return Err(Error::Configuration(format!(
                "cutoffs must be positive, got {:?}",
                cutoffs
            )));
        }
        if let Some(w) = cutoffs.windows(2).find(|w| w[0] >= w[1]) {
            return Err(Error::Configuration(format!(
                "cutoffs must be strictly ascending, got {} then {} in {:?}",
                w[0], w[1], cutoffs
            )));
        }
        Ok(ClusterPartition { cutoffs })
    }

    pub fn cutoffs(&self) -> &[usize] {
        &self.cutoffs
    }

    /// `K`, the head plus every tail cluster.
    pub fn num_clusters(&self) -> usize {
        self.cutoffs.len()
    }

    pub fn num_tails(&self) -> usize {
        self.cutoffs.len() - 1
    }

    pub fn num_classes(&self) -> usize {
        self.cutoffs[self.cutoffs.len() - 1]
    }

    pub fn head_size(&self) -> usize {
        self.cutoffs[0]
    }

    /// Head classes plus one shortcut score per tail cluster.
    pub fn head_output_width(&self) -> usize {
        self.head_size() + self.num_tails()
    }

    /// Column of the head output that scores "the class is in tail `cluster`".
    pub fn shortcut_column(&self, cluster: usize) -> usize {
        debug_assert!(cluster >= 1 && cluster < self.num_clusters());
        self.head_size() + cluster - 1
    }

    pub fn range(&self, cluster: usize) -> Range<usize> {
        let lo = if cluster == 0 { 0 } else { self.cutoffs[cluster - 1] };
        lo..self.cutoffs[cluster]
    }

    pub fn cluster_len(&self, cluster: usize) -> usize {
        self.range(cluster).len()
    }

    pub fn cluster_of(&self, class_id: usize) -> Result<usize> {
        let cluster = self.cutoffs.partition_point(|&c| c <= class_id);
        if cluster == self.cutoffs.len() {
            return Err(Error::InvalidTarget {
                target: class_id,
                num_classes: self.num_classes(),
            });
        }
        Ok(cluster)
    }
}

impl TryFrom<Vec<usize>> for ClusterPartition {
    type Error = Error;

    fn try_from(cutoffs: Vec<usize>) -> Result<Self> {
        ClusterPartition::new(cutoffs)
    }
}

impl From<ClusterPartition> for Vec<usize> {
    fn from(partition: ClusterPartition) -> Self {
        partition.cutoffs
    }
}
