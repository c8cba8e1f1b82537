use serde::{Serialize, Deserialize};

use crate::error::{Error, Result};
use crate::loss::adaptive_softmax::AdaptiveSoftmaxLoss;
use crate::math::matrix::Matrix;
use crate::math::ops::argmax;

/// Full-distribution metrics for a labelled set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Mean of `-log p(target | x)` over the set.
    pub mean_nll: f64,
    /// Fraction of examples whose argmax class equals the target, in [0, 1].
    pub accuracy: f64,
}

/// Scores `inputs` against `targets` through the full log-probability path
/// (every cluster evaluated for every example).
pub fn evaluate(loss: &AdaptiveSoftmaxLoss, inputs: &Matrix, targets: &[usize]) -> Result<Evaluation> {
    if targets.len() != inputs.rows {
        return Err(Error::shape("evaluation targets", inputs.rows, targets.len()));
    }
    for &t in targets {
        loss.partition().cluster_of(t)?;
    }
    if targets.is_empty() {
        return Ok(Evaluation { mean_nll: 0.0, accuracy: 0.0 });
    }

    let log_probs = loss.log_prob(inputs)?;
    let n = targets.len() as f64;
    let mut nll = 0.0;
    let mut correct = 0usize;
    for (row, &t) in log_probs.data.iter().zip(targets.iter()) {
        nll -= row[t];
        if argmax(row) == t {
            correct += 1;
        }
    }

    Ok(Evaluation { mean_nll: nll / n, accuracy: correct as f64 / n })
}
