//! Adaptive softmax: an approximation of softmax + negative log-likelihood
//! for very large, frequency-imbalanced class sets (Grave et al., 2017,
//! "Efficient softmax approximation for GPUs").
//!
//! Classes are bucketed by frequency. The head bucket holds the most frequent
//! classes plus one shortcut score per tail bucket; each tail bucket is scored
//! through a low-rank `down · up` projection whose width shrinks by
//! `div_value` per bucket. During training only the tail buckets that occur in
//! the batch are evaluated.
//!
//! ```text
//! log p(c | x) = log_softmax(x · H)[c]                                  c in head
//! log p(c | x) = log_softmax(x · H)[shortcut_i]
//!              + log_softmax(x · D_i · U_i)[c - lo_i]                   c in tail i
//! ```

use rand::Rng;
use tracing::{debug, trace, warn};

use crate::cluster::masker::{partition_targets, TargetPartition};
use crate::cluster::partition::ClusterPartition;
use crate::error::{Error, Result};
use crate::io::checkpoint::{AdaptiveSoftmaxState, Checkpoint};
use crate::layers::projection::{ProjectionBank, ProjectionGradients, TailProjection};
use crate::loss::loss::Loss;
use crate::loss::reduction::{LossValue, ReduceMode};
use crate::math::matrix::Matrix;
use crate::math::ops::{argmax, log_softmax, nll_logit_gradient};

pub const DEFAULT_DIV_VALUE: f64 = 4.0;

/// Activations of one evaluated tail cluster, restricted to its positions.
#[derive(Debug, Clone)]
struct TailActivation {
    inputs: Matrix,
    hidden: Matrix,
    logits: Matrix,
}

/// Everything the backward pass needs from the last forward pass.
#[derive(Debug, Clone)]
pub struct ForwardTrace {
    inputs: Matrix,
    head_logits: Matrix,
    split: TargetPartition,
    /// Indexed by tail cluster `i` at `tails[i - 1]`; `None` when skipped.
    tails: Vec<Option<TailActivation>>,
}

impl ForwardTrace {
    /// Tail clusters whose projections were evaluated, ascending.
    pub fn evaluated_tails(&self) -> Vec<usize> {
        self.tails
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_some())
            .map(|(i, _)| i + 1)
            .collect()
    }

    pub fn partition(&self) -> &TargetPartition {
        &self.split
    }

    pub fn batch_size(&self) -> usize {
        self.split.batch_size
    }
}

/// Gradients produced by [`AdaptiveSoftmaxLoss::compute_gradients`].
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveSoftmaxGradients {
    /// d(loss)/d(inputs), same shape as the forward inputs.
    pub input: Matrix,
    pub params: ProjectionGradients,
}

#[derive(Debug, Clone)]
pub struct AdaptiveSoftmaxLoss {
    partition: ClusterPartition,
    projections: ProjectionBank,
    div_value: f64,
    reduction: ReduceMode,
    last_trace: Option<ForwardTrace>,
}

impl AdaptiveSoftmaxLoss {
    /// Builds a loss with `div_value = 4` and mean reduction.
    pub fn new(input_size: usize, cutoffs: Vec<usize>) -> Result<AdaptiveSoftmaxLoss> {
        AdaptiveSoftmaxLoss::with_options(input_size, cutoffs, DEFAULT_DIV_VALUE, ReduceMode::Mean)
    }

    pub fn with_options(
        input_size: usize,
        cutoffs: Vec<usize>,
        div_value: f64,
        reduction: ReduceMode,
    ) -> Result<AdaptiveSoftmaxLoss> {
        let mut rng = rand::thread_rng();
        AdaptiveSoftmaxLoss::with_rng(&mut rng, input_size, cutoffs, div_value, reduction)
    }

    /// Like [`AdaptiveSoftmaxLoss::with_options`], drawing the initial weights
    /// from `rng`.
    pub fn with_rng<R: Rng + ?Sized>(
        rng: &mut R,
        input_size: usize,
        cutoffs: Vec<usize>,
        div_value: f64,
        reduction: ReduceMode,
    ) -> Result<AdaptiveSoftmaxLoss> {
        let partition = ClusterPartition::new(cutoffs)?;
        let projections = ProjectionBank::new_with_rng(rng, input_size, &partition, div_value)?;
        debug!(
            input_size,
            cutoffs = ?partition.cutoffs(),
            div_value,
            head_width = partition.head_output_width(),
            reduced_dims = ?projections.tails.iter().map(|t| t.reduced_dim()).collect::<Vec<_>>(),
            "built adaptive softmax loss"
        );
        Ok(AdaptiveSoftmaxLoss { partition, projections, div_value, reduction, last_trace: None })
    }

    /// Builds a loss around explicit weights. `input_size` is taken from the
    /// head matrix rows; every other shape must match what the cutoffs and
    /// `div_value` imply.
    pub fn from_parameters(
        cutoffs: Vec<usize>,
        div_value: f64,
        reduction: ReduceMode,
        head: Matrix,
        tails: Vec<TailProjection>,
    ) -> Result<AdaptiveSoftmaxLoss> {
        let partition = ClusterPartition::new(cutoffs)?;
        let projections = ProjectionBank::from_parameters(head.rows, &partition, div_value, head, tails)?;
        Ok(AdaptiveSoftmaxLoss { partition, projections, div_value, reduction, last_trace: None })
    }

    pub fn input_size(&self) -> usize {
        self.projections.input_size
    }

    pub fn num_classes(&self) -> usize {
        self.partition.num_classes()
    }

    pub fn partition(&self) -> &ClusterPartition {
        &self.partition
    }

    pub fn projections(&self) -> &ProjectionBank {
        &self.projections
    }

    pub fn div_value(&self) -> f64 {
        self.div_value
    }

    pub fn reduction(&self) -> ReduceMode {
        self.reduction
    }

    pub fn set_reduction(&mut self, reduction: ReduceMode) {
        self.reduction = reduction;
    }

    /// Trace recorded by the most recent [`AdaptiveSoftmaxLoss::forward`].
    pub fn last_trace(&self) -> Option<&ForwardTrace> {
        self.last_trace.as_ref()
    }

    /// Validates `inputs` and returns it with an empty batch normalized to
    /// `0 x input_size`.
    fn checked_inputs(&self, inputs: &Matrix) -> Result<Matrix> {
        if inputs.rows == 0 {
            return Ok(Matrix::zeros(0, self.input_size()));
        }
        if inputs.cols != self.input_size() || !inputs.is_rectangular() {
            return Err(Error::shape(
                "adaptive softmax input",
                format!("Bx{}", self.input_size()),
                format!("{}x{}", inputs.rows, inputs.cols),
            ));
        }
        Ok(inputs.clone())
    }

    /// Negative log-likelihood of `targets` under the adaptive softmax,
    /// reduced according to [`AdaptiveSoftmaxLoss::reduction`].
    ///
    /// Only tail clusters with at least one target in the batch are projected.
    /// The trace of this pass is kept for [`AdaptiveSoftmaxLoss::compute_gradients`].
    pub fn forward(&mut self, inputs: &Matrix, targets: &[usize]) -> Result<LossValue> {
        // A failed pass must not leave the previous batch's trace behind.
        self.last_trace = None;
        let inputs = self.checked_inputs(inputs)?;
        if targets.len() != inputs.rows {
            return Err(Error::shape("adaptive softmax targets", inputs.rows, targets.len()));
        }
        let split = partition_targets(&self.partition, targets)?;
        debug!(batch = inputs.rows, active = ?split.active, "adaptive softmax forward");

        let head_logits = self.projections.head_logits(&inputs);
        let mut nll = vec![0.0; inputs.rows];

        let head = &split.clusters[0];
        for (&pos, &target) in head.positions.iter().zip(head.shifted_targets.iter()) {
            nll[pos] = -log_softmax(head_logits.row(pos))[target];
        }

        let mut tails: Vec<Option<TailActivation>> = vec![None; self.partition.num_tails()];
        for cluster in split.active_tails() {
            let members = &split.clusters[cluster];
            let shortcut = self.partition.shortcut_column(cluster);
            let sub = inputs.select_rows(&members.positions);
            let (hidden, logits) = self.projections.tail(cluster).forward(&sub);

            for (k, (&pos, &target)) in members.positions.iter().zip(members.shifted_targets.iter()).enumerate() {
                let head_lp = log_softmax(head_logits.row(pos))[shortcut];
                let tail_lp = log_softmax(logits.row(k))[target];
                nll[pos] = -(head_lp + tail_lp);
            }

            tails[cluster - 1] = Some(TailActivation { inputs: sub, hidden, logits });
        }
        for (i, t) in tails.iter().enumerate() {
            if t.is_none() {
                trace!(cluster = i + 1, "tail cluster absent from batch, skipped");
            }
        }

        let value = self.reduction.reduce(nll);
        if !value.is_finite() {
            warn!(?value, "adaptive softmax produced a non-finite loss");
        }

        self.last_trace = Some(ForwardTrace { inputs, head_logits, split, tails });
        Ok(value)
    }

    /// Gradients of the last forward's loss, as if it were the final output
    /// (upstream gradient of 1 for every entry of the returned value).
    pub fn compute_gradients(&self) -> Result<AdaptiveSoftmaxGradients> {
        let trace = self.last_trace.as_ref().ok_or(Error::MissingForward)?;
        let upstream = match self.reduction {
            ReduceMode::None => vec![1.0; trace.batch_size()],
            _ => vec![1.0],
        };
        self.compute_gradients_with(&upstream)
    }

    /// Gradients of the last forward's loss given the upstream gradient of
    /// its output: one value per example for `ReduceMode::None`, a single
    /// value otherwise.
    pub fn compute_gradients_with(&self, upstream: &[f64]) -> Result<AdaptiveSoftmaxGradients> {
        let trace = self.last_trace.as_ref().ok_or(Error::MissingForward)?;
        let batch = trace.batch_size();

        let weights: Vec<f64> = match self.reduction {
            ReduceMode::None => {
                if upstream.len() != batch {
                    return Err(Error::shape("upstream gradient", batch, upstream.len()));
                }
                upstream.to_vec()
            }
            mode => {
                if upstream.len() != 1 {
                    return Err(Error::shape("upstream gradient", 1, upstream.len()));
                }
                vec![upstream[0] * mode.example_weight(batch); batch]
            }
        };

        let mut d_head_logits = Matrix::zeros(batch, self.partition.head_output_width());
        let mut d_inputs = Matrix::zeros(batch, self.input_size());

        let head = &trace.split.clusters[0];
        for (&pos, &target) in head.positions.iter().zip(head.shifted_targets.iter()) {
            d_head_logits.data[pos] = nll_logit_gradient(trace.head_logits.row(pos), target, weights[pos]);
        }

        let mut tail_grads: Vec<Option<TailProjection>> = vec![None; self.partition.num_tails()];
        for (i, activation) in trace.tails.iter().enumerate() {
            let Some(activation) = activation else { continue };
            let cluster = i + 1;
            let members = &trace.split.clusters[cluster];
            let shortcut = self.partition.shortcut_column(cluster);
            let projection = self.projections.tail(cluster);

            let mut d_logits = Matrix::zeros(members.len(), self.partition.cluster_len(cluster));
            for (k, (&pos, &target)) in members.positions.iter().zip(members.shifted_targets.iter()).enumerate() {
                d_head_logits.data[pos] = nll_logit_gradient(trace.head_logits.row(pos), shortcut, weights[pos]);
                d_logits.data[k] = nll_logit_gradient(activation.logits.row(k), target, weights[pos]);
            }

            // logits = hidden · up, hidden = sub · down
            let d_up = &activation.hidden.transpose() * &d_logits;
            let d_hidden = &d_logits * &projection.up.transpose();
            let d_down = &activation.inputs.transpose() * &d_hidden;
            let d_sub = &d_hidden * &projection.down.transpose();
            d_inputs.scatter_add_rows(&members.positions, &d_sub);

            tail_grads[i] = Some(TailProjection { down: d_down, up: d_up });
        }

        let d_head = &trace.inputs.transpose() * &d_head_logits;
        let d_inputs = &d_inputs + &(&d_head_logits * &self.projections.head.transpose());

        Ok(AdaptiveSoftmaxGradients {
            input: d_inputs,
            params: ProjectionGradients { head: d_head, tails: tail_grads },
        })
    }

    /// Applies parameter gradients scaled by `lr`. The recorded trace no longer
    /// matches the parameters afterwards and is dropped.
    pub fn apply_gradients(&mut self, grads: &AdaptiveSoftmaxGradients, lr: f64) -> Result<()> {
        self.projections.apply_gradients(&grads.params, lr)?;
        self.last_trace = None;
        Ok(())
    }

    /// Log-probabilities over every class, one row per example and one column
    /// per class id.
    pub fn log_prob(&self, inputs: &Matrix) -> Result<Matrix> {
        let inputs = self.checked_inputs(inputs)?;
        let head_output = self.projections.head_logits(&inputs);
        self.full_log_prob(&inputs, &head_output)
    }

    /// Same as [`AdaptiveSoftmaxLoss::log_prob`] with the head projection
    /// already computed. Every tail cluster is evaluated for every example.
    pub fn full_log_prob(&self, inputs: &Matrix, head_output: &Matrix) -> Result<Matrix> {
        let inputs = self.checked_inputs(inputs)?;
        let expected = (inputs.rows, self.partition.head_output_width());
        let shape_ok = head_output.rows == 0 || head_output.shape() == expected;
        if head_output.rows != inputs.rows || !shape_ok || !head_output.is_rectangular() {
            return Err(Error::shape(
                "head output",
                format!("{}x{}", expected.0, expected.1),
                format!("{}x{}", head_output.rows, head_output.cols),
            ));
        }

        let head_size = self.partition.head_size();
        let head_lp: Vec<Vec<f64>> = head_output.data.iter().map(|row| log_softmax(row)).collect();

        let mut out = Matrix::zeros(inputs.rows, self.num_classes());
        for (row, lp) in out.data.iter_mut().zip(head_lp.iter()) {
            row[..head_size].copy_from_slice(&lp[..head_size]);
        }

        for cluster in 1..self.partition.num_clusters() {
            let lo = self.partition.range(cluster).start;
            let shortcut = self.partition.shortcut_column(cluster);
            let (_, logits) = self.projections.tail(cluster).forward(&inputs);

            for (e, row) in out.data.iter_mut().enumerate() {
                let prefix = head_lp[e][shortcut];
                for (j, lp) in log_softmax(logits.row(e)).into_iter().enumerate() {
                    row[lo + j] = prefix + lp;
                }
            }
        }

        Ok(out)
    }

    /// Most probable class id per example; ties go to the lowest id.
    pub fn predict(&self, inputs: &Matrix) -> Result<Vec<usize>> {
        let log_probs = self.log_prob(inputs)?;
        Ok(log_probs.data.iter().map(|row| argmax(row)).collect())
    }

    pub fn pretty_string(&self) -> String {
        format!(
            "AdaptiveSoftMaxLoss (input_size: {}, cutoffs: {:?}, div_value: {}, reduction: {}, parameters: {})",
            self.input_size(),
            self.partition.cutoffs(),
            self.div_value,
            self.reduction.as_str(),
            self.projections.num_parameters(),
        )
    }

    pub fn to_state(&self) -> AdaptiveSoftmaxState {
        AdaptiveSoftmaxState {
            cutoffs: self.partition.cutoffs().to_vec(),
            reduction: self.reduction,
            div_value: self.div_value,
            head: self.projections.head.clone(),
            tails: self.projections.tails.clone(),
        }
    }

    /// Rebuilds a loss from persisted state; shapes are re-derived from the
    /// head rows, the cutoffs and `div_value` before contents are accepted.
    pub fn from_state(state: AdaptiveSoftmaxState) -> Result<AdaptiveSoftmaxLoss> {
        AdaptiveSoftmaxLoss::from_parameters(
            state.cutoffs,
            state.div_value,
            state.reduction,
            state.head,
            state.tails,
        )
    }

    /// Writes a versioned checkpoint to a pretty-printed JSON file.
    pub fn save_json(&self, path: &str) -> Result<()> {
        Checkpoint::from_adaptive_softmax(self)?.save_json(path)
    }

    /// Loads a loss written by [`AdaptiveSoftmaxLoss::save_json`].
    pub fn load_json(path: &str) -> Result<AdaptiveSoftmaxLoss> {
        Checkpoint::load_json(path)?.into_adaptive_softmax()
    }
}

impl Loss for AdaptiveSoftmaxLoss {
    fn forward(&mut self, inputs: &Matrix, targets: &[usize]) -> Result<LossValue> {
        AdaptiveSoftmaxLoss::forward(self, inputs, targets)
    }

    fn pretty_string(&self) -> String {
        AdaptiveSoftmaxLoss::pretty_string(self)
    }

    fn type_tag(&self) -> &'static str {
        AdaptiveSoftmaxState::TYPE_TAG
    }

    fn encode(&self) -> Result<Checkpoint> {
        Checkpoint::from_adaptive_softmax(self)
    }
}
