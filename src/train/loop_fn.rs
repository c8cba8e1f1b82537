use std::sync::atomic::Ordering;
use std::time::Instant;

use rand::seq::SliceRandom;
use tracing::info;

use crate::error::{Error, Result};
use crate::loss::adaptive_softmax::AdaptiveSoftmaxLoss;
use crate::math::matrix::Matrix;
use crate::optim::sgd::Sgd;
use crate::train::epoch_stats::EpochStats;
use crate::train::evaluate::evaluate;
use crate::train::step::train_step;
use crate::train::train_config::TrainConfig;

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Trains the parameters of `loss` for `config.epochs` epochs and returns the
/// mean training loss of the **last completed epoch**.
///
/// # Arguments
/// - `loss`:          mutable reference to the loss; its weights are updated in place
/// - `train_inputs`:  one row per training example, `input_size` columns
/// - `train_targets`: class id per row of `train_inputs`
/// - `val_inputs`:    optional validation rows
/// - `val_targets`:   optional validation class ids (required iff `val_inputs` is `Some`)
/// - `optimizer`:     SGD optimizer (carries learning rate)
/// - `config`:        hyperparameters, optional progress channel, optional stop flag
///
/// # Early termination
/// The loop breaks early if:
/// - the `progress_tx` receiver has been dropped, **or**
/// - `config.stop_flag` is set to `true`.
///
/// # Errors
/// `Configuration` if the training set is empty or `batch_size == 0`;
/// `ShapeMismatch` if inputs and targets disagree in length; any error from
/// the forward pass (e.g. `InvalidTarget`) aborts the run.
pub fn train_loop(
    loss: &mut AdaptiveSoftmaxLoss,
    train_inputs: &Matrix,
    train_targets: &[usize],
    val_inputs: Option<&Matrix>,
    val_targets: Option<&[usize]>,
    optimizer: &Sgd,
    config: &TrainConfig,
) -> Result<f64> {
    if train_inputs.rows == 0 {
        return Err(Error::Configuration("training set must not be empty".into()));
    }
    if train_inputs.rows != train_targets.len() {
        return Err(Error::shape("training targets", train_inputs.rows, train_targets.len()));
    }
    if config.batch_size == 0 {
        return Err(Error::Configuration("batch_size must be at least 1".into()));
    }

    let mut last_train_loss = 0.0;

    for epoch in 1..=config.epochs {
        // Check stop flag at the top of each epoch.
        if let Some(ref flag) = config.stop_flag {
            if flag.load(Ordering::Relaxed) {
                break;
            }
        }

        let t_start = Instant::now();

        // ── One full pass over the training data ───────────────────────────
        let train_loss = run_one_epoch(loss, train_inputs, train_targets, optimizer, config.batch_size)?;
        last_train_loss = train_loss;

        let elapsed_ms = t_start.elapsed().as_millis() as u64;

        let train_accuracy = evaluate(loss, train_inputs, train_targets)?.accuracy;

        // ── Validation ────────────────────────────────────────────────────
        let (val_loss, val_accuracy) = if let (Some(vi), Some(vt)) = (val_inputs, val_targets) {
            let eval = evaluate(loss, vi, vt)?;
            (Some(eval.mean_nll), Some(eval.accuracy))
        } else {
            (None, None)
        };

        info!(
            epoch,
            total_epochs = config.epochs,
            train_loss,
            train_accuracy,
            ?val_loss,
            ?val_accuracy,
            elapsed_ms,
            "epoch complete"
        );

        // ── Emit progress ─────────────────────────────────────────────────
        let stats = EpochStats {
            epoch,
            total_epochs: config.epochs,
            train_loss,
            val_loss,
            train_accuracy,
            val_accuracy,
            elapsed_ms,
        };

        if let Some(ref tx) = config.progress_tx {
            // If the receiver has been dropped, stop training.
            if tx.send(stats).is_err() {
                break;
            }
        }

        // Check stop flag again after potentially expensive eval.
        if let Some(ref flag) = config.stop_flag {
            if flag.load(Ordering::Relaxed) {
                break;
            }
        }
    }

    Ok(last_train_loss)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

/// Runs one full epoch of mini-batch SGD over the training data.
/// Returns the mean loss over all examples.
fn run_one_epoch(
    loss: &mut AdaptiveSoftmaxLoss,
    inputs: &Matrix,
    targets: &[usize],
    optimizer: &Sgd,
    batch_size: usize,
) -> Result<f64> {
    let n = inputs.rows;
    let mut total_loss = 0.0;

    // Shuffle example order each epoch.
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut rand::thread_rng());

    for chunk in indices.chunks(batch_size) {
        let batch_inputs = inputs.select_rows(chunk);
        let batch_targets: Vec<usize> = chunk.iter().map(|&i| targets[i]).collect();

        let mean = train_step(loss, &batch_inputs, &batch_targets, optimizer)?;
        total_loss += mean * chunk.len() as f64;
    }

    Ok(total_loss / n as f64)
}
