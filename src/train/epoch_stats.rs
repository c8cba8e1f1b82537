use serde::{Serialize, Deserialize};

/// Per-epoch training statistics emitted by `train_loop`.
///
/// When a `progress_tx` channel is configured in `TrainConfig`, the training
/// loop sends one `EpochStats` value at the end of every completed epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochStats {
    /// 1-based epoch number.
    pub epoch: usize,
    /// Total epochs requested for this run.
    pub total_epochs: usize,
    /// Mean sampled-path training loss over all examples in this epoch.
    pub train_loss: f64,
    /// Mean full-distribution NLL on the validation set, if one was provided.
    pub val_loss: Option<f64>,
    /// Training accuracy as a fraction in [0, 1], measured after the epoch.
    pub train_accuracy: f64,
    pub val_accuracy: Option<f64>,
    /// Wall-clock duration of this single epoch in milliseconds.
    pub elapsed_ms: u64,
}
