use crate::error::Result;
use crate::loss::adaptive_softmax::{AdaptiveSoftmaxGradients, AdaptiveSoftmaxLoss};

pub struct Sgd {
    pub learning_rate: f64,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Sgd {
        Sgd { learning_rate }
    }

    /// Applies one SGD update to the loss parameters given pre-computed gradients.
    /// Tail clusters without a gradient keep their weights.
    pub fn step(&self, loss: &mut AdaptiveSoftmaxLoss, grads: &AdaptiveSoftmaxGradients) -> Result<()> {
        loss.apply_gradients(grads, self.learning_rate)
    }
}
