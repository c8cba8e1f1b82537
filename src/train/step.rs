use crate::error::Result;
use crate::loss::adaptive_softmax::AdaptiveSoftmaxLoss;
use crate::loss::reduction::ReduceMode;
use crate::math::matrix::Matrix;
use crate::optim::sgd::Sgd;

/// One forward, backward and SGD update on a single mini-batch.
///
/// Returns the mean per-example loss of the batch, whatever reduction the
/// loss is configured with. The gradient follows the configured reduction.
pub fn train_step(
    loss: &mut AdaptiveSoftmaxLoss,
    inputs: &Matrix,
    targets: &[usize],
    optimizer: &Sgd,
) -> Result<f64> {
    let value = loss.forward(inputs, targets)?;
    let grads = loss.compute_gradients()?;
    optimizer.step(loss, &grads)?;

    let n = targets.len();
    if n == 0 {
        return Ok(0.0);
    }
    Ok(match loss.reduction() {
        ReduceMode::Mean => value.total(),
        ReduceMode::Sum | ReduceMode::None => value.total() / n as f64,
    })
}
