//! Row-wise numerics shared by the training and inference paths.

/// Numerically stable log-softmax: `x_i - max - ln(sum(exp(x_j - max)))`.
pub fn log_softmax(logits: &[f64]) -> Vec<f64> {
    if logits.is_empty() {
        return Vec::new();
    }
    let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let log_sum = logits.iter().map(|x| (x - max).exp()).sum::<f64>().ln();
    logits.iter().map(|x| x - max - log_sum).collect()
}

pub fn softmax(logits: &[f64]) -> Vec<f64> {
    log_softmax(logits).into_iter().map(f64::exp).collect()
}

/// Gradient of `-log_softmax(logits)[target]` w.r.t. the logits:
/// `softmax(logits) - onehot(target)`, scaled by `weight`.
pub fn nll_logit_gradient(logits: &[f64], target: usize, weight: f64) -> Vec<f64> {
    let mut grad = softmax(logits);
    grad[target] -= 1.0;
    grad.iter_mut().for_each(|g| *g *= weight);
    grad
}

/// Index of the largest value. Ties go to the lowest index and NaN never wins.
/// Returns 0 for an empty slice.
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    let mut best_value = f64::NEG_INFINITY;
    for (i, &v) in values.iter().enumerate() {
        if v > best_value {
            best = i;
            best_value = v;
        }
    }
    best
}
