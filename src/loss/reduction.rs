use serde::{Serialize, Deserialize};

/// How per-example negative log-likelihoods are combined.
///
/// - `None`: return the per-example vector unchanged.
/// - `Sum`:  sum over the batch.
/// - `Mean`: sum divided by the batch size (0.0 for an empty batch).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReduceMode {
    None,
    Sum,
    #[default]
    Mean,
}

/// Output of a loss forward pass.
#[derive(Debug, Clone, PartialEq)]
pub enum LossValue {
    Scalar(f64),
    PerExample(Vec<f64>),
}

impl LossValue {
    /// The scalar, or `None` for an unreduced loss.
    pub fn scalar(&self) -> Option<f64> {
        match self {
            LossValue::Scalar(v) => Some(*v),
            LossValue::PerExample(_) => None,
        }
    }

    /// Sum of all entries; equals the scalar for reduced losses.
    pub fn total(&self) -> f64 {
        match self {
            LossValue::Scalar(v) => *v,
            LossValue::PerExample(v) => v.iter().sum(),
        }
    }

    pub fn is_finite(&self) -> bool {
        match self {
            LossValue::Scalar(v) => v.is_finite(),
            LossValue::PerExample(v) => v.iter().all(|x| x.is_finite()),
        }
    }
}

impl ReduceMode {
    pub fn reduce(self, per_example: Vec<f64>) -> LossValue {
        match self {
            ReduceMode::None => LossValue::PerExample(per_example),
            ReduceMode::Sum => LossValue::Scalar(per_example.iter().sum()),
            ReduceMode::Mean => {
                if per_example.is_empty() {
                    LossValue::Scalar(0.0)
                } else {
                    LossValue::Scalar(per_example.iter().sum::<f64>() / per_example.len() as f64)
                }
            }
        }
    }

    /// d(reduced)/d(per_example[i]), identical for every example.
    pub fn example_weight(self, batch_size: usize) -> f64 {
        match self {
            ReduceMode::Mean if batch_size > 0 => 1.0 / batch_size as f64,
            _ => 1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReduceMode::None => "none",
            ReduceMode::Sum => "sum",
            ReduceMode::Mean => "mean",
        }
    }
}
