pub mod adaptive_softmax;
pub mod config;
pub mod loss;
pub mod reduction;

pub use adaptive_softmax::{AdaptiveSoftmaxGradients, AdaptiveSoftmaxLoss, ForwardTrace};
pub use config::AdaptiveSoftmaxConfig;
pub use loss::Loss;
pub use reduction::{LossValue, ReduceMode};
