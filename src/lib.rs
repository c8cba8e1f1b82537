pub mod error;
pub mod math;
pub mod cluster;
pub mod layers;
pub mod loss;
pub mod io;
pub mod optim;
pub mod train;

// Convenience re-exports
pub use error::{Error, Result};
pub use math::matrix::Matrix;
pub use cluster::partition::ClusterPartition;
pub use layers::projection::{ProjectionBank, TailProjection};
pub use loss::adaptive_softmax::{AdaptiveSoftmaxGradients, AdaptiveSoftmaxLoss};
pub use loss::config::AdaptiveSoftmaxConfig;
pub use loss::loss::Loss;
pub use loss::reduction::{LossValue, ReduceMode};
pub use io::checkpoint::Checkpoint;
pub use optim::sgd::Sgd;
pub use train::{evaluate, train_loop, train_step, TrainConfig};
