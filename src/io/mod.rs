pub mod checkpoint;
pub mod registry;

pub use checkpoint::{AdaptiveSoftmaxState, Checkpoint};
pub use registry::{decode_loss, load_loss};
