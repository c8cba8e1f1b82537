use crate::error::Result;
use crate::io::checkpoint::Checkpoint;
use crate::loss::reduction::LossValue;
use crate::math::matrix::Matrix;

/// Capability set every loss in the crate offers.
///
/// Object safe, so decoded checkpoints can be handed back as `Box<dyn Loss>`.
pub trait Loss: std::fmt::Debug {
    /// Computes the loss of `inputs` (one row per example) against integer
    /// class `targets`.
    fn forward(&mut self, inputs: &Matrix, targets: &[usize]) -> Result<LossValue>;

    fn pretty_string(&self) -> String;

    /// Stable tag under which the decoder for this type is registered.
    fn type_tag(&self) -> &'static str;

    fn encode(&self) -> Result<Checkpoint>;
}
