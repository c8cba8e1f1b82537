use serde::{Serialize, Deserialize};

use crate::error::{Error, Result};
use crate::layers::projection::TailProjection;
use crate::loss::adaptive_softmax::AdaptiveSoftmaxLoss;
use crate::loss::reduction::ReduceMode;
use crate::math::matrix::Matrix;

/// Persisted form of an [`AdaptiveSoftmaxLoss`].
///
/// `input_size` is not stored; it is the number of rows of `head`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveSoftmaxState {
    pub cutoffs: Vec<usize>,
    pub reduction: ReduceMode,
    pub div_value: f64,
    pub head: Matrix,
    pub tails: Vec<TailProjection>,
}

impl AdaptiveSoftmaxState {
    pub const TYPE_TAG: &'static str = "adaptive_softmax_loss";
    pub const VERSION: u32 = 1;
}

/// Versioned, type-tagged envelope around a loss payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub type_tag: String,
    pub version: u32,
    pub payload: serde_json::Value,
}

impl Checkpoint {
    pub fn from_adaptive_softmax(loss: &AdaptiveSoftmaxLoss) -> Result<Checkpoint> {
        Ok(Checkpoint {
            type_tag: AdaptiveSoftmaxState::TYPE_TAG.to_string(),
            version: AdaptiveSoftmaxState::VERSION,
            payload: serde_json::to_value(loss.to_state())?,
        })
    }

    /// Decodes the payload as an adaptive softmax loss, checking tag and version.
    pub fn into_adaptive_softmax(self) -> Result<AdaptiveSoftmaxLoss> {
        if self.type_tag != AdaptiveSoftmaxState::TYPE_TAG {
            return Err(Error::UnknownTypeTag(self.type_tag));
        }
        if self.version != AdaptiveSoftmaxState::VERSION {
            return Err(Error::UnsupportedVersion { tag: self.type_tag, version: self.version });
        }
        let state: AdaptiveSoftmaxState = serde_json::from_value(self.payload)?;
        AdaptiveSoftmaxLoss::from_state(state)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Checkpoint> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serializes the checkpoint to a pretty-printed JSON file.
    pub fn save_json(&self, path: &str) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes a checkpoint from a JSON file previously written by `save_json`.
    pub fn load_json(path: &str) -> Result<Checkpoint> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}
