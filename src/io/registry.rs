//! Process-wide map from a stable type tag to the decoder for that loss type.
//!
//! The map is built once on first use and is read-only afterwards.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use tracing::debug;

use crate::error::{Error, Result};
use crate::io::checkpoint::{AdaptiveSoftmaxState, Checkpoint};
use crate::loss::loss::Loss;

pub type DecodeFn = fn(Checkpoint) -> Result<Box<dyn Loss>>;

fn decode_adaptive_softmax(checkpoint: Checkpoint) -> Result<Box<dyn Loss>> {
    Ok(Box::new(checkpoint.into_adaptive_softmax()?))
}

static REGISTRY: Lazy<HashMap<&'static str, DecodeFn>> = Lazy::new(|| {
    let mut map: HashMap<&'static str, DecodeFn> = HashMap::new();
    map.insert(AdaptiveSoftmaxState::TYPE_TAG, decode_adaptive_softmax);
    debug!(types = ?map.keys().collect::<Vec<_>>(), "loss registry initialized");
    map
});

pub fn registered_tags() -> Vec<&'static str> {
    let mut tags: Vec<_> = REGISTRY.keys().copied().collect();
    tags.sort_unstable();
    tags
}

/// Decodes any registered loss type from its checkpoint.
pub fn decode_loss(checkpoint: Checkpoint) -> Result<Box<dyn Loss>> {
    let decode = REGISTRY
        .get(checkpoint.type_tag.as_str())
        .ok_or_else(|| Error::UnknownTypeTag(checkpoint.type_tag.clone()))?;
    decode(checkpoint)
}

/// Loads any registered loss type from a JSON checkpoint file.
pub fn load_loss(path: &str) -> Result<Box<dyn Loss>> {
    decode_loss(Checkpoint::load_json(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loss::adaptive_softmax::AdaptiveSoftmaxLoss;

    #[test]
    fn decodes_registered_type() {
        let loss = AdaptiveSoftmaxLoss::new(16, vec![4, 8]).unwrap();
        let decoded = decode_loss(loss.encode().unwrap()).unwrap();
        assert_eq!(decoded.type_tag(), "adaptive_softmax_loss");
        assert_eq!(decoded.pretty_string(), loss.pretty_string());
    }

    #[test]
    fn unknown_tag_fails() {
        let cp = Checkpoint {
            type_tag: "conv2d".into(),
            version: 1,
            payload: serde_json::Value::Null,
        };
        assert!(matches!(decode_loss(cp), Err(Error::UnknownTypeTag(tag)) if tag == "conv2d"));
    }

    #[test]
    fn lists_tags() {
        assert_eq!(registered_tags(), vec!["adaptive_softmax_loss"]);
    }
}
