use serde::{Serialize, Deserialize};

use crate::error::Result;
use crate::loss::adaptive_softmax::{AdaptiveSoftmaxLoss, DEFAULT_DIV_VALUE};
use crate::loss::reduction::ReduceMode;

fn default_div_value() -> f64 {
    DEFAULT_DIV_VALUE
}

/// A serializable description of an adaptive softmax loss, independent of
/// its trained weights.
///
/// Fields:
/// - `input_size`: width of each input row (not the number of classes)
/// - `cutoffs`:    strictly ascending cluster bounds; the last is the class count
/// - `div_value`:  geometric shrink factor for tail projection widths (default 4)
/// - `reduction`:  `"none"`, `"sum"` or `"mean"` (default `"mean"`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveSoftmaxConfig {
    pub input_size: usize,
    pub cutoffs: Vec<usize>,
    #[serde(default = "default_div_value")]
    pub div_value: f64,
    #[serde(default)]
    pub reduction: ReduceMode,
}

impl AdaptiveSoftmaxConfig {
    pub fn new(input_size: usize, cutoffs: Vec<usize>) -> Self {
        AdaptiveSoftmaxConfig {
            input_size,
            cutoffs,
            div_value: DEFAULT_DIV_VALUE,
            reduction: ReduceMode::Mean,
        }
    }

    /// Builds a freshly initialized loss from this description.
    pub fn build(&self) -> Result<AdaptiveSoftmaxLoss> {
        AdaptiveSoftmaxLoss::with_options(
            self.input_size,
            self.cutoffs.clone(),
            self.div_value,
            self.reduction,
        )
    }

    /// Serializes the config to a pretty-printed JSON file.
    pub fn save_json(&self, path: &str) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes an `AdaptiveSoftmaxConfig` from a JSON file.
    pub fn load_json(path: &str) -> Result<AdaptiveSoftmaxConfig> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn defaults_fill_missing_fields() {
        let cfg: AdaptiveSoftmaxConfig =
            serde_json::from_str(r#"{ "input_size": 64, "cutoffs": [5, 50, 100] }"#).unwrap();
        assert_eq!(cfg, AdaptiveSoftmaxConfig::new(64, vec![5, 50, 100]));
        assert_eq!(cfg.div_value, 4.0);
        assert_eq!(cfg.reduction, ReduceMode::Mean);
    }

    #[test]
    fn build_surfaces_configuration_errors() {
        let cfg = AdaptiveSoftmaxConfig::new(64, vec![5, 3, 10]);
        assert!(matches!(cfg.build(), Err(Error::Configuration(_))));
    }
}
