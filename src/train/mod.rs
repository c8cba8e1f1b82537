pub mod epoch_stats;
pub mod evaluate;
pub mod loop_fn;
pub mod step;
pub mod train_config;

pub use epoch_stats::EpochStats;
pub use evaluate::{evaluate, Evaluation};
pub use loop_fn::train_loop;
pub use step::train_step;
pub use train_config::TrainConfig;
