// Minimal binary: builds an adaptive softmax loss and prints its summary.
// All logic lives in the library (src/lib.rs and its modules).
//   cargo run -- path/to/config.json
//   cargo run --example zipf
use adasoft::io::registry::registered_tags;
use adasoft::{AdaptiveSoftmaxConfig, Loss};
use tracing::{error, info};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!(types = ?registered_tags(), "registered loss types");

    let config = match std::env::args().nth(1) {
        Some(path) => match AdaptiveSoftmaxConfig::load_json(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                error!(%path, error = %e, "failed to read config");
                std::process::exit(1);
            }
        },
        None => AdaptiveSoftmaxConfig::new(64, vec![5, 50, 100]),
    };

    match config.build() {
        Ok(loss) => println!("{}", Loss::pretty_string(&loss)),
        Err(e) => {
            error!(error = %e, "failed to build adaptive softmax loss");
            std::process::exit(1);
        }
    }
}
