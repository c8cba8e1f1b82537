//! Trains an adaptive softmax on synthetic Zipf-distributed classes.
//!
//!   RUST_LOG=adasoft=debug cargo run --example zipf

use adasoft::{evaluate, train_loop, AdaptiveSoftmaxLoss, Matrix, ReduceMode, Sgd, TrainConfig};
use rand::prelude::*;
use rand::rngs::StdRng;

const NUM_CLASSES: usize = 200;
const INPUT_SIZE: usize = 32;
const SAMPLES: usize = 2000;

/// Draws a class id with probability proportional to 1 / (rank + 1).
fn sample_zipf(rng: &mut StdRng, cdf: &[f64]) -> usize {
    let u: f64 = rng.gen();
    cdf.partition_point(|&c| c < u).min(NUM_CLASSES - 1)
}

fn main() -> adasoft::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let mut rng = StdRng::seed_from_u64(2017);

    let weights: Vec<f64> = (0..NUM_CLASSES).map(|r| 1.0 / (r as f64 + 1.0)).collect();
    let total: f64 = weights.iter().sum();
    let cdf: Vec<f64> = weights
        .iter()
        .scan(0.0, |acc, w| {
            *acc += w / total;
            Some(*acc)
        })
        .collect();

    // Each class owns a random prototype; examples are noisy copies of it.
    let prototypes: Vec<Vec<f64>> = (0..NUM_CLASSES)
        .map(|_| (0..INPUT_SIZE).map(|_| rng.gen_range(-1.0..1.0)).collect())
        .collect();

    let targets: Vec<usize> = (0..SAMPLES).map(|_| sample_zipf(&mut rng, &cdf)).collect();
    let inputs = Matrix::from_data(
        targets
            .iter()
            .map(|&c| prototypes[c].iter().map(|x| x + rng.gen_range(-0.2_f64..0.2)).collect())
            .collect(),
    );

    let split = SAMPLES * 9 / 10;
    let train_idx: Vec<usize> = (0..split).collect();
    let val_idx: Vec<usize> = (split..SAMPLES).collect();
    let (train_x, val_x) = (inputs.select_rows(&train_idx), inputs.select_rows(&val_idx));
    let (train_y, val_y) = (&targets[..split], &targets[split..]);

    let mut loss = AdaptiveSoftmaxLoss::with_rng(
        &mut rng,
        INPUT_SIZE,
        vec![10, 50, NUM_CLASSES],
        2.0,
        ReduceMode::Mean,
    )?;
    println!("{}", loss.pretty_string());

    let config = TrainConfig::new(20, 32);
    let last = train_loop(&mut loss, &train_x, train_y, Some(&val_x), Some(val_y), &Sgd::new(0.5), &config)?;

    let eval = evaluate(&loss, &val_x, val_y)?;
    println!("final train loss = {last:.4}");
    println!("validation nll   = {:.4}, accuracy = {:.2}%", eval.mean_nll, eval.accuracy * 100.0);
    Ok(())
}
