//! End-to-end behaviour of the adaptive softmax loss.

use adasoft::{AdaptiveSoftmaxLoss, Error, LossValue, Matrix, ReduceMode, Sgd};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn inputs(rows: usize, cols: usize, seed: u64) -> Matrix {
    let mut rng = StdRng::seed_from_u64(seed);
    Matrix::kaiming_uniform_with(&mut rng, rows, cols, 1)
}

#[test]
fn construction_derives_documented_shapes() {
    let loss = AdaptiveSoftmaxLoss::new(64, vec![5, 50, 100]).unwrap();
    let p = loss.partition();
    let bank = loss.projections();

    assert_eq!(p.head_output_width(), 7);
    assert_eq!(bank.head.shape(), (64, 7));
    assert_eq!(p.range(1), 5..50);
    assert_eq!(bank.tails[0].reduced_dim(), 16);
    assert_eq!(bank.tails[0].up.shape(), (16, 45));
    assert_eq!(p.range(2), 50..100);
    assert_eq!(bank.tails[1].reduced_dim(), 4);
    assert_eq!(bank.tails[1].up.shape(), (4, 50));
    assert_eq!(loss.div_value(), 4.0);
    assert_eq!(loss.reduction(), ReduceMode::Mean);
}

#[test]
fn non_ascending_cutoffs_fail() {
    let err = AdaptiveSoftmaxLoss::new(64, vec![5, 3, 10]).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}

#[test]
fn zero_reduced_dimension_fails() {
    // floor(64 / 4^4) = 0 for the fourth tail.
    let err = AdaptiveSoftmaxLoss::new(64, vec![2, 4, 6, 8, 10]).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}

#[test]
fn out_of_range_target_fails_and_records_nothing() {
    let mut loss = AdaptiveSoftmaxLoss::new(64, vec![5, 50, 100]).unwrap();
    loss.forward(&inputs(2, 64, 1), &[3, 60]).unwrap();
    assert!(loss.compute_gradients().is_ok());

    let err = loss.forward(&inputs(3, 64, 2), &[3, 7, 150]).unwrap_err();
    assert!(matches!(err, Error::InvalidTarget { target: 150, num_classes: 100 }));
    assert!(loss.last_trace().is_none());
    assert!(matches!(loss.compute_gradients(), Err(Error::MissingForward)));
}

#[test]
fn tiny_div_value_fails_instead_of_allocating() {
    let err = AdaptiveSoftmaxLoss::with_options(64, vec![5, 50], 1e-300, ReduceMode::Mean).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}

#[test]
fn absent_tail_cluster_is_untouched_by_a_training_step() {
    let mut rng = StdRng::seed_from_u64(3);
    let mut loss =
        AdaptiveSoftmaxLoss::with_rng(&mut rng, 64, vec![5, 50, 100], 4.0, ReduceMode::Mean).unwrap();
    let before = loss.projections().clone();

    // Head and tail 1 only.
    loss.forward(&inputs(4, 64, 2), &[0, 4, 10, 49]).unwrap();
    assert_eq!(loss.last_trace().unwrap().evaluated_tails(), vec![1]);

    let grads = loss.compute_gradients().unwrap();
    assert!(grads.params.tails[1].is_none());
    Sgd::new(0.1).step(&mut loss, &grads).unwrap();

    let after = loss.projections();
    assert_eq!(after.tails[1], before.tails[1]);
    assert_ne!(after.tails[0], before.tails[0]);
    assert_ne!(after.head, before.head);
}

#[test]
fn reduction_modes_agree() {
    let mut rng = StdRng::seed_from_u64(5);
    let mut loss =
        AdaptiveSoftmaxLoss::with_rng(&mut rng, 16, vec![4, 10, 20], 2.0, ReduceMode::None).unwrap();
    let x = inputs(6, 16, 8);
    let targets = [0, 5, 19, 3, 12, 9];

    let per_example = match loss.forward(&x, &targets).unwrap() {
        LossValue::PerExample(v) => v,
        other => panic!("expected per-example loss, got {:?}", other),
    };
    assert_eq!(per_example.len(), 6);

    loss.set_reduction(ReduceMode::Sum);
    let sum = loss.forward(&x, &targets).unwrap().scalar().unwrap();
    loss.set_reduction(ReduceMode::Mean);
    let mean = loss.forward(&x, &targets).unwrap().scalar().unwrap();

    assert!((sum - per_example.iter().sum::<f64>()).abs() < 1e-10);
    assert!((mean - sum / 6.0).abs() < 1e-10);
}

#[test]
fn log_prob_rows_are_distributions_and_predict_is_their_argmax() {
    let loss = AdaptiveSoftmaxLoss::new(32, vec![3, 10, 40]).unwrap();
    let x = inputs(5, 32, 13);
    let lp = loss.log_prob(&x).unwrap();
    assert_eq!(lp.shape(), (5, 40));

    for row in &lp.data {
        let total: f64 = row.iter().map(|v| v.exp()).sum();
        assert!((total - 1.0).abs() < 1e-4, "row sums to {}", total);
    }

    let predicted = loss.predict(&x).unwrap();
    assert_eq!(predicted.len(), 5);
    for (row, &class) in lp.data.iter().zip(predicted.iter()) {
        let best = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(row[class], best);
        assert!(row[..class].iter().all(|&v| v < best));
    }
}

#[test]
fn full_log_prob_checks_head_output_shape() {
    let loss = AdaptiveSoftmaxLoss::new(32, vec![3, 10, 40]).unwrap();
    let x = inputs(2, 32, 1);
    let err = loss.full_log_prob(&x, &Matrix::zeros(2, 4)).unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch { .. }));

    let head = loss.projections().head_logits(&x);
    assert_eq!(loss.full_log_prob(&x, &head).unwrap(), loss.log_prob(&x).unwrap());
}

#[test]
fn predict_breaks_ties_toward_lowest_class() {
    // All-zero weights give a uniform head and uniform tails.
    let head = Matrix::zeros(4, 3);
    let tails = vec![adasoft::TailProjection { down: Matrix::zeros(4, 2), up: Matrix::zeros(2, 3) }];
    let loss = AdaptiveSoftmaxLoss::from_parameters(vec![2, 5], 2.0, ReduceMode::Mean, head, tails).unwrap();
    let predicted = loss.predict(&inputs(3, 4, 21)).unwrap();
    assert_eq!(predicted, vec![0, 0, 0]);
}

#[test]
fn from_parameters_rejects_inconsistent_weights() {
    let head = Matrix::zeros(4, 3);
    let tails = vec![adasoft::TailProjection { down: Matrix::zeros(4, 2), up: Matrix::zeros(3, 3) }];
    let err = AdaptiveSoftmaxLoss::from_parameters(vec![2, 5], 2.0, ReduceMode::Mean, head, tails).unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch { .. }));
}
