use adasoft::io::registry::load_loss;
use adasoft::{AdaptiveSoftmaxConfig, AdaptiveSoftmaxLoss, Checkpoint, Error, Loss, Matrix, ReduceMode};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::tempdir;

fn trained_loss() -> AdaptiveSoftmaxLoss {
    let mut rng = StdRng::seed_from_u64(99);
    let mut loss = AdaptiveSoftmaxLoss::with_rng(&mut rng, 16, vec![3, 8, 20], 2.0, ReduceMode::Sum).unwrap();
    let x = Matrix::kaiming_uniform_with(&mut rng, 4, 16, 1);
    loss.forward(&x, &[0, 4, 19, 7]).unwrap();
    let grads = loss.compute_gradients().unwrap();
    loss.apply_gradients(&grads, 0.1).unwrap();
    loss
}

#[test]
fn save_and_load_restores_identical_predictions() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("asm.json");
    let path = path.to_str().unwrap();

    let loss = trained_loss();
    loss.save_json(path).unwrap();
    let restored = AdaptiveSoftmaxLoss::load_json(path).unwrap();

    assert_eq!(restored.partition().cutoffs(), &[3, 8, 20]);
    assert_eq!(restored.reduction(), ReduceMode::Sum);
    assert_eq!(restored.div_value(), 2.0);
    assert_eq!(restored.projections(), loss.projections());

    let x = Matrix::kaiming_uniform_with(&mut StdRng::seed_from_u64(1), 3, 16, 1);
    assert_eq!(restored.predict(&x).unwrap(), loss.predict(&x).unwrap());
}

#[test]
fn registry_loads_polymorphically() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("loss.json");
    let path = path.to_str().unwrap();

    let loss = trained_loss();
    loss.save_json(path).unwrap();

    let mut decoded = load_loss(path).unwrap();
    assert_eq!(decoded.type_tag(), "adaptive_softmax_loss");
    assert_eq!(decoded.pretty_string(), loss.pretty_string());

    let x = Matrix::zeros(2, 16);
    let value = decoded.forward(&x, &[1, 10]).unwrap();
    assert!(value.scalar().unwrap().is_finite());
}

#[test]
fn unknown_tag_on_disk_is_reported() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("other.json");
    let path = path.to_str().unwrap();

    let cp = Checkpoint { type_tag: "linear".into(), version: 1, payload: serde_json::json!({}) };
    cp.save_json(path).unwrap();
    assert!(matches!(load_loss(path), Err(Error::UnknownTypeTag(_))));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nope.json");
    assert!(matches!(AdaptiveSoftmaxLoss::load_json(path.to_str().unwrap()), Err(Error::Io(_))));
}

#[test]
fn config_round_trips_through_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    let path = path.to_str().unwrap();

    let mut cfg = AdaptiveSoftmaxConfig::new(64, vec![5, 50, 100]);
    cfg.reduction = ReduceMode::None;
    cfg.save_json(path).unwrap();

    let loaded = AdaptiveSoftmaxConfig::load_json(path).unwrap();
    assert_eq!(loaded, cfg);
    let loss = loaded.build().unwrap();
    assert_eq!(loss.reduction(), ReduceMode::None);
    assert_eq!(loss.projections().tails[1].reduced_dim(), 4);
}
