use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::cluster::partition::ClusterPartition;
use crate::error::{Error, Result};
use crate::math::matrix::Matrix;

/// Low-rank projection for one tail cluster: `x · down · up`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TailProjection {
    /// `[input_size, reduced_dim]`
    pub down: Matrix,
    /// `[reduced_dim, cluster_size]`
    pub up: Matrix,
}

impl TailProjection {
    pub fn reduced_dim(&self) -> usize {
        self.down.cols
    }

    /// Returns `(hidden, logits)`; the hidden activation is kept for backprop.
    pub fn forward(&self, x: &Matrix) -> (Matrix, Matrix) {
        let hidden = x * &self.down;
        let logits = &hidden * &self.up;
        (hidden, logits)
    }
}

/// Gradients for every parameter of a [`ProjectionBank`]. A tail that took
/// no part in the forward pass has `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionGradients {
    pub head: Matrix,
    pub tails: Vec<Option<TailProjection>>,
}

/// Owns the head projection and the per-tail low-rank projection pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionBank {
    pub input_size: usize,
    /// `[input_size, head_output_width]`
    pub head: Matrix,
    /// Indexed by tail cluster `i` at `tails[i - 1]`.
    pub tails: Vec<TailProjection>,
}

/// `floor(input_size / div_value^i)` for tail cluster `i` (1-based).
pub fn reduced_dim(input_size: usize, div_value: f64, tail: usize) -> usize {
    (input_size as f64 / div_value.powi(tail as i32)).floor() as usize
}

/// Shapes every parameter must have, as `(head, [(down, up)])`.
fn expected_shapes(
    input_size: usize,
    partition: &ClusterPartition,
    div_value: f64,
) -> Result<((usize, usize), Vec<((usize, usize), (usize, usize))>)> {
    if input_size == 0 {
        return Err(Error::Configuration("input_size must be positive".into()));
    }
    // Below 1 the tail widths would grow past input_size instead of decaying.
    if !div_value.is_finite() || div_value < 1.0 {
        return Err(Error::Configuration(format!(
            "div_value must be a finite number >= 1, got {}",
            div_value
        )));
    }

    let head = (input_size, partition.head_output_width());
    let mut tails = Vec::with_capacity(partition.num_tails());
    for cluster in 1..partition.num_clusters() {
        let dim = reduced_dim(input_size, div_value, cluster);
        if dim < 1 {
            return Err(Error::Configuration(format!(
                "tail cluster {} has reduced dimension floor({} / {}^{}) = 0",
                cluster, input_size, div_value, cluster
            )));
        }
        tails.push(((input_size, dim), (dim, partition.cluster_len(cluster))));
    }
    Ok((head, tails))
}

fn check_shape(context: &str, m: &Matrix, expected: (usize, usize)) -> Result<()> {
    if m.shape() != expected || !m.is_rectangular() {
        return Err(Error::shape(
            context,
            format!("{}x{}", expected.0, expected.1),
            format!("{}x{}", m.rows, m.cols),
        ));
    }
    Ok(())
}

impl ProjectionBank {
    pub fn new(input_size: usize, partition: &ClusterPartition, div_value: f64) -> Result<ProjectionBank> {
        let mut rng = rand::thread_rng();
        ProjectionBank::new_with_rng(&mut rng, input_size, partition, div_value)
    }

    /// Builds a bank with every matrix drawn by Kaiming-uniform fan-in scaling.
    pub fn new_with_rng<R: Rng + ?Sized>(
        rng: &mut R,
        input_size: usize,
        partition: &ClusterPartition,
        div_value: f64,
    ) -> Result<ProjectionBank> {
        let (head_shape, tail_shapes) = expected_shapes(input_size, partition, div_value)?;

        let head = Matrix::kaiming_uniform_with(rng, head_shape.0, head_shape.1, head_shape.0);
        let tails = tail_shapes
            .into_iter()
            .map(|(down, up)| TailProjection {
                down: Matrix::kaiming_uniform_with(rng, down.0, down.1, down.0),
                up: Matrix::kaiming_uniform_with(rng, up.0, up.1, up.0),
            })
            .collect();

        Ok(ProjectionBank { input_size, head, tails })
    }

    /// Wraps explicitly supplied weights after checking each against the
    /// shape derived from `(input_size, partition, div_value)`.
    pub fn from_parameters(
        input_size: usize,
        partition: &ClusterPartition,
        div_value: f64,
        head: Matrix,
        tails: Vec<TailProjection>,
    ) -> Result<ProjectionBank> {
        let (head_shape, tail_shapes) = expected_shapes(input_size, partition, div_value)?;

        check_shape("head projection", &head, head_shape)?;
        if tails.len() != tail_shapes.len() {
            return Err(Error::shape("tail projection count", tail_shapes.len(), tails.len()));
        }
        for (i, (tail, (down, up))) in tails.iter().zip(tail_shapes).enumerate() {
            check_shape(&format!("tail {} down projection", i + 1), &tail.down, down)?;
            check_shape(&format!("tail {} up projection", i + 1), &tail.up, up)?;
        }

        Ok(ProjectionBank { input_size, head, tails })
    }

    pub fn head_logits(&self, x: &Matrix) -> Matrix {
        x * &self.head
    }

    pub fn tail(&self, cluster: usize) -> &TailProjection {
        &self.tails[cluster - 1]
    }

    pub fn num_parameters(&self) -> usize {
        let head = self.head.rows * self.head.cols;
        let tails: usize = self
            .tails
            .iter()
            .map(|t| t.down.rows * t.down.cols + t.up.rows * t.up.cols)
            .sum();
        head + tails
    }

    /// Applies pre-computed gradients scaled by lr. Tails whose gradient is
    /// `None` are left untouched.
    pub fn apply_gradients(&mut self, grads: &ProjectionGradients, lr: f64) -> Result<()> {
        check_shape("head gradient", &grads.head, self.head.shape())?;
        if grads.tails.len() != self.tails.len() {
            return Err(Error::shape("tail gradient count", self.tails.len(), grads.tails.len()));
        }
        for (i, (tail, grad)) in self.tails.iter().zip(grads.tails.iter()).enumerate() {
            if let Some(grad) = grad {
                check_shape(&format!("tail {} down gradient", i + 1), &grad.down, tail.down.shape())?;
                check_shape(&format!("tail {} up gradient", i + 1), &grad.up, tail.up.shape())?;
            }
        }

        self.head = &self.head - &grads.head.map(|x| x * lr);
        for (tail, grad) in self.tails.iter_mut().zip(grads.tails.iter()) {
            if let Some(grad) = grad {
                tail.down = &tail.down - &grad.down.map(|x| x * lr);
                tail.up = &tail.up - &grad.up.map(|x| x * lr);
            }
        }
        Ok(())
    }
}
