pub mod projection;

pub use projection::{ProjectionBank, ProjectionGradients, TailProjection};
