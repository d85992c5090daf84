//! Representational geodesics between two images.
//!
//! Given a differentiable model `f` and two images `A`, `B`, find the
//! sequence `x[0] = A, x[1], ..., x[N] = B` whose representations
//! `f(x[i])` form the shortest discrete path, i.e. minimize
//! `Σ ‖f(x[i+1]) - f(x[i])‖²` over the interior frames.
//!
//! Layout
//! - `tensor`: dense image/representation container.
//! - `model`: the `Model` trait (forward + vjp) and a few built-in models.
//! - `path`: endpoint-pinned path, initializers, straightness diagnostics.
//! - `energy`: loss, gradients, step energy, jerkiness.
//! - `update`: first-order update rules and learning-rate decay.
//! - `monitor`: stop criterion, state machine, history.
//! - `optimizer`: the `GeodesicOptimizer` driver plus checkpoint/resume.

pub mod api;
pub mod cfg;
pub mod energy;
pub mod error;
pub mod model;
pub mod monitor;
pub mod optimizer;
pub mod path;
pub mod tensor;
pub mod update;

/// Library version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use cfg::GeodesicCfg;
pub use error::{GeodesicError, ModelError};
pub use model::Model;
pub use optimizer::{Checkpoint, GeodesicOptimizer};
pub use tensor::Tensor;

/// Common exports for callers that just want to run an optimization.
pub mod prelude {
    pub use crate::cfg::GeodesicCfg;
    pub use crate::energy::{EnergyNorm, RangePenalty};
    pub use crate::error::{GeodesicError, ModelError};
    pub use crate::model::{Chain, Identity, Linear, Model, Normalize, Tanh};
    pub use crate::monitor::{OptimizerState, PixelChangeTol, StopCriterion};
    pub use crate::optimizer::{Checkpoint, GeodesicOptimizer};
    pub use crate::path::Initializer;
    pub use crate::tensor::Tensor;
    pub use crate::update::{StepDecay, UpdateRuleKind};
}
