//! Curated surface for the CLI and experiment scripts (UNSTABLE).
//!
//! Everything a driver needs in one `use`; breaking changes are allowed.

// Core types
pub use crate::cfg::GeodesicCfg;
pub use crate::error::{GeodesicError, ModelError};
pub use crate::tensor::{sequence_norm, Tensor};
// Models
pub use crate::model::{Chain, Identity, Linear, Model, Normalize, Tanh};
// Paths and straightness
pub use crate::path::{
    deviation_from_line, make_straight_line, sample_brownian_bridge, translation_sequence,
    unwrap_angles, Initializer, LineDeviation, Path,
};
// Objective
pub use crate::energy::{
    evaluate, jerkiness, sequence_loss, step_energies, EnergyNorm, Evaluation, Objective,
    RangePenalty,
};
// Updates
pub use crate::update::{Adam, GradientDescent, Momentum, StepDecay, UpdateRule, UpdateRuleKind};
// Monitoring and driver
pub use crate::monitor::{
    auto_pixel_tol, ConvergenceMonitor, Diagnostics, History, OptimizerState, PixelChangeTol,
    ProgressRecord, StopCriterion,
};
pub use crate::optimizer::{Checkpoint, GeodesicOptimizer, RunOutcome, StepOutcome};
