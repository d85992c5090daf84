//! Convergence monitoring and optimization history.
//!
//! State machine
//! - `Running` → `Converged` once the stop criterion has held for `patience`
//!   consecutive iterations.
//! - `Running` → `MaxIterReached` once the iteration count hits the cap.
//! - Both targets are terminal. If both fire on the same iteration,
//!   `Converged` wins.
//!
//! No stopping rule is known to certify a geodesic; the criterion is a
//! configurable heuristic (pixel change and/or relative loss decrease).

use crate::error::GeodesicError;
use crate::path::LineDeviation;

/// Optimizer lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OptimizerState {
    Running,
    Converged,
    MaxIterReached,
}

impl OptimizerState {
    #[inline]
    pub fn is_terminal(self) -> bool {
        !matches!(self, OptimizerState::Running)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OptimizerState::Running => "running",
            OptimizerState::Converged => "converged",
            OptimizerState::MaxIterReached => "max-iter-reached",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(OptimizerState::Running),
            "converged" => Some(OptimizerState::Converged),
            "max-iter-reached" => Some(OptimizerState::MaxIterReached),
            _ => None,
        }
    }
}

/// Threshold on the norm of the pixel change between iterations.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum PixelChangeTol {
    /// `‖pixelfade‖ / 1e4 · φ` (golden ratio), fixed at construction.
    #[default]
    Auto,
    Fixed(f64),
    Off,
}

/// When to declare convergence.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StopCriterion {
    /// Quiet if `pixel_change_norm < tol`.
    pub pixel_change: PixelChangeTol,
    /// Quiet if `0 <= (loss_prev - loss) / max(|loss_prev|, tiny) < tol`.
    pub relative_decrease: Option<f64>,
    /// Consecutive quiet iterations required.
    pub patience: usize,
}

impl Default for StopCriterion {
    fn default() -> Self {
        Self {
            pixel_change: PixelChangeTol::Auto,
            relative_decrease: None,
            patience: 50,
        }
    }
}

impl StopCriterion {
    pub fn validate(&self) -> Result<(), GeodesicError> {
        if self.patience == 0 {
            return Err(GeodesicError::invalid("stop patience must be positive"));
        }
        if let PixelChangeTol::Fixed(tol) = self.pixel_change {
            if !(tol.is_finite() && tol >= 0.0) {
                return Err(GeodesicError::invalid(
                    "pixel change tolerance must be finite and non-negative",
                ));
            }
        }
        if let Some(tol) = self.relative_decrease {
            if !tol.is_finite() {
                return Err(GeodesicError::invalid(
                    "relative decrease tolerance must be finite",
                ));
            }
        }
        Ok(())
    }
}

const GOLDEN_RATIO: f64 = 1.618_033_988_749_895;
const REL_DENOM_FLOOR: f64 = 1e-300;

/// Default pixel-change tolerance for a given pixelfade norm.
pub fn auto_pixel_tol(pixelfade_norm: f64) -> f64 {
    pixelfade_norm / 1e4 * GOLDEN_RATIO
}

/// Tracks consecutive quiet iterations.
#[derive(Clone, Debug)]
pub struct ConvergenceMonitor {
    pixel_tol: Option<f64>,
    relative_tol: Option<f64>,
    patience: usize,
    quiet_streak: usize,
    last_loss: Option<f64>,
}

impl ConvergenceMonitor {
    /// `pixelfade_norm` resolves `PixelChangeTol::Auto`.
    pub fn new(criterion: &StopCriterion, pixelfade_norm: f64) -> Self {
        let pixel_tol = match criterion.pixel_change {
            PixelChangeTol::Auto => Some(auto_pixel_tol(pixelfade_norm)),
            PixelChangeTol::Fixed(tol) => Some(tol),
            PixelChangeTol::Off => None,
        };
        Self {
            pixel_tol,
            relative_tol: criterion.relative_decrease,
            patience: criterion.patience.max(1),
            quiet_streak: 0,
            last_loss: None,
        }
    }

    /// Effective pixel-change tolerance (None when disabled).
    pub fn pixel_tol(&self) -> Option<f64> {
        self.pixel_tol
    }

    pub fn quiet_streak(&self) -> usize {
        self.quiet_streak
    }

    /// Restore the streak from a recorded history (used on resume).
    ///
    /// Returns whether the criterion held after the last recorded iteration.
    pub fn replay(&mut self, losses: &[f64], pixel_changes: &[f64]) -> bool {
        self.quiet_streak = 0;
        self.last_loss = None;
        let mut converged = false;
        for (&loss, &pc) in losses.iter().zip(pixel_changes) {
            converged = self.observe(loss, pc);
        }
        converged
    }

    /// Record one iteration; returns true once the streak reaches `patience`.
    pub fn observe(&mut self, loss: f64, pixel_change: f64) -> bool {
        let pixel_quiet = self.pixel_tol.is_some_and(|tol| pixel_change < tol);
        let rel_quiet = match (self.relative_tol, self.last_loss) {
            (Some(tol), Some(prev)) => {
                // A growing loss is never quiet, however small the growth.
                let rel = (prev - loss) / prev.abs().max(REL_DENOM_FLOOR);
                (0.0..tol).contains(&rel)
            }
            _ => false,
        };
        self.last_loss = Some(loss);
        if pixel_quiet || rel_quiet {
            self.quiet_streak += 1;
        } else {
            self.quiet_streak = 0;
        }
        self.quiet_streak >= self.patience
    }
}

/// Snapshot of stored progress at one iteration.
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressRecord {
    pub iteration: usize,
    /// Per-transition squared representation distances.
    pub step_energy: Vec<f64>,
    /// Representation deviation from the line joining the endpoint representations.
    pub deviation: LineDeviation,
}

/// Append-only diagnostics, one entry per completed iteration.
///
/// `losses[i]`, `energies[i]` and `gradient_norms[i]` describe the path at
/// the start of iteration `i`; `pixel_change_norms[i]` is the size of the
/// update applied during iteration `i`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct History {
    pub losses: Vec<f64>,
    pub energies: Vec<f64>,
    pub gradient_norms: Vec<f64>,
    pub pixel_change_norms: Vec<f64>,
    pub learning_rates: Vec<f64>,
    pub progress: Vec<ProgressRecord>,
}

impl History {
    #[inline]
    pub fn len(&self) -> usize {
        self.losses.len()
    }
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.losses.is_empty()
    }

    pub(crate) fn push(&mut self, d: &Diagnostics) {
        self.losses.push(d.loss);
        self.energies.push(d.energy);
        self.gradient_norms.push(d.gradient_norm);
        self.pixel_change_norms.push(d.pixel_change_norm);
        self.learning_rates.push(d.learning_rate);
    }

    /// All per-iteration columns have the same length.
    pub fn is_consistent(&self) -> bool {
        let n = self.losses.len();
        self.energies.len() == n
            && self.gradient_norms.len() == n
            && self.pixel_change_norms.len() == n
            && self.learning_rates.len() == n
    }
}

/// What one iteration measured.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Diagnostics {
    pub iteration: usize,
    pub loss: f64,
    pub energy: f64,
    pub gradient_norm: f64,
    pub pixel_change_norm: f64,
    /// Learning rate used for this iteration's update.
    pub learning_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_criterion_needs_consecutive_quiet_steps() {
        let crit = StopCriterion {
            pixel_change: PixelChangeTol::Fixed(0.1),
            relative_decrease: None,
            patience: 3,
        };
        let mut mon = ConvergenceMonitor::new(&crit, 1.0);
        assert!(!mon.observe(1.0, 0.05));
        assert!(!mon.observe(1.0, 0.05));
        // Transient spike resets the streak.
        assert!(!mon.observe(1.0, 0.5));
        assert!(!mon.observe(1.0, 0.05));
        assert!(!mon.observe(1.0, 0.05));
        assert!(mon.observe(1.0, 0.05));
    }

    #[test]
    fn zero_change_is_quiet_only_for_positive_tol() {
        let strict = StopCriterion {
            pixel_change: PixelChangeTol::Fixed(0.0),
            relative_decrease: None,
            patience: 1,
        };
        assert!(!ConvergenceMonitor::new(&strict, 1.0).observe(1.0, 0.0));
        let loose = StopCriterion {
            pixel_change: PixelChangeTol::Fixed(1e-12),
            ..strict
        };
        assert!(ConvergenceMonitor::new(&loose, 1.0).observe(1.0, 0.0));
    }

    #[test]
    fn relative_decrease_criterion() {
        let crit = StopCriterion {
            pixel_change: PixelChangeTol::Off,
            relative_decrease: Some(1e-3),
            patience: 2,
        };
        let mut mon = ConvergenceMonitor::new(&crit, 1.0);
        // First observation has no predecessor.
        assert!(!mon.observe(10.0, 1.0));
        assert!(!mon.observe(5.0, 1.0)); // 50% drop
        assert!(!mon.observe(4.9999, 1.0)); // quiet #1
        assert!(mon.observe(4.9998, 1.0)); // quiet #2
        assert_eq!(mon.pixel_tol(), None);
    }

    #[test]
    fn growing_loss_never_converges_on_relative_decrease() {
        let crit = StopCriterion {
            pixel_change: PixelChangeTol::Off,
            relative_decrease: Some(1e-3),
            patience: 3,
        };
        let mut mon = ConvergenceMonitor::new(&crit, 1.0);
        for loss in [20.0, 130.28, 1136.7, 10686.09, 1e5, 1e6] {
            assert!(!mon.observe(loss, 1.0));
            assert_eq!(mon.quiet_streak(), 0);
        }
        // A flat loss after growth is quiet again.
        assert!(!mon.observe(1e6, 1.0));
        assert_eq!(mon.quiet_streak(), 1);
    }

    #[test]
    fn auto_tolerance_and_replay() {
        let mon = ConvergenceMonitor::new(&StopCriterion::default(), 2.0);
        let tol = mon.pixel_tol().unwrap();
        assert!((tol - 2.0 / 1e4 * GOLDEN_RATIO).abs() < 1e-18);

        let crit = StopCriterion {
            pixel_change: PixelChangeTol::Fixed(0.1),
            relative_decrease: None,
            patience: 2,
        };
        let mut mon = ConvergenceMonitor::new(&crit, 1.0);
        assert!(mon.replay(&[1.0, 1.0, 1.0], &[0.5, 0.01, 0.01]));
        assert_eq!(mon.quiet_streak(), 2);
    }

    #[test]
    fn criterion_validation_and_state_names() {
        assert!(StopCriterion::default().validate().is_ok());
        let bad = StopCriterion {
            patience: 0,
            ..StopCriterion::default()
        };
        assert!(bad.validate().is_err());
        for s in [
            OptimizerState::Running,
            OptimizerState::Converged,
            OptimizerState::MaxIterReached,
        ] {
            assert_eq!(OptimizerState::parse(s.as_str()), Some(s));
        }
        assert!(!OptimizerState::Running.is_terminal());
        assert!(OptimizerState::Converged.is_terminal());
    }
}
