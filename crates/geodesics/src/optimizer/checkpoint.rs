//! Snapshot and resume.
//!
//! A checkpoint carries the endpoints, full path, iteration count, state,
//! history and the objective value of the pixelfade. On resume the pixelfade
//! objective is recomputed with the caller's model; a relative mismatch above
//! `MODEL_CHECK_RTOL` means the model (or objective) changed and is rejected.
//! Update-rule buffers are not part of the snapshot and restart empty.

use super::GeodesicOptimizer;
use crate::cfg::GeodesicCfg;
use crate::error::GeodesicError;
use crate::model::Model;
use crate::monitor::{History, OptimizerState};
use crate::path::{bit_equal, Path};
use crate::tensor::Tensor;

const MODEL_CHECK_RTOL: f64 = 1e-2;
const MODEL_CHECK_ATOL: f64 = 1e-8;

/// Everything needed to continue an optimization later.
#[derive(Clone, Debug, PartialEq)]
pub struct Checkpoint {
    pub n_steps: usize,
    pub image_a: Tensor,
    pub image_b: Tensor,
    /// Full sequence `x[0..=N]`.
    pub path: Vec<Tensor>,
    pub iteration: usize,
    pub state: OptimizerState,
    pub history: History,
    /// Objective of the pixelfade under the model that produced this checkpoint.
    pub pixelfade_loss: f64,
}

impl Checkpoint {
    /// Reject a checkpoint taken for other endpoints or another path length.
    pub fn check_compatible(
        &self,
        image_a: &Tensor,
        image_b: &Tensor,
        n_steps: usize,
    ) -> Result<(), GeodesicError> {
        if self.n_steps != n_steps {
            return Err(GeodesicError::invalid(format!(
                "saved and requested n_steps differ ({} vs {n_steps})",
                self.n_steps
            )));
        }
        if !bit_equal(&self.image_a, image_a) {
            return Err(GeodesicError::invalid("saved and requested image_a differ"));
        }
        if !bit_equal(&self.image_b, image_b) {
            return Err(GeodesicError::invalid("saved and requested image_b differ"));
        }
        Ok(())
    }
}

impl<M: Model> GeodesicOptimizer<M> {
    pub fn checkpoint(&self) -> Result<Checkpoint, GeodesicError> {
        Ok(Checkpoint {
            n_steps: self.n_steps(),
            image_a: self.image_a().clone(),
            image_b: self.image_b().clone(),
            path: self.path(),
            iteration: self.iteration,
            state: self.state,
            history: self.history(),
            pixelfade_loss: self.objective_of(&self.pixelfade)?,
        })
    }

    /// Rebuild an optimizer from `checkpoint` with `model` and `cfg`.
    ///
    /// The state is re-derived: the stop criterion is replayed over the
    /// recorded history and the iteration cap comes from `cfg`, so a run that
    /// hit an earlier cap can continue under a larger one.
    pub fn resume(model: M, checkpoint: Checkpoint, cfg: &GeodesicCfg) -> Result<Self, GeodesicError> {
        cfg.validate()?;
        let Checkpoint {
            n_steps,
            image_a,
            image_b,
            path,
            iteration,
            state: _,
            history,
            pixelfade_loss,
        } = checkpoint;
        if !history.is_consistent() || history.len() != iteration {
            return Err(GeodesicError::invalid(format!(
                "checkpoint history has {} entries for {} iterations",
                history.len(),
                iteration
            )));
        }
        let path = Path::from_sequence(&image_a, &image_b, n_steps, path)?;

        let mut opt = Self::assemble(model, path, cfg)?;
        let current = opt.objective_of(&opt.pixelfade)?;
        if (current - pixelfade_loss).abs() > MODEL_CHECK_ATOL + MODEL_CHECK_RTOL * pixelfade_loss.abs() {
            return Err(GeodesicError::invalid(format!(
                "objective on pixelfade differs between checkpoint ({pixelfade_loss:e}) and \
                 current model ({current:e}); do they use the same model?"
            )));
        }

        let converged = opt
            .monitor
            .replay(&history.losses, &history.pixel_change_norms);
        if let Some(decay) = opt.lr_decay {
            for completed in 1..=iteration {
                decay.apply(opt.rule.as_mut(), completed);
            }
        }
        opt.iteration = iteration;
        opt.history = history;
        opt.state = if converged {
            OptimizerState::Converged
        } else if iteration >= opt.max_iterations {
            OptimizerState::MaxIterReached
        } else {
            OptimizerState::Running
        };
        Ok(opt)
    }
}
