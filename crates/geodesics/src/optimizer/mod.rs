//! Geodesic optimizer: owns the path and drives evaluate → update → monitor.
//!
//! Purpose
//! - Minimize the representational path energy between two fixed images by
//!   first-order updates of the free frames.
//! - Keep every iteration atomic: a step either commits path, history, rule
//!   state and counters together, or returns an error and commits nothing.
//!
//! Lifecycle
//! - `new` validates everything and starts in `Running`.
//! - `run_step` performs one iteration; `run` loops until a terminal state or
//!   its own iteration budget. Terminal states are sticky.
//! - `path`/`history` hand out owned snapshots.
//!
//! Concurrency
//! - Single-threaded by contract; steps depend on the previous step's path.
//!   The model is only borrowed immutably, so one model (e.g. `Arc<M>`) can
//!   serve several optimizers in different threads.

mod checkpoint;

pub use checkpoint::Checkpoint;

use tracing::{debug, info, warn};

use crate::cfg::GeodesicCfg;
use crate::energy::{self, Evaluation, Objective};
use crate::error::GeodesicError;
use crate::model::Model;
use crate::monitor::{
    ConvergenceMonitor, Diagnostics, History, OptimizerState, ProgressRecord,
};
use crate::path::{check_endpoints, deviation_from_line, make_straight_line, Path};
use crate::tensor::{sequence_norm, Tensor};
use crate::update::{StepDecay, UpdateRule};

/// Result of one `run_step` call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepOutcome {
    pub state: OptimizerState,
    /// `None` when no iteration was executed (terminal state, or nothing to optimize).
    pub diagnostics: Option<Diagnostics>,
}

/// Result of one `run` call.
#[derive(Clone, Debug)]
pub struct RunOutcome {
    pub state: OptimizerState,
    /// Iterations executed by this call.
    pub steps: usize,
    pub path: Vec<Tensor>,
    pub history: History,
}

/// Discrete geodesic between two images under `model`.
pub struct GeodesicOptimizer<M> {
    model: M,
    path: Path,
    pixelfade: Vec<Tensor>,
    objective: Objective,
    rule: Box<dyn UpdateRule>,
    lr_decay: Option<StepDecay>,
    monitor: ConvergenceMonitor,
    history: History,
    iteration: usize,
    max_iterations: usize,
    store_progress: usize,
    state: OptimizerState,
}

impl<M: Model> GeodesicOptimizer<M> {
    /// Build an optimizer with `n_steps` transitions between `image_a` and `image_b`.
    ///
    /// Fails with `InvalidConfiguration` for `n_steps < 1`, mismatched or
    /// non-finite endpoints, an invalid `cfg`, or a bad custom initial path.
    pub fn new(
        model: M,
        image_a: &Tensor,
        image_b: &Tensor,
        n_steps: usize,
        cfg: &GeodesicCfg,
    ) -> Result<Self, GeodesicError> {
        cfg.validate()?;
        check_endpoints(image_a, image_b, n_steps)?;
        if !(image_a.is_finite() && image_b.is_finite()) {
            return Err(GeodesicError::invalid("endpoint images must be finite"));
        }
        let path = cfg.initializer.build(image_a, image_b, n_steps)?;
        Self::assemble(model, path, cfg)
    }

    fn assemble(model: M, path: Path, cfg: &GeodesicCfg) -> Result<Self, GeodesicError> {
        let pixelfade = make_straight_line(path.start(), path.stop(), path.n_steps())?;
        let monitor = ConvergenceMonitor::new(&cfg.stop, sequence_norm(&pixelfade));
        let rule = cfg.update_rule.build(cfg.step_size);
        info!(
            n_steps = path.n_steps(),
            rule = rule.name(),
            step_size = cfg.step_size,
            pixel_tol = ?monitor.pixel_tol(),
            "geodesic optimizer ready"
        );
        Ok(Self {
            model,
            path,
            pixelfade,
            objective: cfg.objective(),
            rule,
            lr_decay: cfg.lr_decay,
            monitor,
            history: History::default(),
            iteration: 0,
            max_iterations: cfg.max_iterations,
            store_progress: cfg.store_progress,
            state: OptimizerState::Running,
        })
    }

    /// Swap in a custom update rule (before or between steps).
    pub fn with_update_rule(mut self, rule: Box<dyn UpdateRule>) -> Self {
        self.rule = rule;
        self
    }

    /// One iteration: evaluate, update the free frames, record, check stop.
    pub fn run_step(&mut self) -> Result<StepOutcome, GeodesicError> {
        if self.state.is_terminal() {
            return Ok(StepOutcome {
                state: self.state,
                diagnostics: None,
            });
        }
        if self.path.free().is_empty() {
            info!("path has no free frames; nothing to optimize");
            self.state = OptimizerState::Converged;
            return Ok(StepOutcome {
                state: self.state,
                diagnostics: None,
            });
        }

        let iteration = self.iteration;
        let ev = energy::evaluate(&self.model, &self.path, &self.objective)?;
        if !ev.loss.is_finite() {
            return Err(self.refuse(iteration, "loss"));
        }
        if ev.gradients.iter().any(|g| !g.is_finite()) {
            return Err(self.refuse(iteration, "gradient"));
        }

        let learning_rate = self.rule.learning_rate();
        let backup = self.rule.boxed_clone();
        let mut next = self.path.free().to_vec();
        self.rule.step(&mut next, &ev.gradients);
        if next.iter().any(|x| !x.is_finite()) {
            self.rule = backup;
            return Err(self.refuse(iteration, "update"));
        }
        let pixel_change_norm = next
            .iter()
            .zip(self.path.free())
            .map(|(new, old)| new.sub(old).norm_squared())
            .sum::<f64>()
            .sqrt();

        // Commit.
        if self.store_progress > 0 && iteration % self.store_progress == 0 {
            self.history.progress.push(progress_record(iteration, &ev));
        }
        self.path.replace_free(next);
        self.iteration += 1;
        let diagnostics = Diagnostics {
            iteration,
            loss: ev.loss,
            energy: ev.energy,
            gradient_norm: ev.gradient_norm(),
            pixel_change_norm,
            learning_rate,
        };
        self.history.push(&diagnostics);
        if let Some(decay) = &self.lr_decay {
            decay.apply(self.rule.as_mut(), self.iteration);
        }
        debug!(
            iteration,
            loss = diagnostics.loss,
            gradient_norm = diagnostics.gradient_norm,
            pixel_change_norm,
            "step"
        );

        let converged = self.monitor.observe(ev.loss, pixel_change_norm);
        self.state = if converged {
            info!(iteration, "pixel change has converged; stopping");
            OptimizerState::Converged
        } else if self.iteration >= self.max_iterations {
            info!(iterations = self.iteration, "max iterations reached");
            OptimizerState::MaxIterReached
        } else {
            OptimizerState::Running
        };
        Ok(StepOutcome {
            state: self.state,
            diagnostics: Some(diagnostics),
        })
    }

    fn refuse(&self, iteration: usize, quantity: &'static str) -> GeodesicError {
        warn!(iteration, quantity, "non-finite value; step refused");
        GeodesicError::NumericInstability {
            iteration,
            quantity,
        }
    }

    /// Step until a terminal state or `max_iterations` steps in this call.
    ///
    /// If the call budget runs out first the state stays `Running`; a later
    /// `run` continues from the same path, rule state and history.
    pub fn run(&mut self, max_iterations: usize) -> Result<RunOutcome, GeodesicError> {
        let before = self.history.len();
        for _ in 0..max_iterations {
            if self.run_step()?.state.is_terminal() {
                break;
            }
        }
        Ok(RunOutcome {
            state: self.state,
            steps: self.history.len() - before,
            path: self.path(),
            history: self.history(),
        })
    }

    /// Snapshot of the full sequence `x[0..=N]`.
    pub fn path(&self) -> Vec<Tensor> {
        self.path.to_vec()
    }

    /// Snapshot of the diagnostics so far.
    pub fn history(&self) -> History {
        self.history.clone()
    }

    #[inline]
    pub fn state(&self) -> OptimizerState {
        self.state
    }
    #[inline]
    pub fn iteration(&self) -> usize {
        self.iteration
    }
    #[inline]
    pub fn n_steps(&self) -> usize {
        self.path.n_steps()
    }
    #[inline]
    pub fn image_a(&self) -> &Tensor {
        self.path.start()
    }
    #[inline]
    pub fn image_b(&self) -> &Tensor {
        self.path.stop()
    }
    /// Straight pixel interpolation between the endpoints (reference path).
    #[inline]
    pub fn pixelfade(&self) -> &[Tensor] {
        &self.pixelfade
    }
    #[inline]
    pub fn model(&self) -> &M {
        &self.model
    }
    /// Effective pixel-change tolerance (after resolving `Auto`).
    pub fn pixel_tol(&self) -> Option<f64> {
        self.monitor.pixel_tol()
    }
    pub fn learning_rate(&self) -> f64 {
        self.rule.learning_rate()
    }

    /// Loss, energy and gradients at the current path (no state change).
    pub fn evaluate(&self) -> Result<Evaluation, GeodesicError> {
        energy::evaluate(&self.model, &self.path, &self.objective)
    }

    /// Objective of an arbitrary sequence under this optimizer's model and settings.
    pub fn objective_of(&self, sequence: &[Tensor]) -> Result<f64, GeodesicError> {
        energy::sequence_loss(&self.model, sequence, &self.objective)
    }

    /// Per-free-frame optimality residual at the current path.
    pub fn jerkiness(&self) -> Result<Vec<f64>, GeodesicError> {
        energy::jerkiness(&self.model, &self.path)
    }
}

fn progress_record(iteration: usize, ev: &Evaluation) -> ProgressRecord {
    let deviation = match deviation_from_line(&ev.representations, true) {
        Ok(dev) => dev,
        Err(err) => {
            debug!(iteration, %err, "line deviation undefined; storing empty record");
            Default::default()
        }
    };
    ProgressRecord {
        iteration,
        step_energy: ev.step_energy.clone(),
        deviation,
    }
}
