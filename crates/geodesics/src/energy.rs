//! Path energy, its gradient with respect to free frames, and diagnostics.
//!
//! Objective
//! - `r[i] = f(x[i])` for every frame `i = 0..=N`.
//! - `step_energy[i] = ‖r[i+1] - r[i]‖²` for `i = 0..N`.
//! - `energy = s · Σ step_energy` with `s = 1` (`Sum`) or `s = N` (`ScaledByN`).
//! - `loss = energy + λ · range_penalty(x)`; the penalty is zero with λ = 0.
//!
//! Gradient (free frames only, `1 <= i <= N-1`)
//! - `∂E/∂r[i] = 2s (2 r[i] - r[i-1] - r[i+1])`, pulled back through the
//!   model with one vjp per free frame. Endpoints are constants and never get
//!   a gradient.
//!
//! Everything is computed from the path as passed in; nothing is cached
//! between calls, so a gradient can never be stale.

use nalgebra::DVector;

use crate::error::GeodesicError;
use crate::model::Model;
use crate::path::Path;
use crate::tensor::Tensor;

/// Normalization of the summed step energies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EnergyNorm {
    /// Plain sum over transitions.
    #[default]
    Sum,
    /// Sum times `N`; approximates the continuous action `∫‖ṙ‖² dt` on [0, 1].
    ScaledByN,
}

impl EnergyNorm {
    #[inline]
    pub fn factor(self, n_steps: usize) -> f64 {
        match self {
            EnergyNorm::Sum => 1.0,
            EnergyNorm::ScaledByN => n_steps as f64,
        }
    }
}

/// Soft box constraint on pixel values: `Σ min(x - lo, 0)² + max(x - hi, 0)²`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RangePenalty {
    pub lambda: f64,
    pub min: f64,
    pub max: f64,
}

impl Default for RangePenalty {
    fn default() -> Self {
        Self {
            lambda: 0.0,
            min: 0.0,
            max: 1.0,
        }
    }
}

impl RangePenalty {
    #[inline]
    pub fn is_active(&self) -> bool {
        self.lambda > 0.0
    }

    pub fn value(&self, image: &Tensor) -> f64 {
        image
            .as_slice()
            .iter()
            .map(|&x| {
                let below = (x - self.min).min(0.0);
                let above = (x - self.max).max(0.0);
                below * below + above * above
            })
            .sum()
    }

    /// Gradient of `value` (without the λ factor).
    pub fn gradient(&self, image: &Tensor) -> DVector<f64> {
        image.data().map(|x| {
            if x < self.min {
                2.0 * (x - self.min)
            } else if x > self.max {
                2.0 * (x - self.max)
            } else {
                0.0
            }
        })
    }
}

/// What the loss is made of.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Objective {
    pub energy_norm: EnergyNorm,
    pub range_penalty: RangePenalty,
}

/// Result of one forward + backward pass over a path.
#[derive(Clone, Debug)]
pub struct Evaluation {
    /// `energy + λ · range_penalty`.
    pub loss: f64,
    pub energy: f64,
    /// Unweighted range penalty (0 when inactive).
    pub range_penalty: f64,
    /// `‖r[i+1] - r[i]‖²` per transition (before normalization).
    pub step_energy: Vec<f64>,
    /// `r[0..=N]`.
    pub representations: Vec<Tensor>,
    /// `∂loss/∂x[i]` for the free frames `i = 1..N-1`, in order.
    pub gradients: Vec<Tensor>,
}

impl Evaluation {
    /// L2 norm of all free-frame gradients taken together.
    pub fn gradient_norm(&self) -> f64 {
        crate::tensor::sequence_norm(&self.gradients)
    }
}

/// Apply the model to every frame, checking that representation shapes agree.
pub fn represent<M: Model + ?Sized>(
    model: &M,
    frames: &[&Tensor],
) -> Result<Vec<Tensor>, GeodesicError> {
    let mut reps: Vec<Tensor> = Vec::with_capacity(frames.len());
    for (i, x) in frames.iter().enumerate() {
        let r = model
            .forward(x)
            .map_err(|e| GeodesicError::model(i, e))?;
        if let Some(r0) = reps.first() {
            if !r.same_shape(r0) {
                return Err(GeodesicError::model(
                    i,
                    crate::error::ModelError::new(format!(
                        "representation shape {:?} differs from frame 0 shape {:?}",
                        r.shape(),
                        r0.shape()
                    )),
                ));
            }
        }
        reps.push(r);
    }
    Ok(reps)
}

/// `‖r[i+1] - r[i]‖²` for consecutive representations.
pub fn step_energies(reps: &[Tensor]) -> Vec<f64> {
    reps.windows(2)
        .map(|w| (w[1].data() - w[0].data()).norm_squared())
        .collect()
}

/// Loss of an arbitrary full sequence (forward only).
///
/// Used to fingerprint a model on the pixelfade when resuming.
pub fn sequence_loss<M: Model + ?Sized>(
    model: &M,
    sequence: &[Tensor],
    objective: &Objective,
) -> Result<f64, GeodesicError> {
    let frames: Vec<&Tensor> = sequence.iter().collect();
    let reps = represent(model, &frames)?;
    let n_steps = sequence.len().saturating_sub(1);
    let energy = objective.energy_norm.factor(n_steps) * step_energies(&reps).iter().sum::<f64>();
    let penalty = if objective.range_penalty.is_active() {
        sequence.iter().map(|x| objective.range_penalty.value(x)).sum()
    } else {
        0.0
    };
    Ok(energy + objective.range_penalty.lambda * penalty)
}

/// Energy, loss, and free-frame gradients for the current path.
pub fn evaluate<M: Model + ?Sized>(
    model: &M,
    path: &Path,
    objective: &Objective,
) -> Result<Evaluation, GeodesicError> {
    let frames: Vec<&Tensor> = path.frames().collect();
    let reps = represent(model, &frames)?;
    let n_steps = path.n_steps();
    let s = objective.energy_norm.factor(n_steps);
    let step_energy = step_energies(&reps);
    // Order-independent: each term depends only on its own pair.
    let energy = s * step_energy.iter().sum::<f64>();

    let penalty = &objective.range_penalty;
    let range_penalty = if penalty.is_active() {
        frames.iter().map(|x| penalty.value(x)).sum()
    } else {
        0.0
    };

    let mut gradients = Vec::with_capacity(path.free().len());
    for i in 1..n_steps {
        let cot = (reps[i].data() * 2.0 - reps[i - 1].data() - reps[i + 1].data()) * (2.0 * s);
        let cot = Tensor::with_data_of(&reps[i], cot);
        let mut g = model
            .vjp(frames[i], &cot)
            .map_err(|e| GeodesicError::model(i, e))?;
        if !g.same_shape(frames[i]) {
            return Err(GeodesicError::model(
                i,
                crate::error::ModelError::new(format!(
                    "vjp returned shape {:?} for image shape {:?}",
                    g.shape(),
                    frames[i].shape()
                )),
            ));
        }
        if penalty.is_active() {
            *g.data_mut() += penalty.gradient(frames[i]) * penalty.lambda;
        }
        gradients.push(g);
    }

    Ok(Evaluation {
        loss: energy + penalty.lambda * range_penalty,
        energy,
        range_penalty,
        step_energy,
        representations: reps,
        gradients,
    })
}

/// First-order optimality residual per free frame.
///
/// With `a[i] = r[i+1] - 2 r[i] + r[i-1]` and `u[i] = a[i] / ‖a[i]‖`, returns
/// `‖J(x[i])ᵀ u[i]‖²`. A true geodesic has representation acceleration
/// orthogonal to the model's image of the pixel space, so values near zero
/// are good. Frames with zero acceleration report zero.
pub fn jerkiness<M: Model + ?Sized>(model: &M, path: &Path) -> Result<Vec<f64>, GeodesicError> {
    let frames: Vec<&Tensor> = path.frames().collect();
    let reps = represent(model, &frames)?;
    let mut out = Vec::with_capacity(path.free().len());
    for i in 1..path.n_steps() {
        let acc = reps[i + 1].data() - reps[i].data() * 2.0 + reps[i - 1].data();
        let mag = acc.norm();
        if !(mag > 0.0) {
            out.push(0.0);
            continue;
        }
        let dir = Tensor::with_data_of(&reps[i], acc / mag);
        let pulled = model
            .vjp(frames[i], &dir)
            .map_err(|e| GeodesicError::model(i, e))?;
        out.push(pulled.norm_squared());
    }
    Ok(out)
}
