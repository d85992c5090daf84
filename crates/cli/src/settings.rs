//! Run settings: what the CLI flags describe, persisted next to each checkpoint
//! so `resume` can rebuild the same model and configuration.

use anyhow::Result;
use clap::ValueEnum;
use geodesics::api::{
    Chain, EnergyNorm, GeodesicCfg, Identity, Initializer, Linear, Model, Normalize,
    PixelChangeTol, RangePenalty, StepDecay, StopCriterion, Tanh, Tensor, UpdateRuleKind,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Model under which the geodesic is computed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelKind {
    Identity,
    Tanh,
    Normalize,
    Linear,
    LinearTanh,
}

/// Shared, thread-safe model handle.
pub type DynModel = Box<dyn Model + Send + Sync>;

impl ModelKind {
    /// Linear layers map `in_dim → out_dim` with weights drawn from `seed`.
    pub fn build(self, in_dim: usize, out_dim: usize, seed: u64) -> DynModel {
        match self {
            ModelKind::Identity => Box::new(Identity),
            ModelKind::Tanh => Box::new(Tanh),
            ModelKind::Normalize => Box::new(Normalize),
            ModelKind::Linear => Box::new(Linear::random(in_dim, out_dim, seed)),
            ModelKind::LinearTanh => {
                Box::new(Chain::new(Linear::random(in_dim, out_dim, seed), Tanh))
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleArg {
    Gd,
    Momentum,
    Adam,
    Amsgrad,
}

impl RuleArg {
    fn kind(self) -> UpdateRuleKind {
        let adam = |amsgrad| UpdateRuleKind::Adam {
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            amsgrad,
        };
        match self {
            RuleArg::Gd => UpdateRuleKind::GradientDescent,
            RuleArg::Momentum => UpdateRuleKind::Momentum { momentum: 0.9 },
            RuleArg::Adam => adam(false),
            RuleArg::Amsgrad => adam(true),
        }
    }
}

/// Everything needed to reproduce a run from scratch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunSettings {
    pub model: ModelKind,
    /// Image width; endpoints are `1 × width`.
    pub width: usize,
    /// Representation size for the linear models.
    pub features: usize,
    /// Circular shift between the two endpoints.
    pub shift: usize,
    pub n_steps: usize,
    pub max_iterations: usize,
    pub step_size: f64,
    pub rule: RuleArg,
    /// Fixed pixel-change tolerance; `None` uses the automatic one.
    pub tol: Option<f64>,
    pub relative_tol: Option<f64>,
    pub patience: usize,
    /// Brownian-bridge initialization with this largest frame norm.
    pub bridge_norm: Option<f64>,
    pub scaled_energy: bool,
    pub range_lambda: f64,
    pub lr_decay: Option<(f64, usize)>,
    pub store_progress: usize,
    pub seed: u64,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            model: ModelKind::LinearTanh,
            width: 32,
            features: 16,
            shift: 4,
            n_steps: 10,
            max_iterations: 1000,
            step_size: 1e-3,
            rule: RuleArg::Amsgrad,
            tol: None,
            relative_tol: None,
            patience: 50,
            bridge_norm: None,
            scaled_energy: false,
            range_lambda: 0.0,
            lr_decay: None,
            store_progress: 10,
            seed: 0,
        }
    }
}

impl RunSettings {
    pub fn cfg(&self) -> GeodesicCfg {
        GeodesicCfg {
            step_size: self.step_size,
            update_rule: self.rule.kind(),
            lr_decay: self
                .lr_decay
                .map(|(factor, every)| StepDecay { factor, every }),
            stop: StopCriterion {
                pixel_change: match self.tol {
                    Some(tol) => PixelChangeTol::Fixed(tol),
                    None => PixelChangeTol::Auto,
                },
                relative_decrease: self.relative_tol,
                patience: self.patience,
            },
            max_iterations: self.max_iterations,
            initializer: match self.bridge_norm {
                Some(max_norm) => Initializer::BrownianBridge {
                    max_norm,
                    seed: self.seed.wrapping_add(2),
                },
                None => Initializer::Linear,
            },
            energy_norm: if self.scaled_energy {
                EnergyNorm::ScaledByN
            } else {
                EnergyNorm::Sum
            },
            range_penalty: RangePenalty {
                lambda: self.range_lambda,
                ..RangePenalty::default()
            },
            store_progress: self.store_progress,
        }
    }

    pub fn model(&self) -> DynModel {
        self.model
            .build(self.width, self.features, self.seed.wrapping_add(1))
    }

    /// Endpoints: a seeded random image and its circular shift by `shift`.
    pub fn endpoints(&self) -> Result<(Tensor, Tensor)> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let data: Vec<f64> = (0..self.width).map(|_| rng.gen::<f64>()).collect();
        let image = Tensor::new(vec![1, self.width], data)?;
        let shifted = geodesics::api::translation_sequence(&image, self.shift.max(1))?;
        let last = shifted.len() - 1;
        Ok((image, shifted[last].clone()))
    }
}
