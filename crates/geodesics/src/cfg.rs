//! Optimizer configuration.
//!
//! One plain struct with public fields and defaults matching the usual
//! experiment setup (Adam + AMSGrad at lr 1e-3, auto pixel tolerance with a
//! 50-iteration patience, pure energy objective). `validate` is called by the
//! optimizer constructor, so a bad configuration never yields an optimizer.

use crate::energy::{EnergyNorm, Objective, RangePenalty};
use crate::error::GeodesicError;
use crate::monitor::StopCriterion;
use crate::path::Initializer;
use crate::update::{StepDecay, UpdateRuleKind};

#[derive(Clone, Debug)]
pub struct GeodesicCfg {
    /// Learning rate handed to the update rule. Zero freezes the path.
    pub step_size: f64,
    pub update_rule: UpdateRuleKind,
    pub lr_decay: Option<StepDecay>,
    pub stop: StopCriterion,
    /// Total iteration cap across all `run`/`run_step` calls.
    pub max_iterations: usize,
    pub initializer: Initializer,
    pub energy_norm: EnergyNorm,
    pub range_penalty: RangePenalty,
    /// Store step energy and line deviation every k-th iteration (0 = never).
    pub store_progress: usize,
}

impl Default for GeodesicCfg {
    fn default() -> Self {
        Self {
            step_size: 1e-3,
            update_rule: UpdateRuleKind::default(),
            lr_decay: None,
            stop: StopCriterion::default(),
            max_iterations: 1000,
            initializer: Initializer::Linear,
            energy_norm: EnergyNorm::Sum,
            range_penalty: RangePenalty::default(),
            store_progress: 0,
        }
    }
}

impl GeodesicCfg {
    pub fn validate(&self) -> Result<(), GeodesicError> {
        if !(self.step_size.is_finite() && self.step_size >= 0.0) {
            return Err(GeodesicError::invalid(format!(
                "step_size must be finite and non-negative, got {}",
                self.step_size
            )));
        }
        if self.max_iterations == 0 {
            return Err(GeodesicError::invalid("max_iterations must be positive"));
        }
        self.update_rule.validate()?;
        if let Some(decay) = &self.lr_decay {
            decay.validate()?;
        }
        self.stop.validate()?;
        let rp = &self.range_penalty;
        if !(rp.lambda.is_finite() && rp.lambda >= 0.0) {
            return Err(GeodesicError::invalid(
                "range penalty lambda must be non-negative",
            ));
        }
        if !(rp.min.is_finite() && rp.max.is_finite() && rp.min <= rp.max) {
            return Err(GeodesicError::invalid(
                "allowed range must be finite with min <= max",
            ));
        }
        Ok(())
    }

    pub fn objective(&self) -> Objective {
        Objective {
            energy_norm: self.energy_norm,
            range_penalty: self.range_penalty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(GeodesicCfg::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_values() {
        let cases = [
            GeodesicCfg {
                step_size: -1e-3,
                ..GeodesicCfg::default()
            },
            GeodesicCfg {
                step_size: f64::NAN,
                ..GeodesicCfg::default()
            },
            GeodesicCfg {
                max_iterations: 0,
                ..GeodesicCfg::default()
            },
            GeodesicCfg {
                range_penalty: RangePenalty {
                    lambda: 0.1,
                    min: 1.0,
                    max: 0.0,
                },
                ..GeodesicCfg::default()
            },
            GeodesicCfg {
                lr_decay: Some(StepDecay {
                    factor: 1.5,
                    every: 10,
                }),
                ..GeodesicCfg::default()
            },
        ];
        for cfg in cases {
            assert!(matches!(
                cfg.validate(),
                Err(GeodesicError::InvalidConfiguration { .. })
            ));
        }
        let frozen = GeodesicCfg {
            step_size: 0.0,
            ..GeodesicCfg::default()
        };
        assert!(frozen.validate().is_ok());
    }
}
