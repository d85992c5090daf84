//! Pluggable first-order update rules.
//!
//! Purpose
//! - Turn (free frames, gradients) into new free frames. Rules only ever see
//!   the free frames; endpoints are not part of the parameter set.
//! - Adaptive state (momentum buffers, moment estimates) is owned by the rule
//!   instance, so independent optimizers never share it.
//!
//! Rules
//! - `GradientDescent`: `x ← x - lr g`.
//! - `Momentum`: heavy-ball, `b ← μ b + g; x ← x - lr b` (first step `b = g`).
//! - `Adam`: bias-corrected moments, optional AMSGrad max of second moments.

mod rules;

pub use rules::{Adam, GradientDescent, Momentum};

use crate::error::GeodesicError;
use crate::tensor::Tensor;

/// A gradient-based update applied in place to the free frames.
pub trait UpdateRule: Send {
    fn name(&self) -> &'static str;

    /// One update. `params` and `grads` have equal length and matching shapes.
    fn step(&mut self, params: &mut [Tensor], grads: &[Tensor]);

    fn learning_rate(&self) -> f64;
    fn set_learning_rate(&mut self, lr: f64);

    /// Forget adaptive state (buffers, step counters).
    fn reset(&mut self);

    /// Independent copy including adaptive state; used to roll back a refused step.
    fn boxed_clone(&self) -> Box<dyn UpdateRule>;
}

impl Clone for Box<dyn UpdateRule> {
    fn clone(&self) -> Self {
        self.boxed_clone()
    }
}

/// Which built-in rule to construct, with its hyperparameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UpdateRuleKind {
    GradientDescent,
    Momentum {
        momentum: f64,
    },
    Adam {
        beta1: f64,
        beta2: f64,
        eps: f64,
        amsgrad: bool,
    },
}

impl Default for UpdateRuleKind {
    fn default() -> Self {
        Self::Adam {
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            amsgrad: true,
        }
    }
}

impl UpdateRuleKind {
    pub fn validate(&self) -> Result<(), GeodesicError> {
        match *self {
            UpdateRuleKind::GradientDescent => Ok(()),
            UpdateRuleKind::Momentum { momentum } => {
                if !(0.0..1.0).contains(&momentum) {
                    return Err(GeodesicError::invalid("momentum must lie in [0, 1)"));
                }
                Ok(())
            }
            UpdateRuleKind::Adam {
                beta1, beta2, eps, ..
            } => {
                if !(0.0..1.0).contains(&beta1) || !(0.0..1.0).contains(&beta2) {
                    return Err(GeodesicError::invalid("adam betas must lie in [0, 1)"));
                }
                if !(eps.is_finite() && eps > 0.0) {
                    return Err(GeodesicError::invalid("adam eps must be positive"));
                }
                Ok(())
            }
        }
    }

    pub fn build(&self, lr: f64) -> Box<dyn UpdateRule> {
        match *self {
            UpdateRuleKind::GradientDescent => Box::new(GradientDescent::new(lr)),
            UpdateRuleKind::Momentum { momentum } => Box::new(Momentum::new(lr, momentum)),
            UpdateRuleKind::Adam {
                beta1,
                beta2,
                eps,
                amsgrad,
            } => Box::new(Adam::new(lr, beta1, beta2, eps, amsgrad)),
        }
    }
}

/// Multiply the learning rate by `factor` after every `every` iterations.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepDecay {
    pub factor: f64,
    pub every: usize,
}

impl StepDecay {
    pub fn validate(&self) -> Result<(), GeodesicError> {
        if !(self.factor > 0.0 && self.factor <= 1.0) {
            return Err(GeodesicError::invalid("decay factor must lie in (0, 1]"));
        }
        if self.every == 0 {
            return Err(GeodesicError::invalid("decay interval must be positive"));
        }
        Ok(())
    }

    /// Apply after `completed` iterations have finished.
    pub fn apply(&self, rule: &mut dyn UpdateRule, completed: usize) {
        if completed > 0 && completed % self.every == 0 {
            rule.set_learning_rate(rule.learning_rate() * self.factor);
        }
    }
}
