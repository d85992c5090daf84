//! Error types surfaced by the optimizer and by model implementations.
//!
//! - `ModelError`: what a `Model` returns when forward or vjp fails.
//! - `GeodesicError`: everything the core reports to callers. Construction
//!   errors never leave a half-built optimizer behind, and evaluation errors
//!   never commit a partial iteration.

use std::fmt;

/// Failure raised by a model collaborator.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelError {
    pub reason: String,
}

impl ModelError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model error: {}", self.reason)
    }
}

impl std::error::Error for ModelError {}

/// Errors surfaced by the geodesic core.
#[derive(Clone, Debug, PartialEq)]
pub enum GeodesicError {
    /// Bad path length, mismatched shapes, or out-of-range hyperparameters.
    InvalidConfiguration { reason: String },
    /// The model failed on path frame `index` (0 and N are the endpoints).
    ModelEvaluation { index: usize, source: ModelError },
    /// A non-finite `quantity` ("loss", "gradient", "update") showed up while
    /// computing iteration `iteration`; nothing from that iteration was kept.
    NumericInstability {
        iteration: usize,
        quantity: &'static str,
    },
}

impl GeodesicError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            reason: reason.into(),
        }
    }

    pub(crate) fn model(index: usize, source: ModelError) -> Self {
        Self::ModelEvaluation { index, source }
    }
}

impl fmt::Display for GeodesicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfiguration { reason } => {
                write!(f, "invalid configuration: {reason}")
            }
            Self::ModelEvaluation { index, source } => {
                write!(f, "model evaluation failed on frame {index}: {}", source.reason)
            }
            Self::NumericInstability {
                iteration,
                quantity,
            } => write!(
                f,
                "non-finite {quantity} at iteration {iteration}; step was not applied"
            ),
        }
    }
}

impl std::error::Error for GeodesicError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ModelEvaluation { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn model_error_is_exposed_as_source() {
        let err = GeodesicError::model(3, ModelError::new("boom"));
        assert_eq!(err.to_string(), "model evaluation failed on frame 3: boom");
        assert_eq!(err.source().unwrap().to_string(), "model error: boom");
        assert!(GeodesicError::invalid("x").source().is_none());
    }
}
