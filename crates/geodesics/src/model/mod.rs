//! Model capability: forward evaluation plus reverse-mode differentiation.
//!
//! Purpose
//! - The optimizer only needs "callable + differentiable". A model maps one
//!   image to one representation and, for a cotangent on that representation,
//!   returns the vector-Jacobian product with respect to the image.
//! - Models are read-only from the optimizer's side (`&self` everywhere), so
//!   one model can back several optimizers, e.g. behind an `Arc`.
//!
//! Conventions
//! - `forward` must be deterministic.
//! - `vjp(x, c)` returns `J(x)^T c` with the shape of `x`.
//! - Errors are `ModelError`; the core wraps them with the failing frame index.

mod builtin;

pub use builtin::{Chain, Identity, Linear, Normalize, Tanh};

use std::sync::Arc;

use crate::error::ModelError;
use crate::tensor::Tensor;

/// A differentiable image → representation map.
pub trait Model {
    fn forward(&self, image: &Tensor) -> Result<Tensor, ModelError>;

    /// Reverse-mode product `J(image)^T cotangent`.
    fn vjp(&self, image: &Tensor, cotangent: &Tensor) -> Result<Tensor, ModelError>;
}

impl<M: Model + ?Sized> Model for &M {
    fn forward(&self, image: &Tensor) -> Result<Tensor, ModelError> {
        (**self).forward(image)
    }
    fn vjp(&self, image: &Tensor, cotangent: &Tensor) -> Result<Tensor, ModelError> {
        (**self).vjp(image, cotangent)
    }
}

impl<M: Model + ?Sized> Model for Box<M> {
    fn forward(&self, image: &Tensor) -> Result<Tensor, ModelError> {
        (**self).forward(image)
    }
    fn vjp(&self, image: &Tensor, cotangent: &Tensor) -> Result<Tensor, ModelError> {
        (**self).vjp(image, cotangent)
    }
}

impl<M: Model + ?Sized> Model for Arc<M> {
    fn forward(&self, image: &Tensor) -> Result<Tensor, ModelError> {
        (**self).forward(image)
    }
    fn vjp(&self, image: &Tensor, cotangent: &Tensor) -> Result<Tensor, ModelError> {
        (**self).vjp(image, cotangent)
    }
}

#[cfg(test)]
mod tests;
