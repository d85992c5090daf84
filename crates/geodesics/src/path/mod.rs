//! Path state: two fixed endpoints plus the free frames in between.
//!
//! Purpose
//! - Hold the ordered sequence `x[0..=N]` with `x[0] = A`, `x[N] = B`.
//! - Keep endpoints out of the optimizable set by construction: they live in
//!   their own fields and only `free` is ever handed to an update rule.
//!
//! Invariants
//! - `N = free.len() + 1 >= 1` is fixed at construction.
//! - All frames share one shape.
//! - Endpoints are never mutated after construction (no `&mut` accessor).

mod angles;
mod init;
mod straightness;

pub use angles::unwrap_angles;
pub use init::{make_straight_line, sample_brownian_bridge, translation_sequence, Initializer};
pub use straightness::{deviation_from_line, LineDeviation};

use crate::error::GeodesicError;
use crate::tensor::Tensor;

/// Ordered image sequence with fixed endpoints.
#[derive(Clone, Debug, PartialEq)]
pub struct Path {
    start: Tensor,
    stop: Tensor,
    free: Vec<Tensor>,
}

impl Path {
    /// Build from a full sequence `[A, x1, ..., x_{N-1}, B]`.
    ///
    /// The first and last frames must equal `start`/`stop` bit-for-bit.
    pub fn from_sequence(
        start: &Tensor,
        stop: &Tensor,
        n_steps: usize,
        sequence: Vec<Tensor>,
    ) -> Result<Self, GeodesicError> {
        check_endpoints(start, stop, n_steps)?;
        if sequence.len() != n_steps + 1 {
            return Err(GeodesicError::invalid(format!(
                "initial sequence must have n_steps+1 = {} frames, got {}",
                n_steps + 1,
                sequence.len()
            )));
        }
        if let Some(k) = sequence.iter().position(|f| !f.same_shape(start)) {
            return Err(GeodesicError::invalid(format!(
                "frame {k} of initial sequence has shape {:?}, endpoints have {:?}",
                sequence[k].shape(),
                start.shape()
            )));
        }
        if !bit_equal(&sequence[0], start) {
            return Err(GeodesicError::invalid(
                "first frame of initial sequence must equal image_a",
            ));
        }
        if !bit_equal(&sequence[n_steps], stop) {
            return Err(GeodesicError::invalid(
                "last frame of initial sequence must equal image_b",
            ));
        }
        let mut sequence = sequence;
        sequence.pop();
        let free = sequence.split_off(1);
        Ok(Self {
            start: start.clone(),
            stop: stop.clone(),
            free,
        })
    }

    /// Number of transitions `N` (frames are `0..=N`).
    #[inline]
    pub fn n_steps(&self) -> usize {
        self.free.len() + 1
    }
    #[inline]
    pub fn n_frames(&self) -> usize {
        self.free.len() + 2
    }
    #[inline]
    pub fn start(&self) -> &Tensor {
        &self.start
    }
    #[inline]
    pub fn stop(&self) -> &Tensor {
        &self.stop
    }
    #[inline]
    pub fn free(&self) -> &[Tensor] {
        &self.free
    }
    #[inline]
    #[cfg(test)]
    pub(crate) fn free_mut(&mut self) -> &mut [Tensor] {
        &mut self.free
    }
    #[inline]
    pub(crate) fn replace_free(&mut self, free: Vec<Tensor>) {
        debug_assert_eq!(free.len(), self.free.len());
        self.free = free;
    }

    /// Frame `k` in `0..=N`.
    pub fn frame(&self, k: usize) -> Option<&Tensor> {
        match k {
            0 => Some(&self.start),
            k if k == self.n_steps() => Some(&self.stop),
            k => self.free.get(k - 1),
        }
    }

    /// Iterate frames `0..=N` in order.
    pub fn frames(&self) -> impl Iterator<Item = &Tensor> + '_ {
        std::iter::once(&self.start)
            .chain(self.free.iter())
            .chain(std::iter::once(&self.stop))
    }

    /// Owned copy of the full sequence.
    pub fn to_vec(&self) -> Vec<Tensor> {
        self.frames().cloned().collect()
    }
}

/// Shared validation for endpoint pairs and path length.
pub(crate) fn check_endpoints(
    start: &Tensor,
    stop: &Tensor,
    n_steps: usize,
) -> Result<(), GeodesicError> {
    if n_steps < 1 {
        return Err(GeodesicError::invalid("n_steps must be positive"));
    }
    if !start.same_shape(stop) {
        return Err(GeodesicError::invalid(format!(
            "start and stop must be same shape, got {:?} and {:?}",
            start.shape(),
            stop.shape()
        )));
    }
    Ok(())
}

/// Exact equality including the sign of zero and NaN payload positions.
pub(crate) fn bit_equal(a: &Tensor, b: &Tensor) -> bool {
    a.same_shape(b)
        && a
            .as_slice()
            .iter()
            .zip(b.as_slice())
            .all(|(x, y)| x.to_bits() == y.to_bits())
}
