//! Initial sequences between two endpoints.
//!
//! - `make_straight_line`: pixel-space linear blend ("pixelfade"), the default.
//! - `sample_brownian_bridge`: straight line plus a pinned random walk.
//! - `translation_sequence`: circular shifts of one image; a handy source of
//!   endpoint pairs whose natural interpolation is known.

use nalgebra::DVector;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

use super::{check_endpoints, Path};
use crate::error::GeodesicError;
use crate::tensor::Tensor;

/// How the optimizer seeds its path.
#[derive(Clone, Debug, Default)]
pub enum Initializer {
    /// `x[i] = A + (i/N)(B - A)`.
    #[default]
    Linear,
    /// Straight line plus a Brownian bridge of largest frame norm `max_norm`.
    BrownianBridge { max_norm: f64, seed: u64 },
    /// Caller-provided sequence of `N+1` frames (endpoints must match exactly).
    Custom(Vec<Tensor>),
}

impl Initializer {
    pub(crate) fn build(
        &self,
        start: &Tensor,
        stop: &Tensor,
        n_steps: usize,
    ) -> Result<Path, GeodesicError> {
        let sequence = match self {
            Initializer::Linear => make_straight_line(start, stop, n_steps)?,
            Initializer::BrownianBridge { max_norm, seed } => {
                use rand::SeedableRng;
                let mut rng = rand::rngs::StdRng::seed_from_u64(*seed);
                sample_brownian_bridge(start, stop, n_steps, *max_norm, &mut rng)?
            }
            Initializer::Custom(seq) => seq.clone(),
        };
        Path::from_sequence(start, stop, n_steps, sequence)
    }
}

/// Linear interpolation with `n_steps` transitions (`n_steps + 1` frames).
///
/// Endpoints are copied, not computed, so `seq[0] == start` and
/// `seq[n_steps] == stop` hold bit-for-bit.
pub fn make_straight_line(
    start: &Tensor,
    stop: &Tensor,
    n_steps: usize,
) -> Result<Vec<Tensor>, GeodesicError> {
    check_endpoints(start, stop, n_steps)?;
    let n = n_steps as f64;
    let mut seq = Vec::with_capacity(n_steps + 1);
    seq.push(start.clone());
    for i in 1..n_steps {
        seq.push(Tensor::lerp(start, stop, i as f64 / n));
    }
    seq.push(stop.clone());
    Ok(seq)
}

/// Straight line plus a Brownian bridge pinned at both endpoints.
///
/// The bridge is rescaled so that its largest frame norm equals `max_norm`;
/// with `n_steps == 1` there is nothing to perturb and the straight line is
/// returned.
pub fn sample_brownian_bridge<R: Rng + ?Sized>(
    start: &Tensor,
    stop: &Tensor,
    n_steps: usize,
    max_norm: f64,
    rng: &mut R,
) -> Result<Vec<Tensor>, GeodesicError> {
    check_endpoints(start, stop, n_steps)?;
    if !(max_norm.is_finite() && max_norm >= 0.0) {
        return Err(GeodesicError::invalid("max_norm must be non-negative"));
    }
    let mut seq = make_straight_line(start, stop, n_steps)?;
    let d = start.len();
    let dt_sqrt = (1.0 / n_steps as f64).sqrt();

    // W[0] = 0, W[k] = W[k-1] + sqrt(dt) ξ_k; bridge[k] = W[k] - (k/N) W[N].
    let mut walk: Vec<DVector<f64>> = Vec::with_capacity(n_steps + 1);
    walk.push(DVector::zeros(d));
    for k in 1..=n_steps {
        let step = DVector::from_fn(d, |_, _| {
            let xi: f64 = StandardNormal.sample(&mut *rng);
            xi * dt_sqrt
        });
        let next = &walk[k - 1] + step;
        walk.push(next);
    }
    let end = walk[n_steps].clone();
    let bridge: Vec<DVector<f64>> = walk
        .iter()
        .enumerate()
        .map(|(k, w)| w - &end * (k as f64 / n_steps as f64))
        .collect();
    let largest = bridge.iter().map(|b| b.norm()).fold(0.0, f64::max);
    if largest <= 0.0 || max_norm == 0.0 {
        return Ok(seq);
    }
    let scale = max_norm / largest;
    for (k, frame) in seq.iter_mut().enumerate().take(n_steps).skip(1) {
        *frame.data_mut() += &bridge[k] * scale;
    }
    Ok(seq)
}

/// Frame `k` is `image` rolled by `k` positions along its last axis.
pub fn translation_sequence(image: &Tensor, n_steps: usize) -> Result<Vec<Tensor>, GeodesicError> {
    if n_steps < 1 {
        return Err(GeodesicError::invalid("n_steps must be positive"));
    }
    let width = image.shape().last().copied().unwrap_or(1).max(1);
    let rows = image.len() / width;
    let src = image.as_slice();
    let mut seq = Vec::with_capacity(n_steps + 1);
    seq.push(image.clone());
    for shift in 1..=n_steps {
        let mut out = vec![0.0; image.len()];
        for r in 0..rows {
            let row = r * width;
            for j in 0..width {
                out[row + (j + shift) % width] = src[row + j];
            }
        }
        seq.push(Tensor::with_data_of(image, DVector::from_vec(out)));
    }
    Ok(seq)
}
