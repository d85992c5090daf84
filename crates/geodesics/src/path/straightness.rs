//! Deviation of a sequence from the straight line joining its ends.
//!
//! Used on representation sequences to judge how "straight" a path looks in
//! the model's space; the pixelfade typically bends, a good geodesic less so.

use crate::error::GeodesicError;
use crate::tensor::Tensor;

/// Per-frame coordinates relative to the line `y[0] → y[T]`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LineDeviation {
    /// Signed distance along the line, measured from `y[0]`.
    pub along: Vec<f64>,
    /// Euclidean distance to the line.
    pub from: Vec<f64>,
}

/// Project each frame onto the line through the first and last frames.
///
/// With `normalize`, both distances are divided by the line length, so the
/// last frame sits at `(1, 0)`. Fails if fewer than two frames are given,
/// shapes differ, or the end frames coincide.
pub fn deviation_from_line(
    sequence: &[Tensor],
    normalize: bool,
) -> Result<LineDeviation, GeodesicError> {
    let (first, last) = match (sequence.first(), sequence.last()) {
        (Some(f), Some(l)) if sequence.len() >= 2 => (f, l),
        _ => {
            return Err(GeodesicError::invalid(
                "deviation_from_line needs at least two frames",
            ))
        }
    };
    if sequence.iter().any(|y| !y.same_shape(first)) {
        return Err(GeodesicError::invalid(
            "deviation_from_line needs frames of one shape",
        ));
    }
    let line = last.data() - first.data();
    let length = line.norm();
    if !(length.is_finite() && length > 0.0) {
        return Err(GeodesicError::invalid(
            "first and last frames coincide; the line is undefined",
        ));
    }
    let dir = line / length;
    let scale = if normalize { 1.0 / length } else { 1.0 };
    let mut out = LineDeviation {
        along: Vec::with_capacity(sequence.len()),
        from: Vec::with_capacity(sequence.len()),
    };
    for y in sequence {
        let centered = y.data() - first.data();
        let a = centered.dot(&dir);
        let off = (&centered - &dir * a).norm();
        out.along.push(a * scale);
        out.from.push(off * scale);
    }
    Ok(out)
}
