//! Phase unwrapping for angle-valued tensors.
//!
//! Models that output angles (e.g. `atan2` of a quadrature pair) jump by 2π
//! when a path crosses ±π, which makes step distances meaningless. Unwrapping
//! along the path (or any other) axis replaces each jump larger than π by its
//! complement, so consecutive values differ by at most π.

use std::f64::consts::PI;

use crate::error::GeodesicError;
use crate::tensor::Tensor;

/// Unwrap `angles` along `axis` (negative counts from the end), period 2π.
///
/// Matches `numpy.unwrap` with its default discontinuity of π. Fails if
/// `axis` is outside `[-ndim, ndim - 1]`.
pub fn unwrap_angles(angles: &Tensor, axis: isize) -> Result<Tensor, GeodesicError> {
    let shape = angles.shape();
    let ndim = shape.len() as isize;
    if axis >= ndim || axis < -ndim {
        return Err(GeodesicError::invalid(format!(
            "axis must lie within [-{ndim}, {}], got {axis}",
            ndim - 1
        )));
    }
    let axis = if axis < 0 { axis + ndim } else { axis } as usize;
    let len = shape[axis];
    let stride: usize = shape[axis + 1..].iter().product();
    let outer: usize = shape[..axis].iter().product();

    let src = angles.as_slice();
    let mut out = src.to_vec();
    for o in 0..outer {
        for i in 0..stride {
            let base = o * len * stride + i;
            let mut correction = 0.0;
            for j in 1..len {
                let (prev, cur) = (base + (j - 1) * stride, base + j * stride);
                let dp = src[cur] - src[prev];
                if dp.abs() >= PI {
                    let mut wrapped = (dp + PI).rem_euclid(2.0 * PI) - PI;
                    if wrapped == -PI && dp > 0.0 {
                        wrapped = PI;
                    }
                    correction += wrapped - dp;
                }
                out[cur] = src[cur] + correction;
            }
        }
    }
    Tensor::new(shape.to_vec(), out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: &[f64], b: &[f64]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-12)
    }

    #[test]
    fn jump_across_pi_is_removed() {
        let t = Tensor::new(vec![4], vec![0.0, 3.0, -3.0, -2.5]).unwrap();
        let u = unwrap_angles(&t, 0).unwrap();
        let tau = 2.0 * PI;
        assert!(close(u.as_slice(), &[0.0, 3.0, tau - 3.0, tau - 2.5]));
        assert_eq!(unwrap_angles(&t, -1).unwrap(), u);
    }

    #[test]
    fn unwrapping_a_rotation_through_pi() {
        // Points on the circle from 5π/4 down to 3π/4 along the chord; their
        // atan2 angles wrap at π.
        let (a0, a1) = (PI + PI / 4.0, PI - PI / 4.0);
        let angles: Vec<f64> = (0..=10)
            .map(|k| {
                let t = k as f64 / 10.0;
                let x = (1.0 - t) * a0.cos() + t * a1.cos();
                let y = (1.0 - t) * a0.sin() + t * a1.sin();
                y.atan2(x)
            })
            .collect();
        // Either axis of a 1×11 / 11×1 tensor carries the sequence.
        for (shape, axis) in [(vec![1, 11], 1), (vec![11, 1], 0), (vec![11, 1], -2)] {
            let t = Tensor::new(shape, angles.clone()).unwrap();
            let u = unwrap_angles(&t, axis).unwrap();
            let s = u.as_slice();
            assert!(s.windows(2).all(|w| (w[1] - w[0]).abs() < PI));
            assert!((s[10] - s[0] + PI / 2.0).abs() < 1e-12);
        }
    }

    #[test]
    fn unwraps_each_line_independently() {
        // 2 × 3, unwrap along axis 0: columns are separate sequences.
        let t = Tensor::new(vec![2, 3], vec![3.0, 0.0, -3.0, -3.0, 0.5, 3.0]).unwrap();
        let u = unwrap_angles(&t, 0).unwrap();
        let tau = 2.0 * PI;
        assert!(close(
            u.as_slice(),
            &[3.0, 0.0, -3.0, tau - 3.0, 0.5, 3.0 - tau]
        ));
    }

    #[test]
    fn rejects_out_of_range_axis() {
        let t = Tensor::zeros(&[2, 3]);
        for axis in [2, 3, -3, -4] {
            let err = unwrap_angles(&t, axis).unwrap_err();
            assert!(err.to_string().contains("axis must lie within"));
        }
    }
}
