//! Dense fixed-shape tensors (images and representations).
//!
//! A `Tensor` is a shape plus a flat `DVector<f64>` in row-major order. The
//! core never looks at the shape beyond equality checks and the last-axis
//! roll in `translation_sequence`; all reductions act on the flat vector.

use nalgebra::DVector;

use crate::error::GeodesicError;

/// Fixed-shape multi-dimensional array of `f64`.
///
/// Invariant: `data.len() == shape.iter().product()`.
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: DVector<f64>,
}

impl Tensor {
    /// Build from a shape and row-major values.
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> Result<Self, GeodesicError> {
        Self::from_vector(shape, DVector::from_vec(data))
    }

    pub fn from_vector(shape: Vec<usize>, data: DVector<f64>) -> Result<Self, GeodesicError> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(GeodesicError::invalid(format!(
                "tensor of shape {:?} needs {} values, got {}",
                shape,
                expected,
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    /// Same shape as `like`, new values. Caller guarantees matching length.
    #[inline]
    pub(crate) fn with_data_of(like: &Tensor, data: DVector<f64>) -> Self {
        debug_assert_eq!(like.data.len(), data.len());
        Self {
            shape: like.shape.clone(),
            data,
        }
    }

    pub fn zeros(shape: &[usize]) -> Self {
        Self::filled(shape, 0.0)
    }

    pub fn filled(shape: &[usize], value: f64) -> Self {
        let len = shape.iter().product();
        Self {
            shape: shape.to_vec(),
            data: DVector::from_element(len, value),
        }
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
    #[inline]
    pub fn data(&self) -> &DVector<f64> {
        &self.data
    }
    #[inline]
    pub fn data_mut(&mut self) -> &mut DVector<f64> {
        &mut self.data
    }
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        self.data.as_slice()
    }
    pub fn into_parts(self) -> (Vec<usize>, DVector<f64>) {
        (self.shape, self.data)
    }

    #[inline]
    pub fn same_shape(&self, other: &Tensor) -> bool {
        self.shape == other.shape
    }

    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|x| x.is_finite())
    }

    #[inline]
    pub fn norm_squared(&self) -> f64 {
        self.data.norm_squared()
    }
    #[inline]
    pub fn norm(&self) -> f64 {
        self.data.norm()
    }

    /// `self - other` on the flat data (shapes must match).
    pub(crate) fn sub(&self, other: &Tensor) -> Tensor {
        Tensor::with_data_of(self, &self.data - &other.data)
    }

    /// `a + t (b - a)`.
    pub(crate) fn lerp(a: &Tensor, b: &Tensor, t: f64) -> Tensor {
        Tensor::with_data_of(a, &a.data + (&b.data - &a.data) * t)
    }
}

/// Euclidean norm over a whole sequence of tensors, as if concatenated.
pub fn sequence_norm(seq: &[Tensor]) -> f64 {
    seq.iter().map(Tensor::norm_squared).sum::<f64>().sqrt()
}
