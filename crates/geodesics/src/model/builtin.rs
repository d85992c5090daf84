//! Small analytic models used by experiments, benches, and tests.

use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::Model;
use crate::error::ModelError;
use crate::tensor::Tensor;

fn check_cotangent(out: &Tensor, cotangent: &Tensor) -> Result<(), ModelError> {
    if out.shape() != cotangent.shape() {
        return Err(ModelError::new(format!(
            "cotangent shape {:?} does not match representation shape {:?}",
            cotangent.shape(),
            out.shape()
        )));
    }
    Ok(())
}

/// Representation equals the image.
#[derive(Clone, Copy, Debug, Default)]
pub struct Identity;

impl Model for Identity {
    fn forward(&self, image: &Tensor) -> Result<Tensor, ModelError> {
        Ok(image.clone())
    }
    fn vjp(&self, image: &Tensor, cotangent: &Tensor) -> Result<Tensor, ModelError> {
        check_cotangent(image, cotangent)?;
        Ok(cotangent.clone())
    }
}

/// Pointwise `tanh`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Tanh;

impl Model for Tanh {
    fn forward(&self, image: &Tensor) -> Result<Tensor, ModelError> {
        Ok(Tensor::with_data_of(image, image.data().map(f64::tanh)))
    }
    fn vjp(&self, image: &Tensor, cotangent: &Tensor) -> Result<Tensor, ModelError> {
        check_cotangent(image, cotangent)?;
        let d = image
            .data()
            .zip_map(cotangent.data(), |x, c| c * (1.0 - x.tanh().powi(2)));
        Ok(Tensor::with_data_of(image, d))
    }
}

/// Projection onto the unit sphere, `x / ‖x‖`.
///
/// Geodesics under this model follow great circles, so the straight pixel
/// line is generally not optimal.
#[derive(Clone, Copy, Debug, Default)]
pub struct Normalize;

impl Normalize {
    const MIN_NORM: f64 = 1e-12;

    fn norm_of(image: &Tensor) -> Result<f64, ModelError> {
        let n = image.norm();
        if !(n.is_finite() && n > Self::MIN_NORM) {
            return Err(ModelError::new(format!(
                "cannot normalize image with norm {n:e}"
            )));
        }
        Ok(n)
    }
}

impl Model for Normalize {
    fn forward(&self, image: &Tensor) -> Result<Tensor, ModelError> {
        let n = Self::norm_of(image)?;
        Ok(Tensor::with_data_of(image, image.data() / n))
    }
    fn vjp(&self, image: &Tensor, cotangent: &Tensor) -> Result<Tensor, ModelError> {
        check_cotangent(image, cotangent)?;
        let n = Self::norm_of(image)?;
        let y = image.data() / n;
        // J = (I - y yᵀ) / ‖x‖ is symmetric.
        let proj = y.dot(cotangent.data());
        Ok(Tensor::with_data_of(
            image,
            (cotangent.data() - y * proj) / n,
        ))
    }
}

/// Dense linear map on the flattened image: `r = W x`, reshaped to `out_shape`.
#[derive(Clone, Debug)]
pub struct Linear {
    weight: DMatrix<f64>,
    out_shape: Vec<usize>,
}

impl Linear {
    pub fn new(weight: DMatrix<f64>, out_shape: Vec<usize>) -> Result<Self, ModelError> {
        let rows: usize = out_shape.iter().product();
        if rows != weight.nrows() {
            return Err(ModelError::new(format!(
                "out_shape {:?} needs {} rows, weight has {}",
                out_shape,
                rows,
                weight.nrows()
            )));
        }
        Ok(Self { weight, out_shape })
    }

    /// Entries uniform in `[-1, 1] / sqrt(in_dim)`; reproducible from `seed`.
    pub fn random(in_dim: usize, out_dim: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let scale = 1.0 / (in_dim.max(1) as f64).sqrt();
        let weight = DMatrix::from_fn(out_dim, in_dim, |_, _| rng.gen_range(-1.0..=1.0) * scale);
        Self {
            weight,
            out_shape: vec![out_dim],
        }
    }

    pub fn weight(&self) -> &DMatrix<f64> {
        &self.weight
    }

    fn check_input(&self, image: &Tensor) -> Result<(), ModelError> {
        if image.len() != self.weight.ncols() {
            return Err(ModelError::new(format!(
                "linear model expects {} inputs, got {}",
                self.weight.ncols(),
                image.len()
            )));
        }
        Ok(())
    }
}

impl Model for Linear {
    fn forward(&self, image: &Tensor) -> Result<Tensor, ModelError> {
        self.check_input(image)?;
        let r: DVector<f64> = &self.weight * image.data();
        Tensor::from_vector(self.out_shape.clone(), r).map_err(|e| ModelError::new(e.to_string()))
    }
    fn vjp(&self, image: &Tensor, cotangent: &Tensor) -> Result<Tensor, ModelError> {
        self.check_input(image)?;
        if cotangent.len() != self.weight.nrows() {
            return Err(ModelError::new(format!(
                "cotangent has {} entries, linear model outputs {}",
                cotangent.len(),
                self.weight.nrows()
            )));
        }
        Ok(Tensor::with_data_of(
            image,
            self.weight.tr_mul(cotangent.data()),
        ))
    }
}

/// `second ∘ first`.
#[derive(Clone, Debug, Default)]
pub struct Chain<A, B> {
    pub first: A,
    pub second: B,
}

impl<A, B> Chain<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A: Model, B: Model> Model for Chain<A, B> {
    fn forward(&self, image: &Tensor) -> Result<Tensor, ModelError> {
        self.second.forward(&self.first.forward(image)?)
    }
    fn vjp(&self, image: &Tensor, cotangent: &Tensor) -> Result<Tensor, ModelError> {
        let mid = self.first.forward(image)?;
        let back = self.second.vjp(&mid, cotangent)?;
        self.first.vjp(image, &back)
    }
}
