use super::*;
use crate::tensor::Tensor;
use nalgebra::DMatrix;

/// Central finite differences of `⟨c, f(x)⟩` against the model's vjp.
fn assert_vjp_matches_fd<M: Model>(model: &M, x: &Tensor, c: &Tensor) {
    let g = model.vjp(x, c).unwrap();
    assert_eq!(g.shape(), x.shape());
    let h = 1e-6;
    for k in 0..x.len() {
        let mut xp = x.clone();
        let mut xm = x.clone();
        xp.data_mut()[k] += h;
        xm.data_mut()[k] -= h;
        let fp = model.forward(&xp).unwrap().data().dot(c.data());
        let fm = model.forward(&xm).unwrap().data().dot(c.data());
        let fd = (fp - fm) / (2.0 * h);
        assert!(
            (fd - g.data()[k]).abs() < 1e-6,
            "component {k}: fd={fd} vjp={}",
            g.data()[k]
        );
    }
}

fn sample_image() -> Tensor {
    Tensor::new(vec![2, 3], vec![0.3, -0.7, 1.1, 0.05, -0.4, 0.9]).unwrap()
}

#[test]
fn identity_and_tanh_vjp() {
    let x = sample_image();
    let c = Tensor::new(vec![2, 3], vec![1.0, 0.5, -0.25, 2.0, -1.0, 0.1]).unwrap();
    assert_vjp_matches_fd(&Identity, &x, &c);
    assert_vjp_matches_fd(&Tanh, &x, &c);
    assert_eq!(Identity.forward(&x).unwrap(), x);
}

#[test]
fn normalize_vjp_and_zero_input() {
    let x = sample_image();
    let c = Tensor::new(vec![2, 3], vec![0.2, -0.1, 0.4, 0.0, 1.0, -0.3]).unwrap();
    assert_vjp_matches_fd(&Normalize, &x, &c);
    let r = Normalize.forward(&x).unwrap();
    assert!((r.norm() - 1.0).abs() < 1e-12);
    assert!(Normalize.forward(&Tensor::zeros(&[2, 3])).is_err());
}

#[test]
fn linear_shapes_and_vjp() {
    let lin = Linear::random(6, 4, 7);
    let x = sample_image();
    let r = lin.forward(&x).unwrap();
    assert_eq!(r.shape(), &[4]);
    let c = Tensor::new(vec![4], vec![1.0, -2.0, 0.5, 0.25]).unwrap();
    assert_vjp_matches_fd(&lin, &x, &c);
    // Wrong input size is a model error, not a panic.
    assert!(lin.forward(&Tensor::zeros(&[5])).is_err());
    assert!(Linear::new(DMatrix::zeros(3, 6), vec![2, 2]).is_err());
    // Same seed, same weights.
    assert_eq!(Linear::random(6, 4, 7).weight(), lin.weight());
}

#[test]
fn chain_composes_forward_and_vjp() {
    let model = Chain::new(Linear::random(6, 5, 1), Tanh);
    let x = sample_image();
    let c = Tensor::new(vec![5], vec![0.3, 0.1, -0.2, 0.7, -1.0]).unwrap();
    assert_vjp_matches_fd(&model, &x, &c);
    let boxed: Box<dyn Model> = Box::new(model);
    assert_eq!(boxed.forward(&x).unwrap().shape(), &[5]);
}
