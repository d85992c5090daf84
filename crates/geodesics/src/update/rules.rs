use nalgebra::DVector;

use super::UpdateRule;
use crate::tensor::Tensor;

/// Plain gradient descent.
#[derive(Clone, Debug)]
pub struct GradientDescent {
    lr: f64,
}

impl GradientDescent {
    pub fn new(lr: f64) -> Self {
        Self { lr }
    }
}

impl UpdateRule for GradientDescent {
    fn name(&self) -> &'static str {
        "gradient-descent"
    }
    fn step(&mut self, params: &mut [Tensor], grads: &[Tensor]) {
        for (p, g) in params.iter_mut().zip(grads) {
            p.data_mut().axpy(-self.lr, g.data(), 1.0);
        }
    }
    fn learning_rate(&self) -> f64 {
        self.lr
    }
    fn set_learning_rate(&mut self, lr: f64) {
        self.lr = lr;
    }
    fn reset(&mut self) {}
    fn boxed_clone(&self) -> Box<dyn UpdateRule> {
        Box::new(self.clone())
    }
}

/// Heavy-ball momentum (PyTorch SGD convention, no dampening).
#[derive(Clone, Debug)]
pub struct Momentum {
    lr: f64,
    momentum: f64,
    buffers: Option<Vec<DVector<f64>>>,
}

impl Momentum {
    pub fn new(lr: f64, momentum: f64) -> Self {
        Self {
            lr,
            momentum,
            buffers: None,
        }
    }
}

impl UpdateRule for Momentum {
    fn name(&self) -> &'static str {
        "momentum"
    }
    fn step(&mut self, params: &mut [Tensor], grads: &[Tensor]) {
        let mu = self.momentum;
        match self.buffers.as_mut() {
            Some(bufs) => {
                for (b, g) in bufs.iter_mut().zip(grads) {
                    *b *= mu;
                    *b += g.data();
                }
            }
            None => self.buffers = Some(grads.iter().map(|g| g.data().clone()).collect()),
        }
        if let Some(bufs) = &self.buffers {
            for (p, b) in params.iter_mut().zip(bufs) {
                p.data_mut().axpy(-self.lr, b, 1.0);
            }
        }
    }
    fn learning_rate(&self) -> f64 {
        self.lr
    }
    fn set_learning_rate(&mut self, lr: f64) {
        self.lr = lr;
    }
    fn reset(&mut self) {
        self.buffers = None;
    }
    fn boxed_clone(&self) -> Box<dyn UpdateRule> {
        Box::new(self.clone())
    }
}

/// Adam with optional AMSGrad (PyTorch semantics).
#[derive(Clone, Debug)]
pub struct Adam {
    lr: f64,
    beta1: f64,
    beta2: f64,
    eps: f64,
    amsgrad: bool,
    t: i32,
    m: Vec<DVector<f64>>,
    v: Vec<DVector<f64>>,
    v_max: Vec<DVector<f64>>,
}

impl Adam {
    pub fn new(lr: f64, beta1: f64, beta2: f64, eps: f64, amsgrad: bool) -> Self {
        Self {
            lr,
            beta1,
            beta2,
            eps,
            amsgrad,
            t: 0,
            m: Vec::new(),
            v: Vec::new(),
            v_max: Vec::new(),
        }
    }

    fn ensure_state(&mut self, grads: &[Tensor]) {
        if self.m.len() != grads.len() {
            self.m = grads.iter().map(|g| DVector::zeros(g.len())).collect();
            self.v = self.m.clone();
            self.v_max = self.m.clone();
            self.t = 0;
        }
    }
}

impl UpdateRule for Adam {
    fn name(&self) -> &'static str {
        "adam"
    }
    fn step(&mut self, params: &mut [Tensor], grads: &[Tensor]) {
        self.ensure_state(grads);
        self.t = self.t.saturating_add(1);
        let (b1, b2) = (self.beta1, self.beta2);
        let bc1 = 1.0 - b1.powi(self.t);
        let bc2_sqrt = (1.0 - b2.powi(self.t)).sqrt();
        let step = self.lr / bc1;
        for (k, (p, g)) in params.iter_mut().zip(grads).enumerate() {
            let g = g.data();
            let m = &mut self.m[k];
            *m *= b1;
            m.axpy(1.0 - b1, g, 1.0);
            let v = &mut self.v[k];
            *v *= b2;
            *v += g.component_mul(g) * (1.0 - b2);
            let second = if self.amsgrad {
                let vm = &mut self.v_max[k];
                vm.zip_apply(&*v, |a, b| *a = a.max(b));
                &self.v_max[k]
            } else {
                &self.v[k]
            };
            let denom = second.map(|x| x.sqrt() / bc2_sqrt + self.eps);
            let update = self.m[k].component_div(&denom);
            p.data_mut().axpy(-step, &update, 1.0);
        }
    }
    fn learning_rate(&self) -> f64 {
        self.lr
    }
    fn set_learning_rate(&mut self, lr: f64) {
        self.lr = lr;
    }
    fn reset(&mut self) {
        self.t = 0;
        self.m.clear();
        self.v.clear();
        self.v_max.clear();
    }
    fn boxed_clone(&self) -> Box<dyn UpdateRule> {
        Box::new(self.clone())
    }
}
