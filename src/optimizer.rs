//! AdamW Optimizer
//!
//! AdamW (Adam with decoupled Weight decay) is the standard optimizer for
//! transformer training. For each parameter θ with gradient g:
//!
//! ```text
//! m = β₁·m + (1-β₁)·g         # first moment (momentum)
//! v = β₂·v + (1-β₂)·g²        # second moment (variance)
//! m̂ = m / (1 - β₁ᵗ)           # bias correction
//! v̂ = v / (1 - β₂ᵗ)
//! θ = θ - α·(m̂ / (√v̂ + ε) + λ·θ)
//! ```
//!
//! where α is the learning rate, λ the weight decay, and t the step count.
//! The bias correction terms matter in early steps, when m and v are still
//! biased toward their zero initialization.
//!
//! Because parameters and gradients live in flat arenas with identical
//! layouts, the moment buffers are flat too and the update is a single
//! elementwise pass, parallelized with Rayon.

use rayon::prelude::*;

/// AdamW state: first and second moment buffers plus hyperparameters
pub struct AdamW {
    m: Vec<f32>,
    v: Vec<f32>,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    weight_decay: f32,
    step: usize,
}

impl AdamW {
    /// Conventional transformer defaults: β₁=0.9, β₂=0.999, ε=1e-8
    pub fn new(num_parameters: usize, weight_decay: f32) -> Self {
        Self {
            m: vec![0.0; num_parameters],
            v: vec![0.0; num_parameters],
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            weight_decay,
            step: 0,
        }
    }

    pub fn with_betas(mut self, beta1: f32, beta2: f32) -> Self {
        self.beta1 = beta1;
        self.beta2 = beta2;
        self
    }

    /// Number of completed update steps
    pub fn step_count(&self) -> usize {
        self.step
    }

    /// Apply one AdamW step to `params` given `grads`
    ///
    /// Both slices must be the full arenas this optimizer was sized for;
    /// the moments are walked in lockstep by offset.
    pub fn update(&mut self, params: &mut [f32], grads: &[f32], learning_rate: f32) {
        assert_eq!(
            params.len(),
            self.m.len(),
            "optimizer sized for {} parameters, got {}",
            self.m.len(),
            params.len()
        );
        assert_eq!(params.len(), grads.len(), "params and grads must match");

        self.step += 1;
        let beta1 = self.beta1;
        let beta2 = self.beta2;
        let bias_correction1 = 1.0 - beta1.powi(self.step as i32);
        let bias_correction2 = 1.0 - beta2.powi(self.step as i32);
        let epsilon = self.epsilon;
        let weight_decay = self.weight_decay;

        params
            .par_iter_mut()
            .zip(grads.par_iter())
            .zip(self.m.par_iter_mut().zip(self.v.par_iter_mut()))
            .for_each(|((param, &grad), (m, v))| {
                *m = beta1 * *m + (1.0 - beta1) * grad;
                *v = beta2 * *v + (1.0 - beta2) * grad * grad;
                let m_hat = *m / bias_correction1;
                let v_hat = *v / bias_correction2;
                *param -= learning_rate * (m_hat / (v_hat.sqrt() + epsilon) + weight_decay * *param);
            });
    }
}
