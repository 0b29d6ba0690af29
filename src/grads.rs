//! Gradient Arena
//!
//! The gradient arena mirrors the parameter arena exactly: same total
//! length, same per-tensor offsets, so the optimizer can walk the two
//! buffers in lockstep without a per-tensor dispatch. An external
//! differentiation tool fills this buffer during the backward pass; here
//! it is allocated, zeroed, and inspected.
//!
//! ## Gradient Clipping
//!
//! Occasional batches produce outsized gradients that destabilize
//! training. Clipping rescales the whole buffer when its L2 norm exceeds
//! a threshold:
//!
//! ```text
//! norm = √(Σ g²)
//! if norm > max_norm:
//!     g *= max_norm / norm
//! ```
//!
//! All values scale by the same factor, so relative magnitudes between
//! tensors are preserved.

use rayon::prelude::*;

use crate::config::Config;
use crate::layout::{ParameterLayout, ParameterViews, ParameterViewsMut};

/// Flat gradient buffer sharing the parameter layout
pub struct GradientArena {
    layout: ParameterLayout,
    memory: Vec<f32>,
}

impl GradientArena {
    /// Allocate a zeroed gradient arena for `config`
    pub fn new(config: &Config) -> Self {
        let layout = ParameterLayout::new(config);
        let memory = vec![0.0; layout.total];
        Self { layout, memory }
    }

    pub fn len(&self) -> usize {
        self.layout.total
    }

    pub fn is_empty(&self) -> bool {
        self.layout.total == 0
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.memory
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.memory
    }

    /// Per-tensor views in declared order
    pub fn views(&self) -> ParameterViews<'_> {
        self.layout.split(&self.memory)
    }

    /// Mutable per-tensor views for the backward pass to fill
    pub fn views_mut(&mut self) -> ParameterViewsMut<'_> {
        self.layout.split_mut(&mut self.memory)
    }

    /// Reset all gradients to zero between steps
    pub fn zero(&mut self) {
        self.memory.par_iter_mut().for_each(|g| *g = 0.0);
    }
}

/// Compute the L2 norm of a gradient buffer
pub fn compute_grad_norm(grads: &[f32]) -> f32 {
    let sum_sq: f32 = grads.par_iter().map(|&g| g * g).sum();
    sum_sq.sqrt()
}

/// Scale gradients down so their L2 norm is at most `max_norm`
///
/// Returns the norm measured before clipping, for logging.
pub fn clip_gradients(grads: &mut [f32], max_norm: f32) -> f32 {
    let norm = compute_grad_norm(grads);
    if norm > max_norm {
        let scale = max_norm / norm;
        grads.par_iter_mut().for_each(|g| *g *= scale);
    }
    norm
}
