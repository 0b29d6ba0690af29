//! GELU Activation
//!
//! The nonlinearity in the MLP block, using the tanh approximation:
//!
//! ```text
//! GELU(x) ≈ 0.5 × x × (1 + tanh(√(2/π) × (x + 0.044715 × x³)))
//! ```
//!
//! Applied independently per scalar, so the whole buffer fans out over
//! Rayon workers.

use rayon::prelude::*;

/// GELU forward pass, elementwise over equal-length buffers
pub fn gelu_forward(out: &mut [f32], inp: &[f32]) {
    assert_eq!(out.len(), inp.len());
    let scaling = (2.0 / std::f32::consts::PI).sqrt();
    out.par_iter_mut().zip(inp.par_iter()).for_each(|(o, &x)| {
        let cube = 0.044715 * x * x * x;
        *o = 0.5 * x * (1.0 + (scaling * (x + cube)).tanh());
    });
}
