//! Residual Connection
//!
//! Elementwise sum of two equal-shaped buffers. Each transformer layer
//! has two of these: one folding the attention projection back into the
//! stream, one folding the MLP projection back in.

use rayon::prelude::*;

/// Residual forward pass: out[i] = inp1[i] + inp2[i]
pub fn residual_forward(out: &mut [f32], inp1: &[f32], inp2: &[f32]) {
    assert_eq!(out.len(), inp1.len());
    assert_eq!(out.len(), inp2.len());
    out.par_iter_mut()
        .zip(inp1.par_iter())
        .zip(inp2.par_iter())
        .for_each(|((o, &a), &b)| {
            *o = a + b;
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_residual_sums_elementwise() {
        let a = vec![1.0, 2.0, 3.0];
        let b = vec![0.5, -2.0, 10.0];
        let mut out = vec![0.0; 3];
        residual_forward(&mut out, &a, &b);
        assert_eq!(out, vec![1.5, 0.0, 13.0]);
    }

    #[test]
    #[should_panic]
    fn test_shape_mismatch_rejected() {
        let mut out = vec![0.0; 2];
        residual_forward(&mut out, &[1.0, 2.0], &[1.0]);
    }
}
