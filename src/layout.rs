//! Tensor Layout Manager
//!
//! Every weight and every intermediate value of the model lives inside one
//! of two contiguous `f32` arenas: the parameter arena and the activation
//! arena. This module computes the element count of each named tensor as a
//! closed-form product of the hyperparameters, assigns each tensor a
//! running offset in a fixed declared order, and hands out typed slice
//! views into an arena at those offsets.
//!
//! ## Why one arena per group
//!
//! The backward pass is produced by an external reverse-mode
//! differentiation tool that mirrors the parameter arena one-to-one into a
//! gradient arena, and the optimizer updates parameters, gradients, and
//! its two moment buffers by a single shared flat index. That only works
//! if the offset of every tensor is a deterministic function of the
//! hyperparameters alone: re-deriving the layout from the same config must
//! reproduce the same offsets, and a checkpoint written in declared order
//! must load back into identical positions.
//!
//! ## Declared order
//!
//! Parameters (16 tensors): wte, wpe, ln1w, ln1b, qkvw, qkvb, attprojw,
//! attprojb, ln2w, ln2b, fcw, fcb, fcprojw, fcprojb, lnfw, lnfb.
//! Per-layer tensors store all `L` layers contiguously, indexed by a layer
//! stride (e.g. `qkvw` is `(L, 3C, C)` flattened).
//!
//! Activations (23 tensors): encoded, ln1, ln1_mean, ln1_rstd, qkv, atty,
//! preatt, att, attproj, residual2, ln2, ln2_mean, ln2_rstd, fch,
//! fch_gelu, fcproj, residual3, lnf, lnf_mean, lnf_rstd, logits, probs,
//! losses. The attention score tensors `preatt`/`att` are shaped
//! `(L, B, NH, T, T)` and dominate memory at long sequence lengths.
//!
//! ## Views, not allocations
//!
//! The arena owns the memory; the named tensors are non-owning slices
//! carved out of it with `split_at`/`split_at_mut` in declared order. No
//! kernel ever allocates.

use crate::config::Config;

/// Number of named tensors in the parameter arena
pub const NUM_PARAMETER_TENSORS: usize = 16;
/// Number of named tensors in the activation arena
pub const NUM_ACTIVATION_TENSORS: usize = 23;

/// Element counts of the 16 parameter tensors, in declared order
///
/// Note that `wte` has `padded_vocab_size` rows, not `vocab_size`: the
/// padded rows exist so the tied final projection is `Vp` wide, but no
/// valid token ever indexes them.
pub fn parameter_sizes(config: &Config) -> [usize; NUM_PARAMETER_TENSORS] {
    let vp = config.padded_vocab_size;
    let c = config.channels;
    let max_t = config.max_seq_len;
    let l = config.num_layers;
    [
        vp * c,         // wte
        max_t * c,      // wpe
        l * c,          // ln1w
        l * c,          // ln1b
        l * 3 * c * c,  // qkvw
        l * 3 * c,      // qkvb
        l * c * c,      // attprojw
        l * c,          // attprojb
        l * c,          // ln2w
        l * c,          // ln2b
        l * 4 * c * c,  // fcw
        l * 4 * c,      // fcb
        l * c * 4 * c,  // fcprojw
        l * c,          // fcprojb
        c,              // lnfw
        c,              // lnfb
    ]
}

/// Element counts of the 23 activation tensors for a (B, T) shape
pub fn activation_sizes(
    config: &Config,
    batch_size: usize,
    seq_len: usize,
) -> [usize; NUM_ACTIVATION_TENSORS] {
    let b = batch_size;
    let t = seq_len;
    let c = config.channels;
    let nh = config.num_heads;
    let l = config.num_layers;
    let vp = config.padded_vocab_size;
    [
        b * t * c,          // encoded
        l * b * t * c,      // ln1
        l * b * t,          // ln1_mean
        l * b * t,          // ln1_rstd
        l * b * t * 3 * c,  // qkv
        l * b * t * c,      // atty
        l * b * nh * t * t, // preatt
        l * b * nh * t * t, // att
        l * b * t * c,      // attproj
        l * b * t * c,      // residual2
        l * b * t * c,      // ln2
        l * b * t,          // ln2_mean
        l * b * t,          // ln2_rstd
        l * b * t * 4 * c,  // fch
        l * b * t * 4 * c,  // fch_gelu
        l * b * t * c,      // fcproj
        l * b * t * c,      // residual3
        b * t * c,          // lnf
        b * t,              // lnf_mean
        b * t,              // lnf_rstd
        b * t * vp,         // logits
        b * t * vp,         // probs
        b * t,              // losses
    ]
}

fn running_offsets<const N: usize>(sizes: &[usize; N]) -> ([usize; N], usize) {
    let mut offsets = [0usize; N];
    let mut total = 0usize;
    for (offset, &size) in offsets.iter_mut().zip(sizes.iter()) {
        *offset = total;
        total += size;
    }
    (offsets, total)
}

/// Sizes and offsets of the parameter arena for a given config
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParameterLayout {
    pub sizes: [usize; NUM_PARAMETER_TENSORS],
    pub offsets: [usize; NUM_PARAMETER_TENSORS],
    pub total: usize,
}

impl ParameterLayout {
    pub fn new(config: &Config) -> Self {
        config.assert_valid();
        let sizes = parameter_sizes(config);
        let (offsets, total) = running_offsets(&sizes);
        Self {
            sizes,
            offsets,
            total,
        }
    }

    /// Carve the arena into one shared view per parameter tensor
    pub fn split<'a>(&self, buf: &'a [f32]) -> ParameterViews<'a> {
        assert_eq!(
            buf.len(),
            self.total,
            "parameter arena has {} floats, layout expects {}",
            buf.len(),
            self.total
        );
        let (wte, rest) = buf.split_at(self.sizes[0]);
        let (wpe, rest) = rest.split_at(self.sizes[1]);
        let (ln1w, rest) = rest.split_at(self.sizes[2]);
        let (ln1b, rest) = rest.split_at(self.sizes[3]);
        let (qkvw, rest) = rest.split_at(self.sizes[4]);
        let (qkvb, rest) = rest.split_at(self.sizes[5]);
        let (attprojw, rest) = rest.split_at(self.sizes[6]);
        let (attprojb, rest) = rest.split_at(self.sizes[7]);
        let (ln2w, rest) = rest.split_at(self.sizes[8]);
        let (ln2b, rest) = rest.split_at(self.sizes[9]);
        let (fcw, rest) = rest.split_at(self.sizes[10]);
        let (fcb, rest) = rest.split_at(self.sizes[11]);
        let (fcprojw, rest) = rest.split_at(self.sizes[12]);
        let (fcprojb, rest) = rest.split_at(self.sizes[13]);
        let (lnfw, rest) = rest.split_at(self.sizes[14]);
        let (lnfb, rest) = rest.split_at(self.sizes[15]);
        debug_assert!(rest.is_empty());
        ParameterViews {
            wte,
            wpe,
            ln1w,
            ln1b,
            qkvw,
            qkvb,
            attprojw,
            attprojb,
            ln2w,
            ln2b,
            fcw,
            fcb,
            fcprojw,
            fcprojb,
            lnfw,
            lnfb,
        }
    }

    /// Carve the arena into one mutable view per parameter tensor
    ///
    /// The views are disjoint, so initialization (or an optimizer walking
    /// tensor by tensor) can hold all of them at once.
    pub fn split_mut<'a>(&self, buf: &'a mut [f32]) -> ParameterViewsMut<'a> {
        assert_eq!(
            buf.len(),
            self.total,
            "parameter arena has {} floats, layout expects {}",
            buf.len(),
            self.total
        );
        let (wte, rest) = buf.split_at_mut(self.sizes[0]);
        let (wpe, rest) = rest.split_at_mut(self.sizes[1]);
        let (ln1w, rest) = rest.split_at_mut(self.sizes[2]);
        let (ln1b, rest) = rest.split_at_mut(self.sizes[3]);
        let (qkvw, rest) = rest.split_at_mut(self.sizes[4]);
        let (qkvb, rest) = rest.split_at_mut(self.sizes[5]);
        let (attprojw, rest) = rest.split_at_mut(self.sizes[6]);
        let (attprojb, rest) = rest.split_at_mut(self.sizes[7]);
        let (ln2w, rest) = rest.split_at_mut(self.sizes[8]);
        let (ln2b, rest) = rest.split_at_mut(self.sizes[9]);
        let (fcw, rest) = rest.split_at_mut(self.sizes[10]);
        let (fcb, rest) = rest.split_at_mut(self.sizes[11]);
        let (fcprojw, rest) = rest.split_at_mut(self.sizes[12]);
        let (fcprojb, rest) = rest.split_at_mut(self.sizes[13]);
        let (lnfw, rest) = rest.split_at_mut(self.sizes[14]);
        let (lnfb, rest) = rest.split_at_mut(self.sizes[15]);
        debug_assert!(rest.is_empty());
        ParameterViewsMut {
            wte,
            wpe,
            ln1w,
            ln1b,
            qkvw,
            qkvb,
            attprojw,
            attprojb,
            ln2w,
            ln2b,
            fcw,
            fcb,
            fcprojw,
            fcprojb,
            lnfw,
            lnfb,
        }
    }
}

/// Shared views into the parameter arena, one per named tensor
///
/// Logical shapes (all flattened row-major):
/// wte (Vp, C), wpe (maxT, C), ln1w/ln1b (L, C), qkvw (L, 3C, C),
/// qkvb (L, 3C), attprojw (L, C, C), attprojb (L, C), ln2w/ln2b (L, C),
/// fcw (L, 4C, C), fcb (L, 4C), fcprojw (L, C, 4C), fcprojb (L, C),
/// lnfw/lnfb (C).
pub struct ParameterViews<'a> {
    pub wte: &'a [f32],
    pub wpe: &'a [f32],
    pub ln1w: &'a [f32],
    pub ln1b: &'a [f32],
    pub qkvw: &'a [f32],
    pub qkvb: &'a [f32],
    pub attprojw: &'a [f32],
    pub attprojb: &'a [f32],
    pub ln2w: &'a [f32],
    pub ln2b: &'a [f32],
    pub fcw: &'a [f32],
    pub fcb: &'a [f32],
    pub fcprojw: &'a [f32],
    pub fcprojb: &'a [f32],
    pub lnfw: &'a [f32],
    pub lnfb: &'a [f32],
}

/// Mutable views into the parameter arena, one per named tensor
pub struct ParameterViewsMut<'a> {
    pub wte: &'a mut [f32],
    pub wpe: &'a mut [f32],
    pub ln1w: &'a mut [f32],
    pub ln1b: &'a mut [f32],
    pub qkvw: &'a mut [f32],
    pub qkvb: &'a mut [f32],
    pub attprojw: &'a mut [f32],
    pub attprojb: &'a mut [f32],
    pub ln2w: &'a mut [f32],
    pub ln2b: &'a mut [f32],
    pub fcw: &'a mut [f32],
    pub fcb: &'a mut [f32],
    pub fcprojw: &'a mut [f32],
    pub fcprojb: &'a mut [f32],
    pub lnfw: &'a mut [f32],
    pub lnfb: &'a mut [f32],
}

/// Sizes and offsets of the activation arena for a given (config, B, T)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActivationLayout {
    pub sizes: [usize; NUM_ACTIVATION_TENSORS],
    pub offsets: [usize; NUM_ACTIVATION_TENSORS],
    pub total: usize,
}

impl ActivationLayout {
    pub fn new(config: &Config, batch_size: usize, seq_len: usize) -> Self {
        config.assert_valid();
        assert!(batch_size > 0 && seq_len > 0, "B and T must be positive");
        assert!(
            seq_len <= config.max_seq_len,
            "sequence length {} exceeds max_seq_len {}",
            seq_len,
            config.max_seq_len
        );
        let sizes = activation_sizes(config, batch_size, seq_len);
        let (offsets, total) = running_offsets(&sizes);
        Self {
            sizes,
            offsets,
            total,
        }
    }

    /// Carve the arena into one mutable view per activation tensor
    ///
    /// All 23 views are disjoint, so the orchestrator can thread one
    /// kernel's output view into the next kernel's input without any
    /// aliasing. This is the only place the activation arena is split.
    pub fn split_mut<'a>(&self, buf: &'a mut [f32]) -> ActivationViews<'a> {
        assert_eq!(
            buf.len(),
            self.total,
            "activation arena has {} floats, layout expects {}",
            buf.len(),
            self.total
        );
        let (encoded, rest) = buf.split_at_mut(self.sizes[0]);
        let (ln1, rest) = rest.split_at_mut(self.sizes[1]);
        let (ln1_mean, rest) = rest.split_at_mut(self.sizes[2]);
        let (ln1_rstd, rest) = rest.split_at_mut(self.sizes[3]);
        let (qkv, rest) = rest.split_at_mut(self.sizes[4]);
        let (atty, rest) = rest.split_at_mut(self.sizes[5]);
        let (preatt, rest) = rest.split_at_mut(self.sizes[6]);
        let (att, rest) = rest.split_at_mut(self.sizes[7]);
        let (attproj, rest) = rest.split_at_mut(self.sizes[8]);
        let (residual2, rest) = rest.split_at_mut(self.sizes[9]);
        let (ln2, rest) = rest.split_at_mut(self.sizes[10]);
        let (ln2_mean, rest) = rest.split_at_mut(self.sizes[11]);
        let (ln2_rstd, rest) = rest.split_at_mut(self.sizes[12]);
        let (fch, rest) = rest.split_at_mut(self.sizes[13]);
        let (fch_gelu, rest) = rest.split_at_mut(self.sizes[14]);
        let (fcproj, rest) = rest.split_at_mut(self.sizes[15]);
        let (residual3, rest) = rest.split_at_mut(self.sizes[16]);
        let (lnf, rest) = rest.split_at_mut(self.sizes[17]);
        let (lnf_mean, rest) = rest.split_at_mut(self.sizes[18]);
        let (lnf_rstd, rest) = rest.split_at_mut(self.sizes[19]);
        let (logits, rest) = rest.split_at_mut(self.sizes[20]);
        let (probs, rest) = rest.split_at_mut(self.sizes[21]);
        let (losses, rest) = rest.split_at_mut(self.sizes[22]);
        debug_assert!(rest.is_empty());
        ActivationViews {
            encoded,
            ln1,
            ln1_mean,
            ln1_rstd,
            qkv,
            atty,
            preatt,
            att,
            attproj,
            residual2,
            ln2,
            ln2_mean,
            ln2_rstd,
            fch,
            fch_gelu,
            fcproj,
            residual3,
            lnf,
            lnf_mean,
            lnf_rstd,
            logits,
            probs,
            losses,
        }
    }

    /// Flat range of the logits tensor within the arena
    pub fn logits_range(&self) -> std::ops::Range<usize> {
        self.offsets[20]..self.offsets[20] + self.sizes[20]
    }

    /// Flat range of the probability tensor within the arena
    pub fn probs_range(&self) -> std::ops::Range<usize> {
        self.offsets[21]..self.offsets[21] + self.sizes[21]
    }

    /// Flat range of the per-position loss tensor within the arena
    pub fn losses_range(&self) -> std::ops::Range<usize> {
        self.offsets[22]..self.offsets[22] + self.sizes[22]
    }
}

/// Mutable views into the activation arena, one per named tensor
///
/// Logical shapes: `encoded` (B,T,C); per-layer tensors carry a leading
/// `L` dimension, e.g. `qkv` (L,B,T,3C) and `preatt`/`att` (L,B,NH,T,T);
/// the tail is `lnf` (B,T,C), its stats (B,T), `logits`/`probs` (B,T,Vp),
/// and `losses` (B,T).
pub struct ActivationViews<'a> {
    pub encoded: &'a mut [f32],
    pub ln1: &'a mut [f32],
    pub ln1_mean: &'a mut [f32],
    pub ln1_rstd: &'a mut [f32],
    pub qkv: &'a mut [f32],
    pub atty: &'a mut [f32],
    pub preatt: &'a mut [f32],
    pub att: &'a mut [f32],
    pub attproj: &'a mut [f32],
    pub residual2: &'a mut [f32],
    pub ln2: &'a mut [f32],
    pub ln2_mean: &'a mut [f32],
    pub ln2_rstd: &'a mut [f32],
    pub fch: &'a mut [f32],
    pub fch_gelu: &'a mut [f32],
    pub fcproj: &'a mut [f32],
    pub residual3: &'a mut [f32],
    pub lnf: &'a mut [f32],
    pub lnf_mean: &'a mut [f32],
    pub lnf_rstd: &'a mut [f32],
    pub logits: &'a mut [f32],
    pub probs: &'a mut [f32],
    pub losses: &'a mut [f32],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_total_gpt2_small() {
        // The 124M checkpoint: known parameter count with padded vocab
        let layout = ParameterLayout::new(&Config::gpt2_small());
        let expected: usize = parameter_sizes(&Config::gpt2_small()).iter().sum();
        assert_eq!(layout.total, expected);
        // wte alone is Vp * C
        assert_eq!(layout.sizes[0], 50304 * 768);
    }

    #[test]
    fn test_offsets_are_contiguous() {
        let config = Config::tiny(10);
        let layout = ParameterLayout::new(&config);
        for i in 1..NUM_PARAMETER_TENSORS {
            assert_eq!(
                layout.offsets[i],
                layout.offsets[i - 1] + layout.sizes[i - 1]
            );
        }
        assert_eq!(
            layout.total,
            layout.offsets[NUM_PARAMETER_TENSORS - 1] + layout.sizes[NUM_PARAMETER_TENSORS - 1]
        );
    }

    #[test]
    fn test_layout_is_deterministic() {
        // Re-deriving from the same hyperparameters reproduces identical
        // offsets; checkpoint portability depends on this.
        let config = Config::small(512);
        assert_eq!(ParameterLayout::new(&config), ParameterLayout::new(&config));
        assert_eq!(
            ActivationLayout::new(&config, 2, 16),
            ActivationLayout::new(&config, 2, 16)
        );
    }

    #[test]
    fn test_activation_sizes_tiny() {
        let config = Config::tiny(10);
        let (b, t) = (2, 4);
        let sizes = activation_sizes(&config, b, t);
        let c = config.channels;
        let nh = config.num_heads;
        assert_eq!(sizes[0], b * t * c); // encoded
        assert_eq!(sizes[6], b * nh * t * t); // preatt, L = 1
        assert_eq!(sizes[20], b * t * config.padded_vocab_size); // logits
        assert_eq!(sizes[22], b * t); // losses
    }

    #[test]
    fn test_split_views_cover_arena() {
        let config = Config::tiny(10);
        let layout = ParameterLayout::new(&config);
        let buf = vec![0.0f32; layout.total];
        let views = layout.split(&buf);
        let covered = views.wte.len()
            + views.wpe.len()
            + views.ln1w.len()
            + views.ln1b.len()
            + views.qkvw.len()
            + views.qkvb.len()
            + views.attprojw.len()
            + views.attprojb.len()
            + views.ln2w.len()
            + views.ln2b.len()
            + views.fcw.len()
            + views.fcb.len()
            + views.fcprojw.len()
            + views.fcprojb.len()
            + views.lnfw.len()
            + views.lnfb.len();
        assert_eq!(covered, layout.total);
    }

    #[test]
    fn test_activation_split_views() {
        let config = Config::tiny(10);
        let layout = ActivationLayout::new(&config, 1, 3);
        let mut buf = vec![0.0f32; layout.total];
        let views = layout.split_mut(&mut buf);
        assert_eq!(views.encoded.len(), 3 * config.channels);
        assert_eq!(views.losses.len(), 3);
        // Writing through one view lands at the layout's offset
        views.logits[0] = 7.0;
        drop(views);
        assert_eq!(buf[layout.offsets[20]], 7.0);
    }

    #[test]
    #[should_panic(expected = "layout expects")]
    fn test_wrong_arena_size_rejected() {
        let config = Config::tiny(10);
        let layout = ParameterLayout::new(&config);
        let buf = vec![0.0f32; layout.total - 1];
        layout.split(&buf);
    }

    #[test]
    #[should_panic(expected = "exceeds max_seq_len")]
    fn test_overlong_sequence_rejected() {
        let config = Config::tiny(10);
        ActivationLayout::new(&config, 1, config.max_seq_len + 1);
    }
}
