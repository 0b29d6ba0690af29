//! Model Orchestrator
//!
//! [`Gpt2`] owns the parameter arena, lazily allocates the activation
//! arena for a fixed (batch, sequence) shape, and composes the kernels
//! into the full forward pass:
//!
//! ```text
//! tokens
//!   ↓ encoder (token + position embedding)
//! per layer: layernorm → QKV matmul → attention → attproj matmul
//!            → residual → layernorm → fc matmul → GELU
//!            → fcproj matmul → residual
//!   ↓
//! final layernorm → logits (tied to wte) → softmax → cross-entropy
//! ```
//!
//! Layer l+1 reads layer l's second residual stream; layer 0 reads the
//! encoder output directly. The final projection reuses the token
//! embedding table as its weight (weight tying) with no bias, so logits
//! rows are `padded_vocab_size` wide.
//!
//! During a forward pass the orchestrator is the sole writer of the
//! activation arena; the external differentiation tool is the sole writer
//! of the mirrored gradient arenas during a backward pass. The two must
//! not run concurrently against the same model, which `&mut self` on
//! [`Gpt2::forward`] enforces at compile time.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::config::Config;
use crate::kernels::{
    attention_forward, crossentropy_forward, encoder_forward, gelu_forward, layernorm_forward,
    matmul_forward, residual_forward, softmax_forward,
};
use crate::layout::{ActivationLayout, ParameterLayout};

/// Sentinel returned by a forward pass that ran without targets
pub const NO_LOSS: f32 = -1.0;

/// Activation arena bound to the (B, T) shape it was sized for
#[derive(Debug)]
struct Activations {
    layout: ActivationLayout,
    memory: Vec<f32>,
    batch_size: usize,
    seq_len: usize,
}

/// A GPT-2 style model over flat arenas
#[derive(Debug)]
pub struct Gpt2 {
    config: Config,
    param_layout: ParameterLayout,
    params_memory: Vec<f32>,
    acts: Option<Activations>,
    mean_loss: f32,
}

impl Gpt2 {
    /// Build a model from a flat parameter buffer in declared tensor order
    ///
    /// This is the checkpoint-loading entry point: the buffer length must
    /// equal the parameter layout total for `config`, anything else is a
    /// fatal contract violation.
    pub fn from_parameters(config: &Config, params_memory: Vec<f32>) -> Self {
        config.assert_valid();
        let param_layout = ParameterLayout::new(config);
        assert_eq!(
            params_memory.len(),
            param_layout.total,
            "parameter buffer holds {} floats but config requires {}",
            params_memory.len(),
            param_layout.total
        );
        Self {
            config: config.clone(),
            param_layout,
            params_memory,
            acts: None,
            mean_loss: NO_LOSS,
        }
    }

    /// Build a randomly initialized model
    ///
    /// Weights and embeddings are drawn from N(0, 0.02); biases start at
    /// zero and layernorm scales at one. Deterministic for a given seed.
    pub fn random(config: &Config, seed: u64) -> Self {
        let mut model = Self::from_parameters(
            config,
            vec![0.0; ParameterLayout::new(config).total],
        );
        let mut rng = StdRng::seed_from_u64(seed);
        let normal = Normal::new(0.0, 0.02).unwrap();

        let views = model.param_layout.split_mut(&mut model.params_memory);
        for buf in [
            views.wte,
            views.wpe,
            views.qkvw,
            views.attprojw,
            views.fcw,
            views.fcprojw,
        ] {
            for w in buf.iter_mut() {
                *w = normal.sample(&mut rng);
            }
        }
        views.ln1w.fill(1.0);
        views.ln2w.fill(1.0);
        views.lnfw.fill(1.0);
        model
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn param_layout(&self) -> &ParameterLayout {
        &self.param_layout
    }

    /// Total number of parameters in the arena
    pub fn num_parameters(&self) -> usize {
        self.param_layout.total
    }

    /// Total number of activations, once allocated
    pub fn num_activations(&self) -> Option<usize> {
        self.acts.as_ref().map(|a| a.layout.total)
    }

    /// The flat parameter arena, in declared tensor order
    pub fn parameters(&self) -> &[f32] {
        &self.params_memory
    }

    /// Mutable access for the optimizer; offsets are fixed by the layout
    pub fn parameters_mut(&mut self) -> &mut [f32] {
        &mut self.params_memory
    }

    /// Mean loss of the most recent forward pass ([`NO_LOSS`] if none)
    pub fn mean_loss(&self) -> f32 {
        self.mean_loss
    }

    /// Logits of the most recent forward pass, (B, T, Vp)
    ///
    /// Panics if no forward pass has run yet.
    pub fn logits(&self) -> &[f32] {
        let acts = self.acts.as_ref().expect("no forward pass has run");
        &acts.memory[acts.layout.logits_range()]
    }

    /// Probabilities of the most recent forward pass, (B, T, Vp)
    pub fn probs(&self) -> &[f32] {
        let acts = self.acts.as_ref().expect("no forward pass has run");
        &acts.memory[acts.layout.probs_range()]
    }

    /// Per-position losses of the most recent forward pass, (B, T)
    pub fn losses(&self) -> &[f32] {
        let acts = self.acts.as_ref().expect("no forward pass has run");
        &acts.memory[acts.layout.losses_range()]
    }

    /// Allocate the activation arena for a (B, T) shape
    ///
    /// The arena is sized once; asking for a different shape later is a
    /// fatal configuration mismatch, not a resize.
    pub fn allocate(&mut self, batch_size: usize, seq_len: usize) {
        match &self.acts {
            Some(acts) => {
                assert!(
                    acts.batch_size == batch_size && acts.seq_len == seq_len,
                    "activations were allocated for B={} T={}, requested B={} T={}",
                    acts.batch_size,
                    acts.seq_len,
                    batch_size,
                    seq_len
                );
            }
            None => {
                let layout = ActivationLayout::new(&self.config, batch_size, seq_len);
                let memory = vec![0.0; layout.total];
                self.acts = Some(Activations {
                    layout,
                    memory,
                    batch_size,
                    seq_len,
                });
            }
        }
    }

    /// Release the activation arena so a new (B, T) shape can be bound
    pub fn release_activations(&mut self) {
        self.acts = None;
        self.mean_loss = NO_LOSS;
    }

    /// Run the forward pass, returning the mean loss
    ///
    /// `inputs` (and `targets`, when present) are (B, T) token ids, all
    /// validated to lie in `[0, vocab_size)` before any kernel reads
    /// them. With targets the return value is the cross-entropy averaged
    /// uniformly over all B·T positions; without targets it is the
    /// [`NO_LOSS`] sentinel and the probabilities are left in the arena
    /// for sampling.
    pub fn forward(
        &mut self,
        inputs: &[usize],
        targets: Option<&[usize]>,
        batch_size: usize,
        seq_len: usize,
    ) -> f32 {
        let v = self.config.vocab_size;
        let vp = self.config.padded_vocab_size;
        let c = self.config.channels;
        let nh = self.config.num_heads;
        let num_layers = self.config.num_layers;

        // Validate every token id once, before any kernel runs
        assert_eq!(inputs.len(), batch_size * seq_len, "inputs must be B*T ids");
        for &ix in inputs {
            assert!(ix < v, "input token id {} out of vocab range {}", ix, v);
        }
        if let Some(targets) = targets {
            assert_eq!(targets.len(), batch_size * seq_len, "targets must be B*T ids");
            for &ix in targets {
                assert!(ix < v, "target token id {} out of vocab range {}", ix, v);
            }
        }

        self.allocate(batch_size, seq_len);

        let b = batch_size;
        let t = seq_len;
        let btc = b * t * c;
        let bt = b * t;
        let tt_per_layer = b * nh * t * t;

        let p = self.param_layout.split(&self.params_memory);
        let acts = self.acts.as_mut().expect("just allocated");
        let a = acts.layout.split_mut(&mut acts.memory);

        encoder_forward(&mut a.encoded[..], inputs, p.wte, p.wpe, b, t, c);

        for l in 0..num_layers {
            // Layer l reads layer l-1's second residual stream; splitting
            // residual3 keeps the read and the write disjoint
            let (r3_done, r3_now) = a.residual3.split_at_mut(l * btc);
            let residual: &[f32] = if l == 0 {
                &a.encoded[..]
            } else {
                &r3_done[(l - 1) * btc..]
            };

            let l_ln1w = &p.ln1w[l * c..(l + 1) * c];
            let l_ln1b = &p.ln1b[l * c..(l + 1) * c];
            let l_qkvw = &p.qkvw[l * 3 * c * c..(l + 1) * 3 * c * c];
            let l_qkvb = &p.qkvb[l * 3 * c..(l + 1) * 3 * c];
            let l_attprojw = &p.attprojw[l * c * c..(l + 1) * c * c];
            let l_attprojb = &p.attprojb[l * c..(l + 1) * c];
            let l_ln2w = &p.ln2w[l * c..(l + 1) * c];
            let l_ln2b = &p.ln2b[l * c..(l + 1) * c];
            let l_fcw = &p.fcw[l * 4 * c * c..(l + 1) * 4 * c * c];
            let l_fcb = &p.fcb[l * 4 * c..(l + 1) * 4 * c];
            let l_fcprojw = &p.fcprojw[l * 4 * c * c..(l + 1) * 4 * c * c];
            let l_fcprojb = &p.fcprojb[l * c..(l + 1) * c];

            let l_ln1 = &mut a.ln1[l * btc..(l + 1) * btc];
            let l_ln1_mean = &mut a.ln1_mean[l * bt..(l + 1) * bt];
            let l_ln1_rstd = &mut a.ln1_rstd[l * bt..(l + 1) * bt];
            let l_qkv = &mut a.qkv[l * 3 * btc..(l + 1) * 3 * btc];
            let l_atty = &mut a.atty[l * btc..(l + 1) * btc];
            let l_preatt = &mut a.preatt[l * tt_per_layer..(l + 1) * tt_per_layer];
            let l_att = &mut a.att[l * tt_per_layer..(l + 1) * tt_per_layer];
            let l_attproj = &mut a.attproj[l * btc..(l + 1) * btc];
            let l_residual2 = &mut a.residual2[l * btc..(l + 1) * btc];
            let l_ln2 = &mut a.ln2[l * btc..(l + 1) * btc];
            let l_ln2_mean = &mut a.ln2_mean[l * bt..(l + 1) * bt];
            let l_ln2_rstd = &mut a.ln2_rstd[l * bt..(l + 1) * bt];
            let l_fch = &mut a.fch[l * 4 * btc..(l + 1) * 4 * btc];
            let l_fch_gelu = &mut a.fch_gelu[l * 4 * btc..(l + 1) * 4 * btc];
            let l_fcproj = &mut a.fcproj[l * btc..(l + 1) * btc];
            let l_residual3 = &mut r3_now[..btc];

            layernorm_forward(l_ln1, l_ln1_mean, l_ln1_rstd, residual, l_ln1w, l_ln1b, b, t, c);
            matmul_forward(l_qkv, l_ln1, l_qkvw, Some(l_qkvb), b, t, c, 3 * c);
            attention_forward(l_atty, l_preatt, l_att, l_qkv, b, t, c, nh);
            matmul_forward(l_attproj, l_atty, l_attprojw, Some(l_attprojb), b, t, c, c);
            residual_forward(l_residual2, residual, l_attproj);
            layernorm_forward(l_ln2, l_ln2_mean, l_ln2_rstd, l_residual2, l_ln2w, l_ln2b, b, t, c);
            matmul_forward(l_fch, l_ln2, l_fcw, Some(l_fcb), b, t, c, 4 * c);
            gelu_forward(l_fch_gelu, l_fch);
            matmul_forward(l_fcproj, l_fch_gelu, l_fcprojw, Some(l_fcprojb), b, t, 4 * c, c);
            residual_forward(l_residual3, l_residual2, l_fcproj);
        }

        let residual = &a.residual3[(num_layers - 1) * btc..];
        layernorm_forward(
            &mut a.lnf[..],
            &mut a.lnf_mean[..],
            &mut a.lnf_rstd[..],
            residual,
            p.lnfw,
            p.lnfb,
            b,
            t,
            c,
        );
        // Weight tying: the token embedding table doubles as the output
        // projection, with no bias
        matmul_forward(&mut a.logits[..], &a.lnf[..], p.wte, None, b, t, c, vp);
        softmax_forward(&mut a.probs[..], &a.logits[..], b, t, v, vp);

        self.mean_loss = match targets {
            Some(targets) => {
                crossentropy_forward(&mut a.losses[..], &a.probs[..], targets, b, t, vp);
                a.losses.iter().sum::<f32>() / (b * t) as f32
            }
            None => NO_LOSS,
        };
        self.mean_loss
    }
}
