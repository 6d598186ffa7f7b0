//! Small fully connected network over a flat parameter slice.
//!
//! Purpose
//! -------
//! Shared feed-forward block behind the autoregression and lagged-regressor
//! components. Parameters live in the model's flat vector; this type only
//! knows the layer sizes and how to read them.
//!
//! Key behaviors
//! -------------
//! - Layer `l` stores a row-major `(out × in)` weight matrix followed by an
//!   `out`-vector of biases. The output layer's bias is optional.
//! - ReLU between layers, linear output. With no hidden layers the network
//!   is a plain linear map.
//! - [`Mlp::forward`] keeps every activation in an [`MlpTape`] so that
//!   [`Mlp::backward`] can accumulate exact gradients.
//! - Weights start uniform in `±1/√fan_in`, biases at 0.
use ndarray::{ArrayView1, ArrayViewMut1};
use rand::{rngs::StdRng, Rng};
use rand_distr::Uniform;

#[derive(Debug, Clone, PartialEq)]
pub struct Mlp {
    sizes: Vec<usize>,
    output_bias: bool,
}

/// Activations of one forward pass, input first.
#[derive(Debug, Clone, PartialEq)]
pub struct MlpTape {
    activations: Vec<Vec<f64>>,
}

impl MlpTape {
    pub fn output(&self) -> &[f64] {
        self.activations.last().map(Vec::as_slice).unwrap_or(&[])
    }
}

impl Mlp {
    pub fn new(input: usize, hidden: &[usize], output: usize, output_bias: bool) -> Self {
        let mut sizes = Vec::with_capacity(hidden.len() + 2);
        sizes.push(input);
        sizes.extend_from_slice(hidden);
        sizes.push(output);
        Self { sizes, output_bias }
    }

    fn n_layers(&self) -> usize {
        self.sizes.len() - 1
    }

    fn has_bias(&self, layer: usize) -> bool {
        layer + 1 < self.n_layers() || self.output_bias
    }

    /// `(weights offset, bias offset)` of `layer` within the slice.
    fn offsets(&self, layer: usize) -> (usize, usize) {
        let mut offset = 0;
        for l in 0..layer {
            offset += self.sizes[l] * self.sizes[l + 1];
            if self.has_bias(l) {
                offset += self.sizes[l + 1];
            }
        }
        (offset, offset + self.sizes[layer] * self.sizes[layer + 1])
    }

    pub fn n_params(&self) -> usize {
        let last = self.n_layers() - 1;
        let (w, _) = self.offsets(last);
        let tail = self.sizes[last] * self.sizes[last + 1];
        w + tail + if self.output_bias { self.sizes[last + 1] } else { 0 }
    }

    /// Number of weights in the first layer; these come first in the slice.
    pub fn first_layer_len(&self) -> usize {
        self.sizes[0] * self.sizes[1]
    }

    pub fn initialize(&self, mut params: ArrayViewMut1<'_, f64>, rng: &mut StdRng) {
        params.fill(0.0);
        for layer in 0..self.n_layers() {
            let (w, _) = self.offsets(layer);
            let fan_in = self.sizes[layer];
            let bound = 1.0 / (fan_in.max(1) as f64).sqrt();
            let dist = Uniform::new(-bound, bound);
            for i in 0..fan_in * self.sizes[layer + 1] {
                params[w + i] = rng.sample(dist);
            }
        }
    }

    pub fn forward(&self, params: ArrayView1<'_, f64>, input: &[f64]) -> MlpTape {
        let mut activations = Vec::with_capacity(self.sizes.len());
        activations.push(input.to_vec());
        for layer in 0..self.n_layers() {
            let (w, b) = self.offsets(layer);
            let (n_in, n_out) = (self.sizes[layer], self.sizes[layer + 1]);
            let prev = &activations[layer];
            let hidden = layer + 1 < self.n_layers();
            let mut next = vec![0.0; n_out];
            for (i, out) in next.iter_mut().enumerate() {
                let mut z = if self.has_bias(layer) { params[b + i] } else { 0.0 };
                for (j, &x) in prev.iter().enumerate().take(n_in) {
                    z += params[w + i * n_in + j] * x;
                }
                *out = if hidden { z.max(0.0) } else { z };
            }
            activations.push(next);
        }
        MlpTape { activations }
    }

    /// Accumulate `∂L/∂params` given `upstream = ∂L/∂output`.
    pub fn backward(
        &self, params: ArrayView1<'_, f64>, tape: &MlpTape, upstream: &[f64],
        mut grad: ArrayViewMut1<'_, f64>,
    ) {
        let mut delta = upstream.to_vec();
        for layer in (0..self.n_layers()).rev() {
            let (w, b) = self.offsets(layer);
            let (n_in, n_out) = (self.sizes[layer], self.sizes[layer + 1]);
            let input = &tape.activations[layer];
            let mut prev_delta = vec![0.0; n_in];
            for i in 0..n_out {
                let d = delta[i];
                if d == 0.0 {
                    continue;
                }
                if self.has_bias(layer) {
                    grad[b + i] += d;
                }
                for j in 0..n_in {
                    grad[w + i * n_in + j] += d * input[j];
                    prev_delta[j] += d * params[w + i * n_in + j];
                }
            }
            if layer > 0 {
                for (pd, &a) in prev_delta.iter_mut().zip(input.iter()) {
                    if a <= 0.0 {
                        *pd = 0.0;
                    }
                }
            }
            delta = prev_delta;
        }
    }
}
