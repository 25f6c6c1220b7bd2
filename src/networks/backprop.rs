//! Forward and Backward Passes
//!
//! Hand-rolled two-pass backprop over the dense stack. The forward pass
//! retains every layer's input and pre-activation vector; the backward pass
//! walks them in reverse with the chain rule. Loss is MSE; the L2 term is
//! added by the caller after backprop and before clipping.

use crate::error::{EngineError, Result};
use crate::networks::activation::softmax;
use crate::networks::dense::{Matrix, NetworkConfig, Parameters};

/// Per-sample forward state retained for the backward pass
#[derive(Debug, Clone)]
pub struct ForwardCache {
    /// Input vector fed into each layer (index 0 is the sample itself)
    pub layer_inputs: Vec<Vec<f64>>,
    /// Pre-activation sums per layer
    pub pre_activations: Vec<Vec<f64>>,
    /// Activated output of the final layer
    pub output: Vec<f64>,
}

impl ForwardCache {
    /// Raw first component of the output, the scalar prediction used for
    /// regression-style metrics.
    pub fn prediction(&self) -> f64 {
        self.output.first().copied().unwrap_or(0.0)
    }

    /// Output normalized to a probability distribution.
    pub fn probabilities(&self) -> Vec<f64> {
        softmax(&self.output)
    }
}

/// Forward pass for one sample, retaining every layer's activation.
///
/// Malformed layers are a hard shape error, never a silent zero gradient.
pub fn forward_sample(
    params: &Parameters,
    network: &NetworkConfig,
    input: &[f64],
    input_clip: f64,
) -> Result<ForwardCache> {
    if input.len() != network.input_size {
        return Err(EngineError::Shape(format!(
            "input has {} features, network expects {}",
            input.len(),
            network.input_size
        )));
    }
    if params.layers.is_empty() {
        return Err(EngineError::Shape("parameters have no layers".into()));
    }

    let mut layer_inputs = Vec::with_capacity(params.layers.len());
    let mut pre_activations = Vec::with_capacity(params.layers.len());
    let mut x = input.to_vec();

    for (idx, layer) in params.layers.iter().enumerate() {
        if layer.is_empty() {
            return Err(EngineError::Shape(format!("layer[{idx}] has no rows")));
        }
        let activation = network.activation_for(idx);
        let mut z = vec![0.0; layer.len()];
        for (o, row) in layer.iter().enumerate() {
            if row.len() != x.len() {
                return Err(EngineError::Shape(format!(
                    "layer[{idx}] row {o} len {} != input len {}",
                    row.len(),
                    x.len()
                )));
            }
            let mut sum = 0.0;
            for (w, xi) in row.iter().zip(&x) {
                sum += w * xi;
            }
            z[o] = sum;
        }
        let y: Vec<f64> = z.iter().map(|&s| activation.apply(s, input_clip)).collect();

        layer_inputs.push(x);
        pre_activations.push(z);
        x = y;
    }

    Ok(ForwardCache {
        layer_inputs,
        pre_activations,
        output: x,
    })
}

/// Mean squared error over a batch of output/target vectors.
pub fn mse_loss(outputs: &[Vec<f64>], targets: &[Vec<f64>]) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for (out, target) in outputs.iter().zip(targets) {
        for (o, t) in out.iter().zip(target) {
            let diff = o - t;
            sum += diff * diff;
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Backward pass over a batch: per-layer gradients of the MSE loss with
/// respect to every weight, averaged across the batch.
pub fn backward(
    params: &Parameters,
    network: &NetworkConfig,
    caches: &[ForwardCache],
    targets: &[Vec<f64>],
    input_clip: f64,
) -> Result<Vec<Matrix>> {
    if caches.len() != targets.len() {
        return Err(EngineError::Shape(format!(
            "{} caches vs {} targets",
            caches.len(),
            targets.len()
        )));
    }
    let num_layers = params.layers.len();
    if num_layers == 0 {
        return Err(EngineError::Shape("parameters have no layers".into()));
    }

    let mut grads = params.zeros_like();
    let batch = caches.len();
    if batch == 0 {
        return Ok(grads);
    }

    for (cache, target) in caches.iter().zip(targets) {
        if cache.output.len() != target.len() {
            return Err(EngineError::Shape(format!(
                "output dim {} != target dim {}",
                cache.output.len(),
                target.len()
            )));
        }

        // dLoss/d(output) for the batch-and-component mean of squared error.
        let denom = (batch * target.len()) as f64;
        let out_act = network.activation_for(num_layers - 1);
        let mut delta: Vec<f64> = cache
            .output
            .iter()
            .zip(target)
            .zip(&cache.pre_activations[num_layers - 1])
            .map(|((o, t), &z)| 2.0 * (o - t) / denom * out_act.derivative(z, input_clip))
            .collect();

        for l in (0..num_layers).rev() {
            let inputs = &cache.layer_inputs[l];
            for (o, d) in delta.iter().enumerate() {
                let row = &mut grads[l][o];
                for (i, xi) in inputs.iter().enumerate() {
                    row[i] += d * xi;
                }
            }

            if l > 0 {
                let prev_act = network.activation_for(l - 1);
                let prev_z = &cache.pre_activations[l - 1];
                let layer = &params.layers[l];
                let mut next_delta = vec![0.0; inputs.len()];
                for (i, nd) in next_delta.iter_mut().enumerate() {
                    let mut sum = 0.0;
                    for (o, d) in delta.iter().enumerate() {
                        sum += d * layer[o][i];
                    }
                    *nd = sum * prev_act.derivative(prev_z[i], input_clip);
                }
                delta = next_delta;
            }
        }
    }

    Ok(grads)
}

/// L2 penalty term: `(lambda / 2) * Σ θ²`.
pub fn l2_term(params: &Parameters, lambda: f64) -> f64 {
    let sum_sq: f64 = params
        .layers
        .iter()
        .flat_map(|layer| layer.iter())
        .flat_map(|row| row.iter())
        .map(|w| w * w)
        .sum();
    0.5 * lambda * sum_sq
}

/// Add the L2 gradient contribution `lambda * θ` elementwise.
pub fn add_l2(grads: &mut [Matrix], params: &Parameters, lambda: f64) {
    for (glayer, player) in grads.iter_mut().zip(&params.layers) {
        for (grow, prow) in glayer.iter_mut().zip(player) {
            for (g, w) in grow.iter_mut().zip(prow) {
                *g += lambda * w;
            }
        }
    }
}
