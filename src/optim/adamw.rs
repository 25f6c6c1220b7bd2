//! AdamW Optimizer
//!
//! Adam with decoupled weight decay: the decay is applied directly to the
//! parameter, never folded into the gradient. Folding it in would turn this
//! back into L2-regularized Adam and change the update trajectory.

use serde::{Deserialize, Serialize};

use crate::config::OptimizerConfig;
use crate::error::{EngineError, Result};
use crate::networks::dense::{Matrix, Parameters};

/// Per-parameter moment estimates plus the shared step counter.
/// Shape-bound 1:1 to the parameter set; rebuilt whenever the network
/// architecture changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerState {
    /// First moment estimates
    pub m: Vec<Matrix>,
    /// Second moment estimates
    pub v: Vec<Matrix>,
    /// Global timestep for bias correction
    pub step: u64,
}

impl OptimizerState {
    /// Zeroed state matching the given parameters.
    pub fn for_parameters(params: &Parameters) -> Self {
        Self {
            m: params.zeros_like(),
            v: params.zeros_like(),
            step: 0,
        }
    }

    /// Check the moment tensors still mirror the parameter shapes.
    pub fn matches(&self, params: &Parameters) -> bool {
        tensor_shapes_match(&self.m, &params.layers) && tensor_shapes_match(&self.v, &params.layers)
    }
}

fn tensor_shapes_match(a: &[Matrix], b: &[Matrix]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|(la, lb)| {
            la.len() == lb.len() && la.iter().zip(lb).all(|(ra, rb)| ra.len() == rb.len())
        })
}

/// AdamW update rule over the dense parameter set
#[derive(Debug, Clone)]
pub struct AdamW {
    config: OptimizerConfig,
}

impl AdamW {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// One optimizer step: mutate `params` in place from `grads` at the
    /// given learning rate.
    pub fn step(
        &self,
        params: &mut Parameters,
        grads: &[Matrix],
        state: &mut OptimizerState,
        lr: f64,
    ) -> Result<()> {
        if !state.matches(params) {
            return Err(EngineError::Shape(
                "optimizer state does not match parameter shapes".into(),
            ));
        }
        if !tensor_shapes_match(grads, &params.layers) {
            return Err(EngineError::Shape(
                "gradients do not match parameter shapes".into(),
            ));
        }

        state.step += 1;
        let t = state.step as i32;
        let beta1 = self.config.beta1;
        let beta2 = self.config.beta2;
        let eps = self.config.epsilon;
        let decay = self.config.weight_decay;

        let bias1 = 1.0 - beta1.powi(t);
        let bias2 = 1.0 - beta2.powi(t);

        for (l, layer) in params.layers.iter_mut().enumerate() {
            for (o, row) in layer.iter_mut().enumerate() {
                let grow = &grads[l][o];
                let mrow = &mut state.m[l][o];
                let vrow = &mut state.v[l][o];
                for i in 0..row.len() {
                    let g = grow[i];
                    mrow[i] = beta1 * mrow[i] + (1.0 - beta1) * g;
                    vrow[i] = beta2 * vrow[i] + (1.0 - beta2) * g * g;

                    let m_hat = mrow[i] / bias1;
                    let v_hat = vrow[i] / bias2;

                    // Decoupled decay: applied to the parameter directly.
                    row[i] -= lr * (m_hat / (v_hat.sqrt() + eps) + decay * row[i]);
                }
            }
        }

        Ok(())
    }
}
