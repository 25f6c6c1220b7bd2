//! Dense Layer Shapes and Parameters
//!
//! The network is a stack of bias-free dense layers. Weights follow the
//! [out_dim][in_dim] row convention: `y_o = act(Σ_i w[o][i] · x_i)`.
//! Explicit shape validation, fail fast.

use serde::{Deserialize, Serialize};

use crate::config::Architecture;
use crate::error::{EngineError, Result};
use crate::networks::activation::Activation;
use crate::networks::init;

/// One weight matrix, layer → row (output unit) → column (input unit)
pub type Matrix = Vec<Vec<f64>>;

/// Shape of one dense layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerShape {
    /// Output units (matrix rows)
    pub rows: usize,
    /// Input units (matrix columns)
    pub cols: usize,
}

/// Immutable network description, fixed at initialization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Architecture variant the shapes were derived from
    pub architecture: Architecture,
    /// Input feature width
    pub input_size: usize,
    /// Output width
    pub output_size: usize,
    /// Ordered dense-layer shapes
    pub shapes: Vec<LayerShape>,
}

impl NetworkConfig {
    /// Map an architecture variant plus input/output sizes to an ordered
    /// list of dense-layer shapes.
    pub fn build(architecture: Architecture, input_size: usize, output_size: usize) -> Result<Self> {
        if input_size == 0 {
            return Err(EngineError::Config("input_size must be > 0".into()));
        }
        if output_size == 0 {
            return Err(EngineError::Config("output_size must be > 0".into()));
        }

        let mut shapes = Vec::new();
        let mut prev = input_size;
        for &width in architecture.hidden_widths() {
            shapes.push(LayerShape {
                rows: width,
                cols: prev,
            });
            prev = width;
        }
        shapes.push(LayerShape {
            rows: output_size,
            cols: prev,
        });

        Ok(Self {
            architecture,
            input_size,
            output_size,
            shapes,
        })
    }

    /// Activation used by the given layer: leaky-ReLU hidden layers, sigmoid
    /// output head so the scalar prediction lands in (0, 1).
    pub fn activation_for(&self, layer_idx: usize) -> Activation {
        if layer_idx + 1 == self.shapes.len() {
            Activation::Sigmoid
        } else {
            Activation::LeakyRelu
        }
    }

    pub fn num_layers(&self) -> usize {
        self.shapes.len()
    }
}

/// Ordered per-layer weight matrices. Exclusively owned by the training
/// engine; snapshots are explicit deep copies via `Clone`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    pub layers: Vec<Matrix>,
}

impl Parameters {
    /// Initialize Xavier-scaled weights for every layer of the network.
    pub fn initialize(config: &NetworkConfig, gain: f64, seed: Option<u64>) -> Self {
        let mut rng = init::rng_from_seed(seed);
        let layers = config
            .shapes
            .iter()
            .map(|shape| init::xavier_matrix(shape.cols, shape.rows, gain, &mut rng))
            .collect();
        Self { layers }
    }

    /// Observed shape of each layer matrix.
    pub fn shapes(&self) -> Vec<LayerShape> {
        self.layers
            .iter()
            .map(|m| LayerShape {
                rows: m.len(),
                cols: m.first().map(|r| r.len()).unwrap_or(0),
            })
            .collect()
    }

    /// Structural well-formedness: no empty layers, rectangular matrices.
    pub fn validate(&self) -> Result<()> {
        if self.layers.is_empty() {
            return Err(EngineError::Shape("parameters have no layers".into()));
        }
        for (idx, layer) in self.layers.iter().enumerate() {
            if layer.is_empty() {
                return Err(EngineError::Shape(format!("layer[{idx}] has no rows")));
            }
            let cols = layer[0].len();
            if cols == 0 {
                return Err(EngineError::Shape(format!("layer[{idx}] has empty rows")));
            }
            if let Some(r) = layer.iter().position(|row| row.len() != cols) {
                return Err(EngineError::Shape(format!(
                    "layer[{idx}] row {r} len {} != {cols}",
                    layer[r].len()
                )));
            }
        }
        Ok(())
    }

    /// Validate against the declared network shapes, threading the expected
    /// input width layer to layer.
    pub fn validate_against(&self, config: &NetworkConfig) -> Result<()> {
        self.validate()?;
        if self.layers.len() != config.shapes.len() {
            return Err(EngineError::Shape(format!(
                "have {} layers, network declares {}",
                self.layers.len(),
                config.shapes.len()
            )));
        }
        let mut expected_in = config.input_size;
        for (idx, (layer, shape)) in self.layers.iter().zip(&config.shapes).enumerate() {
            if layer.len() != shape.rows || layer[0].len() != shape.cols {
                return Err(EngineError::Shape(format!(
                    "layer[{idx}] is {}x{}, declared {}x{}",
                    layer.len(),
                    layer[0].len(),
                    shape.rows,
                    shape.cols
                )));
            }
            if shape.cols != expected_in {
                return Err(EngineError::Shape(format!(
                    "layer[{idx}] expects {} inputs, previous layer provides {expected_in}",
                    shape.cols
                )));
            }
            expected_in = shape.rows;
        }
        if expected_in != config.output_size {
            return Err(EngineError::Shape(format!(
                "final layer provides {expected_in} outputs, network declares {}",
                config.output_size
            )));
        }
        Ok(())
    }

    /// Zero tensors with this parameter set's shapes (gradients, moments).
    pub fn zeros_like(&self) -> Vec<Matrix> {
        self.layers
            .iter()
            .map(|layer| layer.iter().map(|row| vec![0.0; row.len()]).collect())
            .collect()
    }

    /// Total scalar parameter count.
    pub fn num_params(&self) -> usize {
        self.layers
            .iter()
            .map(|layer| layer.iter().map(Vec::len).sum::<usize>())
            .sum()
    }

    /// Count NaN and Inf occurrences across every layer.
    pub fn count_non_finite(&self) -> (u32, u32) {
        count_non_finite(&self.layers)
    }
}

/// Count NaN and Inf occurrences across a tensor set (parameters or
/// gradients share the same layout).
pub fn count_non_finite(tensors: &[Matrix]) -> (u32, u32) {
    let mut nan = 0;
    let mut inf = 0;
    for layer in tensors {
        for row in layer {
            for &v in row {
                if v.is_nan() {
                    nan += 1;
                } else if v.is_infinite() {
                    inf += 1;
                }
            }
        }
    }
    (nan, inf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_hybrid_shapes() {
        let cfg = NetworkConfig::build(Architecture::Hybrid, 10, 1).unwrap();
        assert_eq!(
            cfg.shapes,
            vec![
                LayerShape { rows: 64, cols: 10 },
                LayerShape { rows: 32, cols: 64 },
                LayerShape { rows: 16, cols: 32 },
                LayerShape { rows: 1, cols: 16 },
            ]
        );
    }

    #[test]
    fn build_rejects_zero_sizes() {
        assert!(NetworkConfig::build(Architecture::Compact, 0, 1).is_err());
        assert!(NetworkConfig::build(Architecture::Compact, 4, 0).is_err());
    }

    #[test]
    fn output_head_is_sigmoid() {
        let cfg = NetworkConfig::build(Architecture::Standard, 4, 1).unwrap();
        assert_eq!(cfg.activation_for(0), Activation::LeakyRelu);
        assert_eq!(cfg.activation_for(cfg.num_layers() - 1), Activation::Sigmoid);
    }

    #[test]
    fn initialized_parameters_match_declared_shapes() {
        let cfg = NetworkConfig::build(Architecture::Hybrid, 10, 1).unwrap();
        let params = Parameters::initialize(&cfg, 1.0, Some(42));
        params.validate_against(&cfg).unwrap();
        assert_eq!(params.shapes().len(), 4);
    }

    #[test]
    fn validate_rejects_ragged_rows() {
        let params = Parameters {
            layers: vec![vec![vec![0.0, 0.0], vec![0.0]]],
        };
        assert!(matches!(params.validate(), Err(EngineError::Shape(_))));
    }

    #[test]
    fn validate_against_rejects_mismatched_width() {
        let cfg = NetworkConfig::build(Architecture::Compact, 3, 1).unwrap();
        let mut params = Parameters::initialize(&cfg, 1.0, Some(1));
        params.layers[0][0].push(0.0);
        assert!(params.validate_against(&cfg).is_err());
    }

    #[test]
    fn counts_non_finite_values() {
        let mut params = Parameters {
            layers: vec![vec![vec![1.0, f64::NAN], vec![f64::INFINITY, 0.0]]],
        };
        assert_eq!(params.count_non_finite(), (1, 1));
        params.layers[0][0][1] = 0.0;
        assert_eq!(params.count_non_finite(), (0, 1));
    }
}