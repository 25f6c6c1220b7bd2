//! Network Primitives
//!
//! Bounded activations, variance-scaled initialization, dense-layer shapes,
//! and the hand-rolled forward/backward passes.

pub mod activation;
pub mod backprop;
pub mod dense;
pub mod init;

pub use activation::{softmax, Activation, OUTPUT_CLAMP};
pub use backprop::{backward, forward_sample, mse_loss, ForwardCache};
pub use dense::{LayerShape, Matrix, NetworkConfig, Parameters};
pub use init::xavier_matrix;
