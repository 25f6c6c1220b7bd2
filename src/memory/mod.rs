//! Experience Memory
//!
//! Priority-weighted replay storage for online training.

pub mod replay;

pub use replay::ExperienceBuffer;
