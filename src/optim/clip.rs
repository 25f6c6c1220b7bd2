//! Gradient Clipping
//!
//! Global L2-norm clipping across the whole gradient set. Direction is
//! preserved: every element is rescaled by the same factor.

use crate::networks::dense::Matrix;

/// Result of a clipping pass
#[derive(Debug, Clone, Copy)]
pub struct ClipOutcome {
    /// Norm before any rescaling, for diagnostics
    pub pre_clip_norm: f64,
    /// Whether a rescale was applied
    pub was_clipped: bool,
}

/// Global L2 norm across all layers: `sqrt(Σ g_ij²)`.
pub fn global_norm(grads: &[Matrix]) -> f64 {
    grads
        .iter()
        .flat_map(|layer| layer.iter())
        .flat_map(|row| row.iter())
        .map(|g| g * g)
        .sum::<f64>()
        .sqrt()
}

/// Rescale the gradient set in place so its global norm does not exceed
/// `max_norm`. A non-finite norm passes through untouched; the watchdog owns
/// that case and a rescale by NaN would only spread it.
pub fn clip_global_norm(grads: &mut [Matrix], max_norm: f64) -> ClipOutcome {
    let norm = global_norm(grads);
    if !norm.is_finite() || norm <= max_norm {
        return ClipOutcome {
            pre_clip_norm: norm,
            was_clipped: false,
        };
    }

    let scale = max_norm / norm;
    for layer in grads.iter_mut() {
        for row in layer.iter_mut() {
            for g in row.iter_mut() {
                *g *= scale;
            }
        }
    }

    ClipOutcome {
        pre_clip_norm: norm,
        was_clipped: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn norm_of_3_4_is_5() {
        let grads = vec![vec![vec![3.0], vec![4.0]]];
        assert!((global_norm(&grads) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn small_gradients_pass_through() {
        let mut grads = vec![vec![vec![0.1, 0.2]]];
        let before = grads.clone();
        let outcome = clip_global_norm(&mut grads, 1.0);
        assert!(!outcome.was_clipped);
        assert_eq!(grads, before);
    }

    #[test]
    fn clipped_norm_bounded_and_direction_preserved() {
        let mut grads = vec![vec![vec![30.0], vec![40.0]]];
        let outcome = clip_global_norm(&mut grads, 5.0);

        assert!(outcome.was_clipped);
        assert!((outcome.pre_clip_norm - 50.0).abs() < 1e-9);
        assert!(global_norm(&grads) <= 5.0 + 1e-9);
        // Same direction: elements keep their 3:4 ratio.
        assert!((grads[0][0][0] / grads[0][1][0] - 0.75).abs() < 1e-12);
        // Exact rescale: g * max/norm.
        assert!((grads[0][0][0] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn non_finite_norm_passes_through() {
        let mut grads = vec![vec![vec![f64::NAN, 1.0]]];
        let outcome = clip_global_norm(&mut grads, 5.0);
        assert!(!outcome.was_clipped);
        assert!(outcome.pre_clip_norm.is_nan());
    }
}
