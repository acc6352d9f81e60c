//! Per-Gaussian sufficient statistics under a fixed alignment.

use derive_more::Debug;
use ndarray::{Array2, ArrayView1, ArrayView2};
use vts_gmm::{AmDiagGmm, TransitionModel};

use crate::error::UtteranceError;

/// Zeroth, first and (diagonal) second order statistics per flat Gaussian.
#[derive(Debug, Clone)]
pub struct NoiseStats {
    /// `Σ_t γ_t(m)`.
    #[debug(skip)]
    pub gamma: Vec<f64>,
    /// `Σ_t γ_t(m) · y_t`, one row per Gaussian.
    #[debug(skip)]
    pub gamma_p: Array2<f64>,
    /// `Σ_t γ_t(m) · y_t²` (elementwise), one row per Gaussian.
    #[debug(skip)]
    pub gamma_q: Array2<f64>,
    num_frames: usize,
}

impl NoiseStats {
    pub fn new(num_gauss: usize, dim: usize) -> Self {
        Self {
            gamma: vec![0.0; num_gauss],
            gamma_p: Array2::zeros((num_gauss, dim)),
            gamma_q: Array2::zeros((num_gauss, dim)),
            num_frames: 0,
        }
    }

    /// Number of frames accumulated.
    #[inline]
    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    /// Total occupancy; equals the frame count for any alignment.
    pub fn total_occupancy(&self) -> f64 {
        self.gamma.iter().sum()
    }

    fn add(&mut self, gauss: usize, weight: f64, frame: ArrayView1<'_, f64>) {
        self.gamma[gauss] += weight;
        self.gamma_p.row_mut(gauss).scaled_add(weight, &frame);
        self.gamma_q
            .row_mut(gauss)
            .zip_mut_with(&frame, |q, &y| *q += weight * y * y);
    }
}

/// Accumulates statistics of `features` under `am` for the given alignment
/// and returns them together with the total alignment log-likelihood.
///
/// Frames are visited in order and, within a frame, components in order, so
/// the result is reproducible bit for bit. The caller has already checked
/// that `alignment` and `features` have the same length.
pub fn accumulate_statistics(
    am: &AmDiagGmm,
    transition_model: &TransitionModel,
    alignment: &[i32],
    features: ArrayView2<'_, f64>,
) -> Result<(NoiseStats, f64), UtteranceError> {
    debug_assert_eq!(alignment.len(), features.nrows());
    let mut stats = NoiseStats::new(am.num_gauss(), am.dim());
    let mut posteriors = Vec::new();
    let mut total_log_like = 0.0;

    for (t, (&tid, frame)) in alignment.iter().zip(features.rows()).enumerate() {
        let pdf = transition_model
            .pdf(tid)
            .ok_or(UtteranceError::InvalidTransitionId {
                frame: t,
                transition_id: tid,
            })?;
        let gmm = am.gmm(pdf);
        posteriors.resize(gmm.num_gauss(), 0.0);
        total_log_like += gmm.component_posteriors(frame, &mut posteriors);

        let offset = am.gauss_offset(pdf);
        for (g, &post) in posteriors.iter().enumerate() {
            if post > 0.0 {
                stats.add(offset + g, post, frame);
            }
        }
        stats.num_frames += 1;
    }

    Ok((stats, total_log_like))
}
