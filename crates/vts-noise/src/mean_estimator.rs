//! Closed-form update of the static noise means.
//!
//! Around the current estimate `w0 = [h0; z0]` the compensated static mean of
//! Gaussian `m` is `μ_m(w) ≈ μ_m + A_m (w - w0)` with `A_m = [Jx_m, Jz_m]`.
//! Maximising the auxiliary function over `w` gives the normal equations
//!
//! ```text
//! (Σ_m γ_m A_mᵀ Σ_m⁻¹ A_m) Δw = Σ_m A_mᵀ Σ_m⁻¹ (p_m - γ_m μ_m)
//! ```
//!
//! The system is rank deficient whenever the statistics cannot separate the
//! channel from the additive noise (e.g. a single Gaussian), so a small
//! diagonal loading is added and the solve returns the near minimum-norm step.

use ndarray::{Array1, Array2, s};
use tracing::trace;
use vts_common::solve;

use crate::accumulator::NoiseStats;
use crate::compensation::CompensatedModel;

/// Diagonal loading, relative to the mean diagonal of the normal matrix.
const DIAGONAL_LOADING: f64 = 1e-8;

/// Updated static noise means.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NoiseMeanUpdate {
    /// Static convolutional noise mean.
    pub(crate) mu_h: Vec<f64>,
    /// Static additive noise mean.
    pub(crate) mu_z: Vec<f64>,
}

/// Estimates new static noise means.
///
/// `mu_h` and `mu_z` are the static means the model was compensated with.
/// Each coefficient of the result is clamped to `[-max_magnitude,
/// max_magnitude]`. Returns `None` if the statistics carry no information
/// (no occupancy, or a numerically singular system).
pub(crate) fn estimate_static_noise_mean(
    compensated: &CompensatedModel,
    stats: &NoiseStats,
    mu_h: &[f64],
    mu_z: &[f64],
    max_magnitude: f64,
) -> Option<NoiseMeanUpdate> {
    let c = mu_h.len();
    debug_assert_eq!(mu_z.len(), c);
    let n = 2 * c;

    let mut normal = Array2::<f64>::zeros((n, n));
    let mut rhs = Array1::<f64>::zeros(n);
    let mut row = Array1::<f64>::zeros(n);

    for pdf in 0..compensated.am.num_pdfs() {
        let gmm = compensated.am.gmm(pdf);
        let offset = compensated.am.gauss_offset(pdf);
        for g in 0..gmm.num_gauss() {
            let m = offset + g;
            let gamma = stats.gamma[m];
            if gamma <= 0.0 {
                continue;
            }
            let jac = &compensated.jacobians[m];
            let mean = gmm.mean(g);
            let var = gmm.var(g);
            let p = stats.gamma_p.row(m);

            for i in 0..c {
                row.slice_mut(s![..c]).assign(&jac.jx.row(i));
                row.slice_mut(s![c..]).assign(&jac.jz.row(i));
                let inv_var = 1.0 / var[i];
                let residual = p[i] - gamma * mean[i];
                for a in 0..n {
                    let ra = row[a] * inv_var;
                    if ra == 0.0 {
                        continue;
                    }
                    rhs[a] += ra * residual;
                    normal.row_mut(a).scaled_add(gamma * ra, &row);
                }
            }
        }
    }

    let diag_sum = normal.diag().sum();
    if !diag_sum.is_finite() || diag_sum <= 0.0 {
        return None;
    }
    let loading = DIAGONAL_LOADING * diag_sum / n as f64;
    normal.diag_mut().mapv_inplace(|d| d + loading);

    let step = match solve(normal.view(), rhs.view()) {
        Ok(step) => step,
        Err(e) => {
            trace!(error = %e, "noise mean system not solvable");
            return None;
        }
    };
    if step.iter().any(|s| !s.is_finite()) {
        return None;
    }

    let clamp = |v: f64| v.clamp(-max_magnitude, max_magnitude);
    Some(NoiseMeanUpdate {
        mu_h: (0..c).map(|i| clamp(mu_h[i] + step[i])).collect(),
        mu_z: (0..c).map(|i| clamp(mu_z[i] + step[c + i])).collect(),
    })
}
