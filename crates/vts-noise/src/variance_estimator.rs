//! Damped update of the additive noise variance.
//!
//! For dimension `d` (coefficient `i` of one of the three blocks) the additive
//! noise contributes `v_n = Jz_ii² σ_d` to a compensated variance `v_y`.
//! Treating that share as a latent Gaussian term, the EM target is the
//! posterior second moment of the noise averaged over the occupancy:
//!
//! ```text
//! target_d = Σ_m [γ_m (σ_d - σ_d² J²/v_y) + (σ_d J / v_y)² R_md] / Σ_m γ_m
//! R_md     = Σ_t γ_t(m) (y_td - μ_md)²
//! ```
//!
//! and the new variance is `(1 - λ) σ_d + λ target_d`.

use crate::accumulator::NoiseStats;
use crate::compensation::CompensatedModel;
use crate::config::NUM_FEATURE_BLOCKS;

/// Floor for the additive noise variance.
pub const MIN_NOISE_VARIANCE: f64 = 1e-6;

/// Returns the updated additive noise variance.
///
/// `var_z` is the variance the model was compensated with, `learning_rate`
/// is λ in `[0, 1]`. Every output element is at least
/// [`MIN_NOISE_VARIANCE`]. Dimensions without occupancy keep their value.
pub fn estimate_additive_noise_variance(
    compensated: &CompensatedModel,
    stats: &NoiseStats,
    num_cepstral: usize,
    learning_rate: f64,
    var_z: &[f64],
) -> Vec<f64> {
    let dim = NUM_FEATURE_BLOCKS * num_cepstral;
    debug_assert_eq!(var_z.len(), dim);

    let mut numerator = vec![0.0; dim];
    let mut occupancy = 0.0;

    for pdf in 0..compensated.am.num_pdfs() {
        let gmm = compensated.am.gmm(pdf);
        let offset = compensated.am.gauss_offset(pdf);
        for g in 0..gmm.num_gauss() {
            let m = offset + g;
            let gamma = stats.gamma[m];
            if gamma <= 0.0 {
                continue;
            }
            occupancy += gamma;
            let jz = &compensated.jacobians[m].jz;
            let mean = gmm.mean(g);
            let var = gmm.var(g);
            let p = stats.gamma_p.row(m);
            let q = stats.gamma_q.row(m);

            for d in 0..dim {
                let i = d % num_cepstral;
                let j2 = jz[[i, i]] * jz[[i, i]];
                let sigma = var_z[d];
                let vy = var[d];
                let scatter = (q[d] - 2.0 * mean[d] * p[d] + gamma * mean[d] * mean[d]).max(0.0);
                let posterior_var = sigma - sigma * sigma * j2 / vy;
                let gain = sigma * sigma * j2 / (vy * vy);
                numerator[d] += gamma * posterior_var + gain * scatter;
            }
        }
    }

    if occupancy <= 0.0 {
        return var_z.to_vec();
    }

    var_z
        .iter()
        .zip(&numerator)
        .map(|(&old, &num)| {
            let target = num / occupancy;
            let new = if target.is_finite() {
                (1.0 - learning_rate) * old + learning_rate * target
            } else {
                old
            };
            new.max(MIN_NOISE_VARIANCE)
        })
        .collect()
}
