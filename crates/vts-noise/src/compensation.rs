//! First-order VTS model compensation.
//!
//! With clean static mean `x`, channel mean `h` and additive noise mean `z`
//! (all cepstral), the mismatch function is
//!
//! ```text
//! y = x + h + D · log(1 + exp(D⁺ (z - x - h)))
//! ```
//!
//! where `D` is the liftered DCT and `D⁺` its pseudo-inverse. Linearising
//! around the current noise estimate gives the Jacobians
//!
//! ```text
//! Jx = ∂y/∂x = ∂y/∂h = D · diag(1 / (1 + exp(u))) · D⁺
//! Jz = ∂y/∂z         = D · diag(1 / (1 + exp(-u))) · D⁺,   u = D⁺ (z - x - h)
//! ```
//!
//! Dynamic means are mapped through `Jx` (noise has no dynamic mean), and each
//! block's diagonal variance is `diag(Jx Σx Jxᵀ + Jz Σz Jzᵀ)`.

use derive_more::Debug;
use ndarray::{Array1, Array2, ArrayView1, Zip, s};
use tracing::trace;
use vts_common::CepstralTransform;
use vts_gmm::AmDiagGmm;

use crate::config::NUM_FEATURE_BLOCKS;
use crate::noise_params::NoiseParams;

/// Floor for compensated model variances.
pub(crate) const MIN_COMPENSATED_VARIANCE: f64 = 1e-6;

/// Jacobians of one Gaussian's compensated static mean (`C × C` each).
#[derive(Debug, Clone)]
pub struct Jacobians {
    /// Sensitivity to the clean speech mean (and to the channel mean).
    pub jx: Array2<f64>,
    /// Sensitivity to the additive noise mean.
    pub jz: Array2<f64>,
}

/// Noise-compensated copy of the clean model plus per-Gaussian Jacobians,
/// indexed by flat Gaussian index.
#[derive(Debug, Clone)]
pub struct CompensatedModel {
    pub am: AmDiagGmm,
    #[debug(skip)]
    pub jacobians: Vec<Jacobians>,
}

/// Compensates `clean` for `noise`.
///
/// `clean` must have dimension `3 · transform.num_cepstral()` and `noise`
/// must already be validated against the same cepstral order.
pub fn compensate_model(
    clean: &AmDiagGmm,
    noise: &NoiseParams,
    transform: &CepstralTransform,
) -> CompensatedModel {
    let c = transform.num_cepstral();
    debug_assert_eq!(clean.dim(), NUM_FEATURE_BLOCKS * c);

    let mu_h = ArrayView1::from(noise.mu_h_static(c));
    let mu_z = ArrayView1::from(noise.mu_z_static(c));
    let var_z = ArrayView1::from(&noise.var_z[..]);

    let mut am = clean.clone();
    let mut jacobians = Vec::with_capacity(clean.num_gauss());
    let mut mean = Array1::zeros(NUM_FEATURE_BLOCKS * c);
    let mut var = Array1::zeros(NUM_FEATURE_BLOCKS * c);

    for pdf in 0..clean.num_pdfs() {
        let gmm = clean.gmm(pdf);
        for g in 0..gmm.num_gauss() {
            let x = gmm.mean(g);
            let vx = gmm.var(g);
            let x_static = x.slice(s![..c]);

            let u = transform.to_log_fbank((&mu_z - &x_static - &mu_h).view());
            let correction = transform.to_cepstral(u.mapv(softplus).view());
            let jx = (transform.dct() * &u.mapv(|v| sigmoid(-v))).dot(transform.inv_dct());
            let jz = (transform.dct() * &u.mapv(sigmoid)).dot(transform.inv_dct());

            mean.slice_mut(s![..c])
                .assign(&(&x_static + &mu_h + &correction));
            for block in 1..NUM_FEATURE_BLOCKS {
                let range = block * c..(block + 1) * c;
                mean.slice_mut(s![range.clone()])
                    .assign(&jx.dot(&x.slice(s![range])));
            }

            // diag(J Σ Jᵀ) for diagonal Σ is (J ∘ J) · σ.
            let jx_sq = jx.mapv(|a| a * a);
            let jz_sq = jz.mapv(|a| a * a);
            for block in 0..NUM_FEATURE_BLOCKS {
                let range = block * c..(block + 1) * c;
                let speech = jx_sq.dot(&vx.slice(s![range.clone()]));
                let noise_var = jz_sq.dot(&var_z.slice(s![range.clone()]));
                Zip::from(var.slice_mut(s![range]))
                    .and(&speech)
                    .and(&noise_var)
                    .for_each(|v, &sp, &n| *v = (sp + n).max(MIN_COMPENSATED_VARIANCE));
            }

            am.gmm_mut(pdf).set_component(g, mean.view(), var.view());
            jacobians.push(Jacobians { jx, jz });
        }
    }

    trace!(num_gauss = jacobians.len(), "compensated model");
    CompensatedModel { am, jacobians }
}

/// `ln(1 + e^v)` without overflow.
#[inline]
fn softplus(v: f64) -> f64 {
    if v > 0.0 {
        v + (-v).exp().ln_1p()
    } else {
        v.exp().ln_1p()
    }
}

/// `1 / (1 + e^-v)` without overflow.
#[inline]
fn sigmoid(v: f64) -> f64 {
    if v >= 0.0 {
        1.0 / (1.0 + (-v).exp())
    } else {
        let e = v.exp();
        e / (1.0 + e)
    }
}
