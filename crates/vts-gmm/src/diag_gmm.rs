//! Diagonal-covariance Gaussian mixture.

use std::f64::consts::TAU;

use derive_more::Debug;
use ndarray::{Array2, ArrayView1};

use crate::model_io::ModelError;

/// Diagonal-covariance GMM.
///
/// Per-component normalisers (`log w - 0.5 (D ln 2π + Σ ln σ²)`) are cached and
/// kept in sync by [`set_component`](Self::set_component).
#[derive(Debug, Clone)]
pub struct DiagGmm {
    #[debug(skip)]
    weights: Vec<f64>,
    #[debug(skip)]
    means: Array2<f64>,
    #[debug(skip)]
    vars: Array2<f64>,
    #[debug(skip)]
    gconsts: Vec<f64>,
    num_gauss: usize,
    dim: usize,
}

impl DiagGmm {
    /// Creates a GMM from per-component weights, means and variances.
    pub fn new(weights: Vec<f64>, means: Array2<f64>, vars: Array2<f64>) -> Result<Self, ModelError> {
        let num_gauss = weights.len();
        if num_gauss == 0 {
            return Err(ModelError::Invalid("GMM has no components".into()));
        }
        if means.nrows() != num_gauss || vars.nrows() != num_gauss {
            return Err(ModelError::Invalid(format!(
                "GMM has {num_gauss} weights but {} means and {} variances",
                means.nrows(),
                vars.nrows()
            )));
        }
        let dim = means.ncols();
        if dim == 0 || vars.ncols() != dim {
            return Err(ModelError::Invalid(format!(
                "GMM mean dimension {dim} and variance dimension {} disagree",
                vars.ncols()
            )));
        }
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) || weights.iter().sum::<f64>() <= 0.0
        {
            return Err(ModelError::Invalid(
                "GMM weights must be finite, non-negative and not all zero".into(),
            ));
        }
        if vars.iter().any(|v| !v.is_finite() || *v <= 0.0) {
            return Err(ModelError::Invalid(
                "GMM variances must be finite and positive".into(),
            ));
        }

        let mut gmm = Self {
            weights,
            means,
            vars,
            gconsts: vec![0.0; num_gauss],
            num_gauss,
            dim,
        };
        for g in 0..num_gauss {
            gmm.gconsts[g] = gmm.compute_gconst(g);
        }
        Ok(gmm)
    }

    #[inline]
    pub fn num_gauss(&self) -> usize {
        self.num_gauss
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn mean(&self, g: usize) -> ArrayView1<'_, f64> {
        self.means.row(g)
    }

    pub fn var(&self, g: usize) -> ArrayView1<'_, f64> {
        self.vars.row(g)
    }

    /// Replaces the mean and variance of component `g`.
    ///
    /// Variances must be strictly positive; callers floor them first.
    pub fn set_component(&mut self, g: usize, mean: ArrayView1<'_, f64>, var: ArrayView1<'_, f64>) {
        assert_eq!(mean.len(), self.dim);
        assert_eq!(var.len(), self.dim);
        debug_assert!(var.iter().all(|v| *v > 0.0), "variances must be positive");
        self.means.row_mut(g).assign(&mean);
        self.vars.row_mut(g).assign(&var);
        self.gconsts[g] = self.compute_gconst(g);
    }

    /// Per-component `log(w_g) + log N(x; μ_g, Σ_g)`, written into `out`.
    pub fn component_log_likelihoods(&self, x: ArrayView1<'_, f64>, out: &mut [f64]) {
        assert_eq!(x.len(), self.dim, "frame dimension must match the GMM");
        assert_eq!(out.len(), self.num_gauss);
        for (g, o) in out.iter_mut().enumerate() {
            let quad: f64 = self
                .means
                .row(g)
                .iter()
                .zip(self.vars.row(g))
                .zip(&x)
                .map(|((m, v), xi)| {
                    let d = xi - m;
                    d * d / v
                })
                .sum();
            *o = self.gconsts[g] - 0.5 * quad;
        }
    }

    /// `log p(x)`.
    pub fn log_likelihood(&self, x: ArrayView1<'_, f64>) -> f64 {
        let mut loglikes = vec![0.0; self.num_gauss];
        self.component_log_likelihoods(x, &mut loglikes);
        log_sum_exp(&loglikes)
    }

    /// Writes component posteriors for `x` into `posteriors` and returns
    /// `log p(x)`.
    pub fn component_posteriors(&self, x: ArrayView1<'_, f64>, posteriors: &mut [f64]) -> f64 {
        self.component_log_likelihoods(x, posteriors);
        let total = log_sum_exp(posteriors);
        for p in posteriors.iter_mut() {
            *p = (*p - total).exp();
        }
        total
    }

    fn compute_gconst(&self, g: usize) -> f64 {
        let log_det: f64 = self.vars.row(g).iter().map(|v| v.ln()).sum();
        // ln(0) = -inf keeps zero-weight components out of every sum.
        self.weights[g].ln() - 0.5 * (self.dim as f64 * TAU.ln() + log_det)
    }
}

/// Numerically stable `log Σ exp(v_i)`.
pub(crate) fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

#[cfg(test)]
mod tests {
    use ndarray::{arr2, aview1};
    use proptest::collection::vec as pvec;
    use proptest::prelude::*;
    use test_strategy::proptest;
    use vts_common::from_rows;

    use super::*;
    use derive_more::Debug;

    fn single(mean: &[f64], var: &[f64]) -> DiagGmm {
        DiagGmm::new(vec![1.0], from_rows(&[mean]).unwrap(), from_rows(&[var]).unwrap()).unwrap()
    }

    #[test]
    fn standard_normal_density_at_mean() {
        let gmm = single(&[0.0], &[1.0]);
        let expected = -0.5 * TAU.ln();
        assert!((gmm.log_likelihood(aview1(&[0.0])) - expected).abs() < 1e-12);
    }

    #[test]
    fn rejects_non_positive_variance() {
        let err = DiagGmm::new(
            vec![1.0],
            arr2(&[[0.0, 0.0]]),
            arr2(&[[1.0, 0.0]]),
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::Invalid(_)));
    }

    #[test]
    fn set_component_updates_cached_normaliser() {
        let mut gmm = single(&[0.0], &[1.0]);
        gmm.set_component(0, aview1(&[2.0]), aview1(&[4.0]));
        let expected = -0.5 * (TAU.ln() + 4.0f64.ln());
        assert!((gmm.log_likelihood(aview1(&[2.0])) - expected).abs() < 1e-12);
    }

    #[test]
    fn log_sum_exp_handles_all_negative_infinity() {
        assert_eq!(log_sum_exp(&[f64::NEG_INFINITY, f64::NEG_INFINITY]), f64::NEG_INFINITY);
        assert!((log_sum_exp(&[0.0, 0.0]) - 2.0f64.ln()).abs() < 1e-15);
    }

    #[proptest]
    fn posteriors_sum_to_one(
        #[strategy(pvec(0.05f64..1.0, 1..6))] weights: Vec<f64>,
        #[strategy(pvec(-3.0f64..3.0, #weights.len() * 2))] means: Vec<f64>,
        #[strategy(pvec(-5.0f64..5.0, 2))] x: Vec<f64>,
    ) {
        let n = weights.len();
        let means = Array2::from_shape_vec((n, 2), means).unwrap();
        let vars = from_rows(&vec![[0.5, 2.0]; n]).unwrap();
        let gmm = DiagGmm::new(weights, means, vars).unwrap();
        let mut post = vec![0.0; n];
        let loglike = gmm.component_posteriors(aview1(&x), &mut post);
        prop_assert!(loglike.is_finite());
        prop_assert!((post.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        prop_assert!((loglike - gmm.log_likelihood(aview1(&x))).abs() < 1e-12);
    }
}
