//! Per-utterance noise parameters.

use crate::config::NUM_FEATURE_BLOCKS;
use crate::error::Error;

/// Key suffix of the convolutional noise mean.
pub(crate) const MU_H_SUFFIX: &str = "_mu_h";
/// Key suffix of the additive noise mean.
pub(crate) const MU_Z_SUFFIX: &str = "_mu_z";
/// Key suffix of the additive noise variance.
pub(crate) const VAR_Z_SUFFIX: &str = "_var_z";

/// Noise hypothesis for one utterance (or speaker).
///
/// The means hold either only the `C` static coefficients or all `3C`
/// coefficients; only the static part is ever estimated and any dynamic part
/// is carried through unchanged. The additive variance always covers all
/// `3C` dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseParams {
    /// Convolutional (channel) noise mean.
    pub mu_h: Vec<f64>,
    /// Additive noise mean.
    pub mu_z: Vec<f64>,
    /// Additive noise diagonal variance.
    pub var_z: Vec<f64>,
}

/// The three archive keys of one utterance's noise parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoiseKeys {
    pub mu_h: String,
    pub mu_z: String,
    pub var_z: String,
}

impl NoiseKeys {
    pub fn new(utterance: &str) -> Self {
        Self {
            mu_h: format!("{utterance}{MU_H_SUFFIX}"),
            mu_z: format!("{utterance}{MU_Z_SUFFIX}"),
            var_z: format!("{utterance}{VAR_Z_SUFFIX}"),
        }
    }
}

impl NoiseParams {
    /// Zero means and the given constant variance, in full `3C` layout.
    pub fn flat(num_cepstral: usize, variance: f64) -> Self {
        let dim = NUM_FEATURE_BLOCKS * num_cepstral;
        Self {
            mu_h: vec![0.0; dim],
            mu_z: vec![0.0; dim],
            var_z: vec![variance; dim],
        }
    }

    /// Checks vector lengths against the cepstral order. `key` is only used
    /// for the error message.
    pub fn validate(&self, key: &str, num_cepstral: usize) -> Result<(), Error> {
        let full = NUM_FEATURE_BLOCKS * num_cepstral;
        for (suffix, mean) in [(MU_H_SUFFIX, &self.mu_h), (MU_Z_SUFFIX, &self.mu_z)] {
            if mean.len() != num_cepstral && mean.len() != full {
                return Err(Error::NoiseDim {
                    key: format!("{key}{suffix}"),
                    expected: "the cepstral order or three times it",
                    found: mean.len(),
                });
            }
        }
        if self.var_z.len() != full {
            return Err(Error::NoiseDim {
                key: format!("{key}{VAR_Z_SUFFIX}"),
                expected: "three times the cepstral order",
                found: self.var_z.len(),
            });
        }
        Ok(())
    }

    /// Static part of `mu_h`.
    pub fn mu_h_static(&self, num_cepstral: usize) -> &[f64] {
        &self.mu_h[..num_cepstral]
    }

    /// Static part of `mu_z`.
    pub fn mu_z_static(&self, num_cepstral: usize) -> &[f64] {
        &self.mu_z[..num_cepstral]
    }

    /// Copy with the static means replaced.
    pub fn with_static_means(&self, mu_h_s: &[f64], mu_z_s: &[f64]) -> Self {
        let mut out = self.clone();
        out.mu_h[..mu_h_s.len()].copy_from_slice(mu_h_s);
        out.mu_z[..mu_z_s.len()].copy_from_slice(mu_z_s);
        out
    }

    /// Copy with the additive variance replaced.
    pub fn with_variance(&self, var_z: Vec<f64>) -> Self {
        Self {
            var_z,
            ..self.clone()
        }
    }

    /// Clamps the static means to `[-cap, cap]`.
    pub(crate) fn clamp_static_means(&mut self, num_cepstral: usize, cap: f64) {
        let (mu_h, mu_z) = (&mut self.mu_h[..num_cepstral], &mut self.mu_z[..num_cepstral]);
        for v in mu_h.iter_mut().chain(mu_z) {
            *v = v.clamp(-cap, cap);
        }
    }

    /// Moves the selected group halfway toward `anchor`.
    pub(crate) fn halve_toward(&mut self, anchor: &Self, means: bool, variance: bool) {
        let midpoint = |v: &mut [f64], a: &[f64]| {
            for (x, &y) in v.iter_mut().zip(a) {
                *x = 0.5 * (*x + y);
            }
        };
        if means {
            midpoint(&mut self.mu_h, &anchor.mu_h);
            midpoint(&mut self.mu_z, &anchor.mu_z);
        }
        if variance {
            midpoint(&mut self.var_z, &anchor.var_z);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_share_utterance_prefix() {
        let keys = NoiseKeys::new("spk1_utt3");
        assert_eq!(keys.mu_h, "spk1_utt3_mu_h");
        assert_eq!(keys.mu_z, "spk1_utt3_mu_z");
        assert_eq!(keys.var_z, "spk1_utt3_var_z");
    }

    #[test]
    fn accepts_static_only_means() {
        let params = NoiseParams {
            mu_h: vec![0.0; 13],
            mu_z: vec![0.0; 39],
            var_z: vec![1.0; 39],
        };
        params.validate("u", 13).unwrap();
    }

    #[test]
    fn rejects_short_variance() {
        let params = NoiseParams {
            var_z: vec![1.0; 13],
            ..NoiseParams::flat(13, 1.0)
        };
        let err = params.validate("u", 13).unwrap_err();
        assert!(matches!(err, Error::NoiseDim { ref key, found: 13, .. } if key == "u_var_z"));
    }

    #[test]
    fn static_update_keeps_dynamic_coefficients() {
        let mut params = NoiseParams::flat(2, 1.0);
        params.mu_z[3] = 7.0;
        let updated = params.with_static_means(&[1.0, 2.0], &[3.0, 4.0]);
        assert_eq!(updated.mu_h, vec![1.0, 2.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(updated.mu_z, vec![3.0, 4.0, 0.0, 7.0, 0.0, 0.0]);
    }

    #[test]
    fn clamping_leaves_dynamic_coefficients() {
        let mut params = NoiseParams::flat(1, 1.0);
        params.mu_h = vec![-9.0, 50.0, -50.0];
        params.mu_z = vec![2.0, 50.0, 0.0];
        params.clamp_static_means(1, 3.0);
        assert_eq!(params.mu_h, vec![-3.0, 50.0, -50.0]);
        assert_eq!(params.mu_z, vec![2.0, 50.0, 0.0]);
    }

    #[test]
    fn halving_only_touches_selected_group() {
        let anchor = NoiseParams::flat(1, 1.0);
        let mut p = anchor.with_static_means(&[4.0], &[-2.0]).with_variance(vec![3.0; 3]);
        p.halve_toward(&anchor, true, false);
        assert_eq!(p.mu_h[0], 2.0);
        assert_eq!(p.mu_z[0], -1.0);
        assert_eq!(p.var_z, vec![3.0; 3]);
    }
}
