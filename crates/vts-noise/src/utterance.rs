//! One estimation iteration for a single utterance.

use derive_more::Debug;
use tracing::debug;
use ndarray::ArrayView2;
use vts_common::CepstralTransform;
use vts_gmm::AcousticModel;

use crate::accumulator::accumulate_statistics;
use crate::backoff::{Guard, GuardOutcome, ParamGroup};
use crate::compensation::compensate_model;
use crate::config::VtsConfig;
use crate::error::{Error, UtteranceError};
use crate::mean_estimator::estimate_static_noise_mean;
use crate::noise_params::NoiseParams;
use crate::variance_estimator::estimate_additive_noise_variance;

/// Read-only state shared by every utterance of a run.
#[derive(Debug)]
pub struct EstimationContext {
    #[debug(skip)]
    model: AcousticModel,
    #[debug(skip)]
    transform: CepstralTransform,
    config: VtsConfig,
}

impl EstimationContext {
    /// Validates `config`, builds the cepstral transform and checks that the
    /// model dimension matches the configured feature layout.
    pub fn new(model: AcousticModel, config: VtsConfig) -> Result<Self, Error> {
        config.validate()?;
        let transform =
            CepstralTransform::new(config.num_cepstral, config.num_fbank, config.ceplifter)?;
        if model.am().dim() != config.feature_dim() {
            return Err(Error::ModelDim {
                expected: config.feature_dim(),
                found: model.am().dim(),
            });
        }
        Ok(Self {
            model,
            transform,
            config,
        })
    }

    #[inline]
    pub fn model(&self) -> &AcousticModel {
        &self.model
    }

    #[inline]
    pub fn transform(&self) -> &CepstralTransform {
        &self.transform
    }

    #[inline]
    pub fn config(&self) -> &VtsConfig {
        &self.config
    }
}

/// Result of [`estimate_utterance`].
#[derive(Debug, Clone, PartialEq)]
pub struct UtteranceEstimate {
    /// Noise parameters to write; equal to the input when nothing was updated.
    pub params: NoiseParams,
    pub mean_updated: bool,
    pub var_updated: bool,
    /// Alignment log-likelihood under the input noise parameters.
    pub old_log_like: f64,
    /// Alignment log-likelihood under `params`.
    pub new_log_like: f64,
    pub num_frames: usize,
}

impl UtteranceEstimate {
    /// Whether either group of parameters changed.
    #[inline]
    pub fn updated(&self) -> bool {
        self.mean_updated || self.var_updated
    }

    /// Likelihood gain; never negative.
    #[inline]
    pub fn improvement(&self) -> f64 {
        self.new_log_like - self.old_log_like
    }
}

/// Runs one noise re-estimation iteration.
///
/// `noise` must already be validated against the context's cepstral order,
/// and `features` must have the model's dimension. Neither the model nor
/// `noise` is modified.
pub fn estimate_utterance(
    ctx: &EstimationContext,
    noise: &NoiseParams,
    alignment: &[i32],
    features: ArrayView2<'_, f64>,
) -> Result<UtteranceEstimate, UtteranceError> {
    if features.nrows() == 0 {
        return Err(UtteranceError::Empty);
    }
    if alignment.len() != features.nrows() {
        return Err(UtteranceError::AlignmentLength {
            alignment: alignment.len(),
            frames: features.nrows(),
        });
    }

    let c = ctx.config.num_cepstral;
    let clean = ctx.model.am();
    let tm = ctx.model.transition_model();

    let compensated = compensate_model(clean, noise, &ctx.transform);
    let (stats, old_log_like) = accumulate_statistics(&compensated.am, tm, alignment, features)?;

    let guard = Guard::new(
        clean,
        tm,
        &ctx.transform,
        &ctx.config,
        alignment,
        features.reborrow(),
        noise,
        old_log_like,
    );

    let mean_outcome = match estimate_static_noise_mean(
        &compensated,
        &stats,
        noise.mu_h_static(c),
        noise.mu_z_static(c),
        ctx.config.max_noise_mean_magnitude,
    ) {
        Some(update) => {
            let candidate = noise.with_static_means(&update.mu_h, &update.mu_z);
            debug!(mu_h = ?candidate.mu_h, mu_z = ?candidate.mu_z, "new noise means");
            guard.check(candidate, ParamGroup::Means)?
        }
        None => GuardOutcome::Reverted,
    };

    let var_outcome = if ctx.config.estimate_variance() {
        let var_z = estimate_additive_noise_variance(
            &compensated,
            &stats,
            c,
            ctx.config.variance_lrate,
            &noise.var_z,
        );
        debug!(?var_z, "new additive noise variance");
        guard.check(noise.with_variance(var_z), ParamGroup::Variance)?
    } else {
        GuardOutcome::Reverted
    };

    let decision = guard.resolve(mean_outcome, var_outcome)?;
    debug!(
        mu_h = ?decision.params.mu_h,
        mu_z = ?decision.params.mu_z,
        var_z = ?decision.params.var_z,
        "final noise parameters"
    );

    Ok(UtteranceEstimate {
        params: decision.params,
        mean_updated: decision.mean_updated,
        var_updated: decision.var_updated,
        old_log_like,
        new_log_like: decision.log_like,
        num_frames: stats.num_frames(),
    })
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;
    use vts_common::from_rows;
    use vts_gmm::{AmDiagGmm, DiagGmm, TransitionModel};
    use vts_proptest::comparison::assert_bits_eq;

    use super::*;

    const C: usize = 13;

    fn context(config: VtsConfig) -> EstimationContext {
        let mut a = vec![0.0; 3 * C];
        a[C - 1] = 60.0;
        a[0] = 2.0;
        let mut b = vec![0.0; 3 * C];
        b[C - 1] = 45.0;
        b[1] = -1.5;
        let vars = Array2::from_shape_fn((2, 3 * C), |(g, _)| if g == 0 { 2.0 } else { 3.0 });
        let gmm = DiagGmm::new(vec![0.6, 0.4], from_rows(&[a, b]).unwrap(), vars).unwrap();
        let model = AcousticModel::new(
            TransitionModel::new(vec![0]),
            AmDiagGmm::new(vec![gmm]).unwrap(),
        )
        .unwrap();
        EstimationContext::new(model, config).unwrap()
    }

    fn noisy_features(ctx: &EstimationContext, n: usize) -> Array2<f64> {
        let mut noise = NoiseParams::flat(C, 1.0);
        noise.mu_z[C - 1] = 50.0;
        noise.mu_h[0] = 0.8;
        let comp = compensate_model(ctx.model().am(), &noise, ctx.transform());
        let gmm = comp.am.gmm(0);
        Array2::from_shape_fn((n, 3 * C), |(t, d)| {
            let wobble = if t % 3 == 0 { 0.3 } else { -0.2 };
            gmm.mean(t % 2)[d] + wobble
        })
    }

    fn start() -> NoiseParams {
        let mut noise = NoiseParams::flat(C, 1.0);
        noise.mu_z[C - 1] = 40.0;
        noise
    }

    #[test]
    fn rejects_model_of_wrong_dimension() {
        let gmm = DiagGmm::new(vec![1.0], Array2::zeros((1, 38)), Array2::ones((1, 38))).unwrap();
        let model = AcousticModel::new(
            TransitionModel::new(vec![0]),
            AmDiagGmm::new(vec![gmm]).unwrap(),
        )
        .unwrap();
        let err = EstimationContext::new(model, VtsConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::ModelDim {
                expected: 39,
                found: 38
            }
        ));
    }

    #[test]
    fn likelihood_never_decreases() {
        let ctx = context(VtsConfig::default());
        let feats = noisy_features(&ctx, 20);
        let est = estimate_utterance(&ctx, &start(), &[1; 20], feats.view()).unwrap();
        assert!(est.new_log_like >= est.old_log_like);
        assert!(est.improvement() >= 0.0);
        assert_eq!(est.num_frames, 20);
    }

    #[test]
    fn disabled_variance_stage_keeps_variance_bits() {
        let ctx = context(VtsConfig {
            variance_lrate: 0.0,
            ..Default::default()
        });
        let feats = noisy_features(&ctx, 12);
        let mut noise = start();
        noise.var_z[5] = 0.123_456_789;
        let est = estimate_utterance(&ctx, &noise, &[1; 12], feats.view()).unwrap();
        assert!(!est.var_updated);
        assert_bits_eq(&est.params.var_z, &noise.var_z);
    }

    #[test]
    fn length_mismatch_is_skipped() {
        let ctx = context(VtsConfig::default());
        let feats = noisy_features(&ctx, 10);
        assert_eq!(
            estimate_utterance(&ctx, &start(), &[1; 9], feats.view()).unwrap_err(),
            UtteranceError::AlignmentLength {
                alignment: 9,
                frames: 10
            }
        );
    }

    #[test]
    fn invalid_transition_id_is_skipped() {
        let ctx = context(VtsConfig::default());
        let feats = noisy_features(&ctx, 3);
        assert!(matches!(
            estimate_utterance(&ctx, &start(), &[1, 0, 1], feats.view()),
            Err(UtteranceError::InvalidTransitionId { frame: 1, .. })
        ));
    }

    #[test]
    fn repeated_runs_are_identical() {
        let ctx = context(VtsConfig::default());
        let feats = noisy_features(&ctx, 8);
        let a = estimate_utterance(&ctx, &start(), &[1; 8], feats.view()).unwrap();
        let b = estimate_utterance(&ctx, &start(), &[1; 8], feats.view()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_utterance_is_skipped() {
        let ctx = context(VtsConfig::default());
        let feats = Array2::<f64>::zeros((0, 3 * C));
        assert_eq!(
            estimate_utterance(&ctx, &start(), &[], feats.view()).unwrap_err(),
            UtteranceError::Empty
        );
    }
}
