//! Likelihood guard for candidate noise estimates.
//!
//! Every candidate is judged against the alignment likelihood of the noise
//! parameters the utterance started with. The mean and variance candidates are
//! judged separately, each with the other group held at that snapshot, and
//! the two are merged only if the merged set also passes.

use ndarray::ArrayView2;
use tracing::debug;
use vts_common::CepstralTransform;
use vts_gmm::{AmDiagGmm, TransitionModel};

use crate::compensation::compensate_model;
use crate::config::VtsConfig;
use crate::error::UtteranceError;
use crate::likelihood::alignment_log_likelihood;
use crate::noise_params::NoiseParams;

/// Which half of the noise parameters a candidate changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ParamGroup {
    /// Static `mu_h` and `mu_z`.
    Means,
    /// `var_z`.
    Variance,
}

/// Result of checking one candidate.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum GuardOutcome {
    /// The candidate (possibly moved back toward the snapshot) does not lower
    /// the likelihood.
    Committed { params: NoiseParams, log_like: f64 },
    /// No accepted candidate; the snapshot stays.
    Reverted,
}

impl GuardOutcome {
    pub(crate) fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }
}

/// Final decision for one utterance.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct GuardDecision {
    pub(crate) params: NoiseParams,
    pub(crate) log_like: f64,
    pub(crate) mean_updated: bool,
    pub(crate) var_updated: bool,
}

/// Evaluates candidates for one utterance.
#[derive(Debug)]
pub(crate) struct Guard<'a> {
    clean: &'a AmDiagGmm,
    transition_model: &'a TransitionModel,
    transform: &'a CepstralTransform,
    config: &'a VtsConfig,
    alignment: &'a [i32],
    features: ArrayView2<'a, f64>,
    snapshot: &'a NoiseParams,
    baseline: f64,
}

impl<'a> Guard<'a> {
    /// `baseline` is the alignment log-likelihood under the model compensated
    /// with `snapshot`.
    #[allow(clippy::too_many_arguments, reason = "borrows every per-utterance input")]
    pub(crate) fn new(
        clean: &'a AmDiagGmm,
        transition_model: &'a TransitionModel,
        transform: &'a CepstralTransform,
        config: &'a VtsConfig,
        alignment: &'a [i32],
        features: ArrayView2<'a, f64>,
        snapshot: &'a NoiseParams,
        baseline: f64,
    ) -> Self {
        Self {
            clean,
            transition_model,
            transform,
            config,
            alignment,
            features,
            snapshot,
            baseline,
        }
    }

    #[inline]
    pub(crate) fn baseline(&self) -> f64 {
        self.baseline
    }

    /// Recompensates for `params` and returns the alignment log-likelihood.
    pub(crate) fn evaluate(&self, params: &NoiseParams) -> Result<f64, UtteranceError> {
        let compensated = compensate_model(self.clean, params, self.transform);
        alignment_log_likelihood(
            &compensated.am,
            self.transition_model,
            self.alignment,
            self.features,
        )
    }

    /// Accepts `candidate` if it does not lower the likelihood, otherwise
    /// halves its distance to the snapshot up to `max_backoff_steps` times.
    ///
    /// Only the parameters in `group` are moved back; the caller passes a
    /// candidate whose other group equals the snapshot. Halved static means are
    /// clamped to the configured magnitude cap, since the snapshot itself may
    /// lie outside it.
    pub(crate) fn check(
        &self,
        mut candidate: NoiseParams,
        group: ParamGroup,
    ) -> Result<GuardOutcome, UtteranceError> {
        let (means, variance) = match group {
            ParamGroup::Means => (true, false),
            ParamGroup::Variance => (false, true),
        };
        let mut step = 0;
        loop {
            let log_like = self.evaluate(&candidate)?;
            if log_like >= self.baseline {
                debug!(?group, step, log_like, baseline = self.baseline, "candidate accepted");
                return Ok(GuardOutcome::Committed {
                    params: candidate,
                    log_like,
                });
            }
            if step >= self.config.max_backoff_steps {
                debug!(?group, step, log_like, baseline = self.baseline, "candidate rejected");
                return Ok(GuardOutcome::Reverted);
            }
            candidate.halve_toward(self.snapshot, means, variance);
            if means {
                candidate.clamp_static_means(
                    self.transform.num_cepstral(),
                    self.config.max_noise_mean_magnitude,
                );
            }
            step += 1;
        }
    }

    /// Merges the outcomes of the two groups.
    ///
    /// The returned likelihood is never below the baseline.
    pub(crate) fn resolve(
        &self,
        means: GuardOutcome,
        variance: GuardOutcome,
    ) -> Result<GuardDecision, UtteranceError> {
        let decision = match (means, variance) {
            (
                GuardOutcome::Committed {
                    params: mean_params,
                    log_like: mean_like,
                },
                GuardOutcome::Committed {
                    params: var_params,
                    log_like: var_like,
                },
            ) => {
                let combined = mean_params.with_variance(var_params.var_z.clone());
                let log_like = self.evaluate(&combined)?;
                if log_like >= self.baseline {
                    GuardDecision {
                        params: combined,
                        log_like,
                        mean_updated: true,
                        var_updated: true,
                    }
                } else if mean_like >= var_like {
                    debug!(log_like, "combined update rejected, keeping means");
                    GuardDecision {
                        params: mean_params,
                        log_like: mean_like,
                        mean_updated: true,
                        var_updated: false,
                    }
                } else {
                    debug!(log_like, "combined update rejected, keeping variance");
                    GuardDecision {
                        params: var_params,
                        log_like: var_like,
                        mean_updated: false,
                        var_updated: true,
                    }
                }
            }
            (GuardOutcome::Committed { params, log_like }, GuardOutcome::Reverted) => {
                GuardDecision {
                    params,
                    log_like,
                    mean_updated: true,
                    var_updated: false,
                }
            }
            (GuardOutcome::Reverted, GuardOutcome::Committed { params, log_like }) => {
                GuardDecision {
                    params,
                    log_like,
                    mean_updated: false,
                    var_updated: true,
                }
            }
            (GuardOutcome::Reverted, GuardOutcome::Reverted) => GuardDecision {
                params: self.snapshot.clone(),
                log_like: self.baseline,
                mean_updated: false,
                var_updated: false,
            },
        };
        Ok(decision)
    }
}
