//! Sequential estimation over a stream of utterances.

use ndarray::ArrayView2;
use tracing::{debug, info, warn};

use crate::error::{Error, UtteranceError};
use crate::noise_params::{NoiseKeys, NoiseParams};
use crate::table::{KeyedTable, UtteranceSource, VectorSink};
use crate::utterance::{EstimationContext, UtteranceEstimate, estimate_utterance};

/// Progress is logged after every this many successful utterances.
const PROGRESS_INTERVAL: usize = 100;

/// Counters collected over one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub num_success: usize,
    pub num_fail: usize,
    /// Successful utterances for which neither group was updated.
    pub num_no_update: usize,
    /// Sum of likelihood gains over utterances with an update.
    pub tot_like_improvement: f64,
    /// Frames of all successful utterances.
    pub tot_frames: usize,
}

impl RunSummary {
    /// Mean likelihood gain per successful utterance, `0` if there was none.
    pub fn avg_improvement_per_file(&self) -> f64 {
        if self.num_success == 0 {
            0.0
        } else {
            self.tot_like_improvement / self.num_success as f64
        }
    }

    /// Process exit status: success iff at least one utterance succeeded.
    pub fn exit_code(&self) -> u8 {
        if self.num_success > 0 { 0 } else { 1 }
    }
}

/// Runs one estimation pass over every utterance of a feature stream.
#[derive(Debug)]
pub struct Driver<'a> {
    ctx: &'a EstimationContext,
}

impl<'a> Driver<'a> {
    pub fn new(ctx: &'a EstimationContext) -> Self {
        Self { ctx }
    }

    /// Processes `features` in stream order.
    ///
    /// Utterances that cannot be processed are skipped and counted; nothing
    /// is written for them. Configuration mismatches in the data abort the
    /// run.
    pub fn run<A, N, S>(
        &self,
        features: impl UtteranceSource,
        alignments: &A,
        noise_in: &N,
        noise_out: &mut S,
    ) -> Result<RunSummary, Error>
    where
        A: KeyedTable<Vec<i32>> + ?Sized,
        N: KeyedTable<Vec<f64>> + ?Sized,
        S: VectorSink + ?Sized,
    {
        let mut summary = RunSummary::default();

        for entry in features {
            let (key, feats) = entry?;
            debug!(%key, "current utterance");

            match self.process(&key, feats.view(), alignments, noise_in)? {
                Ok(estimate) => {
                    let keys = NoiseKeys::new(&key);
                    noise_out.write_vector(&keys.mu_h, &estimate.params.mu_h)?;
                    noise_out.write_vector(&keys.mu_z, &estimate.params.mu_z)?;
                    noise_out.write_vector(&keys.var_z, &estimate.params.var_z)?;

                    if estimate.updated() {
                        summary.tot_like_improvement += estimate.improvement();
                    } else {
                        warn!(%key, "no updates");
                        summary.num_no_update += 1;
                    }
                    summary.num_success += 1;
                    summary.tot_frames += estimate.num_frames;

                    if summary.num_success % PROGRESS_INTERVAL == 0 {
                        info!(
                            num_success = summary.num_success,
                            %key,
                            improvement = estimate.improvement(),
                            num_frames = estimate.num_frames,
                            "progress"
                        );
                    }
                }
                Err(reason) => {
                    warn!(%key, %reason, "utterance skipped");
                    summary.num_fail += 1;
                }
            }
        }

        info!(
            num_success = summary.num_success,
            num_fail = summary.num_fail,
            num_no_update = summary.num_no_update,
            "done"
        );
        info!(
            avg_improvement_per_file = summary.avg_improvement_per_file(),
            num_files = summary.num_success,
            "overall log-likelihood increase"
        );
        Ok(summary)
    }

    /// The outer `Result` aborts the run, the inner one skips the utterance.
    fn process<A, N>(
        &self,
        key: &str,
        features: ArrayView2<'_, f64>,
        alignments: &A,
        noise_in: &N,
    ) -> Result<Result<UtteranceEstimate, UtteranceError>, Error>
    where
        A: KeyedTable<Vec<i32>> + ?Sized,
        N: KeyedTable<Vec<f64>> + ?Sized,
    {
        if features.nrows() == 0 {
            return Ok(Err(UtteranceError::Empty));
        }
        let expected = self.ctx.config().feature_dim();
        if features.ncols() != expected {
            return Err(Error::FeatureDim {
                key: key.to_owned(),
                expected,
                found: features.ncols(),
            });
        }

        let Some(alignment) = alignments.get(key) else {
            return Ok(Err(UtteranceError::MissingAlignment));
        };
        if alignment.len() != features.nrows() {
            return Ok(Err(UtteranceError::AlignmentLength {
                alignment: alignment.len(),
                frames: features.nrows(),
            }));
        }

        let keys = NoiseKeys::new(key);
        let (Some(mu_h), Some(mu_z), Some(var_z)) = (
            noise_in.get(&keys.mu_h),
            noise_in.get(&keys.mu_z),
            noise_in.get(&keys.var_z),
        ) else {
            return Ok(Err(UtteranceError::MissingNoiseParams));
        };
        let noise = NoiseParams {
            mu_h: mu_h.clone(),
            mu_z: mu_z.clone(),
            var_z: var_z.clone(),
        };
        noise.validate(key, self.ctx.config().num_cepstral)?;

        Ok(estimate_utterance(self.ctx, &noise, alignment, features))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_and_exit_code() {
        let mut summary = RunSummary::default();
        assert_eq!(summary.avg_improvement_per_file(), 0.0);
        assert_eq!(summary.exit_code(), 1);

        summary.num_success = 4;
        summary.tot_like_improvement = 10.0;
        assert_eq!(summary.avg_improvement_per_file(), 2.5);
        assert_eq!(summary.exit_code(), 0);
    }
}
