//! Alignment log-likelihood.

use ndarray::ArrayView2;
use vts_gmm::{AmDiagGmm, TransitionModel};

use crate::error::UtteranceError;

/// Sums, over frames, the log-density of each frame under its aligned pdf.
///
/// Pure; uses the same per-frame arithmetic as `accumulate_statistics`, so
/// both agree exactly for the same model.
pub fn alignment_log_likelihood(
    am: &AmDiagGmm,
    transition_model: &TransitionModel,
    alignment: &[i32],
    features: ArrayView2<'_, f64>,
) -> Result<f64, UtteranceError> {
    debug_assert_eq!(alignment.len(), features.nrows());
    let mut total = 0.0;
    for (t, (&tid, frame)) in alignment.iter().zip(features.rows()).enumerate() {
        let pdf = transition_model
            .pdf(tid)
            .ok_or(UtteranceError::InvalidTransitionId {
                frame: t,
                transition_id: tid,
            })?;
        total += am.gmm(pdf).log_likelihood(frame);
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use ndarray::arr2;
    use vts_gmm::DiagGmm;

    use super::*;
    use crate::accumulator::accumulate_statistics;

    #[test]
    fn matches_accumulator_total() {
        let gmm = DiagGmm::new(vec![0.3, 0.7], arr2(&[[0.0], [2.0]]), arr2(&[[1.0], [0.5]])).unwrap();
        let am = AmDiagGmm::new(vec![gmm]).unwrap();
        let tm = TransitionModel::new(vec![0]);
        let feats = arr2(&[[0.1], [1.7], [-0.4]]);
        let align = [1, 1, 1];

        let a = alignment_log_likelihood(&am, &tm, &align, feats.view()).unwrap();
        let b = alignment_log_likelihood(&am, &tm, &align, feats.view()).unwrap();
        let (_, c) = accumulate_statistics(&am, &tm, &align, feats.view()).unwrap();
        assert_eq!(a.to_bits(), b.to_bits());
        assert_eq!(a.to_bits(), c.to_bits());
    }
}
