//! Strategies for clean models, noise vectors and aligned utterances.
//!
//! Feature vectors are laid out as `C` static cepstra (C0 last) followed by
//! `C` deltas and `C` accelerations.

use proptest::collection::vec;
use proptest::prelude::*;
use test_strategy::Arbitrary;
use ndarray::Array2;
use vts_common::from_rows;
use vts_gmm::{AcousticModel, AmDiagGmm, DiagGmm, TransitionModel};

/// Cepstral order used by [`scenario`].
pub const NUM_CEPSTRAL: usize = 13;

/// Noise parameter vectors in full `3C` layout.
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseVectors {
    pub mu_h: Vec<f64>,
    pub mu_z: Vec<f64>,
    pub var_z: Vec<f64>,
}

/// A clean model, a noise hypothesis and one aligned utterance.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub model: AcousticModel,
    pub noise: NoiseVectors,
    pub alignment: Vec<i32>,
    pub features: Array2<f64>,
}

/// Learning rate for the additive noise variance.
#[derive(Debug, Clone, Copy, PartialEq, Arbitrary)]
pub struct LearningRate {
    #[strategy(1e-3f64..=1.0)]
    pub value: f64,
}

/// Clean speech mean: small static cepstra, C0 in a speech-like range,
/// small dynamic coefficients.
pub fn clean_mean(num_cepstral: usize) -> impl Strategy<Value = Vec<f64>> {
    (
        vec(-4.0f64..4.0, num_cepstral - 1),
        30.0f64..80.0,
        vec(-1.0f64..1.0, 2 * num_cepstral),
    )
        .prop_map(|(cepstra, c0, dynamic)| {
            let mut mean = cepstra;
            mean.push(c0);
            mean.extend(dynamic);
            mean
        })
}

/// Strictly positive diagonal variance.
pub fn variance_vector(dim: usize) -> impl Strategy<Value = Vec<f64>> {
    vec(0.1f64..4.0, dim)
}

/// A GMM with `1..=max_gauss` components over `3C` dimensions.
pub fn diag_gmm(num_cepstral: usize, max_gauss: usize) -> impl Strategy<Value = DiagGmm> {
    let dim = 3 * num_cepstral;
    (1..=max_gauss)
        .prop_flat_map(move |n| {
            (
                vec(0.1f64..1.0, n),
                vec(clean_mean(num_cepstral), n),
                vec(variance_vector(dim), n),
            )
        })
        .prop_map(|(weights, means, vars)| {
            let total: f64 = weights.iter().sum();
            let weights = weights.iter().map(|w| w / total).collect();
            let means = from_rows(&means).expect("generated means are rectangular");
            let vars = from_rows(&vars).expect("generated variances are rectangular");
            DiagGmm::new(weights, means, vars).expect("generated GMM is valid")
        })
}

/// A model with `1..=max_pdfs` pdfs, two transition ids per pdf.
pub fn acoustic_model(
    num_cepstral: usize,
    max_pdfs: usize,
    max_gauss: usize,
) -> impl Strategy<Value = AcousticModel> {
    (1..=max_pdfs)
        .prop_flat_map(move |n| vec(diag_gmm(num_cepstral, max_gauss), n))
        .prop_map(|gmms| {
            let num_pdfs = gmms.len();
            let tm = TransitionModel::new((0..num_pdfs).flat_map(|p| [p, p]).collect());
            let am = AmDiagGmm::new(gmms).expect("generated GMMs share a dimension");
            AcousticModel::new(tm, am).expect("transition model covers every pdf")
        })
}

/// Noise hypothesis with static-only means (dynamic part zero) and an
/// additive C0 in a range that overlaps [`clean_mean`].
pub fn noise_vectors(num_cepstral: usize) -> impl Strategy<Value = NoiseVectors> {
    let dim = 3 * num_cepstral;
    (
        vec(-1.0f64..1.0, num_cepstral),
        vec(-3.0f64..3.0, num_cepstral - 1),
        10.0f64..70.0,
        vec(0.05f64..2.0, dim),
    )
        .prop_map(move |(h, z, z0, var_z)| {
            let mut mu_h = h;
            mu_h.resize(dim, 0.0);
            let mut mu_z = z;
            mu_z.push(z0);
            mu_z.resize(dim, 0.0);
            NoiseVectors { mu_h, mu_z, var_z }
        })
}

/// `1..=max_frames` frames, each near the first component of its aligned
/// pdf, with a valid transition id per frame.
pub fn utterance(
    model: AcousticModel,
    max_frames: usize,
) -> impl Strategy<Value = (Vec<i32>, Array2<f64>)> {
    let num_tids = model.transition_model().num_transition_ids() as i32;
    let dim = model.am().dim();
    (1..=max_frames)
        .prop_flat_map(move |n| (vec(1..=num_tids, n), vec(vec(-2.0f64..2.0, dim), n)))
        .prop_map(move |(alignment, jitter)| {
            let rows: Vec<Vec<f64>> = alignment
                .iter()
                .zip(&jitter)
                .map(|(&tid, offsets)| {
                    let pdf = model
                        .transition_model()
                        .pdf(tid)
                        .expect("generated transition id is valid");
                    let mean = model.am().gmm(pdf).mean(0);
                    mean.iter().zip(offsets).map(|(m, o)| m + o).collect()
                })
                .collect();
            let features = from_rows(&rows).expect("every frame has the model dimension");
            (alignment, features)
        })
}

/// A full estimation input at [`NUM_CEPSTRAL`].
pub fn scenario(max_pdfs: usize, max_frames: usize) -> impl Strategy<Value = Scenario> {
    (
        acoustic_model(NUM_CEPSTRAL, max_pdfs, 2),
        noise_vectors(NUM_CEPSTRAL),
    )
        .prop_flat_map(move |(model, noise)| {
            let frames = utterance(model.clone(), max_frames);
            (Just(model), Just(noise), frames)
        })
        .prop_map(|(model, noise, (alignment, features))| Scenario {
            model,
            noise,
            alignment,
            features,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_strategy::proptest;

    #[proptest]
    fn clean_mean_layout(#[strategy(clean_mean(13))] mean: Vec<f64>) {
        assert_eq!(mean.len(), 39);
        assert!((30.0..80.0).contains(&mean[12]));
    }

    #[proptest]
    fn noise_vectors_are_full_length(#[strategy(noise_vectors(13))] noise: NoiseVectors) {
        assert_eq!(noise.mu_h.len(), 39);
        assert_eq!(noise.mu_z.len(), 39);
        assert!(noise.var_z.iter().all(|&v| v > 0.0));
        assert!(noise.mu_z[13..].iter().all(|&v| v == 0.0));
    }

    #[proptest]
    fn model_pdfs_are_reachable(#[strategy(acoustic_model(13, 4, 3))] model: AcousticModel) {
        assert_eq!(model.transition_model().num_pdfs(), model.am().num_pdfs());
        assert_eq!(model.am().dim(), 39);
    }

    #[proptest]
    fn scenario_is_consistent(#[strategy(scenario(3, 10))] s: Scenario) {
        assert_eq!(s.alignment.len(), s.features.nrows());
        assert_eq!(s.features.ncols(), s.model.am().dim());
        for &tid in &s.alignment {
            assert!(s.model.transition_model().pdf(tid).is_some());
        }
    }

    #[proptest]
    fn learning_rate_in_range(lrate: LearningRate) {
        assert!(lrate.value > 0.0 && lrate.value <= 1.0);
    }
}
