//! Property tests over generated models and utterances.

use proptest::prelude::*;
use test_strategy::proptest;
use vts_noise::internals::{
    MIN_NOISE_VARIANCE, accumulate_statistics, alignment_log_likelihood, compensate_model,
    estimate_additive_noise_variance,
};
use vts_noise::{EstimationContext, NoiseParams, VtsConfig, estimate_utterance};
use vts_proptest::generators::{LearningRate, NUM_CEPSTRAL, Scenario, scenario};

fn noise_params(s: &Scenario) -> NoiseParams {
    NoiseParams {
        mu_h: s.noise.mu_h.clone(),
        mu_z: s.noise.mu_z.clone(),
        var_z: s.noise.var_z.clone(),
    }
}

fn context(s: &Scenario, config: VtsConfig) -> EstimationContext {
    EstimationContext::new(s.model.clone(), config).unwrap()
}

#[proptest(ProptestConfig { cases: 48, ..ProptestConfig::default() })]
fn estimate_never_lowers_likelihood(
    #[strategy(scenario(3, 12))] s: Scenario,
    #[strategy(0u32..3)] max_backoff_steps: u32,
) {
    let ctx = context(
        &s,
        VtsConfig {
            max_backoff_steps,
            ..Default::default()
        },
    );
    let noise = noise_params(&s);
    let est = estimate_utterance(&ctx, &noise, &s.alignment, s.features.view()).unwrap();
    prop_assert!(
        est.new_log_like >= est.old_log_like,
        "{} < {}",
        est.new_log_like,
        est.old_log_like
    );

    // The reported likelihood is the one the written parameters produce.
    let comp = compensate_model(ctx.model().am(), &est.params, ctx.transform());
    let recomputed = alignment_log_likelihood(
        &comp.am,
        ctx.model().transition_model(),
        &s.alignment,
        s.features.view(),
    )
    .unwrap();
    prop_assert_eq!(recomputed.to_bits(), est.new_log_like.to_bits());
    if !est.updated() {
        prop_assert_eq!(&est.params, &noise);
    }
}

#[proptest(ProptestConfig { cases: 48, ..ProptestConfig::default() })]
fn estimated_variance_stays_positive(
    #[strategy(scenario(2, 10))] s: Scenario,
    lrate: LearningRate,
) {
    let ctx = context(&s, VtsConfig::default());
    let noise = noise_params(&s);
    let comp = compensate_model(ctx.model().am(), &noise, ctx.transform());
    let (stats, _) = accumulate_statistics(
        &comp.am,
        ctx.model().transition_model(),
        &s.alignment,
        s.features.view(),
    )
    .unwrap();
    let var_z =
        estimate_additive_noise_variance(&comp, &stats, NUM_CEPSTRAL, lrate.value, &noise.var_z);
    prop_assert_eq!(var_z.len(), 3 * NUM_CEPSTRAL);
    for v in var_z {
        prop_assert!(v >= MIN_NOISE_VARIANCE && v.is_finite(), "{v}");
    }
}

#[proptest(ProptestConfig { cases: 32, ..ProptestConfig::default() })]
fn likelihood_is_deterministic(#[strategy(scenario(3, 12))] s: Scenario) {
    let ctx = context(&s, VtsConfig::default());
    let comp = compensate_model(ctx.model().am(), &noise_params(&s), ctx.transform());
    let tm = ctx.model().transition_model();
    let a = alignment_log_likelihood(&comp.am, tm, &s.alignment, s.features.view()).unwrap();
    let b = alignment_log_likelihood(&comp.am, tm, &s.alignment, s.features.view()).unwrap();
    let (_, c) = accumulate_statistics(&comp.am, tm, &s.alignment, s.features.view()).unwrap();
    prop_assert_eq!(a.to_bits(), b.to_bits());
    prop_assert_eq!(a.to_bits(), c.to_bits());
}

#[proptest(ProptestConfig { cases: 32, ..ProptestConfig::default() })]
fn means_respect_cap(
    #[strategy(scenario(2, 8))] s: Scenario,
    #[strategy(1.0f64..30.0)] cap: f64,
    #[strategy(0u32..3)] max_backoff_steps: u32,
) {
    let ctx = context(
        &s,
        VtsConfig {
            max_noise_mean_magnitude: cap,
            max_backoff_steps,
            ..Default::default()
        },
    );
    let mut noise = noise_params(&s);
    for v in noise.mu_h.iter_mut().chain(noise.mu_z.iter_mut()) {
        *v = v.clamp(-cap, cap);
    }
    let est = estimate_utterance(&ctx, &noise, &s.alignment, s.features.view()).unwrap();
    for v in est
        .params
        .mu_h_static(NUM_CEPSTRAL)
        .iter()
        .chain(est.params.mu_z_static(NUM_CEPSTRAL))
    {
        prop_assert!(v.abs() <= cap, "{v} exceeds {cap}");
    }
}
