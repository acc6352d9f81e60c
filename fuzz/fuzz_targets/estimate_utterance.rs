#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use ndarray::Array2;
use vts_common::from_rows;
use vts_gmm::{AcousticModel, AmDiagGmm, DiagGmm, TransitionModel};
use vts_noise::{EstimationContext, NoiseParams, VtsConfig, estimate_utterance};

const C: usize = 13;

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    speech_c0: i8,
    noise_c0: i8,
    channel: [i8; C],
    log_var: [i8; 3],
    lrate: u8,
    backoff: u8,
    frames: Vec<(u8, [i8; 3 * C])>,
}

fn model(speech_c0: f64) -> AcousticModel {
    let mut mean = vec![0.0; 3 * C];
    mean[C - 1] = speech_c0;
    let quieter: Vec<f64> = mean.iter().map(|m| m - 5.0).collect();
    let gmm = DiagGmm::new(
        vec![0.5, 0.5],
        from_rows(&[mean, quieter]).unwrap(),
        from_rows(&[[1.0; 3 * C], [2.0; 3 * C]]).unwrap(),
    )
    .unwrap();
    AcousticModel::new(
        TransitionModel::new(vec![0, 0, 0]),
        AmDiagGmm::new(vec![gmm]).unwrap(),
    )
    .unwrap()
}

fuzz_target!(|input: FuzzInput| {
    if input.frames.is_empty() || input.frames.len() > 64 {
        return;
    }
    let config = VtsConfig {
        variance_lrate: f64::from(input.lrate) / 255.0,
        max_backoff_steps: u32::from(input.backoff % 4),
        ..Default::default()
    };
    let ctx = EstimationContext::new(model(f64::from(input.speech_c0)), config).unwrap();

    let mut noise = NoiseParams::flat(C, 1.0);
    noise.mu_z[C - 1] = f64::from(input.noise_c0);
    for (h, &c) in noise.mu_h.iter_mut().zip(&input.channel) {
        *h = f64::from(c) / 16.0;
    }
    for (block, &lv) in input.log_var.iter().enumerate() {
        let v = (f64::from(lv) / 32.0).exp();
        noise.var_z[block * C..(block + 1) * C].fill(v);
    }

    // Transition ids 0 and 4 are invalid and exercise the skip path.
    let alignment: Vec<i32> = input.frames.iter().map(|(t, _)| i32::from(t % 5)).collect();
    let features = Array2::from_shape_fn((input.frames.len(), 3 * C), |(t, d)| {
        f64::from(input.frames[t].1[d]) / 4.0
    });

    if let Ok(est) = estimate_utterance(&ctx, &noise, &alignment, features.view()) {
        assert!(est.new_log_like >= est.old_log_like);
        assert!(est.params.var_z.iter().all(|&v| v > 0.0));
    }
});
