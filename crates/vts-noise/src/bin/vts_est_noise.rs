//! Re-estimate per-utterance VTS noise parameters, one iteration.
//!
//! ```sh
//! cargo run -p vts-noise --features cli --bin vts-est-noise -- \
//!     final.json feats.ark ali.txt noise_in.txt noise_out.txt
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vts_gmm::AcousticModel;
use vts_noise::config::{
    DEFAULT_CEPLIFTER, DEFAULT_MAX_NOISE_MEAN_MAGNITUDE, DEFAULT_NUM_CEPSTRAL, DEFAULT_NUM_FBANK,
    DEFAULT_VARIANCE_LRATE,
};
use vts_noise::{
    Driver, EstimationContext, MatrixArchiveReader, VectorWriter, VtsConfig, read_int_vector_table,
    read_vector_table,
};

#[derive(Parser, Debug)]
#[command(
    about = "Compute one iteration of noise model estimation for VTS model compensation",
    after_help = "Noise parameters are stored per utterance under <key>_mu_h, <key>_mu_z and <key>_var_z."
)]
struct Args {
    /// Clean-speech acoustic model (JSON).
    model_in: PathBuf,

    /// Feature archive (MFCC_0_D_A matrices).
    features: PathBuf,

    /// Alignment archive (transition ids).
    alignments: PathBuf,

    /// Current noise parameters.
    noise_in: PathBuf,

    /// Where to write the updated noise parameters.
    noise_out: PathBuf,

    /// Number of cepstral coefficients, C0 included.
    #[arg(long, default_value_t = DEFAULT_NUM_CEPSTRAL)]
    num_cepstral: usize,

    /// Number of filter-bank channels.
    #[arg(long, default_value_t = DEFAULT_NUM_FBANK)]
    num_fbank: usize,

    /// Cepstral lifter applied at feature extraction.
    #[arg(long, default_value_t = DEFAULT_CEPLIFTER)]
    ceplifter: f64,

    /// Learning rate for the additive noise variance; 0 disables it.
    #[arg(long, default_value_t = DEFAULT_VARIANCE_LRATE)]
    variance_lrate: f64,

    /// Cap on the magnitude of the static noise means.
    #[arg(long, default_value_t = DEFAULT_MAX_NOISE_MEAN_MAGNITUDE)]
    max_noise_mean_magnitude: f64,

    /// How often a rejected update is halved toward the old estimate.
    #[arg(long, default_value_t = 0)]
    max_backoff_steps: u32,

    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn config(&self) -> VtsConfig {
        VtsConfig {
            num_cepstral: self.num_cepstral,
            num_fbank: self.num_fbank,
            ceplifter: self.ceplifter,
            variance_lrate: self.variance_lrate,
            max_noise_mean_magnitude: self.max_noise_mean_magnitude,
            max_backoff_steps: self.max_backoff_steps,
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: &Args) -> Result<ExitCode> {
    let model = AcousticModel::read(&args.model_in)
        .with_context(|| format!("reading model {}", args.model_in.display()))?;
    let ctx = EstimationContext::new(model, args.config())?;

    let open = |path: &PathBuf| {
        File::open(path)
            .map(BufReader::new)
            .with_context(|| format!("opening {}", path.display()))
    };
    let alignments = read_int_vector_table(open(&args.alignments)?)
        .with_context(|| format!("reading alignments {}", args.alignments.display()))?;
    let noise_in = read_vector_table(open(&args.noise_in)?)
        .with_context(|| format!("reading noise parameters {}", args.noise_in.display()))?;
    let features = MatrixArchiveReader::new(open(&args.features)?);

    let out = File::create(&args.noise_out)
        .with_context(|| format!("creating {}", args.noise_out.display()))?;
    let mut writer = VectorWriter::new(BufWriter::new(out));

    let summary = Driver::new(&ctx)
        .run(features, &alignments, &noise_in, &mut writer)
        .context("noise estimation failed")?;
    writer
        .finish()
        .with_context(|| format!("writing {}", args.noise_out.display()))?;

    info!(
        num_success = summary.num_success,
        num_fail = summary.num_fail,
        tot_frames = summary.tot_frames,
        "finished"
    );
    Ok(ExitCode::from(summary.exit_code()))
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
