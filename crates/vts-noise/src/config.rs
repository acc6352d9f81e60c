//! Estimation configuration.

use crate::error::Error;

/// Default cepstral order (C0 included).
pub const DEFAULT_NUM_CEPSTRAL: usize = 13;
/// Default number of filter-bank channels the cepstra were computed from.
pub const DEFAULT_NUM_FBANK: usize = 26;
/// Default cepstral lifter.
pub const DEFAULT_CEPLIFTER: f64 = 22.0;
/// Default learning rate for the additive noise variance.
pub const DEFAULT_VARIANCE_LRATE: f64 = 0.1;
/// Default cap on noise mean coefficients (effectively unbounded).
pub const DEFAULT_MAX_NOISE_MEAN_MAGNITUDE: f64 = 999_999.0;

/// Learning rates at or below this value disable variance estimation.
pub const MIN_VARIANCE_LRATE: f64 = 1e-6;

/// Static, delta and acceleration blocks.
pub const NUM_FEATURE_BLOCKS: usize = 3;

/// Options for one noise estimation pass.
///
/// # Example
///
/// ```
/// use vts_noise::VtsConfig;
///
/// let config = VtsConfig {
///     variance_lrate: 0.0,
///     ..Default::default()
/// };
/// config.validate().unwrap();
/// assert!(!config.estimate_variance());
/// assert_eq!(config.feature_dim(), 39);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct VtsConfig {
    /// Number of cepstral coefficients per block, C0 last (default: 13).
    pub num_cepstral: usize,
    /// Number of filter-bank channels (default: 26).
    pub num_fbank: usize,
    /// Cepstral lifter used at feature extraction (default: 22).
    pub ceplifter: f64,
    /// Learning rate λ for the additive noise variance, in `[0, 1]`
    /// (default: 0.1). Zero disables variance estimation.
    pub variance_lrate: f64,
    /// Cap on the magnitude of every static noise mean coefficient, for both
    /// convolutional and additive noise (default: 999999).
    pub max_noise_mean_magnitude: f64,
    /// Number of times a rejected candidate is moved halfway back toward the
    /// previous estimate and re-checked before giving up (default: 0).
    pub max_backoff_steps: u32,
}

impl Default for VtsConfig {
    fn default() -> Self {
        Self {
            num_cepstral: DEFAULT_NUM_CEPSTRAL,
            num_fbank: DEFAULT_NUM_FBANK,
            ceplifter: DEFAULT_CEPLIFTER,
            variance_lrate: DEFAULT_VARIANCE_LRATE,
            max_noise_mean_magnitude: DEFAULT_MAX_NOISE_MEAN_MAGNITUDE,
            max_backoff_steps: 0,
        }
    }
}

impl VtsConfig {
    /// Checks the scalar options. Transform dimensions are checked when the
    /// cepstral transform is built.
    pub fn validate(&self) -> Result<(), Error> {
        if !(0.0..=1.0).contains(&self.variance_lrate) {
            return Err(Error::Config(format!(
                "variance learning rate {} is outside [0, 1]",
                self.variance_lrate
            )));
        }
        if self.max_noise_mean_magnitude.is_nan() || self.max_noise_mean_magnitude <= 0.0 {
            return Err(Error::Config(format!(
                "maximum noise mean magnitude {} must be positive",
                self.max_noise_mean_magnitude
            )));
        }
        Ok(())
    }

    /// Feature dimension implied by the cepstral order.
    #[inline]
    pub fn feature_dim(&self) -> usize {
        NUM_FEATURE_BLOCKS * self.num_cepstral
    }

    /// Whether the variance stage runs at all.
    #[inline]
    pub fn estimate_variance(&self) -> bool {
        self.variance_lrate > MIN_VARIANCE_LRATE
    }
}
