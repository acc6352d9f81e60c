//! Error types.
//!
//! [`Error`] aborts the whole run (bad configuration, malformed model or
//! archive, data whose shape contradicts the configuration).
//! [`UtteranceError`] only skips the utterance it was raised for.

use vts_common::DctError;
use vts_gmm::ModelError;

use crate::table::TableError;

/// Fatal errors.
#[derive(Debug)]
pub enum Error {
    /// Invalid option value.
    Config(String),
    /// Cepstral transform could not be built.
    Dct(DctError),
    /// Acoustic model could not be read or is inconsistent.
    Model(ModelError),
    /// Acoustic model dimension does not match the cepstral configuration.
    ModelDim { expected: usize, found: usize },
    /// Feature dimension does not match the cepstral configuration.
    FeatureDim {
        key: String,
        expected: usize,
        found: usize,
    },
    /// A noise parameter vector has the wrong length.
    NoiseDim {
        key: String,
        expected: &'static str,
        found: usize,
    },
    /// Reading or writing a keyed archive failed.
    Table(TableError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "invalid configuration: {msg}"),
            Self::Dct(e) => write!(f, "cannot build cepstral transform: {e}"),
            Self::Model(e) => write!(f, "{e}"),
            Self::ModelDim { expected, found } => write!(
                f,
                "acoustic model has dimension {found}, but the cepstral setup implies {expected}"
            ),
            Self::FeatureDim {
                key,
                expected,
                found,
            } => write!(
                f,
                "features for {key} have dimension {found}; only {expected}-dimensional \
                 MFCC_0_D_A features are supported"
            ),
            Self::NoiseDim {
                key,
                expected,
                found,
            } => write!(
                f,
                "noise parameter {key} has dimension {found}, expected {expected}"
            ),
            Self::Table(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Dct(e) => Some(e),
            Self::Model(e) => Some(e),
            Self::Table(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DctError> for Error {
    fn from(e: DctError) -> Self {
        Self::Dct(e)
    }
}

impl From<ModelError> for Error {
    fn from(e: ModelError) -> Self {
        Self::Model(e)
    }
}

impl From<TableError> for Error {
    fn from(e: TableError) -> Self {
        Self::Table(e)
    }
}

/// Reasons an utterance is skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UtteranceError {
    /// The feature matrix has no frames.
    Empty,
    /// No alignment stored under the utterance key.
    MissingAlignment,
    /// Alignment and feature lengths differ.
    AlignmentLength { alignment: usize, frames: usize },
    /// At least one of `_mu_h`, `_mu_z`, `_var_z` is missing.
    MissingNoiseParams,
    /// Transition id that the transition model does not know.
    InvalidTransitionId { frame: usize, transition_id: i32 },
}

impl std::fmt::Display for UtteranceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::Empty => write!(f, "zero-length utterance"),
            Self::MissingAlignment => write!(f, "no alignment found, utterance ignored"),
            Self::AlignmentLength { alignment, frames } => {
                write!(f, "alignment has wrong size {alignment} vs. {frames}")
            }
            Self::MissingNoiseParams => write!(
                f,
                "not all the noise parameters (mu_h, mu_z, var_z) are available"
            ),
            Self::InvalidTransitionId {
                frame,
                transition_id,
            } => write!(f, "invalid transition id {transition_id} at frame {frame}"),
        }
    }
}

impl std::error::Error for UtteranceError {}
