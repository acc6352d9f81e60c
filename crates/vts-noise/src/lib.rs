//! One-iteration re-estimation of VTS noise parameters.
//!
//! Given a clean-speech acoustic model, per-utterance noise estimates
//! (convolutional mean `mu_h`, additive mean `mu_z`, additive variance
//! `var_z`), MFCC_0_D_A features and a fixed state alignment, each utterance
//! goes through one step of:
//!
//! 1. first-order VTS compensation of the model,
//! 2. posterior statistics under the alignment,
//! 3. closed-form static mean update and damped variance update,
//! 4. a likelihood guard that only keeps updates which do not lower the
//!    alignment likelihood.
//!
//! [`estimate_utterance`] runs that step for one utterance; [`Driver`] runs it
//! over keyed archives.
//!
//! # Quick Start
//!
//! ```ignore
//! use vts_gmm::AcousticModel;
//! use vts_noise::{Driver, EstimationContext, MatrixArchiveReader, VtsConfig, VectorWriter};
//!
//! let ctx = EstimationContext::new(AcousticModel::read("final.json")?, VtsConfig::default())?;
//! let features = MatrixArchiveReader::new(feats_reader);
//! let mut out = VectorWriter::new(noise_writer);
//! let summary = Driver::new(&ctx).run(features, &alignments, &noise_in, &mut out)?;
//! ```

#![deny(unsafe_code)]

pub(crate) mod accumulator;
pub(crate) mod backoff;
pub(crate) mod compensation;
pub mod config;
pub(crate) mod driver;
mod error;
pub(crate) mod likelihood;
pub(crate) mod mean_estimator;
pub(crate) mod noise_params;
pub(crate) mod table;
pub(crate) mod utterance;
pub(crate) mod variance_estimator;

pub use config::VtsConfig;
pub use driver::{Driver, RunSummary};
pub use error::{Error, UtteranceError};
pub use noise_params::{NoiseKeys, NoiseParams};
pub use table::{
    KeyedTable, MatrixArchiveReader, TableError, UtteranceSource, VectorSink, VectorWriter,
    read_int_vector_table, read_vector_table, write_int_vector_entry, write_matrix_entry,
    write_vector_entry,
};
pub use utterance::{EstimationContext, UtteranceEstimate, estimate_utterance};

// Expose the estimation stages for integration tests and benches.
#[doc(hidden)]
pub mod internals {
    pub use crate::accumulator::{NoiseStats, accumulate_statistics};
    pub use crate::compensation::{CompensatedModel, Jacobians, compensate_model};
    pub use crate::likelihood::alignment_log_likelihood;
    pub use crate::variance_estimator::{MIN_NOISE_VARIANCE, estimate_additive_noise_variance};
}
