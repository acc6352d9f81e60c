//! Acoustic model types consumed by VTS noise estimation.
//!
//! An [`AcousticModel`] pairs a set of diagonal-covariance GMMs (one per
//! pdf, [`AmDiagGmm`]) with a [`TransitionModel`] that resolves the
//! transition ids found in alignments to pdf ids.

#![deny(unsafe_code)]

pub(crate) mod am_diag_gmm;
pub(crate) mod diag_gmm;
pub(crate) mod model_io;
pub(crate) mod transition_model;

pub use am_diag_gmm::AmDiagGmm;
pub use diag_gmm::DiagGmm;
pub use model_io::{AcousticModel, ModelError};
pub use transition_model::TransitionModel;
