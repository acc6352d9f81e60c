//! Numeric building blocks shared by the VTS crates.
//!
//! - [`CepstralTransform`]: the liftered DCT mapping log filter-bank energies
//!   to MFCC_0 cepstra, and its pseudo-inverse.
//! - [`solve`] and [`from_rows`]: the two dense kernels the estimators need on
//!   top of `ndarray`.

#![deny(unsafe_code)]

pub(crate) mod dct;
pub(crate) mod linalg;

pub use dct::{CepstralTransform, DctError};
pub use linalg::{SingularMatrix, from_rows, solve};
