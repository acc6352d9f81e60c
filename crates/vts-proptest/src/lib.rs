//! Property-based test helpers for VTS noise estimation.
//!
//! Provides strategies for clean acoustic models, noise vectors and aligned
//! utterances, plus float comparison utilities.
//!
//! # Usage
//!
//! ```ignore
//! use vts_proptest::generators::*;
//! use test_strategy::proptest;
//!
//! #[proptest]
//! fn my_test(#[strategy(scenario(4, 12))] s: Scenario) {
//!     assert_eq!(s.alignment.len(), s.features.nrows());
//! }
//! ```

pub mod comparison;
pub mod generators;

pub use proptest;
pub use test_strategy;
