//! Cepstral transform builder.
//!
//! Builds the `C × F` liftered DCT-II used for MFCC_0 extraction (HTK
//! normalisation, C0 stored as the last coefficient) together with its
//! `F × C` pseudo-inverse. The DCT rows are mutually orthogonal, so
//! `D D^T` is diagonal and the pseudo-inverse `D^T (D D^T)^-1` is `D^T`
//! with each column divided by the energy of the matching DCT row.

use std::f64::consts::PI;

use ndarray::{Array1, Array2, ArrayView1, Axis};

/// Invalid cepstral transform dimensions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DctError {
    /// Cepstral order or filter-bank count is zero.
    ZeroDimension { num_cepstral: usize, num_fbank: usize },
    /// More cepstra requested than there are filter-bank channels.
    TooManyCepstra { num_cepstral: usize, num_fbank: usize },
    /// Lifter coefficient is negative or not finite.
    InvalidLifter { ceplifter: f64 },
}

impl std::fmt::Display for DctError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::ZeroDimension {
                num_cepstral,
                num_fbank,
            } => write!(
                f,
                "cepstral order ({num_cepstral}) and filter-bank count ({num_fbank}) must be positive"
            ),
            Self::TooManyCepstra {
                num_cepstral,
                num_fbank,
            } => write!(
                f,
                "cepstral order {num_cepstral} exceeds filter-bank count {num_fbank}"
            ),
            Self::InvalidLifter { ceplifter } => {
                write!(f, "invalid cepstral lifter {ceplifter}; expected a finite value >= 0")
            }
        }
    }
}

impl std::error::Error for DctError {}

/// Forward and inverse cepstral transforms.
#[derive(Debug, Clone)]
pub struct CepstralTransform {
    num_cepstral: usize,
    num_fbank: usize,
    /// `C × F`: log filter-bank -> cepstrum.
    dct: Array2<f64>,
    /// `F × C`: cepstrum -> log filter-bank.
    inv_dct: Array2<f64>,
}

impl CepstralTransform {
    /// Builds the transform pair.
    ///
    /// A lifter of `0` disables liftering.
    pub fn new(num_cepstral: usize, num_fbank: usize, ceplifter: f64) -> Result<Self, DctError> {
        if num_cepstral == 0 || num_fbank == 0 {
            return Err(DctError::ZeroDimension {
                num_cepstral,
                num_fbank,
            });
        }
        if num_cepstral > num_fbank {
            return Err(DctError::TooManyCepstra {
                num_cepstral,
                num_fbank,
            });
        }
        if !ceplifter.is_finite() || ceplifter < 0.0 {
            return Err(DctError::InvalidLifter { ceplifter });
        }

        let norm = (2.0 / num_fbank as f64).sqrt();
        let dct = Array2::from_shape_fn((num_cepstral, num_fbank), |(r, j)| {
            let k = cepstral_index(r, num_cepstral);
            lifter_weight(k, ceplifter)
                * norm
                * (PI * k as f64 * (j as f64 + 0.5) / num_fbank as f64).cos()
        });

        let energy = dct.map_axis(Axis(1), |row| row.dot(&row));
        // A lifter weight of exactly zero wipes out a coefficient.
        if energy.iter().any(|&e| e <= f64::MIN_POSITIVE) {
            return Err(DctError::InvalidLifter { ceplifter });
        }
        let inv_dct = &dct.t() / &energy;

        Ok(Self {
            num_cepstral,
            num_fbank,
            dct,
            inv_dct,
        })
    }

    #[inline]
    pub fn num_cepstral(&self) -> usize {
        self.num_cepstral
    }

    #[inline]
    pub fn num_fbank(&self) -> usize {
        self.num_fbank
    }

    /// The `C × F` forward transform.
    pub fn dct(&self) -> &Array2<f64> {
        &self.dct
    }

    /// The `F × C` pseudo-inverse.
    pub fn inv_dct(&self) -> &Array2<f64> {
        &self.inv_dct
    }

    /// Log filter-bank vector to cepstrum.
    pub fn to_cepstral(&self, log_fbank: ArrayView1<'_, f64>) -> Array1<f64> {
        self.dct.dot(&log_fbank)
    }

    /// Cepstrum to (minimum-norm) log filter-bank vector.
    pub fn to_log_fbank(&self, cepstrum: ArrayView1<'_, f64>) -> Array1<f64> {
        self.inv_dct.dot(&cepstrum)
    }
}

/// DCT frequency index for output row `r`. C0 goes last.
fn cepstral_index(r: usize, num_cepstral: usize) -> usize {
    if r + 1 == num_cepstral { 0 } else { r + 1 }
}

fn lifter_weight(k: usize, ceplifter: f64) -> f64 {
    if ceplifter == 0.0 {
        1.0
    } else {
        1.0 + 0.5 * ceplifter * (PI * k as f64 / ceplifter).sin()
    }
}

#[cfg(test)]
mod tests {
    use proptest::collection::vec as pvec;
    use proptest::prelude::*;
    use test_strategy::proptest;

    use super::*;

    #[test]
    fn rejects_invalid_dimensions() {
        assert_eq!(
            CepstralTransform::new(0, 26, 22.0).unwrap_err(),
            DctError::ZeroDimension {
                num_cepstral: 0,
                num_fbank: 26
            }
        );
        assert_eq!(
            CepstralTransform::new(27, 26, 22.0).unwrap_err(),
            DctError::TooManyCepstra {
                num_cepstral: 27,
                num_fbank: 26
            }
        );
        assert!(matches!(
            CepstralTransform::new(13, 26, -1.0),
            Err(DctError::InvalidLifter { .. })
        ));
    }

    #[test]
    fn shapes_match_configuration() {
        let t = CepstralTransform::new(13, 26, 22.0).unwrap();
        assert_eq!(t.dct().dim(), (13, 26));
        assert_eq!(t.inv_dct().dim(), (26, 13));
    }

    #[test]
    fn c0_is_last_and_unliftered() {
        let t = CepstralTransform::new(13, 26, 22.0).unwrap();
        let flat = Array1::from_elem(26, 1.0);
        let cep = t.to_cepstral(flat.view());
        // Only C0 sees a constant log spectrum: sqrt(2/F) * F.
        let expected_c0 = (2.0f64 / 26.0).sqrt() * 26.0;
        assert!((cep[12] - expected_c0).abs() < 1e-12);
        for &c in cep.iter().take(12) {
            assert!(c.abs() < 1e-12, "non-C0 coefficient {c} should vanish");
        }
    }

    #[test]
    fn forward_times_inverse_is_identity() {
        let t = CepstralTransform::new(13, 26, 22.0).unwrap();
        let product = t.dct().dot(t.inv_dct());
        let identity = Array2::<f64>::eye(13);
        for ((i, j), p) in product.indexed_iter() {
            assert!((p - identity[[i, j]]).abs() < 1e-12, "({i},{j}) = {p}");
        }
    }

    #[proptest]
    fn cepstral_round_trip(#[strategy(pvec(-50.0f64..50.0, 13))] cepstrum: Vec<f64>) {
        let t = CepstralTransform::new(13, 26, 22.0).unwrap();
        let cepstrum = Array1::from(cepstrum);
        let back = t.to_cepstral(t.to_log_fbank(cepstrum.view()).view());
        let norm = cepstrum.dot(&cepstrum).sqrt();
        let diff = &back - &cepstrum;
        let err = diff.dot(&diff).sqrt();
        prop_assert!(err <= 1e-6 * norm.max(1e-12), "relative error {}", err / norm);
    }
}
