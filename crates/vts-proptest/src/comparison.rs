//! Tolerance assertions over anything that iterates `&f64`.
//!
//! Slices, `Vec`s and `ndarray` arrays or views all qualify, so a model row
//! can be checked against a plain expectation without copying it out.

use std::fmt;

/// The element pair that deviates most between two sequences.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorstDeviation {
    pub index: usize,
    pub actual: f64,
    pub expected: f64,
    /// `|actual - expected|`, with a NaN on either side counted as infinite.
    pub distance: f64,
}

impl fmt::Display for WorstDeviation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "index {}: actual {}, expected {} (off by {})",
            self.index, self.actual, self.expected, self.distance
        )
    }
}

fn distance(actual: f64, expected: f64) -> f64 {
    if actual == expected {
        return 0.0;
    }
    let d = (actual - expected).abs();
    if d.is_nan() { f64::INFINITY } else { d }
}

/// Walks both sequences in step and returns the worst pair, or `None` when
/// both are empty.
///
/// # Panics
///
/// Panics if the sequences differ in length.
pub fn worst_deviation<'a, 'b>(
    actual: impl IntoIterator<Item = &'a f64>,
    expected: impl IntoIterator<Item = &'b f64>,
) -> Option<WorstDeviation> {
    let mut actual = actual.into_iter();
    let mut expected = expected.into_iter();
    let mut worst: Option<WorstDeviation> = None;
    for index in 0.. {
        match (actual.next(), expected.next()) {
            (Some(&a), Some(&e)) => {
                let distance = distance(a, e);
                if worst.is_none_or(|w| distance > w.distance) {
                    worst = Some(WorstDeviation {
                        index,
                        actual: a,
                        expected: e,
                        distance,
                    });
                }
            }
            (None, None) => break,
            (Some(_), None) => panic!("actual is longer than expected ({index} elements matched)"),
            (None, Some(_)) => panic!("actual is shorter than expected ({index} elements matched)"),
        }
    }
    worst
}

/// Asserts every element is within `tolerance` of its counterpart.
#[track_caller]
pub fn assert_all_close<'a, 'b>(
    actual: impl IntoIterator<Item = &'a f64>,
    expected: impl IntoIterator<Item = &'b f64>,
    tolerance: f64,
) {
    if let Some(worst) = worst_deviation(actual, expected) {
        assert!(
            worst.distance <= tolerance,
            "not within {tolerance}: {worst}"
        );
    }
}

/// Asserts every element is within `tolerance` of the single value `expected`.
#[track_caller]
pub fn assert_all_close_to<'a>(
    actual: impl IntoIterator<Item = &'a f64>,
    expected: f64,
    tolerance: f64,
) {
    for (index, &a) in actual.into_iter().enumerate() {
        let d = distance(a, expected);
        assert!(
            d <= tolerance,
            "not within {tolerance}: index {index}: actual {a}, expected {expected} (off by {d})"
        );
    }
}

/// Asserts both sequences hold the same bit patterns.
///
/// Distinguishes `-0.0` from `0.0` and compares NaN payloads.
#[track_caller]
pub fn assert_bits_eq<'a, 'b>(
    actual: impl IntoIterator<Item = &'a f64>,
    expected: impl IntoIterator<Item = &'b f64>,
) {
    let mut actual = actual.into_iter();
    let mut expected = expected.into_iter();
    for index in 0.. {
        match (actual.next(), expected.next()) {
            (Some(a), Some(e)) => assert_eq!(
                a.to_bits(),
                e.to_bits(),
                "bits differ at index {index}: actual {a}, expected {e}"
            ),
            (None, None) => break,
            _ => panic!("sequences differ in length after {index} elements"),
        }
    }
}
