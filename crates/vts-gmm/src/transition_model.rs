//! Transition-id to pdf-id mapping.

use serde::{Deserialize, Serialize};

/// Resolves alignment transition ids to pdf ids.
///
/// Transition ids are 1-based; id `0` is never valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionModel {
    tid_to_pdf: Vec<usize>,
}

impl TransitionModel {
    /// `tid_to_pdf[i]` is the pdf of transition id `i + 1`.
    pub fn new(tid_to_pdf: Vec<usize>) -> Self {
        Self { tid_to_pdf }
    }

    #[inline]
    pub fn num_transition_ids(&self) -> usize {
        self.tid_to_pdf.len()
    }

    /// Number of pdfs referenced (largest pdf id + 1).
    pub fn num_pdfs(&self) -> usize {
        self.tid_to_pdf.iter().max().map_or(0, |m| m + 1)
    }

    /// Pdf of transition id `tid`, or `None` if the id is out of range.
    #[inline]
    pub fn pdf(&self, tid: i32) -> Option<usize> {
        let index = usize::try_from(tid).ok()?.checked_sub(1)?;
        self.tid_to_pdf.get(index).copied()
    }
}
