//! A set of diagonal GMMs, one per pdf.

use crate::diag_gmm::DiagGmm;
use crate::model_io::ModelError;

/// Acoustic model: one [`DiagGmm`] per pdf id.
///
/// Gaussians are also addressable by a flat index, pdf-major then
/// component-minor, which is how per-Gaussian statistics are laid out.
#[derive(Debug, Clone)]
pub struct AmDiagGmm {
    gmms: Vec<DiagGmm>,
    offsets: Vec<usize>,
    num_gauss: usize,
    dim: usize,
}

impl AmDiagGmm {
    pub fn new(gmms: Vec<DiagGmm>) -> Result<Self, ModelError> {
        let Some(first) = gmms.first() else {
            return Err(ModelError::Invalid("acoustic model has no pdfs".into()));
        };
        let dim = first.dim();
        if let Some((pdf, gmm)) = gmms.iter().enumerate().find(|(_, g)| g.dim() != dim) {
            return Err(ModelError::Invalid(format!(
                "pdf {pdf} has dimension {}, expected {dim}",
                gmm.dim()
            )));
        }
        let mut offsets = Vec::with_capacity(gmms.len());
        let mut num_gauss = 0;
        for gmm in &gmms {
            offsets.push(num_gauss);
            num_gauss += gmm.num_gauss();
        }
        Ok(Self {
            gmms,
            offsets,
            num_gauss,
            dim,
        })
    }

    #[inline]
    pub fn num_pdfs(&self) -> usize {
        self.gmms.len()
    }

    /// Total number of Gaussians across all pdfs.
    #[inline]
    pub fn num_gauss(&self) -> usize {
        self.num_gauss
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn gmm(&self, pdf: usize) -> &DiagGmm {
        &self.gmms[pdf]
    }

    pub fn gmm_mut(&mut self, pdf: usize) -> &mut DiagGmm {
        &mut self.gmms[pdf]
    }

    pub fn gmms(&self) -> &[DiagGmm] {
        &self.gmms
    }

    /// Flat index of the first Gaussian of `pdf`.
    #[inline]
    pub fn gauss_offset(&self, pdf: usize) -> usize {
        self.offsets[pdf]
    }
}
