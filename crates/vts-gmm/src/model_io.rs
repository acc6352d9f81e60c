//! JSON model file.
//!
//! ```json
//! {
//!   "transition_model": { "tid_to_pdf": [0, 0, 1] },
//!   "gmms": [
//!     { "weights": [1.0], "means": [[0.0, ...]], "vars": [[1.0, ...]] }
//!   ]
//! }
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;
use vts_common::from_rows;

use crate::am_diag_gmm::AmDiagGmm;
use crate::diag_gmm::DiagGmm;
use crate::transition_model::TransitionModel;

/// Errors raised while building or reading an acoustic model.
#[derive(Debug)]
pub enum ModelError {
    /// The model file could not be opened or read.
    Io(std::io::Error),
    /// The model file is not valid JSON for this schema.
    Parse(serde_json::Error),
    /// The model is structurally inconsistent.
    Invalid(String),
}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read model: {e}"),
            Self::Parse(e) => write!(f, "malformed model file: {e}"),
            Self::Invalid(msg) => write!(f, "invalid model: {msg}"),
        }
    }
}

impl std::error::Error for ModelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Parse(e) => Some(e),
            Self::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ModelError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for ModelError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e)
    }
}

/// Transition model plus GMM set, read once and shared read-only.
///
/// Only [`AcousticModel::new`] builds one, so every transition id is known
/// to resolve to a pdf of [`am`](Self::am).
#[derive(Debug, Clone)]
pub struct AcousticModel {
    transition_model: TransitionModel,
    am: AmDiagGmm,
}

#[derive(Serialize, Deserialize)]
struct GmmRecord {
    weights: Vec<f64>,
    means: Vec<Vec<f64>>,
    vars: Vec<Vec<f64>>,
}

#[derive(Serialize, Deserialize)]
struct ModelRecord {
    transition_model: TransitionModel,
    gmms: Vec<GmmRecord>,
}

impl AcousticModel {
    /// Pairs a transition model with a GMM set, checking that every
    /// transition id resolves to an existing pdf.
    pub fn new(transition_model: TransitionModel, am: AmDiagGmm) -> Result<Self, ModelError> {
        if transition_model.num_pdfs() > am.num_pdfs() {
            return Err(ModelError::Invalid(format!(
                "transition model references {} pdfs but the GMM set has {}",
                transition_model.num_pdfs(),
                am.num_pdfs()
            )));
        }
        Ok(Self {
            transition_model,
            am,
        })
    }

    #[inline]
    pub fn transition_model(&self) -> &TransitionModel {
        &self.transition_model
    }

    #[inline]
    pub fn am(&self) -> &AmDiagGmm {
        &self.am
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let model = Self::from_reader(BufReader::new(File::open(path)?))?;
        debug!(
            path = %path.display(),
            num_pdfs = model.am.num_pdfs(),
            num_gauss = model.am.num_gauss(),
            dim = model.am.dim(),
            "loaded acoustic model"
        );
        Ok(model)
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, ModelError> {
        let record: ModelRecord = serde_json::from_reader(reader)?;
        let gmms = record
            .gmms
            .into_iter()
            .map(|g| {
                let means = from_rows(&g.means)
                    .map_err(|e| ModelError::Invalid(format!("means matrix: {e}")))?;
                let vars = from_rows(&g.vars)
                    .map_err(|e| ModelError::Invalid(format!("vars matrix: {e}")))?;
                DiagGmm::new(g.weights, means, vars)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(record.transition_model, AmDiagGmm::new(gmms)?)
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), ModelError> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.to_writer(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn to_writer(&self, writer: impl Write) -> Result<(), ModelError> {
        let record = ModelRecord {
            transition_model: self.transition_model.clone(),
            gmms: self
                .am
                .gmms()
                .iter()
                .map(|g| GmmRecord {
                    weights: g.weights().to_vec(),
                    means: (0..g.num_gauss()).map(|i| g.mean(i).to_vec()).collect(),
                    vars: (0..g.num_gauss()).map(|i| g.var(i).to_vec()).collect(),
                })
                .collect(),
        };
        serde_json::to_writer(writer, &record)?;
        Ok(())
    }
}
