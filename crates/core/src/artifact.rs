//! Well-known downloadable outputs of a computation.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::CoreError;
use crate::files::{DATA_JSON, MEMBRANE_JSON, PYTHON_SCRIPT, REPORT_ARCHIVE, VMD_SCRIPT};
use crate::types::{JobId, SubmitId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArtifactKind {
    #[default]
    Json,
    Report,
    Molecule,
    PyMol,
    Chimera,
    Vmd,
    /// Profile directory, zipped on request.
    Pdb,
    Membrane,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Report => "report",
            Self::Molecule => "molecule",
            Self::PyMol => "pymol",
            Self::Chimera => "chimera",
            Self::Vmd => "vmd",
            Self::Pdb => "pdb",
            Self::Membrane => "membrane",
        }
    }

    /// Whether the artifact lives in a submission directory.
    pub fn is_per_submission(&self) -> bool {
        !matches!(self, Self::Molecule | Self::Membrane)
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Json | Self::Membrane => "application/json",
            Self::Report | Self::Pdb => "application/zip",
            Self::PyMol | Self::Chimera => "text/x-python",
            Self::Vmd => "text/plain",
            Self::Molecule => "application/octet-stream",
        }
    }

    /// Location relative to the submission (or job) directory.
    pub fn relative_path(&self) -> Option<PathBuf> {
        let path = match self {
            Self::Json => Path::new("json").join(DATA_JSON),
            Self::Report => PathBuf::from(REPORT_ARCHIVE),
            Self::PyMol => Path::new("pymol").join(PYTHON_SCRIPT),
            Self::Chimera => Path::new("chimera").join(PYTHON_SCRIPT),
            Self::Vmd => Path::new("vmd").join(VMD_SCRIPT),
            Self::Pdb => Path::new("pdb").join("profile"),
            Self::Membrane => PathBuf::from(MEMBRANE_JSON),
            Self::Molecule => return None,
        };
        Some(path)
    }

    /// Download name for a per-submission artifact.
    pub fn download_name(&self, job_id: &JobId, submit_id: SubmitId) -> String {
        let stem = format!("mole_channels_{job_id}_{submit_id}");
        match self {
            Self::Json => format!("{stem}.json"),
            Self::Report => format!("{stem}.zip"),
            Self::PyMol => format!("{stem}_pymol.py"),
            Self::Chimera => format!("{stem}_chimera.py"),
            Self::Vmd => format!("{stem}.tk"),
            Self::Pdb => format!("{stem}_pdb.zip"),
            Self::Membrane => MEMBRANE_JSON.to_string(),
            Self::Molecule => stem,
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "report" => Ok(Self::Report),
            "molecule" => Ok(Self::Molecule),
            "pymol" => Ok(Self::PyMol),
            "chimera" => Ok(Self::Chimera),
            "vmd" => Ok(Self::Vmd),
            "pdb" => Ok(Self::Pdb),
            "membrane" => Ok(Self::Membrane),
            other => Err(CoreError::Validation(format!(
                "Unknown data format '{other}'. Expected one of: json, report, molecule, \
                 pymol, chimera, vmd, pdb, membrane"
            ))),
        }
    }
}

/// A resolved artifact ready to be sent to the caller.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub content_type: &'static str,
}
