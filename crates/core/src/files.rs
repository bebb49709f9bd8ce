//! Well-known file and directory names inside the working directory.

/// Serialized computation, one per job directory.
pub const STATUS_FILE: &str = "status.json";

/// Process registry, at the root of the working directory.
pub const PROCESS_REGISTRY_FILE: &str = "processes.json";

/// Channel tool input.
pub const MOLE_INPUT: &str = "input.xml";

/// Caller parameters stored next to a channel tool submission.
pub const MOLE_PARAMS: &str = "mole.json";

/// Pore tool input (also the record of its parameters).
pub const PORES_PARAMS: &str = "pores.json";

/// Archive of a finished submission.
pub const REPORT_ARCHIVE: &str = "report.zip";

/// Channel data produced under `json/`.
pub const DATA_JSON: &str = "data.json";

/// Viewer script produced under `pymol/` and `chimera/`.
pub const PYTHON_SCRIPT: &str = "complex.py";

/// Viewer script produced under `vmd/`.
pub const VMD_SCRIPT: &str = "complex";

/// Membrane data, stored at the job root by the pore tool.
pub const MEMBRANE_JSON: &str = "membrane.json";

/// Directory name of the preparation run.
pub const PREPARATION_DIR: &str = "0";
