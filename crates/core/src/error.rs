#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Admission rejected: {0}")]
    AdmissionRejected(String),

    #[error("Structure fetch failed: {0}")]
    FetchFailed(String),

    #[error("Tool execution failed: {0}")]
    ToolExecution(String),

    #[error("Termination failed: {0}")]
    TerminationFailed(String),

    #[error("Computation {0} has been deleted")]
    Gone(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for a missing computation.
    pub fn job_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "computation",
            id: id.into(),
        }
    }

    /// Text stored in a submission's `errorMessage`.
    ///
    /// Variants that already carry a caller-facing sentence are returned
    /// bare; everything else keeps its category prefix.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg)
            | Self::AdmissionRejected(msg)
            | Self::FetchFailed(msg)
            | Self::ToolExecution(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}
