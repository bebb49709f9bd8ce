//! Submission status values.
//!
//! The serialized names are part of the public report contract and of the
//! on-disk status file, so they must not change.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    /// Structure is being fetched or normalized.
    Initializing,
    /// Structure is ready; a submission may start.
    Initialized,
    /// External tool process is running.
    Running,
    /// Tool exited cleanly and results were archived.
    Finished,
    /// Tool reported a failure, or it could not be launched.
    Error,
    /// Explicitly killed.
    Aborted,
    /// Permanently sealed; absorbs every later status change.
    Deleted,
    /// Structure could not be fetched or normalized.
    FailedInitialization,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initializing => "Initializing",
            Self::Initialized => "Initialized",
            Self::Running => "Running",
            Self::Finished => "Finished",
            Self::Error => "Error",
            Self::Aborted => "Aborted",
            Self::Deleted => "Deleted",
            Self::FailedInitialization => "FailedInitialization",
        }
    }

    /// Whether a new submission may be started from this status.
    pub fn is_submittable(self) -> bool {
        matches!(
            self,
            Self::Initialized | Self::Error | Self::Finished | Self::Aborted
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialized_names_match_display() {
        for status in [
            JobStatus::Initializing,
            JobStatus::Initialized,
            JobStatus::Running,
            JobStatus::Finished,
            JobStatus::Error,
            JobStatus::Aborted,
            JobStatus::Deleted,
            JobStatus::FailedInitialization,
        ] {
            let json = serde_json::to_string(&status).expect("serialize");
            assert_eq!(json, format!("\"{status}\""));
        }
    }

    #[test]
    fn only_idle_states_are_submittable() {
        assert!(JobStatus::Initialized.is_submittable());
        assert!(JobStatus::Finished.is_submittable());
        assert!(JobStatus::Error.is_submittable());
        assert!(JobStatus::Aborted.is_submittable());
        assert!(!JobStatus::Initializing.is_submittable());
        assert!(!JobStatus::Running.is_submittable());
        assert!(!JobStatus::Deleted.is_submittable());
        assert!(!JobStatus::FailedInitialization.is_submittable());
    }
}
