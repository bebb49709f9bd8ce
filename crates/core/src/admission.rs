//! Admission policy for new submissions.
//!
//! A submission may start only when the computation is idle and the number
//! of outstanding processes is below the configured ceiling.

use std::fmt;

use crate::registry::ProcessRegistry;
use crate::status::JobStatus;
use crate::types::JobId;

/// Why a submission was not admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    StillRunning,
    NotInitialized,
    NotSubmittable(JobStatus),
    HeavyLoad,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StillRunning => f.write_str(
                "Previous computation is still running. This one has not been started. \
                 Please, try again later.",
            ),
            Self::NotInitialized => f.write_str(
                "Computation has not been initialized yet. Please, try again later.",
            ),
            Self::NotSubmittable(status) => write!(f, "{status}... cannot proceed."),
            Self::HeavyLoad => f.write_str(
                "Server is under heavy load, computation has not started. Please try again later.",
            ),
        }
    }
}

/// Pure admission rule over the current status and registry occupancy.
pub fn can_admit(status: JobStatus, occupancy: usize, ceiling: usize) -> Result<(), Rejection> {
    match status {
        JobStatus::Running => return Err(Rejection::StillRunning),
        JobStatus::Initializing => return Err(Rejection::NotInitialized),
        other if !other.is_submittable() => return Err(Rejection::NotSubmittable(other)),
        _ => {}
    }
    if occupancy >= ceiling {
        return Err(Rejection::HeavyLoad);
    }
    Ok(())
}

/// Applies [`can_admit`] against the live registry.
#[derive(Debug, Clone, Copy)]
pub struct AdmissionController {
    ceiling: usize,
}

impl AdmissionController {
    pub fn new(ceiling: usize) -> Self {
        Self { ceiling }
    }

    /// Admit a submission for `job_id` and reserve its registry slot.
    ///
    /// The rule is checked first; the reservation then re-checks occupancy
    /// under the registry lock, so concurrent admissions cannot overshoot the
    /// ceiling. On success the caller owns the reservation and must either
    /// register the launched process or release the slot.
    pub fn admit(
        &self,
        job_id: &JobId,
        status: JobStatus,
        registry: &ProcessRegistry,
    ) -> Result<(), Rejection> {
        can_admit(status, registry.occupancy(), self.ceiling)?;
        if registry.try_reserve(job_id, self.ceiling) {
            return Ok(());
        }
        if registry.pid_of(job_id).is_some() {
            return Err(Rejection::StillRunning);
        }
        Err(Rejection::HeavyLoad)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
