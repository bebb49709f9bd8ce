//! Persisted registry of in-flight tool processes.
//!
//! Maps computation id to the OS pid currently running on its behalf and
//! rewrites `{working_dir}/processes.json` after every mutation. Admission
//! slots are reserved here too, so the ceiling check and the reservation
//! happen under the same lock; reservations are in memory only.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::CoreError;
use crate::files::PROCESS_REGISTRY_FILE;
use crate::persist;
use crate::types::JobId;

pub struct ProcessRegistry {
    path: PathBuf,
    inner: Mutex<RegistryState>,
}

#[derive(Default)]
struct RegistryState {
    running: BTreeMap<JobId, u32>,
    reserved: HashSet<JobId>,
}

impl RegistryState {
    fn occupancy(&self) -> usize {
        self.running.len() + self.reserved.len()
    }
}

impl ProcessRegistry {
    /// Load `{working_dir}/processes.json`, or start empty if it is missing.
    pub fn load(working_dir: &Path) -> Result<Self, CoreError> {
        let path = working_dir.join(PROCESS_REGISTRY_FILE);
        let running: BTreeMap<JobId, u32> = persist::read_json(&path)?.unwrap_or_default();
        if !running.is_empty() {
            tracing::info!(count = running.len(), "Loaded in-flight processes from registry");
        }

        Ok(Self {
            path,
            inner: Mutex::new(RegistryState {
                running,
                reserved: HashSet::new(),
            }),
        })
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn flush(&self, state: &RegistryState) -> Result<(), CoreError> {
        persist::write_json_atomic(&self.path, &state.running)
    }

    /// Reserve an admission slot for `job_id` if occupancy is below `ceiling`.
    pub fn try_reserve(&self, job_id: &JobId, ceiling: usize) -> bool {
        let mut state = self.state();
        if state.running.contains_key(job_id) || state.reserved.contains(job_id) {
            return false;
        }
        if state.occupancy() >= ceiling {
            return false;
        }
        state.reserved.insert(job_id.clone());
        true
    }

    /// Give back a reservation that never turned into a process.
    pub fn release(&self, job_id: &JobId) {
        self.state().reserved.remove(job_id);
    }

    /// Record a launched process, consuming any reservation for the job.
    pub fn register(&self, job_id: &JobId, pid: u32) -> Result<(), CoreError> {
        let mut state = self.state();
        state.reserved.remove(job_id);
        state.running.insert(job_id.clone(), pid);
        self.flush(&state)
    }

    /// Drop the entry for `job_id`, returning its pid if there was one.
    ///
    /// Removing an absent entry is a no-op and does not touch the file.
    pub fn remove(&self, job_id: &JobId) -> Result<Option<u32>, CoreError> {
        let mut state = self.state();
        let removed = state.running.remove(job_id);
        if removed.is_some() {
            self.flush(&state)?;
        }
        Ok(removed)
    }

    /// Drop the entry for `job_id` only if it still points at `pid`.
    ///
    /// Used when a process exit is observed: a kill followed by a new
    /// submission may already have replaced the entry.
    pub fn remove_pid(&self, job_id: &JobId, pid: u32) -> Result<bool, CoreError> {
        let mut state = self.state();
        if state.running.get(job_id) != Some(&pid) {
            return Ok(false);
        }
        state.running.remove(job_id);
        self.flush(&state)?;
        Ok(true)
    }

    pub fn pid_of(&self, job_id: &JobId) -> Option<u32> {
        self.state().running.get(job_id).copied()
    }

    /// Running processes plus outstanding reservations.
    pub fn occupancy(&self) -> usize {
        self.state().occupancy()
    }

    /// Number of registered processes.
    pub fn len(&self) -> usize {
        self.state().running.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> BTreeMap<JobId, u32> {
        self.state().running.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> JobId {
        JobId::parse(raw).expect("valid id")
    }

    #[test]
    fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = ProcessRegistry::load(dir.path()).expect("load");
        assert!(registry.is_empty());
        assert!(!dir.path().join(PROCESS_REGISTRY_FILE).exists());
    }

    #[test]
    fn mutations_survive_reload() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = ProcessRegistry::load(dir.path()).expect("load");
        registry.register(&id("a1"), 100).expect("register");
        registry.register(&id("b2"), 200).expect("register");
        registry.remove(&id("a1")).expect("remove");

        let reloaded = ProcessRegistry::load(dir.path()).expect("reload");
        assert_eq!(reloaded.pid_of(&id("b2")), Some(200));
        assert_eq!(reloaded.pid_of(&id("a1")), None);
        assert_eq!(reloaded.len(), 1);
    }

    #[test]
    fn file_is_a_plain_id_to_pid_object() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = ProcessRegistry::load(dir.path()).expect("load");
        registry.register(&id("abc"), 4242).expect("register");

        let raw = std::fs::read_to_string(dir.path().join(PROCESS_REGISTRY_FILE)).expect("read");
        let json: serde_json::Value = serde_json::from_str(&raw).expect("json");
        assert_eq!(json, serde_json::json!({ "abc": 4242 }));
    }

    #[test]
    fn remove_happens_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = ProcessRegistry::load(dir.path()).expect("load");
        registry.register(&id("a1"), 7).expect("register");
        assert_eq!(registry.remove(&id("a1")).expect("remove"), Some(7));
        assert_eq!(registry.remove(&id("a1")).expect("remove"), None);
    }

    #[test]
    fn remove_pid_ignores_replaced_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = ProcessRegistry::load(dir.path()).expect("load");
        registry.register(&id("a1"), 10).expect("register");
        registry.remove(&id("a1")).expect("remove");
        registry.register(&id("a1"), 20).expect("register");

        assert!(!registry.remove_pid(&id("a1"), 10).expect("remove_pid"));
        assert_eq!(registry.pid_of(&id("a1")), Some(20));
        assert!(registry.remove_pid(&id("a1"), 20).expect("remove_pid"));
        assert!(registry.is_empty());
    }

    #[test]
    fn reservations_count_toward_the_ceiling() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = ProcessRegistry::load(dir.path()).expect("load");

        assert!(registry.try_reserve(&id("a1"), 1));
        assert!(!registry.try_reserve(&id("b2"), 1));
        assert_eq!(registry.occupancy(), 1);

        registry.release(&id("a1"));
        assert!(registry.try_reserve(&id("b2"), 1));
    }

    #[test]
    fn register_consumes_reservation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = ProcessRegistry::load(dir.path()).expect("load");
        assert!(registry.try_reserve(&id("a1"), 2));
        registry.register(&id("a1"), 11).expect("register");
        assert_eq!(registry.occupancy(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn reservations_are_not_persisted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = ProcessRegistry::load(dir.path()).expect("load");
        assert!(registry.try_reserve(&id("a1"), 5));
        drop(registry);

        let reloaded = ProcessRegistry::load(dir.path()).expect("reload");
        assert_eq!(reloaded.occupancy(), 0);
    }
}
