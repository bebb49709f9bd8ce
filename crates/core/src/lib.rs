//! Channel computation lifecycle core.
//!
//! Domain logic for running the external channel and pore tools against
//! molecular structures: the computation state machine persisted per job,
//! the process supervisor, the persisted registry of running processes, the
//! admission policy and the [`manager::JobManager`] that composes them. No
//! HTTP here; the API crate maps requests onto the manager.

pub mod admission;
pub mod archive;
pub mod artifact;
pub mod config;
pub mod error;
pub mod fetch;
pub mod files;
pub mod input;
pub mod job;
pub mod manager;
pub mod params;
pub mod persist;
pub mod registry;
pub mod status;
pub mod summary;
pub mod supervisor;
pub mod types;
pub mod xml;
