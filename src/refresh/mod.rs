//! Scheduled recomputation of aggregates behind an atomically swapped snapshot.

pub mod service;
pub mod snapshot;
