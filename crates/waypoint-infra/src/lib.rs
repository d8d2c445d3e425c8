//! Infrastructure layer for Waypoint.
//!
//! Implements the executor port from `waypoint-core` against the outside
//! world (child processes, static dry-run output) and loads engine config
//! and workflow manifests from disk.

pub mod config;
pub mod executor;
pub mod manifest;
