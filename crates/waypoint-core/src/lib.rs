//! Workflow engine core for Waypoint.
//!
//! This crate holds the control-flow logic -- the memory store, the step
//! variants, retry and gate protocols, the audit trace, and the engine loop --
//! plus the traits ("ports") that executors and approval channels implement.
//! It depends only on `waypoint-types`, never on `waypoint-infra` or any
//! process/terminal IO.

pub mod memory;
pub mod workflow;
