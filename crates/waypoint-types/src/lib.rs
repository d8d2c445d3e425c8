//! Shared domain types for Waypoint.
//!
//! Run and step statuses, task outcomes, resource accounting, engine
//! configuration, and the declarative workflow manifest format.
//!
//! Zero infrastructure dependencies -- only serde.

pub mod config;
pub mod manifest;
pub mod workflow;
