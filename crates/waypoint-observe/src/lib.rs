//! Logging and trace export setup shared by Waypoint binaries.

pub mod tracing_setup;
