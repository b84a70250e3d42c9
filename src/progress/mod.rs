//! Progress estimation and the periodic sampling loops.

/// Session-relative counts and the trailing-window ETA.
pub mod estimator;
/// Event sinks, change detection and loop spawning.
pub mod monitor;
