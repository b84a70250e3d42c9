//! Render session lifecycle: request, worker launch, stop and cleanup.

/// Bounded-retry directory removal.
pub mod cleanup;
/// Session state machine and controller.
pub mod controller;
/// Worker process seam.
pub mod host;
/// Render requests and the job descriptor handed to workers.
pub mod request;
