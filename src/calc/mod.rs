//! Expected output calculation from subject and animation descriptors.

/// Descriptor file reading.
pub mod descriptor;
/// Artifact count calculation.
pub mod expected;
