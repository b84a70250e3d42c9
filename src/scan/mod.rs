//! Output directory scanning.

/// Recursive artifact lookup (newest / count modes).
pub mod scanner;
