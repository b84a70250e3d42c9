//! Grouping finished artifacts into per-category archives.

pub mod naming;
pub mod pipeline;
pub mod writer;
