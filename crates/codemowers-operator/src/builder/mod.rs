//! Builders for the metadata and scheduling fragments shared by all children.
pub mod affinity;
pub mod meta;
