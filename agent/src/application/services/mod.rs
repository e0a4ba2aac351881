//! Use-case orchestration over the port traits.

pub mod identity;
pub mod launch;
pub mod package;
pub mod report;
pub mod update;
