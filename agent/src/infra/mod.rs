//! Infrastructure layer: concrete implementations of the application ports.

pub mod archive;
pub mod github;
pub mod http;
pub mod identity;
pub mod process;
pub mod stats;
pub mod store;
pub mod trust;
