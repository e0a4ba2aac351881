//! Command implementations

pub mod keygen;
pub mod package;
pub mod run;
pub mod verify;
pub mod version;
