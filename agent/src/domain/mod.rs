//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `std::fs`, `std::process`, or `std::net`.

pub mod config;
pub mod error;
pub mod release;
pub mod signature;
pub mod telemetry;

pub use config::{AgentPaths, ConnectionParams, UpdateSettings};
pub use error::{ArchiveError, SignatureError, StoreError, UpdateError};
pub use release::{Asset, Release, UpgradeCandidate, select_upgrade};
pub use signature::{KeyPair, Signature};
pub use telemetry::{InstanceId, InstanceInfo, MachineStats};
