//! Fleetwatch agent library: secure self-update, host telemetry and release
//! tooling.

pub mod application;
pub mod cli;
pub mod commands;
pub mod domain;
pub mod infra;
