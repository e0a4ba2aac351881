//! Telemetry payload types.
//!
//! Field names are part of the reporting endpoint's contract and must not be
//! renamed.

use serde::{Deserialize, Serialize};

/// Stable identity of the host the agent runs on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceId {
    pub id: String,
    pub cloud: String,
    #[serde(default)]
    pub addr: String,
}

/// Usage of one mounted partition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionUsage {
    pub mount: String,
    pub fs_type: String,
    pub device: String,
    pub total: u64,
    pub total_gb: u64,
    pub free: u64,
    pub free_gb: u64,
}

impl PartitionUsage {
    /// Build a usage record, deriving the whole-GiB figures.
    #[must_use]
    pub fn new(mount: String, fs_type: String, device: String, total: u64, free: u64) -> Self {
        Self {
            mount,
            fs_type,
            device,
            total,
            total_gb: total / GIB,
            free,
            free_gb: free / GIB,
        }
    }
}

const GIB: u64 = 1024 * 1024 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskUsage {
    pub total_gb: u64,
    pub usage: Vec<PartitionUsage>,
}

impl DiskUsage {
    /// Aggregate partitions; `total_gb` sums the per-partition GiB figures.
    #[must_use]
    pub fn from_partitions(usage: Vec<PartitionUsage>) -> Self {
        let total_gb = usage.iter().map(|p| p.total_gb).sum();
        Self { total_gb, usage }
    }
}

/// Point-in-time host statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MachineStats {
    #[serde(rename = "totalMemory")]
    pub total_memory: u64,
    #[serde(rename = "usedMemory")]
    pub used_memory: u64,
    #[serde(rename = "cpuLoad")]
    pub cpu_load: f32,
    pub cores_number: usize,
    #[serde(rename = "bytesSent")]
    pub bytes_sent: u64,
    #[serde(rename = "byteReceived")]
    pub bytes_received: u64,
    pub uptime: u64,
    pub disk: DiskUsage,
}

/// The document posted to the reporting endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceInfo {
    pub version: String,
    pub instance: InstanceId,
    pub stat: MachineStats,
}

/// Whether a block device should be left out of disk usage.
#[must_use]
pub fn is_ignored_device(device: &str) -> bool {
    device.starts_with("/dev/loop")
}
