//! `StatsCollector` backed by `sysinfo`.

use std::time::Duration;

use anyhow::Result;
use sysinfo::{Disks, Networks, System};

use crate::application::ports::StatsCollector;
use crate::domain::MachineStats;
use crate::domain::telemetry::{DiskUsage, PartitionUsage, is_ignored_device};

/// CPU load is sampled over this window.
const CPU_SAMPLE_WINDOW: Duration = Duration::from_secs(1);

/// Reads host statistics from the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SysinfoCollector;

impl StatsCollector for SysinfoCollector {
    fn collect(&self) -> Result<MachineStats> {
        let mut system = System::new();
        system.refresh_memory();

        // Load is the delta between two refreshes.
        system.refresh_cpu();
        std::thread::sleep(CPU_SAMPLE_WINDOW.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL));
        system.refresh_cpu();

        let (bytes_sent, bytes_received) = network_totals();

        Ok(MachineStats {
            total_memory: system.total_memory(),
            used_memory: system.used_memory(),
            cpu_load: system.global_cpu_info().cpu_usage(),
            cores_number: system.cpus().len(),
            bytes_sent,
            bytes_received,
            uptime: System::uptime(),
            disk: disk_usage(),
        })
    }
}

fn disk_usage() -> DiskUsage {
    let disks = Disks::new_with_refreshed_list();
    let partitions = disks
        .list()
        .iter()
        .filter_map(|disk| {
            let device = disk.name().to_string_lossy().into_owned();
            if is_ignored_device(&device) {
                return None;
            }
            Some(PartitionUsage::new(
                disk.mount_point().to_string_lossy().into_owned(),
                disk.file_system().to_string_lossy().into_owned(),
                device,
                disk.total_space(),
                disk.available_space(),
            ))
        })
        .collect();
    DiskUsage::from_partitions(partitions)
}

fn network_totals() -> (u64, u64) {
    let networks = Networks::new_with_refreshed_list();
    networks.iter().fold((0, 0), |(sent, received), (_, data)| {
        (
            sent + data.total_transmitted(),
            received + data.total_received(),
        )
    })
}
