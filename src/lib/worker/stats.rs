use serde::Serializer;
use sysinfo::{Disks, System};

use crate::worker::types::SystemStats;

const MIB: u64 = 1024 * 1024;

pub(super) fn percent<S: Serializer>(value: &f32, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{value:.2}%"))
}

pub(super) fn megabytes<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{value} MB"))
}

/// Host usage as seen through a refreshed `sysinfo` handle.
///
/// `task_count` is supplied by the caller, normally the number of tasks
/// the registry holds as running.
pub fn get_stats(sysinfo: &System, task_count: u64) -> SystemStats {
    SystemStats {
        cpu_usage: (sysinfo.global_cpu_usage() * 100.0).round() / 100.0,
        total_memory: sysinfo.total_memory() / MIB,
        used_memory: sysinfo.used_memory() / MIB,
        total_swap: sysinfo.total_swap() / MIB,
        used_swap: sysinfo.used_swap() / MIB,
        system_name: System::name().unwrap_or_else(|| "Unknown".to_string()),
        hostname: System::host_name().unwrap_or_else(|| "Unknown".to_string()),
        total_cpus: sysinfo.cpus().len() as u64,
        disk_usage: disk_usage(&Disks::new_with_refreshed_list()),
        task_count,
    }
}

fn disk_usage(disks: &Disks) -> f32 {
    let (used, total) = disks.iter().fold((0u64, 0u64), |(used, total), disk| {
        (
            used + disk.total_space().saturating_sub(disk.available_space()),
            total + disk.total_space(),
        )
    });
    if total == 0 {
        return 0.0;
    }
    (used as f64 / total as f64 * 100.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_units() {
        let stats = SystemStats {
            cpu_usage: 12.5,
            total_memory: 2048,
            used_memory: 512,
            total_swap: 0,
            used_swap: 0,
            system_name: "Linux".into(),
            hostname: "node-1".into(),
            total_cpus: 4,
            disk_usage: 50.0,
            task_count: 3,
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["cpu_usage"], "12.50%");
        assert_eq!(json["total_memory"], "2048 MB");
        assert_eq!(json["disk_usage"], "50.00%");
        assert_eq!(json["task_count"], 3);
    }

    #[test]
    fn collects_task_count_from_caller() {
        let stats = get_stats(&System::new(), 7);
        assert_eq!(stats.task_count, 7);
        assert!(stats.disk_usage >= 0.0);
    }
}
