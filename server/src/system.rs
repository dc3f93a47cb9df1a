use serde::Serialize;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};

/// Point-in-time host utilisation.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    /// 1-minute load average over logical CPU count, as a percentage.
    pub cpu_percent: f64,
    pub memory_percent: f64,
    /// Resident memory of this process.
    pub process_memory_mb: f64,
}

/// Sample the host. Blocking; call from `spawn_blocking`.
pub fn sample() -> HealthSnapshot {
    let mut system = System::new();
    system.refresh_memory();
    system.refresh_cpu_all();

    let cpus = system.cpus().len();
    let load = System::load_average().one;

    let process_memory_mb = sysinfo::get_current_pid()
        .ok()
        .and_then(|pid| {
            system.refresh_processes_specifics(
                ProcessesToUpdate::Some(&[pid]),
                true,
                ProcessRefreshKind::new().with_memory(),
            );
            system.process(pid).map(|p| p.memory() as f64 / 1024.0 / 1024.0)
        })
        .unwrap_or(0.0);

    HealthSnapshot {
        cpu_percent: round1(load_percent(load, cpus)),
        memory_percent: round1(ratio_percent(system.used_memory(), system.total_memory())),
        process_memory_mb: round1(process_memory_mb),
    }
}

fn load_percent(load: f64, cpus: usize) -> f64 {
    if cpus == 0 {
        return 0.0;
    }
    load / cpus as f64 * 100.0
}

fn ratio_percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    used as f64 / total as f64 * 100.0
}

pub(crate) fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
