//! Resource Monitor (component I): polls process-level system metrics and
//! offers non-binding heuristics the kernel *may* consult when choosing a
//! compute tier (spec.md §4.I).

use crate::ids::ComputeTier;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use sysinfo::{Pid, System};
use tokio::time::interval;
use tracing::debug;

/// Default polling period.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// A single snapshot of process-level system metrics.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SystemMetrics {
    pub memory_used_bytes: u64,
    pub memory_total_bytes: u64,
    pub memory_used_pct: f64,
    pub thread_count: usize,
    pub num_cpus: usize,
}

/// Polls and caches system metrics in the background; `get_metrics` reads
/// the latest cached snapshot without blocking on a fresh poll.
pub struct ResourceMonitor {
    latest: Arc<RwLock<SystemMetrics>>,
    num_cpus: usize,
}

impl ResourceMonitor {
    /// Build a monitor and take one synchronous snapshot immediately so
    /// `get_metrics` never returns a default-zeroed reading before the
    /// background loop's first tick.
    pub fn new() -> Self {
        let num_cpus = num_cpus::get();
        let monitor = Self {
            latest: Arc::new(RwLock::new(SystemMetrics {
                num_cpus,
                ..Default::default()
            })),
            num_cpus,
        };
        monitor.poll_once();
        monitor
    }

    /// Spawn the background polling loop at `interval_period`. Returns a
    /// handle the caller can abort to stop polling.
    pub fn spawn_polling(self: &Arc<Self>, interval_period: Duration) -> tokio::task::JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval(interval_period);
            loop {
                ticker.tick().await;
                monitor.poll_once();
            }
        })
    }

    fn poll_once(&self) {
        let pid = Pid::from_u32(std::process::id());
        let mut system = System::new();
        system.refresh_memory();
        system.refresh_process(pid);

        let memory_total_bytes = system.total_memory();
        let memory_used_bytes = system
            .process(pid)
            .map(|p| p.memory())
            .unwrap_or_else(|| system.used_memory());
        let memory_used_pct = if memory_total_bytes == 0 {
            0.0
        } else {
            (memory_used_bytes as f64 / memory_total_bytes as f64) * 100.0
        };
        let thread_count = thread_count_for(&system, pid);

        let metrics = SystemMetrics {
            memory_used_bytes,
            memory_total_bytes,
            memory_used_pct,
            thread_count,
            num_cpus: self.num_cpus,
        };

        debug!(?metrics, "resource monitor tick");
        *self.latest.write().expect("resource monitor lock poisoned") = metrics;
    }

    pub fn get_metrics(&self) -> SystemMetrics {
        *self.latest.read().expect("resource monitor lock poisoned")
    }

    /// Non-binding tier suggestion (spec.md §4.I heuristics).
    pub fn suggest_compute_tier(&self) -> ComputeTier {
        let m = self.get_metrics();
        let fast_threshold = self.num_cpus * 1000;
        let deep_threshold = self.num_cpus * 100;

        if m.memory_used_pct > 80.0 || m.thread_count > fast_threshold {
            ComputeTier::Fast
        } else if m.memory_used_pct < 50.0 && m.thread_count < deep_threshold {
            ComputeTier::Deep
        } else {
            ComputeTier::Hybrid
        }
    }

    /// Whether the system is under enough pressure to warrant caution.
    pub fn is_system_constrained(&self) -> bool {
        let m = self.get_metrics();
        let constrained_threshold = self.num_cpus * 2000;
        m.memory_used_pct > 75.0 || m.thread_count > constrained_threshold
    }
}

impl Default for ResourceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// This process's own thread count (Linux exposes it via `/proc/pid/task`
/// through `sysinfo`'s `tasks()`; elsewhere fall back to a single thread
/// rather than counting unrelated OS processes).
#[cfg(target_os = "linux")]
fn thread_count_for(system: &System, pid: Pid) -> usize {
    system
        .process(pid)
        .and_then(|p| p.tasks())
        .map(|tasks| tasks.len())
        .unwrap_or(1)
}

#[cfg(not(target_os = "linux"))]
fn thread_count_for(_system: &System, _pid: Pid) -> usize {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_monitor_reports_nonzero_cpu_count() {
        let monitor = ResourceMonitor::new();
        assert!(monitor.get_metrics().num_cpus >= 1);
    }

    #[test]
    fn suggest_compute_tier_defaults_to_a_valid_variant() {
        let monitor = ResourceMonitor::new();
        let tier = monitor.suggest_compute_tier();
        assert!(matches!(tier, ComputeTier::Fast | ComputeTier::Deep | ComputeTier::Hybrid));
    }

    #[test]
    fn high_memory_pressure_forces_fast_tier() {
        let monitor = ResourceMonitor::new();
        *monitor.latest.write().unwrap() = SystemMetrics {
            memory_used_bytes: 9,
            memory_total_bytes: 10,
            memory_used_pct: 90.0,
            thread_count: 1,
            num_cpus: monitor.num_cpus,
        };
        assert_eq!(monitor.suggest_compute_tier(), ComputeTier::Fast);
        assert!(monitor.is_system_constrained());
    }
}
