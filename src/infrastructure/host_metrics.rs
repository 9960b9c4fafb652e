//! Host and process gauges sampled by the agent
//!
//! The gauge set is a fixed table of named producers over one `sysinfo`
//! refresh, plus one gauge per logical CPU and a `RandomValue` jitter gauge.

use rand::Rng;
use sysinfo::{Pid, Process, System};

/// Produces the current gauge readings on every call
pub trait GaugeSource: Send {
    fn read(&mut self) -> Vec<(String, f64)>;
}

struct HostView<'a> {
    system: &'a System,
    process: Option<&'a Process>,
}

type Producer = fn(&HostView<'_>) -> f64;

const PRODUCERS: &[(&str, Producer)] = &[
    ("TotalMemory", |h| h.system.total_memory() as f64),
    ("FreeMemory", |h| h.system.free_memory() as f64),
    ("UsedMemory", |h| h.system.used_memory() as f64),
    ("AvailableMemory", |h| h.system.available_memory() as f64),
    ("TotalSwap", |h| h.system.total_swap() as f64),
    ("UsedSwap", |h| h.system.used_swap() as f64),
    ("ProcessResidentMemory", |h| {
        h.process.map(|p| p.memory() as f64).unwrap_or_default()
    }),
    ("ProcessVirtualMemory", |h| {
        h.process.map(|p| p.virtual_memory() as f64).unwrap_or_default()
    }),
    ("ProcessCpuUsage", |h| {
        h.process.map(|p| p.cpu_usage() as f64).unwrap_or_default()
    }),
    ("CPUutilization", |h| h.system.global_cpu_usage() as f64),
];

/// Names of the fixed gauges, in reading order
pub fn gauge_names() -> impl Iterator<Item = &'static str> {
    PRODUCERS.iter().map(|(name, _)| *name)
}

pub struct HostGaugeSource {
    system: System,
    pid: Option<Pid>,
}

impl HostGaugeSource {
    pub fn new() -> Self {
        let mut system = System::new_all();
        system.refresh_all();
        Self {
            system,
            pid: sysinfo::get_current_pid().ok(),
        }
    }
}

impl Default for HostGaugeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl GaugeSource for HostGaugeSource {
    fn read(&mut self) -> Vec<(String, f64)> {
        self.system.refresh_all();

        let view = HostView {
            system: &self.system,
            process: self.pid.and_then(|pid| self.system.process(pid)),
        };

        let mut gauges: Vec<(String, f64)> = PRODUCERS
            .iter()
            .map(|(name, produce)| (name.to_string(), produce(&view)))
            .collect();

        for (n, cpu) in self.system.cpus().iter().enumerate() {
            gauges.push((format!("CPUutilization{}", n + 1), cpu.cpu_usage() as f64));
        }

        gauges.push(("RandomValue".to_string(), rand::rng().random::<f64>()));
        gauges
    }
}
