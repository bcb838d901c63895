use std::path::Path;
#[cfg(feature = "cli")]
use std::sync::Mutex;
#[cfg(feature = "cli")]
use std::time::{Duration, Instant};
#[cfg(feature = "cli")]
use sysinfo::{Pid, RefreshKind, System};

#[cfg(feature = "cli")]
#[derive(Debug, Clone)]
pub struct ProcessStats {
    pub cpu_usage: f32,
    pub memory_usage_mb: u64,
    pub memory_usage_percent: f32,
    pub peak_memory_mb: u64,
    pub uptime: Duration,
}

/// Samples CPU and memory of a server process.
#[cfg(feature = "cli")]
pub struct SystemMonitor {
    system: Mutex<System>,
    start_time: Instant,
    peak_memory: Mutex<u64>,
    enabled: bool,
}

#[cfg(feature = "cli")]
impl SystemMonitor {
    pub fn new(enabled: bool) -> Self {
        let mut system = System::new_with_specifics(RefreshKind::everything());
        system.refresh_all();

        Self {
            system: Mutex::new(system),
            start_time: Instant::now(),
            peak_memory: Mutex::new(0),
            enabled,
        }
    }

    pub fn process_stats(&self, pid: u32) -> Option<ProcessStats> {
        if !self.enabled {
            return None;
        }

        let mut system = self.system.lock().ok()?;
        system.refresh_all();

        let process = system.process(Pid::from_u32(pid))?;
        let memory_mb = process.memory() / 1024 / 1024;
        let total_memory = system.total_memory() / 1024 / 1024;
        let memory_percent = if total_memory > 0 {
            (memory_mb as f32 / total_memory as f32) * 100.0
        } else {
            0.0
        };

        let mut peak = self.peak_memory.lock().ok()?;
        if memory_mb > *peak {
            *peak = memory_mb;
        }

        Some(ProcessStats {
            cpu_usage: process.cpu_usage(),
            memory_usage_mb: memory_mb,
            memory_usage_percent: memory_percent,
            peak_memory_mb: *peak,
            uptime: self.start_time.elapsed(),
        })
    }

    pub fn log_stats(&self, name: &str, pid: u32) {
        if let Some(stats) = self.process_stats(pid) {
            tracing::info!(
                "📊 {} - CPU: {:.1}%, Memory: {}MB ({:.1}%), Peak: {}MB, Uptime: {:?}",
                name,
                stats.cpu_usage,
                stats.memory_usage_mb,
                stats.memory_usage_percent,
                stats.peak_memory_mb,
                stats.uptime
            );
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(feature = "cli")]
impl Default for SystemMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(feature = "cli")]
pub fn total_memory_mb() -> Option<u64> {
    let mut system = System::new();
    system.refresh_memory();
    match system.total_memory() / 1024 / 1024 {
        0 => None,
        mb => Some(mb),
    }
}

/// True when `pid` is alive and looks like a server started in `dir`: its
/// command line carries `nogui` and its working directory, when readable,
/// is `dir`. A reused pid from a stale pid file fails this check.
#[cfg(feature = "cli")]
pub fn is_server_process(pid: u32, dir: &Path) -> bool {
    let mut system = System::new();
    system.refresh_all();

    let Some(process) = system.process(Pid::from_u32(pid)) else {
        return false;
    };

    let launched_as_server = process.cmd().iter().any(|arg| arg.to_str() == Some("nogui"));
    let dir = std::fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf());
    let same_dir = process.cwd().map_or(true, |cwd| cwd == dir.as_path());
    launched_as_server && same_dir
}

// Without system information, a recorded pid is never treated as alive.
#[cfg(not(feature = "cli"))]
pub struct SystemMonitor;

#[cfg(not(feature = "cli"))]
impl SystemMonitor {
    pub fn new(_enabled: bool) -> Self {
        Self
    }

    pub fn log_stats(&self, _name: &str, _pid: u32) {}

    pub fn is_enabled(&self) -> bool {
        false
    }
}

#[cfg(not(feature = "cli"))]
pub fn total_memory_mb() -> Option<u64> {
    None
}

#[cfg(not(feature = "cli"))]
pub fn is_server_process(_pid: u32, _dir: &Path) -> bool {
    false
}
